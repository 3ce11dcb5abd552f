//! Validation rules from the data model's invariants. Collects every
//! violation rather than bailing on the first, matching the contract that
//! validation is exhaustive — callers see every problem with a schema in one
//! pass instead of fixing issues one error at a time.

use binschema_expr::{Expr, Path};

use crate::field::{Computed, Field, FieldKind, FieldModifier, FieldSpec};
use crate::instance::{Instance, PositionExpr, SizeExpr};
use crate::schema::{Schema, SequenceType, TypeDef};
use crate::union::{DiscriminatedUnion, Discriminator};
use crate::errors::SchemaError;

pub fn validate(schema: &Schema) -> Result<(), Vec<SchemaError>> {
    let mut errors = Vec::new();

    for (type_name, type_def) in &schema.types {
        match type_def {
            TypeDef::Sequence(seq) => validate_sequence(schema, type_name, seq, &mut errors),
            TypeDef::DiscriminatedUnion(u) => validate_union(schema, type_name, None, u, &mut errors),
            TypeDef::Alias(spec) => validate_spec(schema, type_name, None, spec, &mut errors),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_sequence(schema: &Schema, type_name: &str, seq: &SequenceType, errors: &mut Vec<SchemaError>) {
    let mut seen = std::collections::HashSet::new();
    for field in &seq.fields {
        if !seen.insert(field.name.as_str()) {
            errors.push(SchemaError::new(type_name, format!("duplicate field name `{}`", field.name)));
        }
        validate_field(schema, type_name, seq, field, errors);
    }
    for inst in &seq.instances {
        if !seen.insert(inst.name.as_str()) {
            errors.push(SchemaError::new(type_name, format!("duplicate field name `{}`", inst.name)));
        }
        validate_instance(schema, type_name, seq, inst, errors);
    }
}

fn validate_field(schema: &Schema, type_name: &str, seq: &SequenceType, field: &Field, errors: &mut Vec<SchemaError>) {
    validate_spec(schema, type_name, Some(seq), &field.spec, errors);

    match &field.spec.modifier {
        FieldModifier::Computed(Computed::LengthOfFromAfterField { after }) => {
            validate_path(type_name, Some(seq), after, &[], errors, &format!("`{}`'s from_after_field", field.name));
            if let Some(anchor_name) = after.0.last() {
                if let Some(anchor_idx) = field_index(seq, anchor_name) {
                    if let Some(field_idx) = field_index(seq, &field.name) {
                        if field_idx <= anchor_idx {
                            errors.push(SchemaError::new(
                                type_name,
                                format!(
                                    "`{}`'s from_after_field anchor `{anchor_name}` must precede it",
                                    field.name
                                ),
                            ));
                        } else if field_idx - anchor_idx > 1 {
                            errors.push(SchemaError::new(
                                type_name,
                                format!(
                                    "`{}`'s from_after_field anchor `{anchor_name}` has content field(s) between it and `{}` (would cause double-encoding)",
                                    field.name, field.name
                                ),
                            ));
                        }
                    }
                }
            }
        }
        FieldModifier::Computed(Computed::LengthOf { target }) => {
            validate_path(type_name, Some(seq), target, &[], errors, &format!("`{}`'s length_of", field.name));
        }
        FieldModifier::Computed(Computed::PositionOf { target }) => {
            validate_path(type_name, Some(seq), target, &[], errors, &format!("`{}`'s position_of", field.name));
        }
        FieldModifier::None | FieldModifier::Const(_) => {}
    }
}

fn field_index(seq: &SequenceType, field_name: &str) -> Option<usize> {
    seq.fields.iter().position(|f| f.name == field_name)
}

fn validate_spec(schema: &Schema, type_name: &str, seq: Option<&SequenceType>, spec: &FieldSpec, errors: &mut Vec<SchemaError>) {
    if let Some(cond) = &spec.condition {
        validate_expr(type_name, seq, cond, &[], errors, "field condition");
    }
    validate_kind(schema, type_name, seq, &spec.kind, errors);
}

fn validate_kind(schema: &Schema, type_name: &str, seq: Option<&SequenceType>, kind: &FieldKind, errors: &mut Vec<SchemaError>) {
    match kind {
        FieldKind::FixedInt { bits, .. } => {
            if ![8, 16, 32, 64].contains(bits) {
                errors.push(SchemaError::new(type_name, format!("fixed_int width {bits} is not one of 8/16/32/64")));
            }
        }
        FieldKind::BitField { bits, .. } => {
            if *bits == 0 || *bits > 64 {
                errors.push(SchemaError::new(type_name, format!("bit_field width {bits} must be 1..=64")));
            }
        }
        FieldKind::VarInt { .. } => {}
        FieldKind::FixedArray { element, .. }
        | FieldKind::LengthPrefixedArray { element, .. }
        | FieldKind::ByteLengthPrefixedArray { element, .. }
        | FieldKind::LengthPrefixedItemsArray { element, .. }
        | FieldKind::NullTerminatedArray { element }
        | FieldKind::EofTerminatedArray { element } => validate_kind(schema, type_name, seq, element, errors),
        FieldKind::FieldReferencedArray { element, count_path } => {
            validate_path(type_name, seq, count_path, &[], errors, "field_referenced_array's count");
            validate_kind(schema, type_name, seq, element, errors);
        }
        FieldKind::Str { bytes, .. } => validate_kind(schema, type_name, seq, bytes, errors),
        FieldKind::TypeRef { name } => {
            if !schema.types.contains_key(name) {
                errors.push(SchemaError::new(type_name, format!("type_ref to unknown type `{name}`")));
            }
        }
        FieldKind::DiscriminatedUnion(u) => validate_union(schema, type_name, seq, u, errors),
        FieldKind::Pointer { offset_path, target, .. } => {
            validate_path(type_name, seq, offset_path, &[], errors, "pointer's offset");
            validate_kind(schema, type_name, seq, target, errors);
        }
        FieldKind::Optional { inner, presence_bits } => {
            if ![8, 16, 32, 64].contains(presence_bits) {
                errors.push(SchemaError::new(type_name, format!("optional presence width {presence_bits} is not one of 8/16/32/64")));
            }
            validate_kind(schema, type_name, seq, inner, errors);
        }
    }
}

fn validate_union(schema: &Schema, type_name: &str, seq: Option<&SequenceType>, u: &DiscriminatedUnion, errors: &mut Vec<SchemaError>) {
    match &u.discriminator {
        Discriminator::Peek { .. } => {}
        Discriminator::Field { path } => {
            if path.0.is_empty() {
                errors.push(SchemaError::new(type_name, "field discriminator has an empty path"));
            } else {
                validate_path(type_name, seq, path, &[], errors, "field discriminator");
            }
        }
    }
    if u.variants.is_empty() {
        errors.push(SchemaError::new(type_name, "discriminated union has no variants"));
    }
    for variant in &u.variants {
        validate_expr(type_name, seq, &variant.when, &["value"], errors, &format!("variant `{}`'s when", variant.name));
        validate_kind(schema, type_name, seq, &variant.target, errors);
    }
}

fn validate_instance(schema: &Schema, type_name: &str, seq: &SequenceType, inst: &Instance, errors: &mut Vec<SchemaError>) {
    if let Some(alignment) = inst.alignment {
        if alignment == 0 || !alignment.is_power_of_two() {
            errors.push(SchemaError::new(
                type_name,
                format!("instance `{}` alignment {alignment} is not a power of two", inst.name),
            ));
        }
    }
    match &inst.position {
        PositionExpr::Literal(_) | PositionExpr::FromEnd(_) => {}
        PositionExpr::FieldPath(path) => {
            validate_path(type_name, Some(seq), path, &[], errors, &format!("instance `{}`'s position", inst.name));
        }
    }
    match &inst.size {
        None | Some(SizeExpr::Literal(_)) => {}
        Some(SizeExpr::FieldPath(path)) => {
            validate_path(type_name, Some(seq), path, &[], errors, &format!("instance `{}`'s size", inst.name));
        }
        Some(SizeExpr::Computed(expr)) => {
            validate_expr(type_name, Some(seq), expr, &[], errors, &format!("instance `{}`'s size", inst.name));
        }
    }
    if let Some(cond) = &inst.condition {
        validate_expr(type_name, Some(seq), cond, &[], errors, &format!("instance `{}`'s condition", inst.name));
    }
    validate_kind(schema, type_name, Some(seq), &inst.target, errors);
}

/// Checks that every `Path` reachable inside `expr` resolves to a field or
/// instance in `seq`'s scope (or one of `extra` synthetic names, e.g. the
/// `value` identifier bound in a union's `when` clause).
fn validate_expr(type_name: &str, seq: Option<&SequenceType>, expr: &Expr, extra: &[&str], errors: &mut Vec<SchemaError>, what: &str) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Path(path) => validate_path(type_name, seq, path, extra, errors, what),
        Expr::Unary(_, inner) => validate_expr(type_name, seq, inner, extra, errors, what),
        Expr::Binary(_, lhs, rhs) => {
            validate_expr(type_name, seq, lhs, extra, errors, what);
            validate_expr(type_name, seq, rhs, extra, errors, what);
        }
    }
}

/// Checks that `path` resolves to a name in `seq`'s scope. `_root`-rooted
/// paths are left unchecked — the root type at decode time is a caller
/// concern, not something a schema can verify against itself. Paths with no
/// scope to check against (bare aliases) are likewise left unchecked.
fn validate_path(type_name: &str, seq: Option<&SequenceType>, path: &Path, extra: &[&str], errors: &mut Vec<SchemaError>, what: &str) {
    if path.is_root() {
        return;
    }
    let Some(head) = path.0.first() else {
        return;
    };
    if extra.contains(&head.as_str()) {
        return;
    }
    let Some(seq) = seq else {
        return;
    };
    let in_scope = seq.fields.iter().any(|f| &f.name == head) || seq.instances.iter().any(|i| &i.name == head);
    if !in_scope {
        errors.push(SchemaError::new(type_name, format!("{what} references unknown field `{head}`")));
    }
}
