//! Converts a parsed [`crate::document::SchemaDocument`] into the internal
//! [`crate::schema::Schema`] model. Defaults are resolved here (e.g. a
//! fixed-int field with no explicit `endianness` inherits the schema's
//! config) so that [`crate::validate`] and everything downstream never has
//! to ask "what does this field actually mean" again.

use binschema_codec::{BitOrder, Endianness, VarlenEncoding};
use binschema_expr::Path;
use indexmap::IndexMap;

use crate::config::Config;
use crate::document::{
    BitOrderDef, ComputedDef, ConstValueDef, DiscriminatorDef, EndiannessDef, FieldDef,
    FieldKindDef, FieldShapeDef, InstanceDef, PointerBaseDef, PositionDef, SchemaDocument,
    SizeDef, StrEncodingDef, TypeDef as TypeDefDoc, VarlenEncodingDef, VariantDef,
};
use crate::errors::SchemaError;
use crate::field::{ConstValue, Field, FieldKind, FieldModifier, FieldSpec, PointerBase, StrEncoding};
use crate::instance::{Instance, PositionExpr, SizeExpr};
use crate::schema::{Schema, SequenceType, TypeDef};
use crate::union::{DiscriminatedUnion, Discriminator, Variant};

pub fn normalize(doc: SchemaDocument) -> Result<Schema, SchemaError> {
    let config = Config {
        endianness: doc.config.endianness.map(from_endianness).unwrap_or(Endianness::Big),
        bit_order: doc.config.bit_order.map(from_bit_order).unwrap_or(BitOrder::MsbFirst),
    };

    let mut types = IndexMap::with_capacity(doc.types.len());
    for (name, def) in doc.types {
        let type_def = normalize_type_def(&name, def, config)?;
        types.insert(name, type_def);
    }

    Ok(Schema { config, types })
}

fn normalize_type_def(name: &str, def: TypeDefDoc, config: Config) -> Result<TypeDef, SchemaError> {
    match def {
        TypeDefDoc::Sequence { fields, instances } => {
            let fields = fields
                .into_iter()
                .map(|f| normalize_field(name, f, config))
                .collect::<Result<Vec<_>, _>>()?;
            let instances = instances
                .into_iter()
                .map(|i| normalize_instance(name, i, config))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypeDef::Sequence(SequenceType { fields, instances }))
        }
        TypeDefDoc::DiscriminatedUnion { discriminator, variants } => {
            Ok(TypeDef::DiscriminatedUnion(normalize_union(name, discriminator, variants, config)?))
        }
        TypeDefDoc::Alias { field } => Ok(TypeDef::Alias(normalize_shape(name, field, config)?)),
    }
}

fn normalize_field(type_name: &str, def: FieldDef, config: Config) -> Result<Field, SchemaError> {
    let path = format!("{type_name}.{}", def.name);
    let spec = normalize_shape(&path, def.shape, config)?;
    Ok(Field { name: def.name, spec })
}

fn normalize_shape(path: &str, shape: FieldShapeDef, config: Config) -> Result<FieldSpec, SchemaError> {
    let kind = normalize_kind(path, shape.kind, config)?;
    let mut spec = FieldSpec::new(kind);

    if let Some(cond) = shape.condition {
        let expr = binschema_expr::parse(&cond)
            .map_err(|e| SchemaError::new(path, format!("invalid condition expression: {e}")))?;
        spec = spec.with_condition(expr);
    }

    match (shape.r#const, shape.computed) {
        (Some(c), None) => spec = spec.with_modifier(FieldModifier::Const(normalize_const(c))),
        (None, Some(c)) => spec = spec.with_modifier(FieldModifier::Computed(normalize_computed(c))),
        (None, None) => {}
        (Some(_), Some(_)) => {
            return Err(SchemaError::new(path, "field cannot be both `const` and `computed`"))
        }
    }

    Ok(spec)
}

fn normalize_const(def: ConstValueDef) -> ConstValue {
    match def {
        ConstValueDef::Int(n) => ConstValue::Int(n),
        ConstValueDef::Str(s) => ConstValue::Str(s),
        ConstValueDef::Bytes(b) => ConstValue::Bytes(b),
    }
}

fn normalize_computed(def: ComputedDef) -> crate::field::Computed {
    use crate::field::Computed;
    match def {
        ComputedDef::LengthOf { target } => Computed::LengthOf { target: parse_path(&target) },
        ComputedDef::LengthOfFromAfterField { after } => {
            Computed::LengthOfFromAfterField { after: parse_path(&after) }
        }
        ComputedDef::PositionOf { target } => Computed::PositionOf { target: parse_path(&target) },
    }
}

fn normalize_kind(path: &str, def: FieldKindDef, config: Config) -> Result<FieldKind, SchemaError> {
    let kind = match def {
        FieldKindDef::FixedInt { bits, signed, endianness } => FieldKind::FixedInt {
            bits,
            signed,
            endianness: endianness.map(from_endianness).unwrap_or(config.endianness),
        },
        FieldKindDef::BitField { bits, signed, bit_order } => FieldKind::BitField {
            bits,
            signed,
            bit_order: bit_order.map(from_bit_order).unwrap_or(config.bit_order),
        },
        FieldKindDef::VarInt { encoding, signed } => FieldKind::VarInt {
            encoding: from_varlen(encoding),
            signed,
        },
        FieldKindDef::FixedArray { element, count } => FieldKind::FixedArray {
            element: Box::new(normalize_kind(path, *element, config)?),
            count,
        },
        FieldKindDef::LengthPrefixedArray { element, length_bits } => FieldKind::LengthPrefixedArray {
            element: Box::new(normalize_kind(path, *element, config)?),
            length_bits,
        },
        FieldKindDef::ByteLengthPrefixedArray { element, length_bits } => {
            FieldKind::ByteLengthPrefixedArray {
                element: Box::new(normalize_kind(path, *element, config)?),
                length_bits,
            }
        }
        FieldKindDef::LengthPrefixedItemsArray { element, length_bits } => FieldKind::LengthPrefixedItemsArray {
            element: Box::new(normalize_kind(path, *element, config)?),
            length_bits,
        },
        FieldKindDef::FieldReferencedArray { element, count_path } => FieldKind::FieldReferencedArray {
            element: Box::new(normalize_kind(path, *element, config)?),
            count_path: parse_path(&count_path),
        },
        FieldKindDef::NullTerminatedArray { element } => FieldKind::NullTerminatedArray {
            element: Box::new(normalize_kind(path, *element, config)?),
        },
        FieldKindDef::EofTerminatedArray { element } => FieldKind::EofTerminatedArray {
            element: Box::new(normalize_kind(path, *element, config)?),
        },
        FieldKindDef::Str { bytes, encoding } => FieldKind::Str {
            bytes: Box::new(normalize_kind(path, *bytes, config)?),
            encoding: from_str_encoding(encoding),
        },
        FieldKindDef::TypeRef { type_name } => FieldKind::TypeRef { name: type_name },
        FieldKindDef::DiscriminatedUnion { discriminator, variants } => {
            FieldKind::DiscriminatedUnion(Box::new(normalize_union(path, discriminator, variants, config)?))
        }
        FieldKindDef::Pointer { offset_path, relative_to, offset_mask, target } => FieldKind::Pointer {
            offset_path: parse_path(&offset_path),
            relative_to: from_pointer_base(relative_to),
            offset_mask,
            target: Box::new(normalize_kind(path, *target, config)?),
        },
        FieldKindDef::Optional { inner, presence_bits } => FieldKind::Optional {
            inner: Box::new(normalize_kind(path, *inner, config)?),
            presence_bits,
        },
    };
    Ok(kind)
}

fn normalize_union(
    path: &str,
    discriminator: DiscriminatorDef,
    variants: Vec<VariantDef>,
    config: Config,
) -> Result<DiscriminatedUnion, SchemaError> {
    let discriminator = match discriminator {
        DiscriminatorDef::Peek { width, endianness } => Discriminator::Peek {
            width,
            endianness: endianness.map(from_endianness).unwrap_or(config.endianness),
        },
        DiscriminatorDef::Field { path } => Discriminator::Field { path: parse_path(&path) },
    };

    let variants = variants
        .into_iter()
        .map(|v| normalize_variant(path, v, config))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DiscriminatedUnion { discriminator, variants })
}

fn normalize_variant(path: &str, def: VariantDef, config: Config) -> Result<Variant, SchemaError> {
    let when = binschema_expr::parse(&def.when)
        .map_err(|e| SchemaError::new(path, format!("invalid `when` expression on variant `{}`: {e}", def.name)))?;
    Ok(Variant {
        name: def.name,
        when,
        target: normalize_kind(path, def.target, config)?,
    })
}

fn normalize_instance(type_name: &str, def: InstanceDef, config: Config) -> Result<Instance, SchemaError> {
    let path = format!("{type_name}.{}", def.name);
    let position = match def.position {
        PositionDef::Literal(n) if n < 0 => PositionExpr::FromEnd(n),
        PositionDef::Literal(n) => PositionExpr::Literal(n),
        PositionDef::Path(p) => PositionExpr::FieldPath(parse_path(&p)),
    };
    let size = match def.size {
        None => None,
        Some(SizeDef::Literal(n)) => Some(SizeExpr::Literal(n)),
        Some(SizeDef::Expr(s)) => {
            if let Some(field_path) = as_bare_path(&s) {
                Some(SizeExpr::FieldPath(field_path))
            } else {
                let expr = binschema_expr::parse(&s)
                    .map_err(|e| SchemaError::new(&path, format!("invalid size expression: {e}")))?;
                Some(SizeExpr::Computed(expr))
            }
        }
    };
    let condition = def
        .condition
        .map(|c| {
            binschema_expr::parse(&c).map_err(|e| SchemaError::new(&path, format!("invalid condition expression: {e}")))
        })
        .transpose()?;

    Ok(Instance {
        name: def.name,
        target: normalize_kind(&path, def.target, config)?,
        position,
        size,
        alignment: def.alignment,
        condition,
    })
}

/// A size/position string that's just a dotted identifier (no operators) is
/// treated as a field path rather than parsed as a general expression, so
/// `"header.count"` resolves the same way a `length_path` does.
fn as_bare_path(s: &str) -> Option<Path> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some(parse_path(trimmed))
}

fn parse_path(s: &str) -> Path {
    Path(s.split('.').map(str::to_string).collect())
}

fn from_endianness(e: EndiannessDef) -> Endianness {
    match e {
        EndiannessDef::Big => Endianness::Big,
        EndiannessDef::Little => Endianness::Little,
    }
}

fn from_bit_order(b: BitOrderDef) -> BitOrder {
    match b {
        BitOrderDef::MsbFirst => BitOrder::MsbFirst,
        BitOrderDef::LsbFirst => BitOrder::LsbFirst,
    }
}

fn from_varlen(v: VarlenEncodingDef) -> VarlenEncoding {
    match v {
        VarlenEncodingDef::Der => VarlenEncoding::Der,
        VarlenEncodingDef::Leb128 => VarlenEncoding::Leb128,
        VarlenEncodingDef::Ebml => VarlenEncoding::Ebml,
        VarlenEncodingDef::Vlq => VarlenEncoding::Vlq,
    }
}

fn from_str_encoding(e: StrEncodingDef) -> StrEncoding {
    match e {
        StrEncodingDef::Utf8 => StrEncoding::Utf8,
        StrEncodingDef::Ascii => StrEncoding::Ascii,
        StrEncodingDef::Latin1 => StrEncoding::Latin1,
    }
}

fn from_pointer_base(b: PointerBaseDef) -> PointerBase {
    match b {
        PointerBaseDef::StartOfStream => PointerBase::StartOfStream,
        PointerBaseDef::StartOfParent => PointerBase::StartOfParent,
        PointerBaseDef::CurrentPosition => PointerBase::CurrentPosition,
    }
}
