//! Encode plan: the inverse of [`crate::decode`]. Fields whose value depends
//! on content written later (`computed` modifiers, byte-length-prefixed
//! arrays) use the writer's reserve/patch placeholder technique rather than
//! a second pass over the tree.

use std::rc::Rc;

use binschema_codec::{Endianness, Writer};
use binschema_expr::{Environment, Path};
use indexmap::IndexMap;

use binschema_schema::{Computed, ConstValue, Field, FieldKind, FieldModifier, Schema, SequenceType, StrEncoding, TypeDef};
use binschema_schema::{DiscriminatedUnion, Discriminator};

use crate::errors::PlanError;
use crate::value::{StructEnv, Value};

/// Encodes a named root type into a fresh byte buffer.
pub fn encode_type(schema: &Rc<Schema>, type_name: &str, value: &Value) -> Result<Vec<u8>, PlanError> {
    let mut writer = Writer::new().with_bit_order(schema.config.bit_order);
    let type_def = schema
        .type_named(type_name)
        .ok_or_else(|| PlanError::UnknownType(type_name.to_string()))?;
    encode_type_def(schema, type_def, value, &mut writer)?;
    flush_length_patches(&mut writer)?;
    writer.finish().map_err(PlanError::Write)
}

fn encode_type_def(schema: &Rc<Schema>, type_def: &TypeDef, value: &Value, writer: &mut Writer) -> Result<(), PlanError> {
    match type_def {
        TypeDef::Sequence(seq) => {
            let own = value.as_struct().ok_or_else(|| PlanError::UnresolvedPath("<sequence>".to_string()))?;
            encode_sequence(schema, seq, own, writer)
        }
        TypeDef::DiscriminatedUnion(u) => encode_union(schema, u, value, writer, &EmptyEnv),
        TypeDef::Alias(spec) => encode_kind(schema, &spec.kind, value, writer, &EmptyEnv),
    }
}

struct EmptyEnv;
impl Environment for EmptyEnv {
    fn resolve(&self, path: &Path) -> Result<binschema_expr::Value, binschema_expr::ExprError> {
        Err(binschema_expr::ExprError::UndefinedName(path.as_str()))
    }
}

pub fn encode_sequence(
    schema: &Rc<Schema>,
    seq: &SequenceType,
    own: &IndexMap<String, Value>,
    writer: &mut Writer,
) -> Result<(), PlanError> {
    let mut field_starts: IndexMap<String, u64> = IndexMap::new();
    let mut field_ends: IndexMap<String, u64> = IndexMap::new();
    let mut position_patches: Vec<PositionPatch> = Vec::new();

    for field in &seq.fields {
        let env = StructEnv { current: own, root: own };

        let skip = if let Some(cond) = &field.spec.condition {
            !binschema_expr::eval(cond, &env)?.is_truthy()
        } else {
            false
        };
        if skip {
            continue;
        }

        field_starts.insert(field.name.clone(), writer.current_byte_offset());
        encode_field(schema, field, own, writer, &env, &field_starts, &field_ends, &mut position_patches)?;
        field_ends.insert(field.name.clone(), writer.current_byte_offset());
    }

    // `position_of` may target a field that hadn't been written yet at the
    // point its computed field was encoded, so every patch is resolved here
    // against the now-complete `field_starts` map instead of inline.
    for patch in position_patches {
        let position = field_starts
            .get(&patch.target)
            .copied()
            .ok_or_else(|| PlanError::UnresolvedPath(patch.target.clone()))?;
        let bytes = encode_int_bytes(patch.bits, patch.signed, patch.endianness, position as i64);
        writer.patch_bytes(patch.placeholder, &bytes).map_err(PlanError::Write)?;
    }

    // Instances are random-access fields: their bytes aren't addressed by
    // the writer's cursor at decode time, but the encoder has no seek
    // mechanism of its own, so it writes them inline right after the
    // regular fields, the same way `Pointer` targets are written inline and
    // trust the sibling offset field to already describe that location.
    for inst in &seq.instances {
        let env = StructEnv { current: own, root: own };
        let skip = if let Some(cond) = &inst.condition {
            !binschema_expr::eval(cond, &env)?.is_truthy()
        } else {
            false
        };
        if skip {
            continue;
        }
        let value = own
            .get(&inst.name)
            .ok_or_else(|| PlanError::UnresolvedPath(inst.name.clone()))?;
        encode_kind(schema, &inst.target, value, writer, &env)?;
    }

    Ok(())
}

fn encode_field(
    schema: &Rc<Schema>,
    field: &Field,
    own: &IndexMap<String, Value>,
    writer: &mut Writer,
    env: &dyn Environment,
    field_starts: &IndexMap<String, u64>,
    field_ends: &IndexMap<String, u64>,
    position_patches: &mut Vec<PositionPatch>,
) -> Result<(), PlanError> {
    match &field.spec.modifier {
        FieldModifier::Const(c) => encode_kind(schema, &field.spec.kind, &const_as_value(c), writer, env),
        FieldModifier::Computed(computed) => {
            encode_computed(&field.spec.kind, computed, own, writer, field_starts, field_ends, position_patches)
        }
        FieldModifier::None => {
            let value = own
                .get(&field.name)
                .ok_or_else(|| PlanError::UnresolvedPath(field.name.clone()))?;
            encode_kind(schema, &field.spec.kind, value, writer, env)
        }
    }
}

/// Computed fields must be byte-aligned fixed-width integers: their encoded
/// size has to be known before the value that fills them is.
fn encode_computed(
    kind: &FieldKind,
    computed: &Computed,
    own: &IndexMap<String, Value>,
    writer: &mut Writer,
    field_starts: &IndexMap<String, u64>,
    field_ends: &IndexMap<String, u64>,
    position_patches: &mut Vec<PositionPatch>,
) -> Result<(), PlanError> {
    let (bits, signed, endianness) = match kind {
        FieldKind::FixedInt { bits, signed, endianness } => (*bits, *signed, *endianness),
        _ => return Err(PlanError::UnresolvedPath("computed modifier requires a fixed_int field".to_string())),
    };

    match computed {
        Computed::PositionOf { target } => {
            // `target` is typically a later field in the same sequence, so
            // its start offset isn't known yet; reserve the bytes here and
            // resolve the real value once `encode_sequence` has written
            // every field and `field_starts` is complete.
            let placeholder = writer.reserve_bytes(bits / 8)?;
            position_patches.push(PositionPatch { placeholder, target: target.as_str(), bits, signed, endianness });
            Ok(())
        }
        Computed::LengthOf { target } => {
            let name = target.as_str();
            let length = match own.get(&name) {
                Some(Value::Array(items)) => items.len() as i64,
                Some(Value::Bytes(b)) => b.len() as i64,
                Some(Value::Str(s)) => s.len() as i64,
                _ => return Err(PlanError::UnresolvedPath(name)),
            };
            write_fixed_int(writer, bits, signed, endianness, length)
        }
        Computed::LengthOfFromAfterField { after } => {
            let name = after.as_str();
            // `after` names a field that has already been written (it must
            // precede this one in declaration order, checked in validate),
            // so its end offset is already on hand; the span's own end isn't
            // known until the rest of the sequence finishes, so the patch is
            // queued and applied by `flush_length_patches`.
            let placeholder = writer.reserve_bytes(bits / 8)?;
            let start = field_ends
                .get(&name)
                .copied()
                .ok_or(PlanError::UnresolvedPath(name))?;
            PENDING_LENGTH_PATCHES.with(|cell| {
                cell.borrow_mut().push(DeferredLengthPatch { placeholder, start, bits, signed, endianness })
            });
            Ok(())
        }
    }
}

fn write_fixed_int(writer: &mut Writer, bits: u32, signed: bool, endianness: Endianness, value: i64) -> Result<(), PlanError> {
    match bits {
        8 if signed => writer.write_i8(value as i8).map_err(PlanError::Write),
        8 => writer.write_u8(value as u8).map_err(PlanError::Write),
        16 if signed => writer.write_i16(value as i16, endianness).map_err(PlanError::Write),
        16 => writer.write_u16(value as u16, endianness).map_err(PlanError::Write),
        32 if signed => writer.write_i32(value as i32, endianness).map_err(PlanError::Write),
        32 => writer.write_u32(value as u32, endianness).map_err(PlanError::Write),
        64 if signed => writer.write_i64(value, endianness).map_err(PlanError::Write),
        64 => writer.write_u64(value as u64, endianness).map_err(PlanError::Write),
        other => Err(PlanError::ValueOutOfRange { path: String::new(), value, bits: other }),
    }
}

fn const_as_value(c: &ConstValue) -> Value {
    match c {
        ConstValue::Int(n) => Value::Int(*n),
        ConstValue::Bytes(b) => Value::Bytes(b.clone()),
        ConstValue::Str(s) => Value::Str(s.clone()),
    }
}

pub fn encode_kind(
    schema: &Rc<Schema>,
    kind: &FieldKind,
    value: &Value,
    writer: &mut Writer,
    env: &dyn Environment,
) -> Result<(), PlanError> {
    match kind {
        FieldKind::FixedInt { bits, signed, endianness } => {
            let raw = value.as_i64().ok_or_else(|| PlanError::UnresolvedPath("<fixed_int>".to_string()))?;
            write_fixed_int(writer, *bits, *signed, *endianness, raw)
        }
        FieldKind::BitField { bits, signed: _, bit_order } => {
            let raw = value.as_u64().ok_or_else(|| PlanError::UnresolvedPath("<bit_field>".to_string()))?;
            writer.write_bits_with_order(*bits, raw, *bit_order).map_err(PlanError::Write)
        }
        FieldKind::VarInt { encoding, signed: _ } => {
            let raw = value.as_u64().ok_or_else(|| PlanError::UnresolvedPath("<varint>".to_string()))?;
            writer.write_varlen(raw, *encoding).map_err(PlanError::Write)
        }
        FieldKind::FixedArray { element, count } => {
            let items = array_items(value)?;
            if items.len() as u64 != *count {
                return Err(PlanError::ValueOutOfRange { path: String::new(), value: items.len() as i64, bits: 0 });
            }
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            Ok(())
        }
        FieldKind::LengthPrefixedArray { element, length_bits } => {
            let items = array_items(value)?;
            write_inline_length(writer, *length_bits, items.len() as u64)?;
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            Ok(())
        }
        FieldKind::ByteLengthPrefixedArray { element, length_bits } => {
            let items = array_items(value)?;
            let placeholder = writer.reserve_bytes(*length_bits / 8)?;
            let start = writer.current_byte_offset();
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            let byte_len = writer.current_byte_offset() - start;
            patch_inline_length(writer, placeholder, *length_bits, byte_len)
        }
        FieldKind::LengthPrefixedItemsArray { element, length_bits } => {
            let items = array_items(value)?;
            write_inline_length(writer, *length_bits, items.len() as u64)?;
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            Ok(())
        }
        FieldKind::FieldReferencedArray { element, count_path: _ } => {
            let items = array_items(value)?;
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            Ok(())
        }
        FieldKind::NullTerminatedArray { element } => {
            let items = array_items(value)?;
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            encode_zero(writer, element)
        }
        FieldKind::EofTerminatedArray { element } => {
            let items = array_items(value)?;
            for item in items {
                encode_kind(schema, element, item, writer, env)?;
            }
            Ok(())
        }
        FieldKind::Str { bytes, encoding } => {
            let raw = encode_string(value, *encoding)?;
            let byte_values: Vec<Value> = raw.into_iter().map(|b| Value::UInt(b as u64)).collect();
            encode_kind(schema, bytes, &Value::Array(byte_values), writer, env)
        }
        FieldKind::TypeRef { name } => {
            let type_def = schema.type_named(name).ok_or_else(|| PlanError::UnknownType(name.clone()))?;
            match type_def {
                TypeDef::Sequence(seq) => {
                    let own = value.as_struct().ok_or_else(|| PlanError::UnresolvedPath(name.clone()))?;
                    encode_sequence(schema, seq, own, writer)
                }
                TypeDef::DiscriminatedUnion(u) => encode_union(schema, u, value, writer, env),
                TypeDef::Alias(spec) => encode_kind(schema, &spec.kind, value, writer, env),
            }
        }
        FieldKind::DiscriminatedUnion(u) => encode_union(schema, u, value, writer, env),
        FieldKind::Pointer { target, .. } => {
            // The pointer's own offset field is written as an ordinary sibling
            // integer field; here we only write the pointed-to payload inline
            // at the current position, mirroring how decode treats pointer
            // targets as independently addressable spans.
            encode_kind(schema, target, value, writer, env)
        }
        FieldKind::Optional { inner, presence_bits } => match value {
            Value::Optional(Some(inner_value)) => {
                write_inline_length(writer, *presence_bits, 1)?;
                encode_kind(schema, inner, inner_value, writer, env)
            }
            Value::Optional(None) => write_inline_length(writer, *presence_bits, 0),
            _ => Err(PlanError::UnresolvedPath("<optional>".to_string())),
        },
    }
}

fn array_items(value: &Value) -> Result<&[Value], PlanError> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        _ => Err(PlanError::UnresolvedPath("<array>".to_string())),
    }
}

fn encode_zero(writer: &mut Writer, element: &FieldKind) -> Result<(), PlanError> {
    match element {
        FieldKind::FixedInt { bits, signed, endianness } => write_fixed_int(writer, *bits, *signed, *endianness, 0),
        FieldKind::BitField { bits, bit_order, .. } => {
            writer.write_bits_with_order(*bits, 0, *bit_order).map_err(PlanError::Write)
        }
        _ => Err(PlanError::UnresolvedPath("null_terminated_array requires a scalar element".to_string())),
    }
}

fn write_inline_length(writer: &mut Writer, length_bits: u32, count: u64) -> Result<(), PlanError> {
    match length_bits {
        8 => writer.write_u8(count as u8).map_err(PlanError::Write),
        16 => writer.write_u16(count as u16, Endianness::Big).map_err(PlanError::Write),
        32 => writer.write_u32(count as u32, Endianness::Big).map_err(PlanError::Write),
        other => writer.write_bits(other, count).map_err(PlanError::Write),
    }
}

fn patch_inline_length(
    writer: &mut Writer,
    placeholder: binschema_codec::Placeholder,
    length_bits: u32,
    byte_len: u64,
) -> Result<(), PlanError> {
    let bytes = match length_bits {
        8 => vec![byte_len as u8],
        16 => (byte_len as u16).to_be_bytes().to_vec(),
        32 => (byte_len as u32).to_be_bytes().to_vec(),
        other => return Err(PlanError::ValueOutOfRange { path: String::new(), value: byte_len as i64, bits: other }),
    };
    writer.patch_bytes(placeholder, &bytes).map_err(PlanError::Write)
}

fn encode_string(value: &Value, encoding: StrEncoding) -> Result<Vec<u8>, PlanError> {
    let s = match value {
        Value::Str(s) => s.as_str(),
        _ => return Err(PlanError::UnresolvedPath("<str>".to_string())),
    };
    match encoding {
        StrEncoding::Utf8 => Ok(s.as_bytes().to_vec()),
        StrEncoding::Ascii => {
            let mut out = Vec::with_capacity(s.len());
            for c in s.chars() {
                let b = c as u32;
                if b > 0x7F {
                    return Err(PlanError::ByteOutOfRange { path: String::new(), encoding: "ascii", value: b as u8 });
                }
                out.push(b as u8);
            }
            Ok(out)
        }
        StrEncoding::Latin1 => Ok(s.chars().map(|c| c as u8).collect()),
    }
}

fn encode_union(
    schema: &Rc<Schema>,
    u: &DiscriminatedUnion,
    value: &Value,
    writer: &mut Writer,
    env: &dyn Environment,
) -> Result<(), PlanError> {
    let (variant_name, inner) = match value {
        Value::Union { variant, value } => (variant.as_str(), value.as_ref()),
        _ => return Err(PlanError::UnresolvedPath("<union>".to_string())),
    };

    let variant = u
        .variants
        .iter()
        .find(|v| v.name == variant_name)
        .ok_or_else(|| PlanError::NoMatchingVariant { value: binschema_expr::Value::Str(variant_name.to_string()) })?;

    if let Discriminator::Peek { width, endianness } = &u.discriminator {
        let tag = discriminant_literal(&variant.when)
            .ok_or_else(|| PlanError::NoMatchingVariant { value: binschema_expr::Value::Str(variant_name.to_string()) })?;
        write_fixed_int(writer, *width, false, *endianness, tag)?;
    }

    encode_kind(schema, &variant.target, inner, writer, env)
}

/// Recovers the tag an encoder must write for a peek-based variant whose
/// `when` clause is a direct equality against the synthetic `value` name,
/// e.g. `value == 2`. Variants guarded by anything more structured (ranges,
/// boolean combinations) aren't encodable this way and are left to a
/// field-based discriminator instead.
fn discriminant_literal(when: &binschema_expr::Expr) -> Option<i64> {
    use binschema_expr::{BinOp, Expr, Literal};
    match when {
        Expr::Binary(BinOp::Eq, lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Path(p), Expr::Literal(Literal::Int(n))) if is_value_name(p) => Some(*n),
            (Expr::Literal(Literal::Int(n)), Expr::Path(p)) if is_value_name(p) => Some(*n),
            _ => None,
        },
        _ => None,
    }
}

fn is_value_name(path: &binschema_expr::Path) -> bool {
    path.0.len() == 1 && path.0[0] == "value"
}

/// A `position_of` placeholder queued within a single [`encode_sequence`]
/// call, resolved against that call's own `field_starts` once every field
/// has been written (unlike [`DeferredLengthPatch`], which is resolved at
/// the end of the whole encode, `position_of`'s target lives in the same
/// sequence the computed field does, so it doesn't need thread-local state).
struct PositionPatch {
    placeholder: binschema_codec::Placeholder,
    target: String,
    bits: u32,
    signed: bool,
    endianness: Endianness,
}

thread_local! {
    static PENDING_LENGTH_PATCHES: std::cell::RefCell<Vec<DeferredLengthPatch>> = const { std::cell::RefCell::new(Vec::new()) };
}

struct DeferredLengthPatch {
    placeholder: binschema_codec::Placeholder,
    start: u64,
    bits: u32,
    signed: bool,
    endianness: Endianness,
}

/// Applies every `length_of_from_after_field` placeholder queued since the
/// last flush. Called once per top-level [`encode_type`] after the whole
/// tree has been written, when every field's final position is known.
pub fn flush_length_patches(writer: &mut Writer) -> Result<(), PlanError> {
    let pending = PENDING_LENGTH_PATCHES.with(|cell| cell.take());
    let end = writer.current_byte_offset();
    for patch in pending {
        let length = end.saturating_sub(patch.start) as i64;
        let bytes = encode_int_bytes(patch.bits, patch.signed, patch.endianness, length);
        writer.patch_bytes(patch.placeholder, &bytes).map_err(PlanError::Write)?;
    }
    Ok(())
}

fn encode_int_bytes(bits: u32, signed: bool, endianness: Endianness, value: i64) -> Vec<u8> {
    let _ = signed;
    let width = (bits / 8) as usize;
    let be = (value as u64).to_be_bytes();
    let body = &be[8 - width..];
    match endianness {
        Endianness::Big => body.to_vec(),
        Endianness::Little => body.iter().rev().cloned().collect(),
    }
}
