//! Decode plan: walks a normalized schema field by field, reading from a
//! [`binschema_codec::Reader`] and building a [`Value`] tree. Conditionals
//! gate reads, bit groups go straight through the runtime's bit-addressed
//! reads (no separate coalescing pass is needed — `Reader` already tracks a
//! sub-byte cursor), and instance fields are deferred to
//! [`crate::instance::InstanceCell`].

use std::rc::Rc;

use binschema_codec::{BufferSource, Reader};
use binschema_expr::{Environment, Path};
use indexmap::IndexMap;

use binschema_schema::{
    ConstValue, Field, FieldKind, FieldModifier, Instance, PointerBase, PositionExpr, Schema, SequenceType,
    SizeExpr, StrEncoding, TypeDef,
};
use binschema_schema::{DiscriminatedUnion, Discriminator};

use crate::errors::PlanError;
use crate::instance::InstanceCell;
use crate::value::{DiscriminatorEnv, StructEnv, Value};

/// Decodes a named root type from a complete in-memory buffer.
pub fn decode_type(schema: &Rc<Schema>, bytes: Rc<Vec<u8>>, type_name: &str) -> Result<Value, PlanError> {
    let mut reader = Reader::from_buffer((*bytes).clone());
    let type_def = schema
        .type_named(type_name)
        .ok_or_else(|| PlanError::UnknownType(type_name.to_string()))?;
    decode_type_def(schema, &bytes, type_def, &mut reader, &EmptyEnv, None)
}

struct EmptyEnv;
impl Environment for EmptyEnv {
    fn resolve(&self, path: &Path) -> Result<binschema_expr::Value, binschema_expr::ExprError> {
        Err(binschema_expr::ExprError::UndefinedName(path.as_str()))
    }
}

/// Decodes a field kind with no enclosing sibling scope: used for instance
/// targets, whose `position`/`size` have already been resolved against their
/// declaring sequence before the reader ever gets here.
pub fn decode_standalone(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    kind: &FieldKind,
    reader: &mut Reader<BufferSource>,
) -> Result<Value, PlanError> {
    decode_kind(schema, bytes, kind, reader, &EmptyEnv, None)
}

fn decode_type_def(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    type_def: &TypeDef,
    reader: &mut Reader<BufferSource>,
    env: &dyn Environment,
    root: Option<&IndexMap<String, Value>>,
) -> Result<Value, PlanError> {
    match type_def {
        TypeDef::Sequence(seq) => decode_sequence(schema, bytes, seq, reader, root).map(Value::Struct),
        TypeDef::DiscriminatedUnion(u) => decode_union(schema, bytes, u, reader, env, root),
        TypeDef::Alias(spec) => decode_kind(schema, bytes, &spec.kind, reader, env, root),
    }
}

pub fn decode_sequence(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    seq: &SequenceType,
    reader: &mut Reader<BufferSource>,
    root: Option<&IndexMap<String, Value>>,
) -> Result<IndexMap<String, Value>, PlanError> {
    let mut own: IndexMap<String, Value> = IndexMap::new();

    for field in &seq.fields {
        let skip = if let Some(cond) = &field.spec.condition {
            let env = StructEnv { current: &own, root: root.unwrap_or(&own) };
            !binschema_expr::eval(cond, &env)?.is_truthy()
        } else {
            false
        };

        if skip {
            continue;
        }

        let value = decode_field(schema, bytes, field, reader, &own, root)?;
        own.insert(field.name.clone(), value);
    }

    for inst in &seq.instances {
        let value = decode_instance(schema, bytes, inst, &own, root)?;
        own.insert(inst.name.clone(), value);
    }

    Ok(own)
}

fn decode_field(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    field: &Field,
    reader: &mut Reader<BufferSource>,
    own: &IndexMap<String, Value>,
    root: Option<&IndexMap<String, Value>>,
) -> Result<Value, PlanError> {
    let env = StructEnv { current: own, root: root.unwrap_or(own) };

    if let FieldModifier::Const(expected) = &field.spec.modifier {
        let decoded = decode_kind(schema, bytes, &field.spec.kind, reader, &env, root)?;
        let expected_value = const_as_value(expected);
        if decoded != expected_value {
            return Err(PlanError::ConstMismatch {
                path: field.name.clone(),
                expected: expected_value,
                found: decoded,
            });
        }
        return Ok(decoded);
    }

    if let FieldModifier::Computed(_) = &field.spec.modifier {
        // Computed fields are encoder-only placeholders; on decode they're
        // read like any ordinary field of their declared kind.
    }

    decode_kind(schema, bytes, &field.spec.kind, reader, &env, root)
}

fn const_as_value(c: &ConstValue) -> Value {
    match c {
        ConstValue::Int(n) => Value::Int(*n),
        ConstValue::Bytes(b) => Value::Bytes(b.clone()),
        ConstValue::Str(s) => Value::Str(s.clone()),
    }
}

pub fn decode_kind(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    kind: &FieldKind,
    reader: &mut Reader<BufferSource>,
    env: &dyn Environment,
    root: Option<&IndexMap<String, Value>>,
) -> Result<Value, PlanError> {
    match kind {
        FieldKind::FixedInt { bits, signed, endianness } => {
            let offset = reader.current_position().0;
            let raw = match *bits {
                8 if *signed => reader.read_i8().map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                8 => reader.read_u8().map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                16 if *signed => reader.read_i16(*endianness).map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                16 => reader.read_u16(*endianness).map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                32 if *signed => reader.read_i32(*endianness).map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                32 => reader.read_u32(*endianness).map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                64 if *signed => reader.read_i64(*endianness).map_err(|e| PlanError::Read(offset, e))?,
                64 => reader.read_u64(*endianness).map(|v| v as i64).map_err(|e| PlanError::Read(offset, e))?,
                other => unreachable!("validated to 8/16/32/64, got {other}"),
            };
            Ok(if *signed { Value::Int(raw) } else { Value::UInt(raw as u64) })
        }
        FieldKind::BitField { bits, signed, bit_order } => {
            let offset = reader.current_position().0;
            let raw = reader.read_bits_with_order(*bits, *bit_order).map_err(|e| PlanError::Read(offset, e))?;
            if *signed {
                Ok(Value::Int(binschema_codec::bits::sign_extend(raw, *bits)))
            } else {
                Ok(Value::UInt(raw))
            }
        }
        FieldKind::VarInt { encoding, signed } => {
            let offset = reader.current_position().0;
            let raw = reader.read_varlen(*encoding).map_err(|e| PlanError::Read(offset, e))?;
            Ok(if *signed { Value::Int(raw as i64) } else { Value::UInt(raw) })
        }
        FieldKind::FixedArray { element, count } => {
            let mut items = Vec::with_capacity(*count as usize);
            for _ in 0..*count {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::LengthPrefixedArray { element, length_bits } => {
            let count = read_inline_length(reader, *length_bits)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::ByteLengthPrefixedArray { element, length_bits } => {
            let byte_len = read_inline_length(reader, *length_bits)?;
            let end = reader.current_position().0 + byte_len;
            let mut items = Vec::new();
            while reader.current_position().0 < end {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::LengthPrefixedItemsArray { element, length_bits } => {
            let count = read_inline_length(reader, *length_bits)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::FieldReferencedArray { element, count_path } => {
            let count = resolve_int_path(env, count_path)?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::NullTerminatedArray { element } => {
            let mut items = Vec::new();
            loop {
                let item = decode_kind(schema, bytes, element, reader, env, root)?;
                if is_zero(&item) {
                    break;
                }
                items.push(item);
            }
            Ok(Value::Array(items))
        }
        FieldKind::EofTerminatedArray { element } => {
            let mut items = Vec::new();
            let len = reader.len().map_err(|e| PlanError::Read(reader.current_position().0, e))?;
            while reader.current_position().0 < len {
                items.push(decode_kind(schema, bytes, element, reader, env, root)?);
            }
            Ok(Value::Array(items))
        }
        FieldKind::Str { bytes: byte_kind, encoding } => {
            let raw = decode_kind(schema, bytes, byte_kind, reader, env, root)?;
            let raw_bytes = value_to_bytes(&raw);
            decode_string(&raw_bytes, *encoding)
        }
        FieldKind::TypeRef { name } => {
            let type_def = schema.type_named(name).ok_or_else(|| PlanError::UnknownType(name.clone()))?;
            decode_type_def(schema, bytes, type_def, reader, env, root)
        }
        FieldKind::DiscriminatedUnion(u) => decode_union(schema, bytes, u, reader, env, root),
        FieldKind::Pointer { offset_path, relative_to, offset_mask, target } => {
            let offset = resolve_int_path(env, offset_path)? as u64;
            let masked = match offset_mask {
                Some(mask) => offset & mask,
                None => offset,
            };
            let base = match relative_to {
                PointerBase::StartOfStream | PointerBase::StartOfParent => 0,
                PointerBase::CurrentPosition => reader.current_position().0,
            };
            let absolute = base + masked;
            let window = bytes
                .get(absolute as usize..)
                .ok_or_else(|| PlanError::Read(absolute, binschema_codec::ReadError::SeekOutOfBounds { position: absolute, len: bytes.len() as u64 }))?;
            let mut sub_reader = Reader::from_buffer(window.to_vec());
            decode_kind(schema, bytes, target, &mut sub_reader, env, root)
        }
        FieldKind::Optional { inner, presence_bits } => {
            let present = read_inline_length(reader, *presence_bits)?;
            if present != 0 {
                let value = decode_kind(schema, bytes, inner, reader, env, root)?;
                Ok(Value::Optional(Some(Box::new(value))))
            } else {
                Ok(Value::Optional(None))
            }
        }
    }
}

fn read_inline_length(reader: &mut Reader<BufferSource>, length_bits: u32) -> Result<u64, PlanError> {
    let offset = reader.current_position().0;
    match length_bits {
        8 => reader.read_u8().map(|v| v as u64).map_err(|e| PlanError::Read(offset, e)),
        16 => reader.read_u16(binschema_codec::Endianness::Big).map(|v| v as u64).map_err(|e| PlanError::Read(offset, e)),
        32 => reader.read_u32(binschema_codec::Endianness::Big).map(|v| v as u64).map_err(|e| PlanError::Read(offset, e)),
        other => reader.read_bits(other).map_err(|e| PlanError::Read(offset, e)),
    }
}

fn resolve_int_path(env: &dyn Environment, path: &Path) -> Result<i64, PlanError> {
    let value = env.resolve(path)?;
    value
        .as_int()
        .ok_or_else(|| PlanError::UnresolvedPath(path.as_str()))
}

fn is_zero(value: &Value) -> bool {
    matches!(value, Value::UInt(0) | Value::Int(0))
}

fn value_to_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(b) => b.clone(),
        Value::Array(items) => items.iter().filter_map(|v| v.as_u64()).map(|n| n as u8).collect(),
        _ => Vec::new(),
    }
}

fn decode_string(raw: &[u8], encoding: StrEncoding) -> Result<Value, PlanError> {
    match encoding {
        StrEncoding::Utf8 => String::from_utf8(raw.to_vec())
            .map(Value::Str)
            .map_err(|e| PlanError::InvalidString { path: String::new(), encoding: "utf8", source: e }),
        StrEncoding::Ascii => {
            for &b in raw {
                if b > 0x7F {
                    return Err(PlanError::ByteOutOfRange { path: String::new(), encoding: "ascii", value: b });
                }
            }
            Ok(Value::Str(raw.iter().map(|&b| b as char).collect()))
        }
        StrEncoding::Latin1 => Ok(Value::Str(raw.iter().map(|&b| b as char).collect())),
    }
}

fn decode_union(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    u: &DiscriminatedUnion,
    reader: &mut Reader<BufferSource>,
    env: &dyn Environment,
    root: Option<&IndexMap<String, Value>>,
) -> Result<Value, PlanError> {
    let discriminant = match &u.discriminator {
        Discriminator::Peek { width, endianness } => {
            let offset = reader.current_position().0;
            let raw = match width {
                8 => reader.peek_u8().map(|v| v as u64).map_err(|e| PlanError::Read(offset, e))?,
                16 => reader.peek_u16(*endianness).map(|v| v as u64).map_err(|e| PlanError::Read(offset, e))?,
                32 => reader.peek_u32(*endianness).map(|v| v as u64).map_err(|e| PlanError::Read(offset, e))?,
                other => reader.peek_bits(*other).map_err(|e| PlanError::Read(offset, e))?,
            };
            binschema_expr::Value::Int(raw as i64)
        }
        Discriminator::Field { path } => env.resolve(path)?,
    };

    let disc_env = DiscriminatorEnv { value: discriminant.clone(), inner: env };

    for variant in &u.variants {
        if binschema_expr::eval(&variant.when, &disc_env)?.is_truthy() {
            let decoded = decode_kind(schema, bytes, &variant.target, reader, env, root)?;
            return Ok(Value::Union { variant: variant.name.clone(), value: Box::new(decoded) });
        }
    }

    Err(PlanError::NoMatchingVariant { value: discriminant })
}

fn decode_instance(
    schema: &Rc<Schema>,
    bytes: &Rc<Vec<u8>>,
    inst: &Instance,
    own: &IndexMap<String, Value>,
    root: Option<&IndexMap<String, Value>>,
) -> Result<Value, PlanError> {
    let env = StructEnv { current: own, root: root.unwrap_or(own) };

    let gated = if let Some(cond) = &inst.condition {
        !binschema_expr::eval(cond, &env)?.is_truthy()
    } else {
        false
    };

    if gated {
        return Ok(Value::Instance(Rc::new(InstanceCell::skipped(schema.clone(), bytes.clone(), inst.target.clone()))));
    }

    let position = match &inst.position {
        PositionExpr::Literal(n) => *n as u64,
        PositionExpr::FieldPath(path) => resolve_int_path(&env, path)? as u64,
        PositionExpr::FromEnd(n) => (bytes.len() as i64 + n) as u64,
    };

    if let Some(alignment) = inst.alignment {
        if position % alignment != 0 {
            return Err(PlanError::Unaligned { position, alignment });
        }
    }

    let size = match &inst.size {
        None => None,
        Some(SizeExpr::Literal(n)) => Some(*n),
        Some(SizeExpr::FieldPath(path)) => Some(resolve_int_path(&env, path)? as u64),
        Some(SizeExpr::Computed(expr)) => Some(binschema_expr::eval(expr, &env)?.as_int().unwrap_or(0) as u64),
    };

    Ok(Value::Instance(Rc::new(InstanceCell::new(
        schema.clone(),
        bytes.clone(),
        inst.target.clone(),
        position,
        size,
    ))))
}
