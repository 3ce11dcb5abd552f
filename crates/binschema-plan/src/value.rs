//! The decoded value tree: what `decode` hands back to a caller and what
//! `encode` consumes.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::instance::InstanceCell;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<Value>),
    Struct(IndexMap<String, Value>),
    Union { variant: String, value: Box<Value> },
    Optional(Option<Box<Value>>),
    /// A random-access field, not yet (or possibly never) evaluated. See
    /// [`InstanceCell`] for the state machine.
    Instance(Rc<InstanceCell>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_struct()?.get(name)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Union { variant: v1, value: a }, Value::Union { variant: v2, value: b }) => v1 == v2 && a == b,
            (Value::Optional(a), Value::Optional(b)) => a == b,
            // Instances compare by identity of evaluation outcome is a
            // stream-dependent side effect; two instance handles are only
            // equal if they're the very same cell.
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Resolves dotted paths against a struct being decoded (or already decoded)
/// for use by [`binschema_expr::eval`]. `_root` walks back to the outermost
/// struct in the decode rather than the immediate parent.
pub struct StructEnv<'a> {
    pub current: &'a IndexMap<String, Value>,
    pub root: &'a IndexMap<String, Value>,
}

impl<'a> binschema_expr::Environment for StructEnv<'a> {
    fn resolve(&self, path: &binschema_expr::Path) -> Result<binschema_expr::Value, binschema_expr::ExprError> {
        let (scope, segments) = if path.is_root() {
            (self.root, &path.0[1..])
        } else {
            (self.current, &path.0[..])
        };

        let mut value = scope
            .get(segments.first().ok_or_else(|| binschema_expr::ExprError::UndefinedName(path.as_str()))?)
            .ok_or_else(|| binschema_expr::ExprError::UndefinedName(path.as_str()))?;

        for segment in &segments[1..] {
            value = value
                .field(segment)
                .ok_or_else(|| binschema_expr::ExprError::UndefinedName(path.as_str()))?;
        }

        to_expr_value(value, path)
    }
}

fn to_expr_value(value: &Value, path: &binschema_expr::Path) -> Result<binschema_expr::Value, binschema_expr::ExprError> {
    match value {
        Value::Int(n) => Ok(binschema_expr::Value::Int(*n)),
        Value::UInt(n) => Ok(binschema_expr::Value::Int(*n as i64)),
        Value::Bool(b) => Ok(binschema_expr::Value::Bool(*b)),
        Value::Str(s) => Ok(binschema_expr::Value::Str(s.clone())),
        _ => Err(binschema_expr::ExprError::UndefinedName(path.as_str())),
    }
}

/// Binds the synthetic name `value` (used inside discriminator `when`
/// clauses) to a peeked/referenced scalar, falling back to `inner` for every
/// other path.
pub struct DiscriminatorEnv<'a> {
    pub value: binschema_expr::Value,
    pub inner: &'a dyn binschema_expr::Environment,
}

impl<'a> binschema_expr::Environment for DiscriminatorEnv<'a> {
    fn resolve(&self, path: &binschema_expr::Path) -> Result<binschema_expr::Value, binschema_expr::ExprError> {
        if path.0.len() == 1 && path.0[0] == "value" {
            Ok(self.value.clone())
        } else {
            self.inner.resolve(path)
        }
    }
}
