//! Expression evaluation against an [`Environment`] of decoded field values.
//!
//! Arithmetic is 64-bit two's-complement and wraps on overflow, matching the
//! width of the integers the codec itself hands back from a decode. Division
//! and remainder by zero are fatal rather than wrapping to some sentinel.

use crate::ast::{BinOp, Expr, Literal, Path, UnOp};
use crate::errors::ExprError;
use crate::value::Value;

/// Resolves path references (`header.flags`, `_root.version`, the synthetic
/// `value` name inside a discriminator) to a [`Value`]. Left to the caller
/// because what a path means depends on where in a decode tree evaluation is
/// happening, which this crate has no visibility into.
pub trait Environment {
    fn resolve(&self, path: &Path) -> Result<Value, ExprError>;
}

pub fn eval(expr: &Expr, env: &dyn Environment) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(Literal::Int(n)) => Ok(Value::Int(*n)),
        Expr::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),
        Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        Expr::Path(path) => env.resolve(path),
        Expr::Unary(op, operand) => eval_unary(*op, eval(operand, env)?),
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, env),
    }
}

fn eval_unary(op: UnOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnOp::Not => value
            .as_bool()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| type_mismatch("!", &value)),
        UnOp::Neg => value
            .as_int()
            .map(|n| Value::Int(n.wrapping_neg()))
            .ok_or_else(|| type_mismatch("-", &value)),
        UnOp::BitNot => value
            .as_int()
            .map(|n| Value::Int(!n))
            .ok_or_else(|| type_mismatch("~", &value)),
    }
}

/// Short-circuits `&&`/`||` by deferring evaluation of the right-hand side
/// until the left-hand side's truthiness is known; every other operator
/// evaluates both sides eagerly.
fn eval_binary(op: BinOp, lhs_expr: &Expr, rhs_expr: &Expr, env: &dyn Environment) -> Result<Value, ExprError> {
    let lhs = eval(lhs_expr, env)?;
    match op {
        BinOp::And => {
            let l = lhs.as_bool().ok_or_else(|| type_mismatch("&&", &lhs))?;
            if !l {
                return Ok(Value::Bool(false));
            }
            let r = eval(rhs_expr, env)?;
            r.as_bool().map(Value::Bool).ok_or_else(|| type_mismatch("&&", &r))
        }
        BinOp::Or => {
            let l = lhs.as_bool().ok_or_else(|| type_mismatch("||", &lhs))?;
            if l {
                return Ok(Value::Bool(true));
            }
            let r = eval(rhs_expr, env)?;
            r.as_bool().map(Value::Bool).ok_or_else(|| type_mismatch("||", &r))
        }
        other => eval_strict_binary(other, lhs, eval(rhs_expr, env)?),
    }
}

fn eval_strict_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (l, r) = int_pair(op.symbol(), lhs, rhs)?;
            let result = match op {
                BinOp::Lt => l < r,
                BinOp::Le => l <= r,
                BinOp::Gt => l > r,
                BinOp::Ge => l >= r,
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::BitAnd => int_pair("&", lhs, rhs).map(|(l, r)| Value::Int(l & r)),
        BinOp::BitOr => int_pair("|", lhs, rhs).map(|(l, r)| Value::Int(l | r)),
        BinOp::BitXor => int_pair("^", lhs, rhs).map(|(l, r)| Value::Int(l ^ r)),
        BinOp::Shl => int_pair("<<", lhs, rhs).map(|(l, r)| Value::Int(l.wrapping_shl(r as u32))),
        BinOp::Shr => int_pair(">>", lhs, rhs).map(|(l, r)| Value::Int(l.wrapping_shr(r as u32))),
        BinOp::Add => int_pair("+", lhs, rhs).map(|(l, r)| Value::Int(l.wrapping_add(r))),
        BinOp::Sub => int_pair("-", lhs, rhs).map(|(l, r)| Value::Int(l.wrapping_sub(r))),
        BinOp::Mul => int_pair("*", lhs, rhs).map(|(l, r)| Value::Int(l.wrapping_mul(r))),
        BinOp::Div => {
            let (l, r) = int_pair("/", lhs, rhs)?;
            if r == 0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Int(l.wrapping_div(r)))
        }
        BinOp::Rem => {
            let (l, r) = int_pair("%", lhs, rhs)?;
            if r == 0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Int(l.wrapping_rem(r)))
        }
        BinOp::And | BinOp::Or => unreachable!("handled by eval_binary"),
    }
}

fn int_pair(op: &str, lhs: Value, rhs: Value) -> Result<(i64, i64), ExprError> {
    match (lhs.as_int(), rhs.as_int()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(ExprError::TypeMismatch {
            op: op.to_string(),
            message: format!("expected two integers, found {} and {}", lhs.type_name(), rhs.type_name()),
        }),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn type_mismatch(op: &str, value: &Value) -> ExprError {
    ExprError::TypeMismatch {
        op: op.to_string(),
        message: format!("unsupported operand type {}", value.type_name()),
    }
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::collections::HashMap;

    struct MapEnv(HashMap<String, Value>);

    impl Environment for MapEnv {
        fn resolve(&self, path: &Path) -> Result<Value, ExprError> {
            self.0
                .get(&path.as_str())
                .cloned()
                .ok_or_else(|| ExprError::UndefinedName(path.as_str()))
        }
    }

    fn env(pairs: &[(&str, Value)]) -> MapEnv {
        MapEnv(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn arithmetic_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(eval(&expr, &env(&[])).unwrap(), Value::Int(7));
    }

    #[test]
    fn comparison_and_logic() {
        let expr = parse("version >= 2 && flags & 1 == 1").unwrap();
        let e = env(&[("version", Value::Int(3)), ("flags", Value::Int(5))]);
        assert_eq!(eval(&expr, &e).unwrap(), Value::Bool(true));
    }

    #[test]
    fn short_circuit_or_skips_undefined_name() {
        let expr = parse("true || undefined_field").unwrap();
        assert_eq!(eval(&expr, &env(&[])).unwrap(), Value::Bool(true));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let expr = parse("10 / 0").unwrap();
        assert_eq!(eval(&expr, &env(&[])).unwrap_err(), ExprError::DivisionByZero);
    }

    #[test]
    fn root_path_reference() {
        let expr = parse("_root.magic == 0x1234").unwrap();
        let e = env(&[("_root.magic", Value::Int(0x1234))]);
        assert_eq!(eval(&expr, &e).unwrap(), Value::Bool(true));
    }

    #[test]
    fn bitwise_and_shift() {
        let expr = parse("(1 << 4) | (0xF0 & 0x0F)").unwrap();
        assert_eq!(eval(&expr, &env(&[])).unwrap(), Value::Int(16));
    }

    #[test]
    fn type_mismatch_reported() {
        let expr = parse("\"a\" + 1").unwrap();
        assert!(matches!(
            eval(&expr, &env(&[])).unwrap_err(),
            ExprError::TypeMismatch { .. }
        ));
    }
}
