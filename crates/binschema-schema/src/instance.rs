//! Instances: random-access fields of a sequence type, resolved lazily by
//! absolute position and memoized once evaluated.

use binschema_expr::{Expr, Path};

use crate::field::FieldKind;

#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub target: FieldKind,
    pub position: PositionExpr,
    /// Bytes the sub-parse is bounded to, if any.
    pub size: Option<SizeExpr>,
    /// Required power-of-two byte alignment of `position`; checked before
    /// the instance is resolved.
    pub alignment: Option<u64>,
    /// Gates whether the instance is evaluated at all; false skips straight
    /// to the `SKIPPED` state without ever touching the reader.
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum PositionExpr {
    Literal(i64),
    /// A dotted path to an already-decoded sibling field.
    FieldPath(Path),
    /// Negative offset counted from the end of the input.
    FromEnd(i64),
}

#[derive(Debug, Clone)]
pub enum SizeExpr {
    Literal(u64),
    FieldPath(Path),
    /// A general expression over already-decoded fields, for sizes derived
    /// by arithmetic rather than a bare reference.
    Computed(Expr),
}
