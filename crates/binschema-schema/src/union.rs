//! Discriminated unions: a discriminator selects one of several named
//! variants, each itself a [`crate::field::FieldKind`].

use binschema_codec::Endianness;
use binschema_expr::{Expr, Path};

use crate::field::FieldKind;

#[derive(Debug, Clone)]
pub struct DiscriminatedUnion {
    pub discriminator: Discriminator,
    /// Matched in declared order; exactly one must match at decode time.
    pub variants: Vec<Variant>,
}

/// Peek-based discriminators never carry a path; field-based discriminators
/// never carry endianness — both are enforced in [`crate::validate`].
#[derive(Debug, Clone)]
pub enum Discriminator {
    /// Peek `width` bits without consuming them from the reader.
    Peek { width: u32, endianness: Endianness },
    /// Use the already-decoded value at `path`.
    Field { path: Path },
}

/// `when` is compared against the synthetic identifier `value` bound to the
/// discriminator's peeked or referenced value.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub when: Expr,
    pub target: FieldKind,
}
