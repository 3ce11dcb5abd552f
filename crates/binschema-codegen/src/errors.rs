//! Errors the generator can fail with. Unlike [`binschema_plan::PlanError`]
//! these are all "this schema can't be lowered to source text", not I/O or
//! decode failures — a schema that already passed
//! [`binschema_schema::validate::validate`] should only ever hit
//! [`CodegenError::Unsupported`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("type `{0}` referenced by a type_ref does not exist in this schema")]
    UnknownType(String),
    #[error("{construct} has no target-language lowering for {target}")]
    Unsupported { construct: String, target: &'static str },
    #[error("peek-based discriminator variant `{variant}` has a `when` guard that isn't a direct `value == <literal>` equality; only that shape can be lowered to a written tag")]
    NonLiteralDiscriminant { variant: String },
}
