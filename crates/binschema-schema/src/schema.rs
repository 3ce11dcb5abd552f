//! The normalized, internal schema model. Built from a [`crate::document::SchemaDocument`]
//! by [`crate::normalize::normalize`] and checked by [`crate::validate::validate`]
//! before it is handed to the planner or code generator.

use indexmap::IndexMap;

use crate::config::Config;
use crate::field::Field;
use crate::instance::Instance;
use crate::union::DiscriminatedUnion;
use crate::field::FieldSpec;

/// A fully normalized schema. Immutable once built — every downstream
/// component may assume the invariants in [`crate::validate`] already hold.
#[derive(Debug, Clone)]
pub struct Schema {
    pub config: Config,
    /// Insertion-ordered so that codegen output doesn't shuffle types
    /// between runs of the same document.
    pub types: IndexMap<String, TypeDef>,
}

impl Schema {
    pub fn type_named(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Sequence(SequenceType),
    DiscriminatedUnion(DiscriminatedUnion),
    Alias(FieldSpec),
}

#[derive(Debug, Clone)]
pub struct SequenceType {
    pub fields: Vec<Field>,
    pub instances: Vec<Instance>,
}

impl SequenceType {
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
