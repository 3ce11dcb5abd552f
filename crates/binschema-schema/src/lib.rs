//! Normalized in-memory schema model: types, fields, computed expressions,
//! discriminators, conditionals, and instances, plus the document parser and
//! validator that build and check it.
//!
//! `binschema-schema` sits directly above `binschema-codec` (for
//! `Endianness`/`BitOrder`/`VarlenEncoding`) and `binschema-expr` (for
//! conditional and discriminator `when` expressions); it knows nothing about
//! planning or code generation.

pub mod config;
pub mod document;
pub mod errors;
pub mod field;
pub mod instance;
pub mod normalize;
pub mod schema;
pub mod union;
pub mod validate;

pub use config::Config;
pub use document::SchemaDocument;
pub use errors::SchemaError;
pub use field::{Computed, ConstValue, Field, FieldKind, FieldModifier, FieldSpec, PointerBase, StrEncoding};
pub use instance::{Instance, PositionExpr, SizeExpr};
pub use schema::{Schema, SequenceType, TypeDef};
pub use union::{DiscriminatedUnion, Discriminator, Variant};

use errors::SchemaError as Error;

/// Parses and validates a schema document in one step — the entry point
/// most callers want.
pub fn load(json: &str) -> Result<Schema, Vec<Error>> {
    let doc: SchemaDocument = serde_json::from_str(json)
        .map_err(|e| vec![SchemaError::new("<document>", format!("invalid schema document: {e}"))])?;
    let schema = normalize::normalize(doc).map_err(|e| vec![e])?;
    validate::validate(&schema)?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_sequence_round_trips_through_load() {
        let json = r#"{
            "config": { "endianness": "big", "bit_order": "msb_first" },
            "types": {
                "Header": {
                    "type": "sequence",
                    "fields": [
                        { "name": "magic", "kind": "fixed_int", "bits": 32 },
                        { "name": "version", "kind": "fixed_int", "bits": 8 }
                    ]
                }
            }
        }"#;
        let schema = load(json).expect("schema should validate");
        assert!(matches!(schema.type_named("Header"), Some(TypeDef::Sequence(_))));
    }

    #[test]
    fn duplicate_field_names_rejected() {
        let json = r#"{
            "types": {
                "Bad": {
                    "type": "sequence",
                    "fields": [
                        { "name": "x", "kind": "fixed_int", "bits": 8 },
                        { "name": "x", "kind": "fixed_int", "bits": 8 }
                    ]
                }
            }
        }"#;
        let errors = load(json).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate field name")));
    }

    #[test]
    fn unknown_type_ref_rejected() {
        let json = r#"{
            "types": {
                "Container": {
                    "type": "sequence",
                    "fields": [
                        { "name": "inner", "kind": "type_ref", "type_name": "Missing" }
                    ]
                }
            }
        }"#;
        let errors = load(json).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("unknown type")));
    }

    #[test]
    fn const_and_computed_are_mutually_exclusive() {
        let json = r#"{
            "types": {
                "Bad": {
                    "type": "sequence",
                    "fields": [
                        {
                            "name": "len",
                            "kind": "fixed_int",
                            "bits": 8,
                            "const": 1,
                            "computed": { "kind": "length_of", "target": "payload" }
                        }
                    ]
                }
            }
        }"#;
        let errors = load(json).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("both `const` and `computed`")));
    }
}
