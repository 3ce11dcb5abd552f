//! Emits target-language source for a normalized [`binschema_schema::Schema`]:
//! value types, `decode`/`encode` functions, and lazy instance accessors, one
//! emitter per target (`TypeScript`, `Rust`, `Python`).
//!
//! This crate never decodes or encodes a single byte itself — it only
//! produces source text. [`binschema_plan`] is the reference a generated
//! module's behavior is checked against: for any schema, the bytes the
//! interpreter decodes should be exactly what a correctly generated
//! `decode`/`encode` pair would produce too.

mod casing;
pub mod emitter;
pub mod errors;
mod generate;
mod python;
mod rust_target;
mod text;
mod typescript;

pub use emitter::{Emitter, Target};
pub use errors::CodegenError;
pub use python::PythonEmitter;
pub use rust_target::RustEmitter;
pub use typescript::TypeScriptEmitter;

use binschema_schema::Schema;

/// Generates source for `schema` in `target`, using that target's default
/// emitter.
pub fn generate(schema: &Schema, target: Target) -> Result<String, CodegenError> {
    match target {
        Target::TypeScript => generate::generate(schema, &TypeScriptEmitter),
        Target::Rust => generate::generate(schema, &RustEmitter),
        Target::Python => generate::generate(schema, &PythonEmitter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_schema() -> Schema {
        let json = r#"{
            "config": { "endianness": "big", "bit_order": "msb_first" },
            "types": {
                "Header": {
                    "type": "sequence",
                    "fields": [
                        { "name": "magic", "kind": "fixed_int", "bits": 32, "const": 1195984521 },
                        { "name": "version", "kind": "fixed_int", "bits": 8 },
                        { "name": "name_len", "kind": "fixed_int", "bits": 8, "computed": { "kind": "length_of", "target": "name" } },
                        { "name": "name", "kind": "field_referenced_array", "count_path": "name_len", "element": { "kind": "fixed_int", "bits": 8 } }
                    ]
                }
            }
        }"#;
        binschema_schema::load(json).expect("schema should validate")
    }

    fn union_schema() -> Schema {
        let json = r#"{
            "types": {
                "Payload": {
                    "type": "discriminated_union",
                    "discriminator": { "kind": "peek", "width": 8, "endianness": "big" },
                    "variants": [
                        { "name": "small", "when": "value == 0", "target": { "kind": "fixed_int", "bits": 8 } },
                        { "name": "large", "when": "value == 1", "target": { "kind": "fixed_int", "bits": 32 } }
                    ]
                }
            }
        }"#;
        binschema_schema::load(json).expect("schema should validate")
    }

    #[test]
    fn typescript_output_declares_interface_and_functions() {
        let schema = header_schema();
        let out = generate(&schema, Target::TypeScript).expect("generation should succeed");
        assert!(out.contains("export interface Header"));
        assert!(out.contains("function decodeHeader(reader: BitReader): Header"));
        assert!(out.contains("function encodeHeader(writer: BitWriter, value: Header): void"));
        assert!(out.contains("nameLen"));
    }

    #[test]
    fn rust_output_declares_struct_and_result_returning_functions() {
        let schema = header_schema();
        let out = generate(&schema, Target::Rust).expect("generation should succeed");
        assert!(out.contains("pub struct Header"));
        assert!(out.contains("pub fn decode_header(reader: &mut BitReader) -> Result<Header, DecodeError>"));
        assert!(out.contains("pub fn encode_header(writer: &mut BitWriter, value: Header) -> Result<(), EncodeError>"));
        assert!(out.contains("name_len"));
    }

    #[test]
    fn python_output_declares_dataclass_and_functions() {
        let schema = header_schema();
        let out = generate(&schema, Target::Python).expect("generation should succeed");
        assert!(out.contains("@dataclass"));
        assert!(out.contains("class Header"));
        assert!(out.contains("def decode_header(reader: BitReader) -> Header"));
        assert!(out.contains("def encode_header(writer: BitWriter, value: Header) -> None"));
    }

    #[test]
    fn const_field_generates_a_mismatch_check_on_every_target() {
        let schema = header_schema();
        for target in [Target::TypeScript, Target::Rust, Target::Python] {
            let out = generate(&schema, target).expect("generation should succeed");
            assert!(out.to_lowercase().contains("const mismatch"), "target {target:?} missing const check");
        }
    }

    #[test]
    fn peek_discriminated_union_round_trips_through_every_target() {
        let schema = union_schema();
        for target in [Target::TypeScript, Target::Rust, Target::Python] {
            let out = generate(&schema, target).expect("generation should succeed");
            assert!(out.contains("no variant of `Payload` matched"));
        }
    }

    #[test]
    fn non_literal_discriminant_guard_is_rejected_rather_than_silently_dropped() {
        let json = r#"{
            "types": {
                "Weird": {
                    "type": "discriminated_union",
                    "discriminator": { "kind": "peek", "width": 8, "endianness": "big" },
                    "variants": [
                        { "name": "anything", "when": "value != 0", "target": { "kind": "fixed_int", "bits": 8 } }
                    ]
                }
            }
        }"#;
        let schema = binschema_schema::load(json).expect("schema should validate");
        let err = generate(&schema, Target::Rust).unwrap_err();
        assert!(matches!(err, CodegenError::NonLiteralDiscriminant { .. }));
    }

    #[test]
    fn inline_union_field_is_rejected_with_a_named_type_hint() {
        let json = r#"{
            "types": {
                "Outer": {
                    "type": "sequence",
                    "fields": [
                        {
                            "name": "body",
                            "kind": "discriminated_union",
                            "discriminator": { "kind": "peek", "width": 8, "endianness": "big" },
                            "variants": [
                                { "name": "a", "when": "value == 0", "target": { "kind": "fixed_int", "bits": 8 } }
                            ]
                        }
                    ]
                }
            }
        }"#;
        let schema = binschema_schema::load(json).expect("schema should validate");
        let err = generate(&schema, Target::TypeScript).unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { .. }));
    }
}
