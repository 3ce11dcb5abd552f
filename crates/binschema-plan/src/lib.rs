//! Host-side interpreter for binschema: decodes and encodes values directly
//! against a normalized [`binschema_schema::Schema`] and the bit-level
//! runtime in `binschema-codec`.
//!
//! This is the planner a code generator's emitted output is checked against:
//! anything `binschema-codegen` produces for a schema should round-trip the
//! same bytes this interpreter does.

pub mod decode;
pub mod encode;
pub mod errors;
pub mod instance;
pub mod value;

use std::rc::Rc;

use binschema_schema::Schema;

pub use errors::PlanError;
pub use value::Value;

/// Decodes `bytes` as the named root type of `schema`.
pub fn decode(schema: Rc<Schema>, type_name: &str, bytes: Vec<u8>) -> Result<Value, PlanError> {
    decode::decode_type(&schema, Rc::new(bytes), type_name)
}

/// Encodes `value` as the named root type of `schema`.
pub fn encode(schema: &Rc<Schema>, type_name: &str, value: &Value) -> Result<Vec<u8>, PlanError> {
    encode::encode_type(schema, type_name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn header_schema() -> Rc<Schema> {
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
        Rc::new(binschema_schema::load(json).expect("schema should validate"))
    }

    #[test]
    fn decode_reads_const_and_inline_length() {
        let schema = header_schema();
        let mut bytes = vec![0x47, 0x49, 0x46, 0x89, 0x01];
        bytes.push(3);
        bytes.extend_from_slice(&[b'c', b'a', b't']);
        let value = decode(schema, "Header", bytes).expect("decode should succeed");
        let name = value.field("name").unwrap();
        assert_eq!(name.as_struct(), None);
        assert!(matches!(value.field("version"), Some(Value::UInt(1))));
    }

    #[test]
    fn decode_rejects_const_mismatch() {
        let schema = header_schema();
        let bytes = vec![0x00, 0x00, 0x00, 0x00, 0x01, 0, 3];
        let err = decode(schema, "Header", bytes).unwrap_err();
        assert!(matches!(err, PlanError::ConstMismatch { .. }));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let schema = header_schema();
        let mut fields = IndexMap::new();
        fields.insert("magic".to_string(), Value::UInt(1195984521));
        fields.insert("version".to_string(), Value::UInt(2));
        fields.insert("name_len".to_string(), Value::UInt(0));
        fields.insert(
            "name".to_string(),
            Value::Array(vec![Value::UInt(b'h' as u64), Value::UInt(b'i' as u64)]),
        );
        let value = Value::Struct(fields);

        let bytes = encode(&schema, "Header", &value).expect("encode should succeed");
        let decoded = decode(schema, "Header", bytes).expect("decode should succeed");

        assert!(matches!(decoded.field("name_len"), Some(Value::UInt(2))));
        let name = decoded.field("name").unwrap();
        match name {
            Value::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn instance_is_memoized_across_repeated_reads() {
        let json = r#"{
            "types": {
                "WithInstance": {
                    "type": "sequence",
                    "fields": [
                        { "name": "offset", "kind": "fixed_int", "bits": 8 }
                    ],
                    "instances": [
                        { "name": "payload", "target": { "kind": "fixed_int", "bits": 8 }, "position": "offset" }
                    ]
                }
            }
        }"#;
        let schema = Rc::new(binschema_schema::load(json).expect("schema should validate"));
        let value = decode(schema, "WithInstance", vec![1, 0xAB]).expect("decode should succeed");
        let instance = match value.field("payload") {
            Some(Value::Instance(cell)) => cell.clone(),
            _ => panic!("expected instance"),
        };
        let first = instance.get("payload").expect("first read");
        assert!(instance.is_evaluated());
        let second = instance.get("payload").expect("second read");
        assert_eq!(first, second);
    }
}
