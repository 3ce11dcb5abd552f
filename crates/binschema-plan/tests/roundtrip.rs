use std::rc::Rc;

use binschema_plan::{decode, encode, Value};
use binschema_schema::Schema;
use indexmap::IndexMap;
use proptest::prelude::*;

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

fn header_value(version: u8, name_bytes: &[u8]) -> Value {
    let mut fields = IndexMap::new();
    fields.insert("magic".to_string(), Value::UInt(1195984521));
    fields.insert("version".to_string(), Value::UInt(version as u64));
    fields.insert("name_len".to_string(), Value::UInt(0));
    fields.insert(
        "name".to_string(),
        Value::Array(name_bytes.iter().map(|&b| Value::UInt(b as u64)).collect()),
    );
    Value::Struct(fields)
}

proptest! {
    #[test]
    fn header_round_trips_for_any_version_and_name(version: u8, name_bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let schema = header_schema();
        let value = header_value(version, &name_bytes);

        let bytes = encode(&schema, "Header", &value).expect("encode should succeed");
        let decoded = decode(schema, "Header", bytes).expect("decode should succeed");

        prop_assert_eq!(decoded.field("version"), Some(&Value::UInt(version as u64)));
        prop_assert_eq!(decoded.field("name_len"), Some(&Value::UInt(name_bytes.len() as u64)));
        match decoded.field("name") {
            Some(Value::Array(items)) => {
                let got: Vec<u8> = items.iter().map(|v| v.as_u64().unwrap() as u8).collect();
                prop_assert_eq!(got, name_bytes);
            }
            other => prop_assert!(false, "expected an array, got {other:?}"),
        }
    }
}
