use std::rc::Rc;

use binschema_plan::decode;
use binschema_schema::Schema;
use criterion::{criterion_group, criterion_main, Criterion};

fn gen_schema(field_count: usize) -> Rc<Schema> {
    let fields: Vec<String> = (0..field_count)
        .map(|i| format!(r#"{{ "name": "f{i}", "kind": "fixed_int", "bits": 16 }}"#))
        .collect();
    let json = format!(
        r#"{{
            "config": {{ "endianness": "big", "bit_order": "msb_first" }},
            "types": {{ "Packet": {{ "type": "sequence", "fields": [{}] }} }}
        }}"#,
        fields.join(",")
    );
    Rc::new(binschema_schema::load(&json).expect("schema should validate"))
}

fn gen_packet(field_count: usize) -> Vec<u8> {
    (0..field_count * 2).map(|i| (i * 31 % 256) as u8).collect()
}

fn bench_schema_decode(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let schema = gen_schema(field_count);
        let packet = gen_packet(field_count);

        c.bench_function(&format!("decode_{field_count}_fields"), |b| {
            b.iter(|| {
                let _ = decode(schema.clone(), "Packet", packet.clone()).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_schema_decode);
criterion_main!(benches);
