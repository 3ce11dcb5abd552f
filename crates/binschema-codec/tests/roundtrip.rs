use binschema_codec::{BitOrder, Endianness, Reader, Writer};
use proptest::prelude::*;

fn round_trip_u16(value: u16, endianness: Endianness) {
    let mut w = Writer::new();
    w.write_u16(value, endianness).unwrap();
    let bytes = w.finish().unwrap();
    let mut r = Reader::from_buffer(bytes);
    assert_eq!(r.read_u16(endianness).unwrap(), value);
}

fn round_trip_u32(value: u32, endianness: Endianness) {
    let mut w = Writer::new();
    w.write_u32(value, endianness).unwrap();
    let bytes = w.finish().unwrap();
    let mut r = Reader::from_buffer(bytes);
    assert_eq!(r.read_u32(endianness).unwrap(), value);
}

fn round_trip_u64(value: u64, endianness: Endianness) {
    let mut w = Writer::new();
    w.write_u64(value, endianness).unwrap();
    let bytes = w.finish().unwrap();
    let mut r = Reader::from_buffer(bytes);
    assert_eq!(r.read_u64(endianness).unwrap(), value);
}

#[test]
fn byte_order_boundary_values() {
    for &endianness in &[Endianness::Big, Endianness::Little] {
        round_trip_u16(0, endianness);
        round_trip_u16(1, endianness);
        round_trip_u16(u16::MAX, endianness);

        round_trip_u32(0, endianness);
        round_trip_u32(1, endianness);
        round_trip_u32(0x0123_4567, endianness);
        round_trip_u32(u32::MAX, endianness);

        round_trip_u64(0, endianness);
        round_trip_u64(1, endianness);
        round_trip_u64(0x0123_4567_89AB_CDEF, endianness);
        round_trip_u64(u64::MAX, endianness);
    }
}

fn round_trip_bit_group(widths: &[u32], bit_order: BitOrder) {
    let mut w = Writer::new().with_bit_order(bit_order);
    let values: Vec<u64> = widths
        .iter()
        .enumerate()
        .map(|(i, &width)| {
            let v = (i as u64 * 7 + 3) % (1u64 << width.min(63));
            w.write_bits(width, v).unwrap();
            v
        })
        .collect();
    let bytes = w.finish().unwrap();

    let mut r = Reader::from_buffer(bytes).with_bit_order(bit_order);
    for (&width, &expected) in widths.iter().zip(values.iter()) {
        assert_eq!(r.read_bits(width).unwrap(), expected);
    }
}

#[test]
fn bit_span_mixed_sizes_both_orders() {
    for &order in &[BitOrder::MsbFirst, BitOrder::LsbFirst] {
        round_trip_bit_group(&[1, 8], order);
        round_trip_bit_group(&[3, 5, 24, 32], order);
    }
}

proptest! {
    #[test]
    fn prop_u32_round_trips_big_endian(value: u32) {
        round_trip_u32(value, Endianness::Big);
    }

    #[test]
    fn prop_u32_round_trips_little_endian(value: u32) {
        round_trip_u32(value, Endianness::Little);
    }

    #[test]
    fn prop_bit_field_round_trips(value in 0u64..(1u64 << 40), width in 41u32..64) {
        let mut w = Writer::new();
        w.write_bits(width, value).unwrap();
        let bytes = w.finish().unwrap();
        let mut r = Reader::from_buffer(bytes);
        prop_assert_eq!(r.read_bits(width).unwrap(), value);
    }
}
