use super::deserializer::{varint_read, zig_zag_decode, Deserializer};
use super::v2_serializer::{varint_write, zig_zag_encode, V2Serializer};
use super::{Serializer, V2_COOKIE, V2_HEADER_SIZE};
use crate::{Histogram, StoreKind};

use byteorder::{BigEndian, ReadBytesExt};
use rand::Rng;
use std::io::Cursor;

#[test]
fn zig_zag_encode_0() {
    assert_eq!(0, zig_zag_encode(0));
}

#[test]
fn zig_zag_encode_neg_1() {
    assert_eq!(1, zig_zag_encode(-1));
}

#[test]
fn zig_zag_encode_1() {
    assert_eq!(2, zig_zag_encode(1));
}

#[test]
fn zig_zag_encode_i64_max() {
    assert_eq!(u64::max_value() - 1, zig_zag_encode(i64::max_value()));
}

#[test]
fn zig_zag_encode_i64_min() {
    assert_eq!(u64::max_value(), zig_zag_encode(i64::min_value()));
}

#[test]
fn zig_zag_decode_i64_max() {
    assert_eq!(i64::max_value(), zig_zag_decode(u64::max_value() - 1));
}

#[test]
fn zig_zag_decode_i64_min() {
    assert_eq!(i64::min_value(), zig_zag_decode(u64::max_value()));
}

#[test]
fn zig_zag_roundtrip_random() {
    let mut rng = rand::thread_rng();

    for _ in 0..100_000 {
        let r: i64 = rng.gen();
        assert_eq!(r, zig_zag_decode(zig_zag_encode(r)));
    }
}

#[test]
fn varint_write_1_byte_boundaries() {
    let mut buf = [0_u8; 9];
    assert_eq!(1, varint_write(0, &mut buf));
    assert_eq!(0, buf[0]);
    assert_eq!(1, varint_write(127, &mut buf));
    assert_eq!(127, buf[0]);
}

#[test]
fn varint_write_2_byte_boundaries() {
    let mut buf = [0_u8; 9];
    assert_eq!(2, varint_write(128, &mut buf));
    assert_eq!(&[0x80, 0x01], &buf[0..2]);
    assert_eq!(2, varint_write((1 << 14) - 1, &mut buf));
    assert_eq!(&[0xFF, 0x7F], &buf[0..2]);
}

#[test]
fn varint_write_8_and_9_byte_boundaries() {
    let mut buf = [0_u8; 9];
    // largest 8-byte varint carries 56 bits of payload
    assert_eq!(8, varint_write((1 << 56) - 1, &mut buf));
    assert_eq!(9, varint_write(1 << 56, &mut buf));
    // the 9th byte is written as-is
    assert_eq!(9, varint_write(u64::max_value(), &mut buf));
    assert_eq!(0xFF, buf[8]);
}

#[test]
fn varint_roundtrip_boundaries() {
    let mut buf = [0_u8; 9];
    for shift in 0..64 {
        for delta in [-1_i128, 0, 1] {
            let n = (1_i128 << shift) + delta;
            let Ok(n) = u64::try_from(n) else { continue };
            let len = varint_write(n, &mut buf);
            let mut cursor = Cursor::new(&buf[0..len]);
            assert_eq!(n, varint_read(&mut cursor).unwrap(), "value {}", n);
        }
    }
}

#[test]
fn varint_roundtrip_random() {
    let mut rng = rand::thread_rng();
    let mut buf = [0_u8; 9];

    for _ in 0..100_000 {
        // cover all byte lengths evenly rather than almost always taking 9+ bit values
        let bits = rng.gen_range(1..=64);
        let n: u64 = rng.gen::<u64>() >> (64 - bits);
        let len = varint_write(n, &mut buf);
        let mut cursor = Cursor::new(&buf[0..len]);
        assert_eq!(n, varint_read(&mut cursor).unwrap());
    }
}

#[test]
fn serialize_header_fields() {
    let mut h = Histogram::new_with_bounds(10, 100_000, 4).unwrap();
    h.record(5_000).unwrap();

    let mut buf = Vec::new();
    V2Serializer::new().serialize(&h, &mut buf).unwrap();

    let mut cursor = Cursor::new(&buf);
    assert_eq!(V2_COOKIE, cursor.read_u32::<BigEndian>().unwrap());
    let payload_len = cursor.read_u32::<BigEndian>().unwrap() as usize;
    assert_eq!(V2_HEADER_SIZE + payload_len, buf.len());
    // normalizing index offset
    assert_eq!(0, cursor.read_u32::<BigEndian>().unwrap());
    assert_eq!(4, cursor.read_u32::<BigEndian>().unwrap());
    assert_eq!(10, cursor.read_u64::<BigEndian>().unwrap());
    assert_eq!(100_000, cursor.read_u64::<BigEndian>().unwrap());
    assert_eq!(1.0, cursor.read_f64::<BigEndian>().unwrap());
}

#[test]
fn serialize_empty_histogram_has_minimal_payload() {
    let h = Histogram::new_with_bounds(1, 1_000_000, 3).unwrap();

    let mut buf = Vec::new();
    let len = V2Serializer::new().serialize(&h, &mut buf).unwrap();

    // one varint for the single count at the (zero) max value's index
    assert_eq!(V2_HEADER_SIZE + 1, len);
}

#[test]
fn deserialize_rejects_unknown_cookie() {
    let mut buf = Vec::new();
    V2Serializer::new()
        .serialize(&Histogram::new(3).unwrap(), &mut buf)
        .unwrap();
    buf[0] ^= 0xFF;

    let err = Deserializer::new()
        .deserialize(&mut buf.as_slice())
        .unwrap_err();
    assert!(matches!(err, super::DeserializeError::InvalidCookie));
}

#[test]
fn deserialize_rejects_truncated_payload() {
    let mut buf = Vec::new();
    let mut h = Histogram::new_with_bounds(1, 1_000_000, 3).unwrap();
    h.record_n(1_000, 42).unwrap();
    V2Serializer::new().serialize(&h, &mut buf).unwrap();

    buf.truncate(buf.len() - 1);
    let err = Deserializer::new()
        .deserialize(&mut buf.as_slice())
        .unwrap_err();
    assert!(matches!(err, super::DeserializeError::IoError(_)));
}

#[test]
fn roundtrip_random_counts_all_store_kinds() {
    let mut rng = rand::thread_rng();
    let mut serializer = V2Serializer::new();
    let mut deserializer = Deserializer::new();

    for kind in [
        StoreKind::U8,
        StoreKind::U16,
        StoreKind::U32,
        StoreKind::U64,
        StoreKind::Packed,
    ] {
        let mut h =
            Histogram::new_with_bounds_and_store(1, 1 << 40, 3, kind).unwrap();
        for _ in 0..300 {
            // counts stay small enough that no u8 bin can overflow even with collisions
            h.record_n(rng.gen_range(1..(1_u64 << 40)), rng.gen_range(1..20))
                .unwrap();
        }

        let mut buf = Vec::new();
        serializer.serialize(&h, &mut buf).unwrap();
        let back = deserializer
            .deserialize_into(&mut buf.as_slice(), kind)
            .unwrap();

        assert_eq!(h, back, "{:?}", kind);
        assert_eq!(h.len(), back.len());
        assert_eq!(h.min_nz(), back.min_nz());
        assert_eq!(h.max(), back.max());
    }
}
