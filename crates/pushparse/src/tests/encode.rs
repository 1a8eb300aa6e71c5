//! Minimal wire-format encoder used to generate test streams.

use alloc::vec::Vec;

use crate::protobuf::{Tag, WireType, varint};

pub fn put_varint(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(varint::encode(value, &mut [0; varint::MAX_LEN]));
}

pub fn put_tag(out: &mut Vec<u8>, field: u32, wire_type: WireType) {
    put_varint(out, Tag { field, wire_type }.raw());
}

#[allow(clippy::cast_sign_loss)]
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn put_bytes(out: &mut Vec<u8>, field: u32, body: &[u8]) {
    put_tag(out, field, WireType::LengthDelimited);
    put_varint(out, body.len() as u64);
    out.extend_from_slice(body);
}

#[test]
fn encoder_matches_known_vectors() {
    let mut out = Vec::new();
    put_tag(&mut out, 1, WireType::Varint);
    put_varint(&mut out, 300);
    put_tag(&mut out, 2, WireType::Varint);
    put_varint(&mut out, 5_000_000_000);
    assert_eq!(out, b"\x08\xac\x02\x10\x80\xe4\x97\xd0\x12");
    assert_eq!(zigzag(-1), 1);
    assert_eq!(zigzag(1), 2);
}
