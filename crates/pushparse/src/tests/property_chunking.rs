use alloc::vec::Vec;

use quickcheck::{Arbitrary, Gen, QuickCheck};

use super::encode::{put_bytes, put_tag, put_varint, zigzag};
use crate::{
    Parser, ParserError,
    chunk_utils::{bytewise, split_by},
    protobuf::{MessageBuilder, WireType},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Record {
    id: u32,
    stamp: u64,
    delta: i64,
    flag: bool,
    blob: Vec<u8>,
    checksum: u32,
    inner: Option<u32>,
}

impl Arbitrary for Record {
    fn arbitrary(g: &mut Gen) -> Self {
        Record {
            id: u32::arbitrary(g),
            stamp: u64::arbitrary(g),
            delta: i64::arbitrary(g),
            flag: bool::arbitrary(g),
            blob: Vec::arbitrary(g),
            checksum: u32::arbitrary(g),
            inner: Option::arbitrary(g),
        }
    }
}

impl Record {
    /// Encodes the record with unknown fields interleaved.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_tag(&mut out, 1, WireType::Varint);
        put_varint(&mut out, u64::from(self.id));
        put_tag(&mut out, 20, WireType::Varint);
        put_varint(&mut out, self.stamp.rotate_left(7));
        put_tag(&mut out, 2, WireType::Varint);
        put_varint(&mut out, self.stamp);
        put_tag(&mut out, 3, WireType::Varint);
        put_varint(&mut out, zigzag(self.delta));
        put_tag(&mut out, 4, WireType::Varint);
        put_varint(&mut out, u64::from(self.flag));
        put_bytes(&mut out, 21, &self.blob);
        put_bytes(&mut out, 5, &self.blob);
        put_tag(&mut out, 6, WireType::Fixed32);
        out.extend_from_slice(&self.checksum.to_le_bytes());
        put_tag(&mut out, 22, WireType::Fixed64);
        out.extend_from_slice(&self.stamp.to_le_bytes());
        if let Some(inner) = self.inner {
            let mut body = Vec::new();
            put_tag(&mut body, 1, WireType::Varint);
            put_varint(&mut body, u64::from(inner));
            put_tag(&mut body, 23, WireType::Fixed32);
            body.extend_from_slice(&inner.to_le_bytes());
            put_bytes(&mut out, 7, &body);
        }
        out
    }
}

fn record_parser() -> Parser<Record> {
    let mut parser = Parser::new(Record::default());
    let root = parser.root();
    let mut message = MessageBuilder::new(parser.scope_mut(), root).unwrap();
    message
        .uint32(1, |out: &mut Record, v| out.id = v)
        .unwrap()
        .uint64(2, |out: &mut Record, v| out.stamp = v)
        .unwrap()
        .sint64(3, |out: &mut Record, v| out.delta = v)
        .unwrap()
        .bool(4, |out: &mut Record, v| out.flag = v)
        .unwrap()
        .bytes(5, |out: &mut Record, v: &[u8]| out.blob = v.to_vec())
        .unwrap()
        .fixed32(6, |out: &mut Record, v| out.checksum = v)
        .unwrap()
        .message(7, |inner| {
            inner.uint32(1, |out: &mut Record, v| out.inner = Some(v))?;
            Ok(())
        })
        .unwrap();
    let node = message.build().unwrap();
    parser.set_active(node).unwrap();
    parser
}

fn decode(chunks: &[&[u8]]) -> Result<Record, ParserError> {
    let mut parser = record_parser();
    for chunk in chunks {
        parser.push(chunk)?;
    }
    parser.close()?;
    Ok(parser.into_output())
}

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: a record decodes to itself however its encoding is chunked.
#[test]
fn record_roundtrip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(record: Record, splits: Vec<usize>) -> bool {
        let payload = record.encode();
        decode(&split_by(&payload, &splits)) == Ok(record)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Record, Vec<usize>) -> bool);
}

/// Property: arbitrary bytes either decode or fail the same way, at the same
/// offset, whatever the chunking.
#[test]
fn garbage_outcome_is_chunking_invariant_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(payload: Vec<u8>, splits: Vec<usize>) -> bool {
        let whole = decode(&[payload.as_slice()]);
        let split = decode(&split_by(&payload, &splits));
        let bytewise = decode(&bytewise(&payload));
        whole == split && whole == bytewise
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>, Vec<usize>) -> bool);
}
