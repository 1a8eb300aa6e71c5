//! Benchmark – `pushparse::Parser` decoding a protobuf message
#![allow(missing_docs)]

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pushparse::{Parser, chunk_utils::produce_chunks, protobuf::{MessageBuilder, varint}};

#[derive(Default)]
struct Totals {
    values: u64,
    sum: u64,
    bytes: usize,
}

fn put_varint(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(varint::encode(value, &mut [0; varint::MAX_LEN]));
}

/// A deterministic message of roughly `target_len` bytes alternating varint
/// fields (1), short strings (2) and unknown fixed64 fields (15).
fn make_payload(target_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(target_len + 32);
    let mut i = 0u64;
    while out.len() < target_len {
        out.push(0x08);
        put_varint(&mut out, i.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> (i % 64));
        out.push(0x12);
        let len = (i % 24) as usize;
        put_varint(&mut out, len as u64);
        out.extend(std::iter::repeat_n(b'a', len));
        out.push(0x79);
        out.extend_from_slice(&i.to_le_bytes());
        i += 1;
    }
    out
}

fn new_parser() -> Parser<Totals> {
    let mut parser = Parser::new(Totals::default());
    let root = parser.root();
    let mut message = MessageBuilder::new(parser.scope_mut(), root).expect("builder");
    message
        .uint64(1, |out: &mut Totals, v| {
            out.values += 1;
            out.sum = out.sum.wrapping_add(v);
        })
        .expect("field 1")
        .bytes(2, |out: &mut Totals, v: &[u8]| out.bytes += v.len())
        .expect("field 2");
    let node = message.build().expect("build");
    parser.set_active(node).expect("activate");
    parser
}

fn run_push_parser(payload: &[u8], parts: usize) -> u64 {
    let mut parser = new_parser();
    for chunk in produce_chunks(payload, parts) {
        parser.push(chunk).expect("push");
    }
    parser.close().expect("close");
    let totals = parser.into_output();
    totals.values + totals.sum + totals.bytes as u64
}

fn bench_push_parser(c: &mut Criterion) {
    let payload = make_payload(100_000);

    let mut group = c.benchmark_group("push_parser_split");
    for &parts in &[1usize, 100, 1_000, 10_000, payload.len()] {
        group.bench_with_input(BenchmarkId::from_parameter(parts), &parts, |b, &parts| {
            b.iter(|| {
                let result = run_push_parser(black_box(&payload), parts);
                black_box(result);
            });
        });
    }
    group.finish();
}

fn criterion() -> Criterion {
    let mut c = Criterion::default();
    if cfg!(feature = "bench-fast") {
        c = c
            .warm_up_time(Duration::from_millis(10))
            .measurement_time(Duration::from_millis(100))
            .sample_size(10);
    } else {
        c = c
            .warm_up_time(Duration::from_secs(5))
            .measurement_time(Duration::from_secs(10));
    }
    c
}

criterion_group! { name = benches; config = criterion(); targets = bench_push_parser }
criterion_main!(benches);
