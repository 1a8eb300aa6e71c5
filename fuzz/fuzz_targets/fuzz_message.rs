#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pushparse::{
    ErrorSource, Parser, ParserOptions,
    chunk_utils::split_by,
    protobuf::MessageBuilder,
};

#[derive(Debug, Default, PartialEq)]
struct Fields {
    small: u32,
    large: u64,
    signed: i64,
    flag: bool,
    word: u32,
    wide: u64,
    text: Vec<u8>,
    nested: u32,
}

#[derive(Debug, Arbitrary)]
struct Input {
    /// Exercise `panic_on_error` so failures carry a backtrace.
    panic_on_error: bool,
    splits: Vec<usize>,
    payload: Vec<u8>,
}

fn new_parser(panic_on_error: bool) -> Parser<Fields> {
    let mut parser = Parser::with_options(
        Fields::default(),
        ParserOptions {
            panic_on_error,
            ..Default::default()
        },
    );
    let root = parser.root();
    let mut message = MessageBuilder::new(parser.scope_mut(), root).unwrap();
    message
        .uint32(1, |out: &mut Fields, v| out.small = v)
        .unwrap()
        .uint64(2, |out: &mut Fields, v| out.large = v)
        .unwrap()
        .sint64(3, |out: &mut Fields, v| out.signed = v)
        .unwrap()
        .bool(4, |out: &mut Fields, v| out.flag = v)
        .unwrap()
        .fixed32(5, |out: &mut Fields, v| out.word = v)
        .unwrap()
        .fixed64(6, |out: &mut Fields, v| out.wide = v)
        .unwrap()
        .bytes(7, |out: &mut Fields, v: &[u8]| out.text = v.to_vec())
        .unwrap()
        .message(8, |inner| {
            inner.uint32(1, |out: &mut Fields, v| out.nested = v)?;
            Ok(())
        })
        .unwrap();
    let node = message.build().unwrap();
    parser.set_active(node).unwrap();
    parser
}

fn decode(chunks: &[&[u8]], panic_on_error: bool) -> Result<Fields, ErrorSource> {
    let mut parser = new_parser(panic_on_error);
    for chunk in chunks {
        parser.push(chunk).map_err(|err| err.kind().clone())?;
    }
    parser.close().map_err(|err| err.kind().clone())?;
    Ok(parser.into_output())
}

fuzz_target!(|input: Input| {
    let whole = decode(&[input.payload.as_slice()], false);
    // Only panic on inputs known to decode, so a panic is a chunking bug.
    let panic_on_error = input.panic_on_error && whole.is_ok();
    let split = decode(&split_by(&input.payload, &input.splits), panic_on_error);
    assert_eq!(whole, split);
});
