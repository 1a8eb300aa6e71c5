#![expect(missing_docs)]

use bstr::BString;
use pushparse::{
    ErrorSource, Next, Parser, ParserError, SyntaxError,
    chunk_utils::{bytewise, produce_chunks},
    combinators::{pure, sequence},
    protobuf::{MessageBuilder, WireType, submessage},
};
use rstest::rstest;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Phone {
    number: BString,
    kind: u32,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Person {
    name: BString,
    id: u32,
    email: Option<BString>,
    phones: Vec<Phone>,
    /// Filled by the phone decoder, moved into `phones` when it ends.
    pending: Phone,
}

/// name "Ada", id 7, an email and two phones, the second without a kind.
const ADA: &[u8] =
    b"\x0a\x03Ada\x10\x07\x1a\x0aada@ex.com\x22\x07\x0a\x03555\x10\x01\x22\x06\x0a\x040123";

fn person_parser() -> Result<Parser<Person>, ErrorSource> {
    let mut parser = Parser::new(Person::default());
    let root = parser.root();
    let mut message = MessageBuilder::new(parser.scope_mut(), root)?;
    message
        .bytes(1, |out: &mut Person, v: &[u8]| out.name = v.into())?
        .uint32(2, |out: &mut Person, v| out.id = v)?
        .bytes(3, |out: &mut Person, v: &[u8]| out.email = Some(v.into()))?;

    // A repeated submessage: decode into `pending`, then commit it.
    let staging = message.staging();
    let scope = message.scope();
    let mut phone = MessageBuilder::new(&mut *scope, staging)?;
    phone
        .bytes(1, |out: &mut Person, v: &[u8]| out.pending.number = v.into())?
        .uint32(2, |out: &mut Person, v| out.pending.kind = v)?;
    let phone = phone.build()?;
    let body = submessage(scope, staging, phone, Next::Finish)?;
    let commit = pure(
        scope,
        staging,
        |out: &mut Person, _| {
            let phone = core::mem::take(&mut out.pending);
            out.phones.push(phone);
            Ok(())
        },
        Next::Finish,
    )?;
    let decoder = sequence(scope, staging, &[body, commit], Next::Finish)?;
    message.field(4, WireType::LengthDelimited, decoder)?;

    let node = message.build()?;
    parser.set_active(node).map_err(|err| err.kind().clone())?;
    Ok(parser)
}

fn decode(chunks: &[&[u8]]) -> Result<Person, ParserError> {
    let mut parser = person_parser().unwrap();
    for chunk in chunks {
        parser.push(chunk)?;
    }
    parser.close()?;
    Ok(parser.into_output())
}

fn ada() -> Person {
    Person {
        name: "Ada".into(),
        id: 7,
        email: Some("ada@ex.com".into()),
        phones: vec![
            Phone {
                number: "555".into(),
                kind: 1,
            },
            Phone {
                number: "0123".into(),
                kind: 0,
            },
        ],
        pending: Phone::default(),
    }
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
#[case(16)]
#[case(ADA.len())]
fn person_decodes_in_parts(#[case] parts: usize) {
    assert_eq!(decode(&produce_chunks(ADA, parts)), Ok(ada()));
}

#[test_log::test]
fn person_decodes_bytewise() {
    assert_eq!(decode(&bytewise(ADA)), Ok(ada()));
}

#[test_log::test]
fn fields_may_arrive_in_any_order() {
    let mut reordered = Vec::new();
    reordered.extend_from_slice(&ADA[19..]); // phones first
    reordered.extend_from_slice(&ADA[..19]);
    assert_eq!(decode(&[reordered.as_slice()]), Ok(ada()));
}

#[test_log::test]
fn unfinished_phone_is_not_committed() {
    let mut parser = person_parser().unwrap();
    parser.push(&ADA[..ADA.len() - 2]).unwrap();
    assert!(!parser.is_finished());
    assert_eq!(parser.output().phones.len(), 1);

    let err = parser.close().unwrap_err();
    assert_eq!(err.kind().syntax(), Some(&SyntaxError::UnexpectedEndOfInput));
    assert_eq!(err.offset(), ADA.len() - 2);
    assert!(parser.is_failed());
}

#[test_log::test]
fn wrong_wire_type_for_a_known_field() {
    // field 2 sent as fixed32
    let err = decode(&[&b"\x0a\x01A"[..], &b"\x15\x07\x00\x00\x00"[..]]).unwrap_err();
    assert_eq!(
        err.kind().syntax(),
        Some(&SyntaxError::UnexpectedWireType {
            field: 2,
            expected: WireType::Varint,
            actual: WireType::Fixed32,
        })
    );
    assert_eq!(err.offset(), 4);
}
