use alloc::boxed::Box;

use super::*;
use crate::{
    Callback,
    combinators::{Noop, Skip, eof, skip, trash},
    error::ScopeError,
};

/// Fails to activate.
struct Refuse;

impl Callback<()> for Refuse {
    fn activate(&mut self, _cx: &mut Context<'_, ()>, _input: Option<u64>) -> Result<(), ErrorSource> {
        Err(SyntaxError::SyntaxError("refused").into())
    }

    fn process(&mut self, _cx: &mut Context<'_, ()>, _buf: &[u8]) -> Result<Step, ErrorSource> {
        Ok(Step::Incomplete)
    }
}

/// Claims to have left more bytes than it was given.
struct Overclaim;

impl Callback<()> for Overclaim {
    fn process(&mut self, _cx: &mut Context<'_, ()>, buf: &[u8]) -> Result<Step, ErrorSource> {
        Ok(Step::Done {
            unconsumed: buf.len() + 1,
        })
    }
}

/// Dispatches to the first node under the root, which is itself.
struct Reenter;

impl Callback<()> for Reenter {
    fn process(&mut self, cx: &mut Context<'_, ()>, buf: &[u8]) -> Result<Step, ErrorSource> {
        let root = cx.scope().root();
        let first = cx.scope().children_of(root)?[0];
        let me = cx.scope().node(first)?;
        cx.process(me, buf).map(|nested| nested.step)
    }
}

fn parser_with(build: impl FnOnce(&mut Scope<()>, ScopeId) -> NodeId) -> Parser<()> {
    parser_with_options(ParserOptions::default(), build)
}

fn parser_with_options(
    options: ParserOptions,
    build: impl FnOnce(&mut Scope<()>, ScopeId) -> NodeId,
) -> Parser<()> {
    let mut parser = Parser::with_options((), options);
    let root = parser.root();
    let node = build(parser.scope_mut(), root);
    parser.set_active(node).unwrap();
    parser
}

#[test]
fn push_without_active_callback_fails() {
    let mut parser = Parser::new(());
    assert_eq!(parser.push(&[]), Ok(()));

    let err = parser.push(b"x").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::NoActiveCallback);
    assert_eq!(err.offset(), 0);
    assert!(parser.is_failed());
}

#[test]
fn errors_are_sticky() {
    let mut parser = parser_with(|scope, root| {
        let end = eof(scope, root).unwrap();
        skip(scope, root, 2, end).unwrap()
    });

    let err = parser.push(b"abc").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::Syntax(SyntaxError::TrailingData));
    assert_eq!(err.offset(), 2);

    let expected = ParserError::new(
        ErrorSource::Failed(Box::new(ErrorSource::Syntax(SyntaxError::TrailingData))),
        2,
    );
    assert_eq!(parser.push(b"more"), Err(expected.clone()));
    assert_eq!(parser.push(&[]), Err(expected.clone()));
    assert_eq!(parser.close(), Err(expected));
    assert_eq!(parser.error(), Some(&err));
}

#[test]
fn activation_failure_is_terminal() {
    let mut parser = Parser::new(());
    let root = parser.root();
    let node = parser.scope_mut().insert(root, Refuse).unwrap();

    let err = parser.set_active(node).unwrap_err();
    assert_eq!(
        err.kind().syntax(),
        Some(&SyntaxError::SyntaxError("refused"))
    );
    assert!(parser.is_failed());
    assert!(parser.set_active(node).is_err());
}

#[test]
fn successor_activation_failure_is_reported_at_boundary() {
    let mut parser = parser_with(|scope, root| {
        let refuse = scope.insert(root, Refuse).unwrap();
        skip(scope, root, 3, refuse).unwrap()
    });

    let err = parser.push(b"abcd").unwrap_err();
    assert_eq!(err.offset(), 3);
}

#[test]
fn remainder_larger_than_chunk_is_rejected() {
    let mut parser = parser_with(|scope, root| scope.insert(root, Overclaim).unwrap());
    let err = parser.push(b"ab").unwrap_err();
    assert_eq!(
        err.kind(),
        &ErrorSource::InvalidRemainder {
            unconsumed: 3,
            available: 2
        }
    );
}

#[test]
fn zero_progress_loop_stalls() {
    let mut parser = parser_with_options(
        ParserOptions {
            stall_limit: 3,
            ..Default::default()
        },
        |scope, root| scope.insert(root, Noop::then(Next::Repeat)).unwrap(),
    );

    let err = parser.push(b"x").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::Stalled);
    assert_eq!(err.offset(), 0);
}

#[test]
fn remainder_flows_through_several_callbacks_in_one_push() {
    let mut parser = parser_with(|scope, root| {
        let end = eof(scope, root).unwrap();
        let third = skip(scope, root, 1, end).unwrap();
        let second = skip(scope, root, 1, third).unwrap();
        skip(scope, root, 1, second).unwrap()
    });

    parser.push(b"abc").unwrap();
    assert_eq!(parser.position(), 3);
    assert!(!parser.is_finished());
    parser.close().unwrap();
    assert!(parser.is_finished());
    assert_eq!(parser.active(), None);
}

#[test]
fn completion_without_successor_finishes() {
    let mut parser = parser_with(|scope, root| skip(scope, root, 2, Next::Finish).unwrap());

    parser.push(b"ab").unwrap();
    assert!(parser.is_finished());
    assert_eq!(parser.close(), Ok(()));

    let err = parser.push(b"c").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::Finished);
    assert!(parser.is_finished());
}

#[test]
fn trailing_data_can_be_ignored() {
    let mut parser = parser_with_options(
        ParserOptions {
            ignore_trailing_data: true,
            ..Default::default()
        },
        |scope, root| skip(scope, root, 2, Next::Finish).unwrap(),
    );

    parser.push(b"abc").unwrap();
    assert!(parser.is_finished());
    assert_eq!(parser.position(), 2);
    parser.push(b"def").unwrap();
    assert_eq!(parser.position(), 2);
    assert_eq!(parser.close(), Ok(()));
}

#[test]
fn close_in_the_middle_of_a_value_fails() {
    let mut parser = parser_with(|scope, root| scope.insert(root, Skip::new(4)).unwrap());

    parser.push(b"ab").unwrap();
    let err = parser.close().unwrap_err();
    assert_eq!(err.kind().syntax(), Some(&SyntaxError::UnexpectedEndOfInput));
    assert_eq!(err.offset(), 2);
}

#[test]
fn freeing_the_active_callback_stops_the_parser() {
    let mut parser = parser_with(|scope, root| {
        let group = scope.group(root).unwrap();
        trash(scope, group).unwrap()
    });
    let root = parser.root();
    let group = parser.scope().children_of(root).unwrap()[0];
    parser.scope_mut().free(group).unwrap();

    let err = parser.push(b"x").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::Scope(ScopeError::Stale));
}

#[test]
fn reentrant_dispatch_is_rejected() {
    let mut parser = parser_with(|scope, root| scope.insert(root, Reenter).unwrap());
    let err = parser.push(b"x").unwrap_err();
    assert_eq!(err.kind(), &ErrorSource::Scope(ScopeError::Busy));
}

#[test]
fn output_is_reachable_from_callbacks() {
    let mut parser = Parser::new(0u32);
    let root = parser.root();
    let node = crate::combinators::fixed_le_u32(
        parser.scope_mut(),
        root,
        |out: &mut u32, v| *out = v,
        Next::Finish,
    )
    .unwrap();
    parser.set_active(node).unwrap();
    parser.push(&7u32.to_le_bytes()).unwrap();

    *parser.output_mut() += 1;
    assert_eq!(parser.into_output(), 8);
}

#[test]
#[should_panic(expected = "unexpected trailing data at byte 0")]
fn panic_on_error_panics() {
    let mut parser = parser_with_options(
        ParserOptions {
            panic_on_error: true,
            ..Default::default()
        },
        |scope, root| eof(scope, root).unwrap(),
    );
    let _ = parser.push(b"x");
}
