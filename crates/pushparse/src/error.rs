use alloc::collections::TryReserveError;

use thiserror::Error;

use crate::protobuf::WireType;

/// A terminal failure reported by a [`Parser`](crate::Parser), together with
/// the stream offset at which it was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} at byte {offset}")]
pub struct ParserError {
    pub(crate) source: ErrorSource,
    pub(crate) offset: usize,
}

impl ParserError {
    pub(crate) fn new(source: ErrorSource, offset: usize) -> Self {
        Self { source, offset }
    }

    /// What went wrong.
    #[must_use]
    pub fn kind(&self) -> &ErrorSource {
        &self.source
    }

    /// Byte offset, relative to the start of the stream, at which the error
    /// was detected.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorSource {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),
    #[error("no active callback")]
    NoActiveCallback,
    #[error("continuation chain made no progress")]
    Stalled,
    #[error("callback reported {unconsumed} unconsumed bytes but was offered {available}")]
    InvalidRemainder { unconsumed: usize, available: usize },
    #[error("parser already failed: {0}")]
    Failed(alloc::boxed::Box<ErrorSource>),
    #[error("parser already finished")]
    Finished,
}

impl ErrorSource {
    /// The structural parse error underneath this source, if any.
    #[must_use]
    pub fn syntax(&self) -> Option<&SyntaxError> {
        match self {
            Self::Syntax(e) => Some(e),
            Self::Failed(inner) => inner.syntax(),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected trailing data")]
    TrailingData,
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("varint longer than {0} bytes")]
    VarintTooLong(usize),
    #[error("varint overflows {0} bits")]
    VarintOverflow(u32),
    #[error("expected wire type {expected:?} for field {field}, found {actual:?}")]
    UnexpectedWireType {
        field: u32,
        expected: WireType,
        actual: WireType,
    },
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),
    #[error("unsupported wire type {0:?}")]
    UnsupportedWireType(WireType),
    #[error("invalid field number 0")]
    InvalidFieldNumber,
    #[error("length {0} does not fit in memory")]
    LengthOverflow(u64),
    #[error("fixed-width read needs {needed} bytes, got {available}")]
    ShortRead { needed: usize, available: usize },
    #[error("wrapped callback left {0} bytes of the buffered minimum unconsumed")]
    MinimumNotConsumed(usize),
    #[error("{0}")]
    SyntaxError(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
    #[error("handle refers to a freed object")]
    Stale,
    #[error("arena has run out of slot indices")]
    Exhausted,
    #[error("handle refers to a {actual}, expected a {expected}")]
    WrongKind {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("callback is already running")]
    Busy,
    #[error("reparenting would create an ownership cycle")]
    Cycle,
    #[error("tuple slot {index} out of range for size {size}")]
    SlotOutOfRange { index: usize, size: usize },
}
