//! Protocol Buffers wire-format decoding on top of the callback core.
//!
//! Nothing here is special to the driver: varints, length-delimited bodies
//! and messages are ordinary callbacks composed from the generic
//! combinators. Decoded values are written into the parser's output through
//! sink closures.
//!
//! ```rust
//! use pushparse::{Parser, protobuf::MessageBuilder};
//!
//! #[derive(Default)]
//! struct Pair {
//!     a: u32,
//!     b: u64,
//! }
//!
//! let mut parser = Parser::new(Pair::default());
//! let root = parser.root();
//! let mut message = MessageBuilder::new(parser.scope_mut(), root).unwrap();
//! message.uint32(1, |out: &mut Pair, v| out.a = v).unwrap();
//! message.uint64(2, |out: &mut Pair, v| out.b = v).unwrap();
//! let node = message.build().unwrap();
//!
//! parser.set_active(node).unwrap();
//! parser.push(&[0x08, 0xac]).unwrap();
//! parser.push(&[0x02, 0x10, 0x80, 0xe4, 0x97, 0xd0, 0x12]).unwrap();
//! parser.close().unwrap();
//! assert_eq!(parser.output().a, 300);
//! assert_eq!(parser.output().b, 5_000_000_000);
//! ```

mod bytes;
mod message;
pub mod varint;


pub use bytes::Bytes;
pub use message::{Message, MessageBuilder};
pub use varint::{Varint, Width};

use crate::{
    callback::Next,
    combinators::{MaxBytes, Skip, or_free, sequence},
    error::{ScopeError, SyntaxError},
    scope::{Handle, NodeId, Scope},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = SyntaxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::LengthDelimited,
            3 => WireType::StartGroup,
            4 => WireType::EndGroup,
            5 => WireType::Fixed32,
            other => return Err(SyntaxError::InvalidWireType(other)),
        })
    }
}

/// A field key: field number and wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub field: u32,
    pub wire_type: WireType,
}

impl Tag {
    /// Largest field number the format allows.
    pub const MAX_FIELD: u32 = (1 << 29) - 1;

    pub fn new(field: u32, wire_type: WireType) -> Result<Self, SyntaxError> {
        if field == 0 || field > Self::MAX_FIELD {
            return Err(SyntaxError::InvalidFieldNumber);
        }
        Ok(Self { field, wire_type })
    }

    /// Splits a decoded key into its parts.
    pub fn from_raw(raw: u64) -> Result<Self, SyntaxError> {
        #[allow(clippy::cast_possible_truncation)]
        let wire_type = WireType::try_from((raw & 0x7) as u8)?;
        let field = u32::try_from(raw >> 3).map_err(|_| SyntaxError::InvalidFieldNumber)?;
        Self::new(field, wire_type)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        (u64::from(self.field) << 3) | self.wire_type as u64
    }
}

/// Decodes a 32-bit varint and hands it to the successor.
pub fn varint32<T: 'static>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Varint::new(Width::U32, varint::discard::<T>).then(next))
}

/// Decodes a 64-bit varint and hands it to the successor.
pub fn varint64<T: 'static>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Varint::new(Width::U64, varint::discard::<T>).then(next))
}

/// Allocates a varint length and the body built by `body`, and runs them
/// in sequence. The body is activated with the decoded length.
fn prefixed<T: 'static>(
    scope: &mut Scope<T>,
    parent: Handle,
    body: impl FnOnce(&mut Scope<T>, Handle) -> Result<NodeId, ScopeError>,
    next: Next,
) -> Result<NodeId, ScopeError> {
    let length = varint64(scope, parent, Next::Finish)?;
    let body = body(scope, parent);
    let body = or_free(scope, length, body)?;
    sequence(scope, parent, &[length, body], next).inspect_err(|_| {
        let _ = scope.free(length);
        let _ = scope.free(body);
    })
}

/// Skips a varint length prefix and the body it announces.
pub fn length_prefixed_skip<T: 'static>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    prefixed(
        scope,
        parent.into(),
        |scope, parent| scope.insert(parent, Skip::new(0)),
        next.into(),
    )
}

/// Reads a length-delimited body and passes it to `sink`.
pub fn bytes_field<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    mut sink: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, &[u8]) + 'static,
    T: 'static,
{
    let body = Bytes::new(move |out: &mut T, bytes: &[u8]| -> Result<(), SyntaxError> {
        sink(out, bytes);
        Ok(())
    });
    prefixed(
        scope,
        parent.into(),
        |scope, parent| scope.insert(parent, body),
        next.into(),
    )
}

/// Runs `message` over a varint-length-prefixed body. The message is
/// closed at the end of the body, so a truncated final field is an error.
pub fn submessage<T: 'static>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    message: NodeId,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    prefixed(
        scope,
        parent.into(),
        |scope, parent| {
            let body = scope.insert(parent, MaxBytes::new(message, 0))?;
            let stolen = scope.steal(body, message);
            or_free(scope, body, stolen)?;
            Ok(body)
        },
        next.into(),
    )
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn zigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
