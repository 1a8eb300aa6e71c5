//! Incremental, push-style parsing of binary streams.
//!
//! A parser is a graph of small [`Callback`]s living in a [`Scope`]. The
//! [`Parser`] driver feeds each chunk of input to the active callback and
//! follows the continuations they name, so a format is described once and
//! decodes identically however the stream happens to be chunked.
//!
//! ```rust
//! use pushparse::{Next, Parser, combinators};
//!
//! // Skip a five byte header, then insist the stream ends.
//! let mut parser = Parser::new(());
//! let root = parser.root();
//! let scope = parser.scope_mut();
//! let end = combinators::eof(scope, root).unwrap();
//! let header = combinators::skip(scope, root, 5, end).unwrap();
//!
//! parser.set_active(header).unwrap();
//! parser.push(b"he").unwrap();
//! parser.push(b"llo").unwrap();
//! parser.close().unwrap();
//! assert_eq!(parser.position(), 5);
//! ```

#![no_std]
#![allow(missing_docs)]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod callback;
mod error;
mod options;
mod parser;
mod scope;

pub mod combinators;
pub mod protobuf;

#[doc(hidden)]
pub mod chunk_utils;

#[cfg(test)]
mod tests;

pub use callback::{Callback, Context, Nested, Next, Step};
pub use error::{ErrorSource, ParserError, ScopeError, SyntaxError};
pub use options::ParserOptions;
pub use parser::Parser;
pub use scope::{Handle, NodeId, Scope, ScopeId, TupleId};
