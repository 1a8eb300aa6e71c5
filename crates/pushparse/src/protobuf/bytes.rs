use alloc::vec::Vec;

use bstr::BStr;
use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, ScopeError, SyntaxError},
};

/// Collects a length-delimited body and passes it to a sink in one piece.
///
/// The length comes from the activation input. A body that arrives inside a
/// single chunk is handed over borrowed; only bodies split across chunks
/// are copied.
pub struct Bytes<F> {
    length: usize,
    buffer: Vec<u8>,
    sink: F,
    next: Next,
}

impl<F> Bytes<F> {
    pub fn new(sink: F) -> Self {
        Self {
            length: 0,
            buffer: Vec::new(),
            sink,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }
}

impl<T, F> Callback<T> for Bytes<F>
where
    F: FnMut(&mut T, &[u8]) -> Result<(), SyntaxError>,
{
    fn activate(&mut self, _cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        let length = input.unwrap_or(0);
        self.length = usize::try_from(length).map_err(|_| SyntaxError::LengthOverflow(length))?;
        self.buffer.clear();
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        if self.buffer.is_empty() && buf.len() >= self.length {
            let (body, rest) = buf.split_at(self.length);
            trace!("bytes: borrowed {:?}", BStr::new(body));
            if let Err(err) = (self.sink)(cx.output(), body) {
                cx.advance(self.length);
                return Err(err.into());
            }
            cx.continue_with(self.next);
            return Ok(Step::Done {
                unconsumed: rest.len(),
            });
        }

        let wanted = self.length - self.buffer.len();
        let taken = wanted.min(buf.len());
        self.buffer
            .try_reserve(taken)
            .map_err(ScopeError::from)?;
        self.buffer.extend_from_slice(&buf[..taken]);
        if self.buffer.len() < self.length {
            trace!("bytes: {} of {}", self.buffer.len(), self.length);
            return Ok(Step::Incomplete);
        }

        trace!("bytes: buffered {:?}", BStr::new(&self.buffer));
        let result = (self.sink)(cx.output(), &self.buffer);
        self.buffer.clear();
        if let Err(err) = result {
            cx.advance(taken);
            return Err(err.into());
        }
        cx.continue_with(self.next);
        Ok(Step::Done {
            unconsumed: buf.len() - taken,
        })
    }
}
