use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, SyntaxError},
    scope::NodeId,
};

/// Lets `inner` see at most `limit` bytes.
///
/// When the limit is reached `inner` is closed, so it must be at a point
/// where ending is acceptable, and control passes to this node's successor.
/// If `inner` completes first, the rest of the chunk goes straight to the
/// successor. An activation input overrides the limit, which is how a
/// length prefix bounds the body that follows it.
pub struct MaxBytes {
    inner: NodeId,
    limit: usize,
    remaining: usize,
    next: Next,
}

impl MaxBytes {
    pub fn new(inner: NodeId, limit: usize) -> Self {
        Self {
            inner,
            limit,
            remaining: limit,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }
}

impl<T> Callback<T> for MaxBytes {
    fn activate(&mut self, cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.remaining = match input {
            Some(limit) => usize::try_from(limit).map_err(|_| SyntaxError::LengthOverflow(limit))?,
            None => self.limit,
        };
        cx.activate(self.inner, None)
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        let window = self.remaining.min(buf.len());
        let nested = cx.process(self.inner, &buf[..window])?;
        let consumed = match nested.step {
            Step::Incomplete => {
                self.remaining -= window;
                if self.remaining > 0 {
                    return Ok(Step::Incomplete);
                }
                trace!("max_bytes: limit reached, closing inner");
                cx.close(self.inner)?;
                window
            }
            Step::Done { unconsumed } if unconsumed > window => {
                return Err(ErrorSource::InvalidRemainder {
                    unconsumed,
                    available: window,
                });
            }
            Step::Done { unconsumed } => {
                self.remaining -= window - unconsumed;
                trace!("max_bytes: inner finished {} bytes short of the limit", self.remaining);
                window - unconsumed
            }
        };
        cx.continue_with(self.next);
        Ok(Step::Done {
            unconsumed: buf.len() - consumed,
        })
    }

    /// Ending here is clean only if the limit was met exactly and both
    /// `inner` and the successor accept it.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.remaining > 0 {
            return Err(SyntaxError::UnexpectedEndOfInput.into());
        }
        cx.close(self.inner)?;
        cx.close_next(self.next, None)
    }
}
