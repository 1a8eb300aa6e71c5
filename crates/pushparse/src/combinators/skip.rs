use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, SyntaxError},
};

/// Discards a fixed number of bytes, then hands control to its successor.
///
/// When activated with an input (say, a length decoded by the previous
/// callback), that input replaces the configured length for this run.
#[derive(Debug, Clone, Copy)]
pub struct Skip {
    length: usize,
    remaining: usize,
    started: bool,
    allow_eof: bool,
    next: Next,
}

impl Skip {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            remaining: length,
            started: false,
            allow_eof: false,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }

    /// Accept the stream ending before the first skipped byte.
    #[must_use]
    pub fn allow_eof(mut self, allow: bool) -> Self {
        self.allow_eof = allow;
        self
    }
}

impl<T> Callback<T> for Skip {
    fn activate(&mut self, _cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.remaining = match input {
            Some(length) => {
                usize::try_from(length).map_err(|_| SyntaxError::LengthOverflow(length))?
            }
            None => self.length,
        };
        self.started = false;
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        let taken = self.remaining.min(buf.len());
        self.remaining -= taken;
        self.started |= taken > 0;
        trace!("skip: {taken} bytes, {} to go", self.remaining);

        if self.remaining > 0 {
            return Ok(Step::Incomplete);
        }
        cx.continue_with(self.next);
        Ok(Step::Done {
            unconsumed: buf.len() - taken,
        })
    }

    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.remaining == 0 {
            return cx.close_next(self.next, None);
        }
        if self.allow_eof && !self.started {
            return Ok(());
        }
        Err(SyntaxError::UnexpectedEndOfInput.into())
    }
}
