use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, SyntaxError},
};

/// Absorbs every byte it is offered and never completes. Ending the stream
/// while it is active is fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trash;

impl<T> Callback<T> for Trash {
    fn process(&mut self, _cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        trace!("trash: dropping {} bytes", buf.len());
        Ok(Step::Incomplete)
    }

    fn close(&mut self, _cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        Ok(())
    }
}

/// Accepts only the end of the stream. Any byte is trailing data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eof;

impl<T> Callback<T> for Eof {
    fn process(&mut self, _cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        if buf.is_empty() {
            return Ok(Step::Incomplete);
        }
        Err(SyntaxError::TrailingData.into())
    }

    fn close(&mut self, _cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        Ok(())
    }
}

/// Runs a function against the output without consuming input, then moves
/// on. The activation input, if any, is handed on unchanged.
pub struct Pure<F> {
    f: F,
    next: Next,
    input: Option<u64>,
}

impl<F> Pure<F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            next: Next::Finish,
            input: None,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }
}

impl<T, F> Callback<T> for Pure<F>
where
    F: FnMut(&mut T, Option<u64>) -> Result<(), SyntaxError>,
{
    fn activate(&mut self, _cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.input = input;
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        (self.f)(cx.output(), self.input)?;
        cx.continue_with(self.next);
        if let Some(value) = self.input {
            cx.hand_off(value);
        }
        Ok(Step::Done {
            unconsumed: buf.len(),
        })
    }

    /// The function still runs when the stream ends here.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        (self.f)(cx.output(), self.input)?;
        cx.close_next(self.next, self.input)
    }
}

/// Completes immediately without touching the output, passing its
/// activation input on.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop {
    next: Next,
    input: Option<u64>,
}

impl Noop {
    pub fn then(next: impl Into<Next>) -> Self {
        Self {
            next: next.into(),
            input: None,
        }
    }
}

impl<T> Callback<T> for Noop {
    fn activate(&mut self, _cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.input = input;
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        cx.continue_with(self.next);
        if let Some(value) = self.input {
            cx.hand_off(value);
        }
        Ok(Step::Done {
            unconsumed: buf.len(),
        })
    }

    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        cx.close_next(self.next, self.input)
    }
}
