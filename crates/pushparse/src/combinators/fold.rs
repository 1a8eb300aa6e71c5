use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::ErrorSource,
    scope::NodeId,
};

/// Runs `inner` over and over until an iteration rejects its very first
/// byte, or the stream ends between iterations.
///
/// Each iteration is activated with the value the previous one handed off,
/// so the hand-off works as an accumulator; the fold's own activation input
/// seeds it. When the fold ends, the last accumulator goes to the successor
/// together with the bytes the rejected iteration did not read.
///
/// Only a [`SyntaxError`](crate::SyntaxError) raised before an iteration
/// has read anything ends the fold. Once an iteration has read a byte, its
/// failures are the fold's failures. An iteration that completes without
/// reading anything is [`ErrorSource::Stalled`].
pub struct Fold {
    inner: NodeId,
    accumulator: Option<u64>,
    started: bool,
    iterations: usize,
    next: Next,
}

impl Fold {
    pub fn new(inner: NodeId) -> Self {
        Self {
            inner,
            accumulator: None,
            started: false,
            iterations: 0,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }

    fn finish<T>(&self, cx: &mut Context<'_, T>) {
        trace!("fold: done after {} iterations", self.iterations);
        cx.continue_with(self.next);
        if let Some(value) = self.accumulator {
            cx.hand_off(value);
        }
    }
}

impl<T> Callback<T> for Fold {
    fn activate(&mut self, cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.accumulator = input;
        self.started = false;
        self.iterations = 0;
        cx.activate(self.inner, input)
    }

    fn process(&mut self, cx: &mut Context<'_, T>, mut buf: &[u8]) -> Result<Step, ErrorSource> {
        loop {
            if buf.is_empty() {
                return Ok(Step::Incomplete);
            }
            let start = cx.offset();
            let nested = match cx.process(self.inner, buf) {
                Ok(nested) => nested,
                Err(ErrorSource::Syntax(err)) if !self.started && cx.offset() == start => {
                    trace!("fold: iteration {} rejected its first byte: {err}", self.iterations);
                    self.finish(cx);
                    return Ok(Step::Done {
                        unconsumed: buf.len(),
                    });
                }
                Err(err) => return Err(err),
            };

            let unconsumed = match nested.step {
                Step::Incomplete => {
                    self.started = true;
                    return Ok(Step::Incomplete);
                }
                Step::Done { unconsumed } if unconsumed > buf.len() => {
                    return Err(ErrorSource::InvalidRemainder {
                        unconsumed,
                        available: buf.len(),
                    });
                }
                Step::Done { unconsumed } => unconsumed,
            };
            if unconsumed == buf.len() && !self.started {
                return Err(ErrorSource::Stalled);
            }

            buf = &buf[buf.len() - unconsumed..];
            self.accumulator = nested.hand_off;
            self.started = false;
            self.iterations += 1;
            cx.activate(self.inner, self.accumulator)?;
        }
    }

    /// Ending between iterations is clean. Inside one, `inner` decides.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.started {
            cx.close(self.inner)?;
        }
        trace!("fold: stream ended after {} iterations", self.iterations);
        cx.close_next(self.next, self.accumulator)
    }
}
