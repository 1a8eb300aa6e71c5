use alloc::vec::Vec;

use log::trace;

use crate::{
    callback::{Callback, Context, Nested, Step},
    error::{ErrorSource, ScopeError, SyntaxError},
    scope::NodeId,
};

/// Holds bytes back from `inner` until at least `minimum` are available.
///
/// The first call `inner` receives in each run carries at least `minimum`
/// bytes, so fixed-width decoders never have to stitch a value together
/// across chunks. The buffered prefix plus the chunk that completed it are
/// forwarded in a single call, and `inner` must consume the whole buffered
/// part: handing any of it back is
/// [`SyntaxError::MinimumNotConsumed`]. If `inner` asks for more after that,
/// later chunks go straight through until it completes.
///
/// `inner`'s continuation is relayed unchanged.
pub struct MinBytes {
    inner: NodeId,
    minimum: usize,
    buffer: Vec<u8>,
    forwarding: bool,
    allow_eof: bool,
    input: Option<u64>,
}

impl MinBytes {
    pub fn new(inner: NodeId, minimum: usize) -> Result<Self, ScopeError> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(minimum)?;
        Ok(Self {
            inner,
            minimum,
            buffer,
            forwarding: false,
            allow_eof: false,
            input: None,
        })
    }

    /// Accept the stream ending before any byte was buffered.
    #[must_use]
    pub fn allow_eof(mut self, allow: bool) -> Self {
        self.allow_eof = allow;
        self
    }

    fn relay<T>(
        &mut self,
        cx: &mut Context<'_, T>,
        nested: &Nested,
        fresh: usize,
    ) -> Result<Step, ErrorSource> {
        match nested.step {
            Step::Incomplete => {
                self.forwarding = true;
                Ok(Step::Incomplete)
            }
            Step::Done { unconsumed } => {
                self.forwarding = false;
                if unconsumed > fresh {
                    return Err(SyntaxError::MinimumNotConsumed(unconsumed - fresh).into());
                }
                cx.forward(nested);
                Ok(Step::Done { unconsumed })
            }
        }
    }
}

impl<T> Callback<T> for MinBytes {
    fn activate(&mut self, _cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.input = input;
        self.buffer.clear();
        self.forwarding = false;
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        if self.forwarding {
            let nested = cx.process(self.inner, buf)?;
            return self.relay(cx, &nested, buf.len());
        }

        if self.buffer.is_empty() && buf.len() >= self.minimum {
            trace!("min_bytes: chunk of {} meets minimum {}", buf.len(), self.minimum);
            cx.activate(self.inner, self.input)?;
            let nested = cx.process(self.inner, buf)?;
            return self.relay(cx, &nested, buf.len());
        }

        self.buffer
            .try_reserve(buf.len())
            .map_err(ScopeError::from)?;
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() < self.minimum {
            trace!("min_bytes: buffered {} of {}", self.buffer.len(), self.minimum);
            return Ok(Step::Incomplete);
        }

        trace!("min_bytes: forwarding {} buffered bytes", self.buffer.len());
        cx.activate(self.inner, self.input)?;
        // The joined buffer starts where the first held byte did.
        cx.rewind(self.buffer.len() - buf.len());
        let joined = core::mem::take(&mut self.buffer);
        let result = cx.process(self.inner, &joined);
        self.buffer = joined;
        self.buffer.clear();
        let nested = result?;
        self.relay(cx, &nested, buf.len())
    }

    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.forwarding {
            return cx.close(self.inner);
        }
        if self.buffer.is_empty() && self.allow_eof {
            return Ok(());
        }
        Err(SyntaxError::UnexpectedEndOfInput.into())
    }
}
