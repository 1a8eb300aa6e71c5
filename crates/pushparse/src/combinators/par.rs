use alloc::vec::Vec;

use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, ScopeError, SyntaxError},
    scope::TupleId,
};

/// Runs the callbacks in a tuple one after another, like
/// [`Sequence`](super::Sequence), but hands every one of them the par's own
/// activation input instead of its predecessor's output. The values they
/// hand off are collected in order and passed to a sink once the last one
/// completes. A step that hands nothing off leaves `None` in its place.
pub struct Par<F> {
    steps: TupleId,
    len: usize,
    input: Option<u64>,
    results: Vec<Option<u64>>,
    sink: F,
    next: Next,
}

impl<F> Par<F> {
    pub fn new(steps: TupleId, sink: F) -> Self {
        Self {
            steps,
            len: 0,
            input: None,
            results: Vec::new(),
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

impl<T, F> Callback<T> for Par<F>
where
    F: FnMut(&mut T, &[Option<u64>]) -> Result<(), SyntaxError>,
{
    fn activate(&mut self, cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.len = cx.scope().tuple_len(self.steps)?;
        self.input = input;
        self.results.clear();
        self.results
            .try_reserve_exact(self.len)
            .map_err(ScopeError::from)?;
        if self.len == 0 {
            return Ok(());
        }
        let first = cx.scope().tuple_node(self.steps, 0)?;
        cx.activate(first, input)
    }

    fn process(&mut self, cx: &mut Context<'_, T>, mut buf: &[u8]) -> Result<Step, ErrorSource> {
        while self.results.len() < self.len {
            let child = cx.scope().tuple_node(self.steps, self.results.len())?;
            let nested = cx.process(child, buf)?;
            let unconsumed = match nested.step {
                Step::Incomplete => return Ok(Step::Incomplete),
                Step::Done { unconsumed } if unconsumed > buf.len() => {
                    return Err(ErrorSource::InvalidRemainder {
                        unconsumed,
                        available: buf.len(),
                    });
                }
                Step::Done { unconsumed } => unconsumed,
            };
            buf = &buf[buf.len() - unconsumed..];
            self.results.push(nested.hand_off);
            trace!("par: step {} of {} done", self.results.len(), self.len);

            if self.results.len() < self.len {
                let following = cx.scope().tuple_node(self.steps, self.results.len())?;
                cx.activate(following, self.input)?;
            }
        }

        (self.sink)(cx.output(), &self.results)?;
        cx.continue_with(self.next);
        Ok(Step::Done {
            unconsumed: buf.len(),
        })
    }

    /// Like [`Sequence`](super::Sequence), every remaining step must accept
    /// the end. Steps closed this way contribute `None`.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.results.len() < self.len {
            let current = cx.scope().tuple_node(self.steps, self.results.len())?;
            cx.close(current)?;
            self.results.push(None);
            while self.results.len() < self.len {
                let step = cx.scope().tuple_node(self.steps, self.results.len())?;
                cx.activate(step, self.input)?;
                cx.close(step)?;
                self.results.push(None);
            }
        }
        (self.sink)(cx.output(), &self.results)?;
        cx.close_next(self.next, None)
    }
}
