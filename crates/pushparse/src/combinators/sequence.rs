use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::ErrorSource,
    scope::TupleId,
};

/// Runs the callbacks in a tuple one after another, passing each one's
/// leftover bytes and handed-off value to the next. Completes when the last
/// one does; its hand-off is passed on to the sequence's successor.
///
/// The children's own continuations are ignored.
pub struct Sequence {
    steps: TupleId,
    index: usize,
    len: usize,
    input: Option<u64>,
    next: Next,
}

impl Sequence {
    pub fn new(steps: TupleId) -> Self {
        Self {
            steps,
            index: 0,
            len: 0,
            input: None,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }
}

impl<T> Callback<T> for Sequence {
    fn activate(&mut self, cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        self.index = 0;
        self.len = cx.scope().tuple_len(self.steps)?;
        self.input = input;
        if self.len == 0 {
            return Ok(());
        }
        let first = cx.scope().tuple_node(self.steps, 0)?;
        cx.activate(first, input)
    }

    fn process(&mut self, cx: &mut Context<'_, T>, mut buf: &[u8]) -> Result<Step, ErrorSource> {
        // An empty sequence passes its own input through.
        let mut hand_off = self.input;
        while self.index < self.len {
            let child = cx.scope().tuple_node(self.steps, self.index)?;
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
            hand_off = nested.hand_off;
            self.index += 1;
            trace!("sequence: step {} of {} done", self.index, self.len);

            if self.index < self.len {
                let following = cx.scope().tuple_node(self.steps, self.index)?;
                cx.activate(following, hand_off)?;
            }
        }

        cx.continue_with(self.next);
        if let Some(value) = hand_off {
            cx.hand_off(value);
        }
        Ok(Step::Done {
            unconsumed: buf.len(),
        })
    }

    /// Ending here is clean only if the current step and every step after
    /// it accept it. Steps that never ran are activated without an input
    /// before being closed.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        let mut hand_off = self.input;
        if self.index < self.len {
            let current = cx.scope().tuple_node(self.steps, self.index)?;
            cx.close(current)?;
            hand_off = None;
            for index in self.index + 1..self.len {
                let step = cx.scope().tuple_node(self.steps, index)?;
                trace!("sequence: closing step {} of {} unrun", index + 1, self.len);
                cx.activate(step, None)?;
                cx.close(step)?;
            }
        }
        cx.close_next(self.next, hand_off)
    }
}
