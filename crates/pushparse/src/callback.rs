//! The contract between the driver and the callbacks it dispatches to.

use log::trace;

use crate::{
    error::{ErrorSource, SyntaxError},
    scope::{NodeId, Scope},
};

/// What a callback reports after being offered a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Every offered byte was absorbed and more are needed.
    Incomplete,
    /// The callback is done. The last `unconsumed` bytes of the chunk were
    /// not used and go to its successor.
    Done { unconsumed: usize },
}

impl Step {
    /// Shorthand for a completion that used every offered byte.
    pub const DONE: Step = Step::Done { unconsumed: 0 };
}

/// Where control goes once a callback completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Next {
    /// Install this node.
    Node(NodeId),
    /// Re-activate the node that just completed.
    Repeat,
    /// Nothing follows: the stream is over.
    #[default]
    Finish,
}

impl From<NodeId> for Next {
    fn from(node: NodeId) -> Self {
        Next::Node(node)
    }
}

/// Result of running a nested callback through [`Context::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nested {
    pub step: Step,
    /// The continuation the callback asked for, if it set one.
    pub next: Option<Next>,
    /// The value it handed to its successor, if any.
    pub hand_off: Option<u64>,
}

/// One stage of a push parser.
///
/// Callbacks are owned by a [`Scope`] and are only ever run through the
/// driver or through a parent's [`Context`]. A callback is activated each
/// time it becomes the active node, and `process` is then called with
/// successive chunks until it returns [`Step::Done`].
///
/// The driver never offers an empty chunk. A composite may, to let a child
/// finish without input (a zero-length skip, say); callbacks that need bytes
/// should just return [`Step::Incomplete`].
pub trait Callback<T> {
    /// Called whenever this callback becomes active. `input` is the value
    /// handed off by whatever completed before it, if anything.
    fn activate(&mut self, cx: &mut Context<'_, T>, input: Option<u64>) -> Result<(), ErrorSource> {
        let _ = (cx, input);
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource>;

    /// Called when the stream ends while this callback is active. The
    /// default treats that as truncated input.
    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        let _ = cx;
        Err(SyntaxError::UnexpectedEndOfInput.into())
    }

    /// Name used in trace logs.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Mutable state a callback sees while it runs: the arena, the output being
/// decoded into, the continuation it is about to request and the stream
/// offset reached so far.
///
/// The offset is what a failure is reported at. Nested dispatch keeps it
/// current: when a nested callback returns, the offset moves past whatever
/// it consumed. A callback that rejects input part-way through its own
/// chunk calls [`advance`](Self::advance) first, so the error lands on the
/// same byte however the stream was split.
pub struct Context<'a, T> {
    scope: &'a mut Scope<T>,
    output: &'a mut T,
    next: Option<Next>,
    hand_off: Option<u64>,
    offset: usize,
}

impl<'a, T> Context<'a, T> {
    pub(crate) fn new(scope: &'a mut Scope<T>, output: &'a mut T, offset: usize) -> Self {
        Self {
            scope,
            output,
            next: None,
            hand_off: None,
            offset,
        }
    }

    /// Stream offset of the first byte of the chunk the running callback
    /// was offered, plus anything its nested callbacks or
    /// [`advance`](Self::advance) have since accounted for.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Counts `read` more bytes of the running callback's chunk as read.
    pub fn advance(&mut self, read: usize) {
        self.offset += read;
    }

    /// Moves the offset back by `held`, for callbacks that replay bytes they
    /// buffered during earlier calls.
    pub fn rewind(&mut self, held: usize) {
        self.offset = self.offset.saturating_sub(held);
    }

    pub fn output(&mut self) -> &mut T {
        &mut *self.output
    }

    pub fn scope(&mut self) -> &mut Scope<T> {
        &mut *self.scope
    }

    /// Names the successor to install once the running callback returns
    /// [`Step::Done`]. The last call wins.
    pub fn continue_with(&mut self, next: impl Into<Next>) {
        self.next = Some(next.into());
    }

    /// Shorthand for `continue_with(Next::Node(node))`.
    pub fn set_active(&mut self, node: NodeId) {
        self.continue_with(Next::Node(node));
    }

    /// Passes `value` to the successor's [`Callback::activate`].
    pub fn hand_off(&mut self, value: u64) {
        self.hand_off = Some(value);
    }

    /// Re-posts a nested callback's continuation as the running callback's
    /// own.
    pub fn forward(&mut self, nested: &Nested) {
        if let Some(next) = nested.next {
            self.next = Some(next);
        }
        if let Some(value) = nested.hand_off {
            self.hand_off = Some(value);
        }
    }

    /// Offers `buf` to `node`. Whatever continuation the node requests is
    /// returned, not applied.
    ///
    /// `buf` is taken to start at the current offset. On success the offset
    /// moves past the bytes the node consumed; on failure it stays where the
    /// node left it.
    pub fn process(&mut self, node: NodeId, buf: &[u8]) -> Result<Nested, ErrorSource> {
        let mut callback = self.scope.take_callback(node)?;
        trace!("process {} with {} bytes at {}", callback.name(), buf.len(), self.offset);
        let start = self.offset;
        let saved = (self.next.take(), self.hand_off.take());
        let result = callback.process(self, buf);
        self.scope.restore_callback(node, callback);
        let next = core::mem::replace(&mut self.next, saved.0);
        let hand_off = core::mem::replace(&mut self.hand_off, saved.1);
        let step = result?;
        match step {
            Step::Incomplete => self.offset = start + buf.len(),
            Step::Done { unconsumed } if unconsumed <= buf.len() => {
                self.offset = start + buf.len() - unconsumed;
            }
            // The caller reports the bad remainder.
            Step::Done { .. } => self.offset = start,
        }
        Ok(Nested {
            step,
            next,
            hand_off,
        })
    }

    /// Activates `node`, passing it `input`.
    pub fn activate(&mut self, node: NodeId, input: Option<u64>) -> Result<(), ErrorSource> {
        let mut callback = self.scope.take_callback(node)?;
        trace!("activate {} with {input:?}", callback.name());
        let saved = (self.next.take(), self.hand_off.take());
        let result = callback.activate(self, input);
        self.scope.restore_callback(node, callback);
        (self.next, self.hand_off) = saved;
        result
    }

    /// Tells `node` the stream has ended.
    pub fn close(&mut self, node: NodeId) -> Result<(), ErrorSource> {
        let mut callback = self.scope.take_callback(node)?;
        trace!("close {}", callback.name());
        let saved = (self.next.take(), self.hand_off.take());
        let result = callback.close(self);
        self.scope.restore_callback(node, callback);
        (self.next, self.hand_off) = saved;
        result
    }

    /// Ends the stream at `next`: activates the successor, if there is one,
    /// and closes it. Used by callbacks that can end cleanly only if
    /// whatever follows them can.
    pub fn close_next(&mut self, next: Next, input: Option<u64>) -> Result<(), ErrorSource> {
        match next {
            Next::Node(node) => {
                self.activate(node, input)?;
                self.close(node)
            }
            Next::Repeat | Next::Finish => Ok(()),
        }
    }
}
