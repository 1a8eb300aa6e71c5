//! The push driver.
//!
//! A [`Parser`] owns a [`Scope`] of callbacks and the output value they
//! decode into. Exactly one callback is active at a time. Each `push` offers
//! the new bytes to the active callback; when it completes, the driver
//! installs the successor it named and re-offers whatever it left
//! unconsumed, looping until the chunk is used up. Callers never see a
//! callback boundary: the same bytes decode to the same result however they
//! are split across `push` calls.
//!
//! Errors are terminal. Once a callback fails, the parser remembers the
//! failure and every later call reports it again at the same offset.

#[cfg(test)]
mod tests;

use alloc::boxed::Box;

use log::{debug, trace};

use crate::{
    callback::{Context, Nested, Next, Step},
    error::{ErrorSource, ParserError, SyntaxError},
    options::ParserOptions,
    scope::{NodeId, Scope, ScopeId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Running,
    Finished,
    Failed(ParserError),
}

pub struct Parser<T> {
    scope: Scope<T>,
    output: T,
    active: Option<NodeId>,
    state: State,
    position: usize,
    options: ParserOptions,
}

impl<T> Parser<T> {
    /// Creates a parser that decodes into `output`. Build callbacks with
    /// [`Parser::scope_mut`] and install the first with
    /// [`Parser::set_active`].
    pub fn new(output: T) -> Self {
        Self::with_options(output, ParserOptions::default())
    }

    pub fn with_options(output: T, options: ParserOptions) -> Self {
        Self {
            scope: Scope::new(),
            output,
            active: None,
            state: State::Running,
            position: 0,
            options,
        }
    }

    pub fn scope(&self) -> &Scope<T> {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope<T> {
        &mut self.scope
    }

    /// The arena's root group; callbacks that live as long as the parser go
    /// here.
    pub fn root(&self) -> ScopeId {
        self.scope.root()
    }

    pub fn output(&self) -> &T {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut T {
        &mut self.output
    }

    pub fn into_output(self) -> T {
        self.output
    }

    pub fn active(&self) -> Option<NodeId> {
        self.active
    }

    /// Number of bytes consumed from the stream so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed(_))
    }

    /// The failure that stopped the parser, if any.
    pub fn error(&self) -> Option<&ParserError> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Makes `node` the active callback and activates it.
    pub fn set_active(&mut self, node: NodeId) -> Result<(), ParserError> {
        self.check_running()?;
        self.install(node, None)
    }

    /// Feeds the next chunk of the stream.
    ///
    /// Empty chunks are ignored. After the final callback has completed,
    /// further bytes are an error unless
    /// [`ParserOptions::ignore_trailing_data`] is set.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), ParserError> {
        if bytes.is_empty() {
            return match &self.state {
                State::Failed(err) => Err(Self::replay(err)),
                State::Running | State::Finished => Ok(()),
            };
        }
        match &self.state {
            State::Failed(err) => return Err(Self::replay(err)),
            State::Finished if self.options.ignore_trailing_data => {
                trace!("ignoring {} bytes after end of stream", bytes.len());
                return Ok(());
            }
            State::Finished => {
                return Err(ParserError::new(ErrorSource::Finished, self.position));
            }
            State::Running => {}
        }

        let mut buf = bytes;
        let mut idle_hops = 0;
        loop {
            let Some(active) = self.active else {
                return Err(self.fail(ErrorSource::NoActiveCallback));
            };
            let nested = match self.dispatch(active, buf) {
                Ok(nested) => nested,
                Err(err) => return Err(self.record(err)),
            };

            let unconsumed = match nested.step {
                Step::Incomplete => {
                    self.position += buf.len();
                    return Ok(());
                }
                Step::Done { unconsumed } if unconsumed > buf.len() => {
                    return Err(self.fail(ErrorSource::InvalidRemainder {
                        unconsumed,
                        available: buf.len(),
                    }));
                }
                Step::Done { unconsumed } => unconsumed,
            };

            let consumed = buf.len() - unconsumed;
            self.position += consumed;
            buf = &buf[consumed..];
            if consumed == 0 {
                idle_hops += 1;
                if idle_hops > self.options.stall_limit {
                    return Err(self.fail(ErrorSource::Stalled));
                }
            } else {
                idle_hops = 0;
            }

            let next = match nested.next.unwrap_or_default() {
                Next::Node(node) => node,
                Next::Repeat => active,
                Next::Finish => {
                    debug!("stream finished at byte {}", self.position);
                    self.active = None;
                    self.state = State::Finished;
                    if !buf.is_empty() && !self.options.ignore_trailing_data {
                        return Err(self.fail(SyntaxError::TrailingData.into()));
                    }
                    return Ok(());
                }
            };
            self.install(next, nested.hand_off)?;

            if buf.is_empty() {
                return Ok(());
            }
        }
    }

    /// Signals the end of the stream. Succeeds only if the active callback
    /// accepts ending here.
    pub fn close(&mut self) -> Result<(), ParserError> {
        match &self.state {
            State::Failed(err) => return Err(Self::replay(err)),
            State::Finished => return Ok(()),
            State::Running => {}
        }
        let Some(active) = self.active else {
            return Err(self.fail(ErrorSource::NoActiveCallback));
        };
        let mut cx = Context::new(&mut self.scope, &mut self.output, self.position);
        match cx.close(active) {
            Ok(()) => {
                debug!("stream closed at byte {}", self.position);
                self.active = None;
                self.state = State::Finished;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Runs the active callback over `buf`. A failure is reported at the
    /// offset the callback had reached, not at the start of the chunk.
    fn dispatch(&mut self, active: NodeId, buf: &[u8]) -> Result<Nested, ParserError> {
        let mut cx = Context::new(&mut self.scope, &mut self.output, self.position);
        cx.process(active, buf)
            .map_err(|source| ParserError::new(source, cx.offset()))
    }

    fn install(&mut self, node: NodeId, input: Option<u64>) -> Result<(), ParserError> {
        self.active = Some(node);
        let mut cx = Context::new(&mut self.scope, &mut self.output, self.position);
        match cx.activate(node, input) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn check_running(&self) -> Result<(), ParserError> {
        match &self.state {
            State::Running => Ok(()),
            State::Finished => Err(ParserError::new(ErrorSource::Finished, self.position)),
            State::Failed(err) => Err(Self::replay(err)),
        }
    }

    fn replay(err: &ParserError) -> ParserError {
        ParserError::new(ErrorSource::Failed(Box::new(err.source.clone())), err.offset)
    }

    fn fail(&mut self, source: ErrorSource) -> ParserError {
        self.record(ParserError::new(source, self.position))
    }

    fn record(&mut self, err: ParserError) -> ParserError {
        debug!("parser failed: {err}");

        #[cfg(any(test, feature = "fuzzing"))]
        if self.options.panic_on_error {
            panic!("{err}");
        }

        self.active = None;
        self.state = State::Failed(err.clone());
        err
    }
}

impl<T: Default> Default for Parser<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
