/// Configuration options for the push parser driver.
///
/// # Examples
///
/// ```rust
/// use pushparse::{Parser, ParserOptions};
///
/// let parser = Parser::with_options(
///     (),
///     ParserOptions {
///         ignore_trailing_data: true,
///         ..Default::default()
///     },
/// );
/// assert!(!parser.is_finished());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Whether bytes that arrive after the final callback completed are
    /// discarded.
    ///
    /// By default, a callback that completes without installing a successor
    /// finishes the stream, and any remainder it reports (or any later
    /// `push`) is rejected as trailing data. When `true`, the remainder and
    /// every later chunk are dropped instead.
    ///
    /// # Default
    ///
    /// `false`
    pub ignore_trailing_data: bool,

    /// Maximum number of consecutive continuation hand-offs that consume no
    /// bytes before the driver gives up with
    /// [`ErrorSource::Stalled`](crate::ErrorSource::Stalled).
    ///
    /// Guards against callbacks that repeat themselves forever without
    /// consuming input.
    ///
    /// # Default
    ///
    /// `1024`
    pub stall_limit: usize,

    #[cfg(any(test, feature = "fuzzing"))]
    /// Panic on errors instead of returning them.
    ///
    /// Enabled only in test and fuzzing builds to produce backtraces on parse
    /// failures.
    pub panic_on_error: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            ignore_trailing_data: false,
            stall_limit: 1024,
            #[cfg(any(test, feature = "fuzzing"))]
            panic_on_error: false,
        }
    }
}
