//! Reusable callbacks and the factories that place them in a scope.
//!
//! Every factory allocates under the `parent` it is given. Wrappers take
//! ownership of the nodes they wrap, so freeing the wrapper frees them too.
//! When a factory fails part-way, whatever it allocated is freed again.

mod basic;
mod fixed;
mod fold;
mod max_bytes;
mod min_bytes;
mod par;
mod sequence;
mod skip;


pub use basic::{Eof, Noop, Pure, Trash};
pub use fixed::Fixed;
pub(crate) use fixed::{le_u32, le_u64};
pub use fold::Fold;
pub use max_bytes::MaxBytes;
pub use min_bytes::MinBytes;
pub use par::Par;
pub use sequence::Sequence;
pub use skip::Skip;

use crate::{
    callback::{Callback, Next},
    error::{ScopeError, SyntaxError},
    scope::{Handle, NodeId, Scope, TupleId},
};

/// Frees `orphan` if `result` is an error.
pub(crate) fn or_free<T, R>(
    scope: &mut Scope<T>,
    orphan: impl Into<Handle>,
    result: Result<R, ScopeError>,
) -> Result<R, ScopeError> {
    if result.is_err() {
        let _ = scope.free(orphan);
    }
    result
}

/// A node that swallows the rest of the stream.
pub fn trash<T>(scope: &mut Scope<T>, parent: impl Into<Handle>) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Trash)
}

/// A node that only accepts the end of the stream.
pub fn eof<T>(scope: &mut Scope<T>, parent: impl Into<Handle>) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Eof)
}

/// A node that discards `length` bytes, then continues at `next`.
pub fn skip<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    length: usize,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Skip::new(length).then(next))
}

/// Wraps `inner` so the first call of each run carries at least `minimum`
/// bytes. See [`MinBytes`].
pub fn min_bytes<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    inner: NodeId,
    minimum: usize,
) -> Result<NodeId, ScopeError> {
    let wrapper = scope.insert(parent, MinBytes::new(inner, minimum)?)?;
    let stolen = scope.steal(wrapper, inner);
    or_free(scope, wrapper, stolen)?;
    Ok(wrapper)
}

/// Wraps `inner` so it sees at most `limit` bytes before being closed.
/// See [`MaxBytes`].
pub fn max_bytes<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    inner: NodeId,
    limit: usize,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    let wrapper = scope.insert(parent, MaxBytes::new(inner, limit).then(next))?;
    let stolen = scope.steal(wrapper, inner);
    or_free(scope, wrapper, stolen)?;
    Ok(wrapper)
}

/// Places `steps` in a new tuple and inserts the callback `build` makes
/// from it; the callback then owns the tuple and, through it, the steps.
fn over_tuple<T, C>(
    scope: &mut Scope<T>,
    parent: Handle,
    steps: &[NodeId],
    build: impl FnOnce(TupleId) -> C,
) -> Result<NodeId, ScopeError>
where
    C: Callback<T> + 'static,
{
    let tuple = scope.tuple_new(parent, steps.len())?;
    for (index, step) in steps.iter().enumerate() {
        let set = scope.tuple_set(tuple, index, *step);
        or_free(scope, tuple, set)?;
    }
    let node = scope.insert(parent, build(tuple));
    let node = or_free(scope, tuple, node)?;
    let stolen = scope.steal(node, tuple);
    or_free(scope, node, stolen)?;
    Ok(node)
}

/// Runs `steps` in order. The steps become owned by the sequence.
pub fn sequence<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    steps: &[NodeId],
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    let next = next.into();
    over_tuple(scope, parent.into(), steps, |tuple| Sequence::new(tuple).then(next))
}

/// Runs `steps` in order, each on the same activation input, and passes
/// their hand-offs to `sink`. See [`Par`].
pub fn par<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    steps: &[NodeId],
    sink: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, &[Option<u64>]) -> Result<(), SyntaxError> + 'static,
    T: 'static,
{
    let next = next.into();
    over_tuple(scope, parent.into(), steps, |tuple| Par::new(tuple, sink).then(next))
}

/// Two-step [`par`]: `first` then `second`, both fed the same input.
pub fn both<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    first: NodeId,
    second: NodeId,
    mut sink: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, Option<u64>, Option<u64>) -> Result<(), SyntaxError> + 'static,
    T: 'static,
{
    let pair = move |out: &mut T, results: &[Option<u64>]| match *results {
        [a, b] => sink(out, a, b),
        _ => Err(SyntaxError::SyntaxError("both: expected two results")),
    };
    par(scope, parent, &[first, second], pair, next)
}

/// Repeats `inner` until an iteration rejects its first byte. `inner`
/// becomes owned by the fold. See [`Fold`].
pub fn fold<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    inner: NodeId,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    let wrapper = scope.insert(parent, Fold::new(inner).then(next))?;
    let stolen = scope.steal(wrapper, inner);
    or_free(scope, wrapper, stolen)?;
    Ok(wrapper)
}

/// Calls `f` on the output without consuming input.
pub fn pure<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    f: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, Option<u64>) -> Result<(), SyntaxError> + 'static,
    T: 'static,
{
    scope.insert(parent, Pure::new(f).then(next))
}

/// Completes at once, consuming nothing.
pub fn noop<T>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError> {
    scope.insert(parent, Noop::then(next))
}

/// Reads a little-endian `u32`, however the stream is chunked.
pub fn fixed_le_u32<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    mut sink: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, u32) + 'static,
    T: 'static,
{
    let parent = parent.into();
    let reader = Fixed::new(4, move |out: &mut T, bytes: &[u8]| -> Result<(), SyntaxError> {
        sink(out, le_u32(bytes));
        Ok(())
    });
    let reader = scope.insert(parent, reader.then(next))?;
    let wrapper = min_bytes(scope, parent, reader, 4);
    or_free(scope, reader, wrapper)
}

/// Reads a little-endian `u64`, however the stream is chunked.
pub fn fixed_le_u64<T, F>(
    scope: &mut Scope<T>,
    parent: impl Into<Handle>,
    mut sink: F,
    next: impl Into<Next>,
) -> Result<NodeId, ScopeError>
where
    F: FnMut(&mut T, u64) + 'static,
    T: 'static,
{
    let parent = parent.into();
    let reader = Fixed::new(8, move |out: &mut T, bytes: &[u8]| -> Result<(), SyntaxError> {
        sink(out, le_u64(bytes));
        Ok(())
    });
    let reader = scope.insert(parent, reader.then(next))?;
    let wrapper = min_bytes(scope, parent, reader, 8);
    or_free(scope, reader, wrapper)
}
