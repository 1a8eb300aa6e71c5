use alloc::vec::Vec;

use super::{Handle, NodeId, Object, Scope, TupleId};
use crate::error::ScopeError;

impl<T> Scope<T> {
    /// Allocates a tuple of `size` empty slots under `parent`.
    pub fn tuple_new(&mut self, parent: impl Into<Handle>, size: usize) -> Result<TupleId, ScopeError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(size)?;
        slots.resize(size, None);
        self.alloc(parent.into(), Object::Tuple(slots)).map(TupleId)
    }

    /// Frees a tuple together with every object it owns.
    pub fn tuple_free(&mut self, tuple: TupleId) -> Result<usize, ScopeError> {
        self.tuple_slots(tuple)?;
        self.free(tuple)
    }

    /// Number of slots in `tuple`.
    pub fn tuple_len(&self, tuple: TupleId) -> Result<usize, ScopeError> {
        self.tuple_slots(tuple).map(<[_]>::len)
    }

    /// The handle stored at `index`, or `None` if the slot was never set.
    pub fn tuple_get(&self, tuple: TupleId, index: usize) -> Result<Option<Handle>, ScopeError> {
        let slots = self.tuple_slots(tuple)?;
        slots
            .get(index)
            .copied()
            .ok_or(ScopeError::SlotOutOfRange {
                index,
                size: slots.len(),
            })
    }

    /// The callback stored at `index`. Empty slots and slots holding
    /// anything other than a live callback are errors.
    pub fn tuple_node(&self, tuple: TupleId, index: usize) -> Result<NodeId, ScopeError> {
        let handle = self.tuple_get(tuple, index)?.ok_or(ScopeError::WrongKind {
            expected: "callback",
            actual: "vacant slot",
        })?;
        self.node(handle)
    }

    /// Stores `child` at `index` and makes the tuple its owner, so freeing
    /// the tuple frees it. Returns the handle previously stored there; that
    /// object stays owned by the tuple.
    pub fn tuple_set(
        &mut self,
        tuple: TupleId,
        index: usize,
        child: impl Into<Handle>,
    ) -> Result<Option<Handle>, ScopeError> {
        let child = child.into();
        let size = self.tuple_len(tuple)?;
        if index >= size {
            return Err(ScopeError::SlotOutOfRange { index, size });
        }
        self.steal(tuple, child)?;
        match self.object_mut(tuple.0)? {
            Object::Tuple(slots) => Ok(slots[index].replace(child)),
            other => Err(ScopeError::WrongKind {
                expected: "tuple",
                actual: other.kind(),
            }),
        }
    }

    fn tuple_slots(&self, tuple: TupleId) -> Result<&[Option<Handle>], ScopeError> {
        match self.object(tuple.0)? {
            Object::Tuple(slots) => Ok(slots),
            other => Err(ScopeError::WrongKind {
                expected: "tuple",
                actual: other.kind(),
            }),
        }
    }
}
