//! Hierarchical ownership for callbacks and tuples.
//!
//! Every object lives in a [`Scope`] arena and, apart from the root group,
//! has exactly one parent. Freeing an object frees everything allocated
//! beneath it, each object exactly once. Handles carry a generation, so a
//! handle to a freed object is reported as [`ScopeError::Stale`] instead of
//! silently aliasing whatever reused its slot.

mod tuple;


use alloc::{boxed::Box, vec::Vec};

use log::trace;

use crate::{callback::Callback, error::ScopeError};

/// Untyped reference to an object in a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

macro_rules! handle_kind {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Handle);

        impl $name {
            /// The untyped handle.
            #[must_use]
            pub fn handle(self) -> Handle {
                self.0
            }
        }

        impl From<$name> for Handle {
            fn from(id: $name) -> Handle {
                id.0
            }
        }
    };
}

handle_kind!(
    /// A plain ownership group: owns objects, does nothing else.
    ScopeId
);
handle_kind!(
    /// A callback node.
    NodeId
);
handle_kind!(
    /// A fixed-size tuple of child slots.
    TupleId
);

pub(crate) enum Object<T> {
    Group,
    /// `None` while the callback is being run.
    Callback(Option<Box<dyn Callback<T>>>),
    Tuple(Vec<Option<Handle>>),
}

impl<T> Object<T> {
    fn kind(&self) -> &'static str {
        match self {
            Object::Group => "group",
            Object::Callback(_) => "callback",
            Object::Tuple(_) => "tuple",
        }
    }
}

struct Entry<T> {
    parent: Option<Handle>,
    children: Vec<Handle>,
    object: Object<T>,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// An arena of callbacks, tuples and groups arranged in an ownership tree.
///
/// `T` is the output type the callbacks decode into; see
/// [`Parser`](crate::Parser).
pub struct Scope<T> {
    slots: Vec<Slot<T>>,
    /// Always has capacity for every slot, so freeing never allocates here.
    vacant: Vec<u32>,
    live: usize,
    root: ScopeId,
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scope<T> {
    /// Creates an arena holding only its root group.
    #[must_use]
    pub fn new() -> Self {
        let root = Handle {
            index: 0,
            generation: 0,
        };
        let mut slots = Vec::with_capacity(8);
        slots.push(Slot {
            generation: 0,
            entry: Some(Entry {
                parent: None,
                children: Vec::new(),
                object: Object::Group,
            }),
        });
        Self {
            slots,
            vacant: Vec::with_capacity(8),
            live: 1,
            root: ScopeId(root),
        }
    }

    /// The root group. Everything allocated in this arena descends from it.
    #[must_use]
    pub fn root(&self) -> ScopeId {
        self.root
    }

    /// Number of live objects, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// `true` once the root itself has been freed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `handle` still refers to a live object.
    #[must_use]
    pub fn contains(&self, handle: impl Into<Handle>) -> bool {
        self.entry(handle.into()).is_ok()
    }

    /// The owner of `handle`, or `None` for the root.
    pub fn parent_of(&self, handle: impl Into<Handle>) -> Result<Option<Handle>, ScopeError> {
        Ok(self.entry(handle.into())?.parent)
    }

    /// The objects directly owned by `handle`, in allocation order.
    pub fn children_of(&self, handle: impl Into<Handle>) -> Result<&[Handle], ScopeError> {
        Ok(&self.entry(handle.into())?.children)
    }

    /// Allocates a new, empty group under `parent`.
    pub fn group(&mut self, parent: impl Into<Handle>) -> Result<ScopeId, ScopeError> {
        self.alloc(parent.into(), Object::Group).map(ScopeId)
    }

    /// Moves `callback` into the arena under `parent`.
    pub fn insert<C>(&mut self, parent: impl Into<Handle>, callback: C) -> Result<NodeId, ScopeError>
    where
        C: Callback<T> + 'static,
    {
        self.alloc(parent.into(), Object::Callback(Some(Box::new(callback))))
            .map(NodeId)
    }

    /// Frees `handle` and, recursively, everything it owns. Returns the
    /// number of objects released.
    pub fn free(&mut self, handle: impl Into<Handle>) -> Result<usize, ScopeError> {
        let handle = handle.into();
        let parent = self.entry(handle)?.parent;
        if let Some(parent) = parent {
            if let Ok(entry) = self.entry_mut(parent) {
                entry.children.retain(|child| *child != handle);
            }
        }

        let mut freed = 0;
        let mut pending = Vec::new();
        pending.push(handle);
        while let Some(next) = pending.pop() {
            let slot = &mut self.slots[next.index as usize];
            if slot.generation != next.generation {
                continue;
            }
            let Some(entry) = slot.entry.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.vacant.push(next.index);
            self.live -= 1;
            freed += 1;
            pending.extend_from_slice(&entry.children);
            // `entry` drops here, dropping the object it held.
        }
        trace!("scope: freed {freed} objects under {handle:?}");
        Ok(freed)
    }

    /// Reparents `child` under `new_parent`. Fails with
    /// [`ScopeError::Cycle`] if `new_parent` is `child` or one of its
    /// descendants.
    pub fn steal(
        &mut self,
        new_parent: impl Into<Handle>,
        child: impl Into<Handle>,
    ) -> Result<(), ScopeError> {
        let new_parent = new_parent.into();
        let child = child.into();
        let old_parent = self.entry(child)?.parent;

        let mut cursor = Some(new_parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(ScopeError::Cycle);
            }
            cursor = self.entry(ancestor)?.parent;
        }
        if old_parent == Some(new_parent) {
            return Ok(());
        }

        self.entry_mut(new_parent)?.children.try_reserve(1)?;
        if let Some(old_parent) = old_parent {
            self.entry_mut(old_parent)?
                .children
                .retain(|existing| *existing != child);
        }
        self.entry_mut(new_parent)?.children.push(child);
        self.entry_mut(child)?.parent = Some(new_parent);
        Ok(())
    }

    fn alloc(&mut self, parent: Handle, object: Object<T>) -> Result<Handle, ScopeError> {
        self.entry_mut(parent)?.children.try_reserve(1)?;

        let handle = if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.try_reserve(1)?;
            let wanted = self.slots.len() + 1;
            self.vacant
                .try_reserve(wanted.saturating_sub(self.vacant.len()))?;
            let index = slot_index(self.slots.len())?;
            self.slots.push(Slot {
                generation: 0,
                entry: None,
            });
            Handle {
                index,
                generation: 0,
            }
        };

        self.slots[handle.index as usize].entry = Some(Entry {
            parent: Some(parent),
            children: Vec::new(),
            object,
        });
        self.live += 1;
        self.entry_mut(parent)?.children.push(handle);
        Ok(handle)
    }

    fn entry(&self, handle: Handle) -> Result<&Entry<T>, ScopeError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(ScopeError::Stale)
    }

    fn entry_mut(&mut self, handle: Handle) -> Result<&mut Entry<T>, ScopeError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(ScopeError::Stale)
    }

    pub(crate) fn object(&self, handle: Handle) -> Result<&Object<T>, ScopeError> {
        Ok(&self.entry(handle)?.object)
    }

    pub(crate) fn object_mut(&mut self, handle: Handle) -> Result<&mut Object<T>, ScopeError> {
        Ok(&mut self.entry_mut(handle)?.object)
    }

    /// Interprets an untyped handle as a callback.
    pub fn node(&self, handle: Handle) -> Result<NodeId, ScopeError> {
        match self.object(handle)? {
            Object::Callback(_) => Ok(NodeId(handle)),
            other => Err(ScopeError::WrongKind {
                expected: "callback",
                actual: other.kind(),
            }),
        }
    }

    /// Takes a callback out of its slot so it can run with mutable access to
    /// the arena.
    pub(crate) fn take_callback(&mut self, node: NodeId) -> Result<Box<dyn Callback<T>>, ScopeError> {
        match self.object_mut(node.0)? {
            Object::Callback(slot) => slot.take().ok_or(ScopeError::Busy),
            other => Err(ScopeError::WrongKind {
                expected: "callback",
                actual: other.kind(),
            }),
        }
    }

    /// Returns a callback taken with [`Scope::take_callback`]. If the node
    /// was freed while it ran, the callback is dropped.
    pub(crate) fn restore_callback(&mut self, node: NodeId, callback: Box<dyn Callback<T>>) {
        if let Ok(Object::Callback(slot @ None)) = self.object_mut(node.0) {
            *slot = Some(callback);
        }
    }
}

/// Handles index slots with a `u32`.
fn slot_index(len: usize) -> Result<u32, ScopeError> {
    u32::try_from(len).map_err(|_| ScopeError::Exhausted)
}
