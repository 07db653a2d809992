//! Array storage: an owned growable sequence plus a foreign-backed variant.
//!
//! The owned variant supports amortized-O(1) push and O(1) indexed get, and
//! `set` past the end fills the gap with empty slots. The foreign variant
//! wraps a host collection behind [`ShallowArray`] and degrades the public
//! operations to read-only lookups.

use crate::arena::{Arena, Slot};
use crate::value::Value;
use std::rc::Rc;

/// Read hooks for a host-owned sequence wrapped without deep conversion.
///
/// Implementations convert elements on access, allocating the converted value
/// into the arena passed to `get`.
pub trait ShallowArray {
    fn len(&self) -> usize;
    fn get(&self, arena: &Arena, index: usize) -> Option<Value>;
}

pub(crate) enum ArrayBuf {
    /// Arena-backed storage. `None` entries are the zero-filled holes created
    /// by an out-of-range `set`.
    Owned(Vec<Option<Slot>>),
    /// Host-backed storage with the element count cached at wrap time.
    Foreign {
        backing: Rc<dyn ShallowArray>,
        count: usize,
    },
}

impl ArrayBuf {
    pub(crate) fn len(&self) -> usize {
        match self {
            ArrayBuf::Owned(items) => items.len(),
            ArrayBuf::Foreign { count, .. } => *count,
        }
    }

    pub(crate) fn push(&mut self, slot: Slot) -> bool {
        match self {
            ArrayBuf::Owned(items) => {
                items.push(Some(slot));
                true
            }
            ArrayBuf::Foreign { .. } => false,
        }
    }

    /// Sets `index`, zero-filling any intermediate slots and extending the
    /// count when the index is past the end.
    pub(crate) fn set(&mut self, index: usize, slot: Slot) -> bool {
        match self {
            ArrayBuf::Owned(items) => {
                if index >= items.len() {
                    items.resize(index + 1, None);
                }
                items[index] = Some(slot);
                true
            }
            ArrayBuf::Foreign { .. } => false,
        }
    }
}
