//! Slot arena backing the value model.
//!
//! Every [`Value`] lives in exactly one arena and is released wholesale when
//! the arena is dropped. `reset` empties the arena while retaining capacity;
//! it bumps an internal epoch so that handles created before the reset stop
//! resolving instead of aliasing new allocations. The arena also carries the
//! last-error slot used by the compiler and the builder operations.
//!
//! The arena handle itself is a cheap clone (values carry one), so a matcher
//! keeps its compilation arena alive for as long as the matcher exists.

use crate::array::{ArrayBuf, ShallowArray};
use crate::error::{Error, ErrorKind};
use crate::table::{HashTable, ShallowTable, TableBuf};
use crate::value::{Kind, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Slot capacity reserved up front so small documents never regrow.
const ARENA_INITIAL_CAPACITY: usize = 64;

/// Index of a value cell, stamped with the epoch it was allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) index: u32,
    pub(crate) epoch: u32,
}

/// Storage for one allocated value.
pub(crate) enum ValueCell {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(Rc<str>),
    Array(ArrayBuf),
    Table(TableBuf),
    Regex(Rc<str>),
    Pointer(Rc<dyn Any>),
    Opaque(Rc<dyn Any>),
}

struct ArenaInner {
    cells: RefCell<Vec<ValueCell>>,
    epoch: Cell<u32>,
    error: RefCell<Option<Error>>,
    adopted: RefCell<Vec<Rc<dyn Any>>>,
}

/// A pool of values sharing one lifetime.
///
/// Cloning an `Arena` clones the handle, not the storage; all clones refer to
/// the same pool.
///
/// # Example
/// ```rust,ignore
/// let arena = Arena::new();
/// let condition = arena.table_of(&[("age", arena.table_of(&[("$gte", arena.int(18))]))]);
/// let matcher = Matcher::compile(&arena, &condition)?;
/// ```
#[derive(Clone)]
pub struct Arena {
    inner: Rc<ArenaInner>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ArenaInner {
                cells: RefCell::new(Vec::with_capacity(ARENA_INITIAL_CAPACITY)),
                epoch: Cell::new(0),
                error: RefCell::new(None),
                adopted: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Number of live allocations in the current epoch.
    pub fn len(&self) -> usize {
        self.inner.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the arena empty while retaining its capacity.
    ///
    /// Every handle created before the reset is invalidated: it no longer
    /// resolves, and evaluation over it degrades to `false`. The error slot
    /// is cleared.
    pub fn reset(&self) {
        self.inner.cells.borrow_mut().clear();
        self.inner.epoch.set(self.inner.epoch.get().wrapping_add(1));
        self.inner.error.borrow_mut().take();
    }

    /// Adopts a foreign allocation so it is released together with the arena.
    pub fn adopt(&self, resource: Rc<dyn Any>) {
        self.inner.adopted.borrow_mut().push(resource);
    }

    /// The last error recorded by a failing operation, if any.
    pub fn last_error(&self) -> Option<Error> {
        self.inner.error.borrow().clone()
    }

    pub fn clear_error(&self) {
        self.inner.error.borrow_mut().take();
    }

    /// Records an error unless one is already set; the first failure wins and
    /// later validators short-circuit against it.
    pub fn set_error(&self, error: Error) {
        let mut slot = self.inner.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(crate) fn same_arena(&self, other: &Arena) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn epoch(&self) -> u32 {
        self.inner.epoch.get()
    }

    fn alloc(&self, cell: ValueCell) -> Value {
        let mut cells = self.inner.cells.borrow_mut();
        let index = cells.len() as u32;
        cells.push(cell);
        Value::from_slot(
            self.clone(),
            Slot {
                index,
                epoch: self.epoch(),
            },
        )
    }

    /// Runs `f` against the cell behind `slot`. Returns `None` for handles
    /// from an earlier epoch.
    pub(crate) fn with_cell<R>(&self, slot: Slot, f: impl FnOnce(&ValueCell) -> R) -> Option<R> {
        if slot.epoch != self.epoch() {
            return None;
        }
        let cells = self.inner.cells.borrow();
        cells.get(slot.index as usize).map(f)
    }

    pub(crate) fn with_cell_mut<R>(
        &self,
        slot: Slot,
        f: impl FnOnce(&mut ValueCell) -> R,
    ) -> Option<R> {
        if slot.epoch != self.epoch() {
            return None;
        }
        let mut cells = self.inner.cells.borrow_mut();
        cells.get_mut(slot.index as usize).map(f)
    }

    // ------------------------------------------------------------------
    // Value constructors. Constructors are total: they always produce a
    // valid handle or record the failure in the error slot.
    // ------------------------------------------------------------------

    pub fn null(&self) -> Value {
        self.alloc(ValueCell::Null)
    }

    pub fn boolean(&self, value: bool) -> Value {
        self.alloc(ValueCell::Bool(value))
    }

    pub fn int(&self, value: i64) -> Value {
        self.alloc(ValueCell::Int(value))
    }

    pub fn double(&self, value: f64) -> Value {
        self.alloc(ValueCell::Double(value))
    }

    /// Wraps a string; the contents are copied into the arena.
    pub fn string(&self, value: &str) -> Value {
        self.alloc(ValueCell::Str(Rc::from(value)))
    }

    /// Wraps a regex pattern. Matching and rendering of regex values are
    /// delegated to the registered regex adapter.
    pub fn regex(&self, pattern: &str) -> Value {
        self.alloc(ValueCell::Regex(Rc::from(pattern)))
    }

    /// Wraps an opaque host pointer, typically substituted through the value
    /// converter's shallow conversion during field extraction.
    pub fn pointer(&self, payload: Rc<dyn Any>) -> Value {
        self.alloc(ValueCell::Pointer(payload))
    }

    /// Wraps a payload no operator understands; it compares as incomparable.
    pub fn opaque(&self, payload: Rc<dyn Any>) -> Value {
        self.alloc(ValueCell::Opaque(payload))
    }

    pub fn array_new(&self) -> Value {
        self.alloc(ValueCell::Array(ArrayBuf::Owned(Vec::new())))
    }

    pub fn table_new(&self) -> Value {
        self.alloc(ValueCell::Table(TableBuf::Owned(HashTable::new())))
    }

    /// Builds an array from the given items.
    pub fn array_of(&self, items: &[Value]) -> Value {
        let array = self.array_new();
        for item in items {
            array.push(item);
        }
        array
    }

    /// Builds a table from the given entries.
    pub fn table_of(&self, entries: &[(&str, Value)]) -> Value {
        let table = self.table_new();
        for (key, value) in entries {
            table.table_set(key, value);
        }
        table
    }

    /// Wraps a foreign-backed sequence. The resulting array is read-only;
    /// `push` and `set` report `UnsupportedOperation`.
    pub fn shallow_array(&self, backing: Rc<dyn ShallowArray>) -> Value {
        let count = backing.len();
        self.alloc(ValueCell::Array(ArrayBuf::Foreign { backing, count }))
    }

    /// Wraps a foreign-backed map. The resulting table is read-only.
    pub fn shallow_table(&self, backing: Rc<dyn ShallowTable>) -> Value {
        let count = backing.len();
        self.alloc(ValueCell::Table(TableBuf::Foreign { backing, count }))
    }

    // ------------------------------------------------------------------
    // Condition-shape validators used by the compiler. Each one refuses to
    // overwrite an error that is already set.
    // ------------------------------------------------------------------

    pub(crate) fn expect_table(&self, who: &str, value: &Value) -> bool {
        self.expect_kind(who, value, Kind::Table)
    }

    pub(crate) fn expect_array(&self, who: &str, value: &Value) -> bool {
        self.expect_kind(who, value, Kind::Array)
    }

    fn expect_kind(&self, who: &str, value: &Value, expected: Kind) -> bool {
        if self.last_error().is_some() {
            return false;
        }
        if value.kind() == expected {
            return true;
        }
        self.set_error(Error::new(
            ErrorKind::InvalidType,
            format!(
                "{who} needs {}, got {}",
                expected.name(),
                value.kind().name()
            ),
        ));
        false
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_produce_expected_kinds() {
        let arena = Arena::new();
        assert_eq!(arena.null().kind(), Kind::Null);
        assert_eq!(arena.boolean(true).kind(), Kind::Bool);
        assert_eq!(arena.int(42).kind(), Kind::Int);
        assert_eq!(arena.double(1.5).kind(), Kind::Double);
        assert_eq!(arena.string("hi").kind(), Kind::Str);
        assert_eq!(arena.array_new().kind(), Kind::Array);
        assert_eq!(arena.table_new().kind(), Kind::Table);
        assert_eq!(arena.regex("a+").kind(), Kind::Regex);
    }

    #[test]
    fn test_reset_invalidates_handles_and_keeps_capacity() {
        let arena = Arena::new();
        let value = arena.int(1);
        assert!(value.is_valid());
        assert_eq!(arena.len(), 1);

        arena.reset();
        assert!(!value.is_valid());
        assert_eq!(arena.len(), 0);

        // A fresh allocation after reset is valid and unrelated to the stale
        // handle.
        let fresh = arena.int(2);
        assert!(fresh.is_valid());
        assert!(!value.is_valid());
    }

    #[test]
    fn test_error_slot_keeps_first_error() {
        let arena = Arena::new();
        arena.set_error(Error::new(ErrorKind::InvalidType, "first"));
        arena.set_error(Error::new(ErrorKind::Memory, "second"));

        let error = arena.last_error().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidType);
        assert_eq!(error.message, "first");

        arena.clear_error();
        assert!(arena.last_error().is_none());
    }

    #[test]
    fn test_reset_clears_error() {
        let arena = Arena::new();
        arena.set_error(Error::memory());
        arena.reset();
        assert!(arena.last_error().is_none());
    }

    #[test]
    fn test_validators_short_circuit_on_existing_error() {
        let arena = Arena::new();
        let int = arena.int(1);
        assert!(!arena.expect_table("condition", &int));
        let first = arena.last_error().unwrap();
        assert_eq!(first.kind, ErrorKind::InvalidType);
        assert!(first.message.contains("needs Table"));
        assert!(first.message.contains("got Int"));

        // A later validator must not overwrite the recorded failure.
        let table = arena.table_new();
        assert!(!arena.expect_array("$and", &table));
        assert_eq!(arena.last_error().unwrap(), first);
    }

    #[test]
    fn test_adopt_holds_resource_until_drop() {
        let arena = Arena::new();
        let resource: Rc<dyn std::any::Any> = Rc::new(vec![1u8, 2, 3]);
        let weak = Rc::downgrade(&resource);
        arena.adopt(resource);
        assert!(weak.upgrade().is_some());
        drop(arena);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_handles_are_shared_across_clones() {
        let arena = Arena::new();
        let clone = arena.clone();
        let value = arena.int(9);
        assert!(arena.same_arena(&clone));
        assert!(value.is_valid());
        clone.reset();
        assert!(!value.is_valid());
    }
}
