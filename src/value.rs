//! The generic value model.
//!
//! A [`Value`] is a handle into an [`Arena`]: a tagged payload with uniform
//! comparison and stringification. Handles are cheap to clone and carry their
//! arena, so values from different arenas (say, a long-lived condition and a
//! per-match scratch record) compare against each other directly.

use crate::arena::{Arena, Slot, ValueCell};
use crate::array::{ArrayBuf, ShallowArray};
use crate::error::{Error, ErrorKind};
use crate::table::{ShallowTable, TableBuf};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// The kind of payload a value holds. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Double,
    Str,
    Array,
    Table,
    Regex,
    Pointer,
    Opaque,
}

impl Kind {
    /// Human-readable kind name, used in error messages and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Null => "Null",
            Kind::Bool => "Bool",
            Kind::Int => "Int",
            Kind::Double => "Double",
            Kind::Str => "String",
            Kind::Array => "Array",
            Kind::Table => "Table",
            Kind::Regex => "Regex",
            Kind::Pointer => "Pointer",
            Kind::Opaque => "Unsupported",
        }
    }
}

/// Outcome of comparing two values.
///
/// Comparison is total within the numeric kinds and strings; Int and Double
/// promote to Double. Kinds with no promotion rule are `Incomparable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl CompareResult {
    pub fn is_equal(&self) -> bool {
        matches!(self, CompareResult::Equal)
    }
}

impl From<Ordering> for CompareResult {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => CompareResult::Less,
            Ordering::Equal => CompareResult::Equal,
            Ordering::Greater => CompareResult::Greater,
        }
    }
}

/// A cheap snapshot of a value's payload.
///
/// Scalar arms carry the payload directly; `Array` and `Table` signal the
/// kind, with elements reached through [`Value`] accessors.
#[derive(Clone)]
pub enum ValueView {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(Rc<str>),
    Array,
    Table,
    Regex(Rc<str>),
    Pointer(Rc<dyn Any>),
    Opaque(Rc<dyn Any>),
}

/// A handle to one value inside an arena.
#[derive(Clone)]
pub struct Value {
    arena: Arena,
    slot: Slot,
}

enum ElementHit {
    Owned(Option<Slot>),
    Foreign(Rc<dyn ShallowArray>),
    Miss,
}

enum EntryHit {
    Owned(Option<Slot>),
    Foreign(Rc<dyn ShallowTable>),
    Miss,
}

impl Value {
    pub(crate) fn from_slot(arena: Arena, slot: Slot) -> Self {
        Self { arena, slot }
    }

    /// The arena this value lives in.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// False once the owning arena has been reset.
    pub fn is_valid(&self) -> bool {
        self.slot.epoch == self.arena.epoch()
    }

    pub fn kind(&self) -> Kind {
        self.arena
            .with_cell(self.slot, |cell| match cell {
                ValueCell::Null => Kind::Null,
                ValueCell::Bool(_) => Kind::Bool,
                ValueCell::Int(_) => Kind::Int,
                ValueCell::Double(_) => Kind::Double,
                ValueCell::Str(_) => Kind::Str,
                ValueCell::Array(_) => Kind::Array,
                ValueCell::Table(_) => Kind::Table,
                ValueCell::Regex(_) => Kind::Regex,
                ValueCell::Pointer(_) => Kind::Pointer,
                ValueCell::Opaque(_) => Kind::Opaque,
            })
            .unwrap_or(Kind::Null)
    }

    /// Snapshots the payload. Stale handles read as null.
    pub fn view(&self) -> ValueView {
        self.arena
            .with_cell(self.slot, |cell| match cell {
                ValueCell::Null => ValueView::Null,
                ValueCell::Bool(b) => ValueView::Bool(*b),
                ValueCell::Int(i) => ValueView::Int(*i),
                ValueCell::Double(d) => ValueView::Double(*d),
                ValueCell::Str(s) => ValueView::Str(s.clone()),
                ValueCell::Array(_) => ValueView::Array,
                ValueCell::Table(_) => ValueView::Table,
                ValueCell::Regex(p) => ValueView::Regex(p.clone()),
                ValueCell::Pointer(p) => ValueView::Pointer(p.clone()),
                ValueCell::Opaque(p) => ValueView::Opaque(p.clone()),
            })
            .unwrap_or(ValueView::Null)
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Compares this value with `other` under the cross-kind promotion rules.
    pub fn compare(&self, other: &Value) -> CompareResult {
        use ValueView as V;
        match (self.view(), other.view()) {
            (V::Null, V::Null) => CompareResult::Equal,
            (V::Bool(a), V::Bool(b)) => a.cmp(&b).into(),
            (V::Int(a), V::Int(b)) => a.cmp(&b).into(),
            (V::Int(a), V::Double(b)) => compare_doubles(a as f64, b),
            (V::Double(a), V::Int(b)) => compare_doubles(a, b as f64),
            (V::Double(a), V::Double(b)) => compare_doubles(a, b),
            (V::Str(a), V::Str(b)) => a.as_ref().cmp(b.as_ref()).into(),
            (V::Array, V::Array) => self.compare_arrays(other),
            _ => CompareResult::Incomparable,
        }
    }

    /// Length-first array ordering: a longer array is greater. At equal
    /// length elements compare pairwise with nulls ordered first, and any
    /// incomparable pair short-circuits.
    fn compare_arrays(&self, other: &Value) -> CompareResult {
        let len_a = self.len();
        let len_b = other.len();
        if len_a != len_b {
            return len_a.cmp(&len_b).into();
        }
        for i in 0..len_a {
            let item_a = self.get(i);
            let item_b = other.get(i);
            let a_null = item_a.as_ref().map_or(true, |v| v.kind() == Kind::Null);
            let b_null = item_b.as_ref().map_or(true, |v| v.kind() == Kind::Null);
            if a_null && b_null {
                continue;
            }
            if a_null {
                return CompareResult::Less;
            }
            if b_null {
                return CompareResult::Greater;
            }
            let (Some(item_a), Some(item_b)) = (item_a, item_b) else {
                continue;
            };
            match item_a.compare(&item_b) {
                CompareResult::Equal => continue,
                other_result => return other_result,
            }
        }
        CompareResult::Equal
    }

    // ------------------------------------------------------------------
    // Stringification
    // ------------------------------------------------------------------

    /// Renders the value as JSON-ish text: `null`, `true`/`false`, decimal
    /// integers, fixed-point doubles, quoted strings, bracketed arrays and
    /// braced tables. Regex values are rendered by the registered regex
    /// adapter, pointers as opaque addresses.
    pub fn render(&self) -> String {
        match self.view() {
            ValueView::Null => "null".to_string(),
            ValueView::Bool(b) => b.to_string(),
            ValueView::Int(i) => i.to_string(),
            ValueView::Double(d) => format!("{d:.6}"),
            ValueView::Str(s) => format!("\"{}\"", escape_string(&s)),
            ValueView::Array => {
                let parts: Vec<String> = (0..self.len())
                    .map(|i| match self.get(i) {
                        Some(item) => item.render(),
                        None => "null".to_string(),
                    })
                    .collect();
                format!("[{}]", parts.join(","))
            }
            ValueView::Table => {
                let parts: Vec<String> = self
                    .table_entries()
                    .iter()
                    .map(|(key, value)| format!("\"{}\":{}", escape_string(key), value.render()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
            ValueView::Regex(_) => crate::registry::regex_stringify(self),
            ValueView::Pointer(p) => format!("{:p}", Rc::as_ptr(&p)),
            ValueView::Opaque(p) => format!("{:p}", Rc::as_ptr(&p)),
        }
    }

    // ------------------------------------------------------------------
    // Array operations
    // ------------------------------------------------------------------

    /// Element count for arrays, zero for any other kind.
    pub fn len(&self) -> usize {
        self.arena
            .with_cell(self.slot, |cell| match cell {
                ValueCell::Array(buf) => buf.len(),
                _ => 0,
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed element access. Out-of-range indexes and zero-filled holes
    /// both read as absent.
    pub fn get(&self, index: usize) -> Option<Value> {
        let hit = self.arena.with_cell(self.slot, |cell| match cell {
            ValueCell::Array(ArrayBuf::Owned(items)) => {
                ElementHit::Owned(items.get(index).copied().flatten())
            }
            ValueCell::Array(ArrayBuf::Foreign { backing, count }) => {
                if index < *count {
                    ElementHit::Foreign(backing.clone())
                } else {
                    ElementHit::Miss
                }
            }
            _ => ElementHit::Miss,
        })?;
        match hit {
            ElementHit::Owned(slot) => slot.map(|s| Value::from_slot(self.arena.clone(), s)),
            ElementHit::Foreign(backing) => backing.get(&self.arena, index),
            ElementHit::Miss => None,
        }
    }

    /// Appends an element. Fails on foreign-backed arrays and non-arrays.
    pub fn push(&self, item: &Value) -> bool {
        let slot = item.slot;
        let pushed = self
            .arena
            .with_cell_mut(self.slot, |cell| match cell {
                ValueCell::Array(buf) => buf.push(slot),
                _ => false,
            })
            .unwrap_or(false);
        if !pushed {
            self.arena.set_error(Error::new(
                ErrorKind::UnsupportedOperation,
                "push is not supported on this value",
            ));
        }
        pushed
    }

    /// Sets the element at `index`, zero-filling intermediate slots when the
    /// index is past the end.
    pub fn set(&self, index: usize, item: &Value) -> bool {
        let slot = item.slot;
        let stored = self
            .arena
            .with_cell_mut(self.slot, |cell| match cell {
                ValueCell::Array(buf) => buf.set(index, slot),
                _ => false,
            })
            .unwrap_or(false);
        if !stored {
            self.arena.set_error(Error::new(
                ErrorKind::UnsupportedOperation,
                "set is not supported on this value",
            ));
        }
        stored
    }

    // ------------------------------------------------------------------
    // Table operations
    // ------------------------------------------------------------------

    /// Entry count for tables, zero for any other kind.
    pub fn table_len(&self) -> usize {
        self.arena
            .with_cell(self.slot, |cell| match cell {
                ValueCell::Table(buf) => buf.len(),
                _ => 0,
            })
            .unwrap_or(0)
    }

    pub fn table_get(&self, key: &str) -> Option<Value> {
        let hit = self.arena.with_cell(self.slot, |cell| match cell {
            ValueCell::Table(TableBuf::Owned(table)) => EntryHit::Owned(table.get(key)),
            ValueCell::Table(TableBuf::Foreign { backing, .. }) => {
                EntryHit::Foreign(backing.clone())
            }
            _ => EntryHit::Miss,
        })?;
        match hit {
            EntryHit::Owned(slot) => slot.map(|s| Value::from_slot(self.arena.clone(), s)),
            EntryHit::Foreign(backing) => backing.get(&self.arena, key),
            EntryHit::Miss => None,
        }
    }

    /// Inserts or updates an entry; the key is copied. Fails on
    /// foreign-backed tables and non-tables.
    pub fn table_set(&self, key: &str, item: &Value) -> bool {
        let slot = item.slot;
        let stored = self
            .arena
            .with_cell_mut(self.slot, |cell| match cell {
                ValueCell::Table(TableBuf::Owned(table)) => {
                    table.set(key, slot);
                    true
                }
                _ => false,
            })
            .unwrap_or(false);
        if !stored {
            self.arena.set_error(Error::new(
                ErrorKind::UnsupportedOperation,
                "set is not supported on this value",
            ));
        }
        stored
    }

    pub fn table_del(&self, key: &str) -> bool {
        let deleted = self.arena.with_cell_mut(self.slot, |cell| match cell {
            ValueCell::Table(TableBuf::Owned(table)) => Some(table.del(key)),
            _ => None,
        });
        match deleted {
            Some(Some(result)) => result,
            _ => {
                self.arena.set_error(Error::new(
                    ErrorKind::UnsupportedOperation,
                    "del is not supported on this value",
                ));
                false
            }
        }
    }

    /// Snapshot of the table's entries, in unspecified order. Foreign-backed
    /// tables cannot be enumerated and yield an empty snapshot.
    pub fn table_entries(&self) -> Vec<(Rc<str>, Value)> {
        self.arena
            .with_cell(self.slot, |cell| match cell {
                ValueCell::Table(TableBuf::Owned(table)) => table.entries(),
                _ => Vec::new(),
            })
            .unwrap_or_default()
            .into_iter()
            .map(|(key, slot)| (key, Value::from_slot(self.arena.clone(), slot)))
            .collect()
    }

    /// Copies every entry of `other` into this table.
    pub fn table_merge(&self, other: &Value) -> bool {
        for (key, value) in other.table_entries() {
            if !self.table_set(&key, &value) {
                return false;
            }
        }
        true
    }

    /// Field-style lookup: a table key, or an integer index into an array
    /// where negative indices count from the end. Unparseable keys and
    /// out-of-range indices read as absent.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self.kind() {
            Kind::Table => self.table_get(key),
            Kind::Array => {
                let index: i64 = key.parse().ok()?;
                let count = self.len() as i64;
                let index = if index < 0 { count + index } else { index };
                if index < 0 || index >= count {
                    return None;
                }
                self.get(index as usize)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("kind", &self.kind().name())
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn compare_doubles(a: f64, b: f64) -> CompareResult {
    match a.partial_cmp(&b) {
        Some(ordering) => ordering.into(),
        None => CompareResult::Incomparable,
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
