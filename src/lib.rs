//! # Mongory Core
//!
//! An embeddable query engine that evaluates MongoDB-style condition
//! documents against in-memory records: given a condition and a value, does
//! the value satisfy the condition?
//!
//! ## Architecture
//!
//! The crate is built from three subsystems:
//! - **Value model**: a tagged value type with uniform comparison and
//!   stringification, allocated into an [`Arena`] that is released (or
//!   reset) wholesale.
//! - **Matcher compiler**: a recursive translation of condition documents
//!   into a tree of typed matcher nodes, with operator dispatch through a
//!   process-wide [`registry`], priority-based sibling reordering, and a
//!   lazy specialization for array-valued inputs.
//! - **Matcher evaluator**: the polymorphic `matches` walk over that tree,
//!   plus a traversal substrate powering `explain` and per-node `trace`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mongory_core::{convert, Arena, Matcher};
//! use serde_json::json;
//!
//! let arena = Arena::new();
//! let condition = convert::json_to_value(&arena, &json!({"age": {"$gte": 18}}));
//! let matcher = Matcher::compile(&arena, &condition)?;
//!
//! let scratch = Arena::new();
//! let record = convert::json_to_value(&scratch, &json!({"age": 20}));
//! assert!(matcher.matches(&record));
//! scratch.reset(); // reuse between matches
//! ```
//!
//! Compiled matchers are re-entrant but not thread-safe; compile per thread
//! when sharing work across threads.

pub mod arena;
pub mod array;
pub mod convert;
pub mod error;
pub mod matcher;
pub mod regex_engine;
pub mod registry;
pub mod table;
pub mod value;

pub use arena::Arena;
pub use array::ShallowArray;
pub use error::{Error, ErrorKind, Result};
pub use matcher::Matcher;
pub use registry::{
    cleanup, init, register_operator, set_custom_matcher_build, set_custom_matcher_lookup,
    set_custom_matcher_match, set_regex_match, set_regex_stringify, set_trace_colorful,
    set_value_converter_deep, set_value_converter_recover, set_value_converter_shallow,
    CustomMatcherSpec, ExternContext,
};
pub use table::ShallowTable;
pub use value::{CompareResult, Kind, Value, ValueView};
