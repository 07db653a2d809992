//! The matcher compiler and evaluator.
//!
//! A condition document compiles into a tree of typed matcher nodes; the tree
//! answers `matches(value)` for any number of records. The module separates
//! compilation from evaluation:
//! - **Compilation**: [`compile`] walks the condition structurally,
//!   dispatching on key shape (operator vs field), condition shape, and value
//!   shape, and reorders siblings so cheap predicates run first.
//! - **Evaluation**: a pure walk over the tree; absent values, incompatible
//!   types, and unconfigured adapters all degrade to `false`.
//!
//! Explain and trace share the same structural traversal and are available on
//! every compiled tree.
//!
//! # Example
//! ```rust,ignore
//! use mongory_core::{Arena, Matcher};
//!
//! let arena = Arena::new();
//! let condition = arena.table_of(&[("age", arena.table_of(&[("$gte", arena.int(18))]))]);
//! let matcher = Matcher::compile(&arena, &condition)?;
//!
//! let record = arena.table_of(&[("age", arena.int(20))]);
//! assert!(matcher.matches(&record));
//! ```

pub(crate) mod compile;
pub(crate) mod leaf;
pub(crate) mod literal;
mod explain;
mod trace;
mod traverse;

use crate::arena::Arena;
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{self, ExternContext};
use crate::value::{Kind, Value};
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

pub(crate) use trace::TraceState;
pub(crate) use traverse::{Frame, Visitor};

/// Comparison operator selector for the compare leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Semantics selector for composite nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompositeOp {
    And,
    Or,
    ElemMatch,
    Every,
}

/// The scalar-path delegate of a field-like node plus its lazily built
/// array-input specialization.
///
/// The array record is constructed the first time the node sees an
/// array-valued input, into the compilation arena, and then reused. A build
/// that fails leaves the slot empty and is retried on the next array input.
pub(crate) struct LiteralNode {
    pub(crate) delegate: Box<Matcher>,
    pub(crate) array_record: OnceCell<Box<Matcher>>,
}

impl LiteralNode {
    pub(crate) fn new(delegate: Matcher) -> Self {
        Self {
            delegate: Box::new(delegate),
            array_record: OnceCell::new(),
        }
    }
}

pub(crate) enum MatcherKind {
    AlwaysTrue,
    AlwaysFalse,
    Compare(CompareOp),
    Inclusion { negate: bool },
    Exists,
    Present,
    Regex,
    Custom { external: ExternContext },
    Composite { op: CompositeOp, children: Vec<Matcher> },
    Field { field: Rc<str>, node: LiteralNode },
    Not { node: LiteralNode },
    Size { node: LiteralNode },
}

/// A compiled, evaluable condition.
///
/// A matcher is immutable after compilation except for the lazy array-record
/// population and trace enable/disable; treat it as exclusively owned by one
/// thread while in use.
pub struct Matcher {
    pub(crate) name: Rc<str>,
    pub(crate) condition: Value,
    pub(crate) priority: f64,
    pub(crate) extern_ctx: Option<ExternContext>,
    pub(crate) trace: RefCell<Option<TraceState>>,
    pub(crate) kind: MatcherKind,
}

impl Matcher {
    pub(crate) fn with_kind(
        name: &str,
        condition: Value,
        priority: f64,
        extern_ctx: Option<ExternContext>,
        kind: MatcherKind,
    ) -> Self {
        Self {
            name: Rc::from(name),
            condition,
            priority,
            extern_ctx,
            trace: RefCell::new(None),
            kind,
        }
    }

    /// Compiles a table condition into a matcher tree.
    ///
    /// On failure the error is also left in the arena's error slot.
    pub fn compile(arena: &Arena, condition: &Value) -> Result<Matcher> {
        Self::compile_with(arena, condition, None)
    }

    /// Compiles with an opaque caller context, handed through to custom
    /// matchers built during compilation.
    pub fn compile_with(
        arena: &Arena,
        condition: &Value,
        extern_ctx: Option<ExternContext>,
    ) -> Result<Matcher> {
        registry::init();
        let matcher = compile::table_condition(arena, condition, extern_ctx.as_ref());
        if let Some(error) = arena.last_error() {
            return Err(error);
        }
        matcher.ok_or_else(|| Error::new(ErrorKind::Unknown, "matcher compilation failed"))
    }

    /// Short identifier used in explain and trace output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The condition this node was compiled from.
    pub fn condition(&self) -> &Value {
        &self.condition
    }

    /// Sibling ordering weight; cheaper predicates sort first.
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Evaluates the matcher against a value.
    pub fn matches(&self, value: &Value) -> bool {
        self.matches_opt(Some(value))
    }

    /// Evaluation entry that also understands absent values, which arise from
    /// field lookups that find nothing.
    pub(crate) fn matches_opt(&self, value: Option<&Value>) -> bool {
        let matched = self.eval(value);
        let state = self.trace.borrow().clone();
        if let Some(state) = state {
            state.record(self, value, matched);
        }
        matched
    }

    fn eval(&self, value: Option<&Value>) -> bool {
        match &self.kind {
            MatcherKind::AlwaysTrue => true,
            MatcherKind::AlwaysFalse => false,
            MatcherKind::Compare(op) => leaf::compare_eval(*op, &self.condition, value),
            MatcherKind::Inclusion { negate } => {
                leaf::inclusion_eval(&self.condition, value) != *negate
            }
            MatcherKind::Exists => leaf::exists_eval(&self.condition, value),
            MatcherKind::Present => leaf::present_eval(&self.condition, value),
            MatcherKind::Regex => leaf::regex_eval(&self.condition, value),
            MatcherKind::Custom { external } => registry::registry().custom_match(external, value),
            MatcherKind::Composite { op, children } => match op {
                CompositeOp::And => children.iter().all(|child| child.matches_opt(value)),
                CompositeOp::Or => children.iter().any(|child| child.matches_opt(value)),
                CompositeOp::ElemMatch => elem_wise_eval(children, value, true),
                CompositeOp::Every => elem_wise_eval(children, value, false),
            },
            MatcherKind::Field { field, node } => literal::field_eval(
                field,
                node,
                &self.condition,
                self.extern_ctx.as_ref(),
                value,
            ),
            MatcherKind::Not { node } => {
                !literal::literal_eval(node, &self.condition, self.extern_ctx.as_ref(), value)
            }
            MatcherKind::Size { node } => {
                literal::size_eval(node, &self.condition, self.extern_ctx.as_ref(), value)
            }
        }
    }
}

/// Element-wise composite evaluation. `any` selects between the
/// at-least-one semantics of `$elemMatch` and the all-elements semantics of
/// `$every`; an empty or non-array input matches neither.
fn elem_wise_eval(children: &[Matcher], value: Option<&Value>, any: bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.kind() != Kind::Array {
        return false;
    }
    let count = value.len();
    if count == 0 {
        return false;
    }
    let element_matches = |index: usize| {
        let element = value.get(index);
        children
            .iter()
            .all(|child| child.matches_opt(element.as_ref()))
    };
    if any {
        (0..count).any(element_matches)
    } else {
        (0..count).all(element_matches)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}
