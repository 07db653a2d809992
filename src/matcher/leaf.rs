//! Leaf matchers: comparisons, inclusion, existence, regex, custom hooks,
//! and the trivial always-true/always-false nodes.
//!
//! Constructors validate their condition shape and report failures into the
//! arena's error slot; evaluation helpers are total and degrade to `false`
//! (or `true` for the negated forms) on anything unrepresentable.

use super::{CompareOp, Matcher, MatcherKind};
use crate::arena::Arena;
use crate::error::{Error, ErrorKind};
use crate::registry::{self, ExternContext};
use crate::value::{CompareResult, Kind, Value, ValueView};

pub(crate) fn always_true(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Matcher {
    Matcher::with_kind(
        "Always True",
        condition.clone(),
        1.0,
        ctx.cloned(),
        MatcherKind::AlwaysTrue,
    )
}

pub(crate) fn always_false(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Matcher {
    Matcher::with_kind(
        "Always False",
        condition.clone(),
        1.0,
        ctx.cloned(),
        MatcherKind::AlwaysFalse,
    )
}

fn compare_operator(
    name: &str,
    op: CompareOp,
    priority: f64,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    Some(Matcher::with_kind(
        name,
        condition.clone(),
        priority,
        ctx.cloned(),
        MatcherKind::Compare(op),
    ))
}

pub(crate) fn eq_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Eq", CompareOp::Eq, 1.0, condition, ctx)
}

pub(crate) fn ne_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Ne", CompareOp::Ne, 1.0, condition, ctx)
}

pub(crate) fn gt_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Gt", CompareOp::Gt, 2.0, condition, ctx)
}

pub(crate) fn gte_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Gte", CompareOp::Gte, 2.0, condition, ctx)
}

pub(crate) fn lt_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Lt", CompareOp::Lt, 2.0, condition, ctx)
}

pub(crate) fn lte_operator(
    _arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    compare_operator("Lte", CompareOp::Lte, 2.0, condition, ctx)
}

/// Inclusion tests scale with the size of the condition array, so their
/// priority grows log-sublinearly with it.
fn inclusion_priority(count: usize) -> f64 {
    1.0 + log_base(count as f64 + 1.0, 1.5)
}

fn log_base(x: f64, base: f64) -> f64 {
    x.ln() / base.ln()
}

fn validate_array_condition(arena: &Arena, who: &str, condition: &Value) -> bool {
    if condition.kind() == Kind::Array {
        return true;
    }
    arena.set_error(Error::new(
        ErrorKind::InvalidArgument,
        format!("{who} condition must be a valid array"),
    ));
    false
}

pub(crate) fn in_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !validate_array_condition(arena, "$in", condition) {
        return None;
    }
    Some(Matcher::with_kind(
        "In",
        condition.clone(),
        inclusion_priority(condition.len()),
        ctx.cloned(),
        MatcherKind::Inclusion { negate: false },
    ))
}

pub(crate) fn nin_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !validate_array_condition(arena, "$nin", condition) {
        return None;
    }
    Some(Matcher::with_kind(
        "Nin",
        condition.clone(),
        inclusion_priority(condition.len()),
        ctx.cloned(),
        MatcherKind::Inclusion { negate: true },
    ))
}

fn validate_bool_condition(arena: &Arena, who: &str, condition: &Value) -> bool {
    if condition.kind() == Kind::Bool {
        return true;
    }
    arena.set_error(Error::new(
        ErrorKind::InvalidArgument,
        format!("{who} condition must be a boolean value"),
    ));
    false
}

pub(crate) fn exists_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !validate_bool_condition(arena, "$exists", condition) {
        return None;
    }
    Some(Matcher::with_kind(
        "Exists",
        condition.clone(),
        2.0,
        ctx.cloned(),
        MatcherKind::Exists,
    ))
}

pub(crate) fn present_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !validate_bool_condition(arena, "$present", condition) {
        return None;
    }
    Some(Matcher::with_kind(
        "Present",
        condition.clone(),
        2.0,
        ctx.cloned(),
        MatcherKind::Present,
    ))
}

pub(crate) fn regex_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !matches!(condition.kind(), Kind::Str | Kind::Regex) {
        arena.set_error(Error::new(
            ErrorKind::InvalidArgument,
            "$regex condition must be a string or a regex object",
        ));
        return None;
    }
    Some(Matcher::with_kind(
        "Regex",
        condition.clone(),
        20.0,
        ctx.cloned(),
        MatcherKind::Regex,
    ))
}

/// Builds a host-registered predicate through the custom-matcher adapter.
pub(crate) fn custom_new(
    _arena: &Arena,
    key: &str,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    let spec = registry::registry().custom_build(key, condition, ctx)?;
    Some(Matcher::with_kind(
        &spec.name,
        condition.clone(),
        20.0,
        ctx.cloned(),
        MatcherKind::Custom {
            external: spec.external,
        },
    ))
}

// ----------------------------------------------------------------------
// Evaluation helpers
// ----------------------------------------------------------------------

pub(crate) fn compare_eval(op: CompareOp, condition: &Value, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        // An absent value is only "not equal".
        return op == CompareOp::Ne;
    };
    let result = value.compare(condition);
    match op {
        CompareOp::Eq => result == CompareResult::Equal,
        CompareOp::Ne => result != CompareResult::Equal,
        CompareOp::Gt => result == CompareResult::Greater,
        CompareOp::Gte => matches!(result, CompareResult::Greater | CompareResult::Equal),
        CompareOp::Lt => result == CompareResult::Less,
        CompareOp::Lte => matches!(result, CompareResult::Less | CompareResult::Equal),
    }
}

/// `$in` semantics: membership for scalars, intersection for array inputs.
pub(crate) fn inclusion_eval(condition: &Value, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.kind() != Kind::Array {
        return array_includes(condition, value);
    }
    let count = value.len();
    (0..count).any(|index| {
        value
            .get(index)
            .is_some_and(|item| array_includes(condition, &item))
    })
}

fn array_includes(array: &Value, needle: &Value) -> bool {
    let count = array.len();
    (0..count).any(|index| {
        array
            .get(index)
            .is_some_and(|item| item.compare(needle) == CompareResult::Equal)
    })
}

pub(crate) fn exists_eval(condition: &Value, value: Option<&Value>) -> bool {
    let ValueView::Bool(expects) = condition.view() else {
        return false;
    };
    expects == value.is_some()
}

/// `$present` semantics: absent, explicit null, empty collections, and empty
/// strings are not present; a boolean's presence is its own value.
pub(crate) fn present_eval(condition: &Value, value: Option<&Value>) -> bool {
    let ValueView::Bool(expects) = condition.view() else {
        return false;
    };
    let Some(value) = value else {
        return !expects;
    };
    let present = match value.view() {
        ValueView::Null => false,
        ValueView::Bool(own) => return own == expects,
        ValueView::Str(s) => !s.is_empty(),
        ValueView::Array => value.len() > 0,
        ValueView::Table => value.table_len() > 0,
        _ => true,
    };
    present == expects
}

pub(crate) fn regex_eval(condition: &Value, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.kind() != Kind::Str {
        return false;
    }
    registry::registry().regex_match(condition.arena(), condition, value)
}
