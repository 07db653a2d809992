//! The condition compiler: table walks, `$and`/`$or`/`$elemMatch`/`$every`,
//! and priority-based sibling ordering.
//!
//! A table condition compiles each key into a sub-matcher: `$`-keys dispatch
//! through the operator registry (falling through to the custom-matcher
//! adapter), anything else becomes a field node. Multi-child groups are
//! wrapped in a composite whose children are sorted ascending by priority so
//! cheap predicates short-circuit expensive ones.

use super::{leaf, literal, CompositeOp, Matcher, MatcherKind};
use crate::arena::Arena;
use crate::error::{Error, ErrorKind};
use crate::registry::{self, ExternContext};
use crate::value::Value;

/// Compiles a table condition. Empty tables match everything; a single entry
/// compiles to its sub-matcher directly.
pub(crate) fn table_condition(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !arena.expect_table("condition", condition) {
        return None;
    }
    let entries = condition.table_entries();
    if entries.is_empty() {
        return Some(leaf::always_true(arena, condition, ctx));
    }
    let mut children = Vec::with_capacity(entries.len());
    for (key, sub) in &entries {
        children.push(build_sub_matcher(arena, key, sub, ctx)?);
    }
    if children.len() == 1 {
        return children.pop();
    }
    Some(seal_composite(
        "Condition",
        CompositeOp::And,
        condition,
        ctx,
        children,
        2.0,
    ))
}

/// Builds the sub-matcher for one condition entry.
fn build_sub_matcher(
    arena: &Arena,
    key: &str,
    sub: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if key.starts_with('$') {
        if let Some(builder) = registry::registry().operator(key) {
            return (*builder)(arena, sub, ctx);
        }
        if registry::registry().custom_lookup(key) {
            return leaf::custom_new(arena, key, sub, ctx);
        }
    }
    literal::field_new(arena, key, sub, ctx)
}

/// Builds matchers for every entry of `table` into `out`.
fn collect_entry_matchers(
    arena: &Arena,
    table: &Value,
    ctx: Option<&ExternContext>,
    out: &mut Vec<Matcher>,
) -> bool {
    for (key, sub) in table.table_entries() {
        match build_sub_matcher(arena, &key, &sub, ctx) {
            Some(matcher) => out.push(matcher),
            None => return false,
        }
    }
    true
}

/// `$and`: an array of tables whose entries all flatten into one And group.
/// `$and: []` matches everything.
pub(crate) fn and_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !arena.expect_array("$and", condition) {
        return None;
    }
    if condition.len() == 0 {
        return Some(leaf::always_true(arena, condition, ctx));
    }
    let mut children = Vec::new();
    for index in 0..condition.len() {
        let branch = fetch_branch(arena, "$and", condition, index)?;
        if !arena.expect_table("$and", &branch) {
            return None;
        }
        if !collect_entry_matchers(arena, &branch, ctx, &mut children) {
            return None;
        }
    }
    match children.len() {
        0 => Some(leaf::always_true(arena, condition, ctx)),
        1 => children.pop(),
        _ => Some(seal_composite(
            "And",
            CompositeOp::And,
            condition,
            ctx,
            children,
            2.0,
        )),
    }
}

/// `$or`: each table in the array compiles to its own branch. `$or: []`
/// matches nothing.
pub(crate) fn or_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !arena.expect_array("$or", condition) {
        return None;
    }
    if condition.len() == 0 {
        return Some(leaf::always_false(arena, condition, ctx));
    }
    let mut children = Vec::new();
    for index in 0..condition.len() {
        let branch = fetch_branch(arena, "$or", condition, index)?;
        children.push(table_condition(arena, &branch, ctx)?);
    }
    if children.len() == 1 {
        return children.pop();
    }
    Some(seal_composite(
        "Or",
        CompositeOp::Or,
        condition,
        ctx,
        children,
        2.0,
    ))
}

/// `$elemMatch`: the table's entries compile as one And applied per element.
/// An empty table can never pick an element, so it compiles to always-false.
pub(crate) fn elem_match_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !arena.expect_table("$elemMatch", condition) {
        return None;
    }
    let mut children = Vec::new();
    if !collect_entry_matchers(arena, condition, ctx, &mut children) {
        return None;
    }
    if children.is_empty() {
        return Some(leaf::always_false(arena, condition, ctx));
    }
    Some(seal_composite(
        "ElemMatch",
        CompositeOp::ElemMatch,
        condition,
        ctx,
        children,
        3.0,
    ))
}

/// `$every`: like `$elemMatch` but all elements must satisfy the And; an
/// empty condition table constrains nothing.
pub(crate) fn every_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    if !arena.expect_table("$every", condition) {
        return None;
    }
    let mut children = Vec::new();
    if !collect_entry_matchers(arena, condition, ctx, &mut children) {
        return None;
    }
    if children.is_empty() {
        return Some(leaf::always_true(arena, condition, ctx));
    }
    Some(seal_composite(
        "Every",
        CompositeOp::Every,
        condition,
        ctx,
        children,
        3.0,
    ))
}

fn fetch_branch(arena: &Arena, who: &str, condition: &Value, index: usize) -> Option<Value> {
    let branch = condition.get(index);
    if branch.is_none() {
        arena.set_error(Error::new(
            ErrorKind::InvalidType,
            format!("{who} needs Table, got Null"),
        ));
    }
    branch
}

/// Sorts the children and wraps them in a composite whose priority is the
/// base plus the children's sum.
fn seal_composite(
    name: &str,
    op: CompositeOp,
    condition: &Value,
    ctx: Option<&ExternContext>,
    mut children: Vec<Matcher>,
    base_priority: f64,
) -> Matcher {
    sort_children(&mut children);
    let priority = base_priority + children.iter().map(Matcher::priority).sum::<f64>();
    Matcher::with_kind(
        name,
        condition.clone(),
        priority,
        ctx.cloned(),
        MatcherKind::Composite { op, children },
    )
}

/// Stable ascending sort keyed by `floor(priority * 10000)`.
pub(crate) fn sort_children(children: &mut [Matcher]) {
    children.sort_by_key(|matcher| (matcher.priority() * 10000.0).floor() as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children_priorities(matcher: &Matcher) -> Vec<f64> {
        match &matcher.kind {
            MatcherKind::Composite { children, .. } => {
                children.iter().map(Matcher::priority).collect()
            }
            _ => panic!("expected a composite node"),
        }
    }

    #[test]
    fn test_empty_condition_is_always_true() {
        let arena = Arena::new();
        let matcher = Matcher::compile(&arena, &arena.table_new()).unwrap();
        assert_eq!(matcher.name(), "Always True");
        assert!(matcher.matches(&arena.table_new()));
        assert!(matcher.matches(&arena.int(1)));
    }

    #[test]
    fn test_single_entry_compiles_to_its_sub_matcher() {
        let arena = Arena::new();
        let condition = arena.table_of(&[("age", arena.int(3))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();
        assert_eq!(matcher.name(), "Field");
    }

    #[test]
    fn test_non_table_condition_sets_invalid_type() {
        let arena = Arena::new();
        let error = Matcher::compile(&arena, &arena.int(1)).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidType);
        assert_eq!(arena.last_error().unwrap(), error);
    }

    #[test]
    fn test_composite_children_sorted_by_priority() {
        let arena = Arena::new();
        // $regex (20) is far more expensive than $eq (1) and $gt (2); the
        // compiled And must run the cheap ones first.
        let condition = arena.table_of(&[
            ("name", arena.table_of(&[("$regex", arena.string("^a"))])),
            ("age", arena.table_of(&[("$gt", arena.int(3))])),
            ("id", arena.int(7)),
        ]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();
        assert_eq!(matcher.name(), "Condition");

        let priorities = children_priorities(&matcher);
        assert_eq!(priorities.len(), 3);
        for pair in priorities.windows(2) {
            assert!(pair[0] <= pair[1], "children out of order: {priorities:?}");
        }
    }

    #[test]
    fn test_composite_priority_accumulates_children() {
        let arena = Arena::new();
        let condition = arena.table_of(&[
            ("a", arena.int(1)),
            ("b", arena.int(2)),
        ]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();
        let expected: f64 = 2.0 + children_priorities(&matcher).iter().sum::<f64>();
        assert!((matcher.priority() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_and_normalizations() {
        let arena = Arena::new();
        let empty = arena.table_of(&[("$and", arena.array_new())]);
        let matcher = Matcher::compile(&arena, &empty).unwrap();
        assert_eq!(matcher.name(), "Always True");

        // $and entries flatten into one group.
        let flat = arena.table_of(&[(
            "$and",
            arena.array_of(&[
                arena.table_of(&[("a", arena.int(1))]),
                arena.table_of(&[("b", arena.int(2)), ("c", arena.int(3))]),
            ]),
        )]);
        let matcher = Matcher::compile(&arena, &flat).unwrap();
        assert_eq!(matcher.name(), "And");
        assert_eq!(children_priorities(&matcher).len(), 3);
    }

    #[test]
    fn test_or_normalizations() {
        let arena = Arena::new();
        let empty = arena.table_of(&[("$or", arena.array_new())]);
        let matcher = Matcher::compile(&arena, &empty).unwrap();
        assert_eq!(matcher.name(), "Always False");
        assert!(!matcher.matches(&arena.table_new()));

        let single = arena.table_of(&[(
            "$or",
            arena.array_of(&[arena.table_of(&[("a", arena.int(1))])]),
        )]);
        let matcher = Matcher::compile(&arena, &single).unwrap();
        // A one-branch $or collapses to the branch itself.
        assert_eq!(matcher.name(), "Field");
    }

    #[test]
    fn test_and_with_non_table_entry_fails() {
        let arena = Arena::new();
        let bad = arena.table_of(&[("$and", arena.array_of(&[arena.int(1)]))]);
        let error = Matcher::compile(&arena, &bad).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidType);
    }

    #[test]
    fn test_unknown_operator_falls_through_to_field() {
        let arena = Arena::new();
        // "$doesNotExist" is not registered and no custom adapter approves
        // it, so it compiles as a field name and simply never matches a
        // table without that key.
        let condition = arena.table_of(&[("$doesNotExist", arena.int(1))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();
        assert_eq!(matcher.name(), "Field");
        assert!(!matcher.matches(&arena.table_of(&[("x", arena.int(1))])));
        assert!(matcher.matches(&arena.table_of(&[("$doesNotExist", arena.int(1))])));
    }

    #[test]
    fn test_sort_is_stable_for_equal_priorities() {
        let arena = Arena::new();
        let mut children = vec![
            leaf::eq_operator(&arena, &arena.int(1), None).unwrap(),
            leaf::eq_operator(&arena, &arena.int(2), None).unwrap(),
            leaf::eq_operator(&arena, &arena.int(3), None).unwrap(),
        ];
        sort_children(&mut children);
        let order: Vec<String> = children
            .iter()
            .map(|child| child.condition().render())
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }
}
