//! Field, `$not`, and `$size` nodes, the literal delegate they share, and
//! the lazy array-input specialization.
//!
//! A literal condition gets a scalar-path delegate chosen by its shape:
//! tables recurse into the condition compiler, regexes become regex leaves,
//! an explicit null becomes "missing or null", and everything else becomes
//! equality. When such a node is asked to match an array-valued input it
//! switches to an array-record matcher built on first use, which encodes the
//! implicit `$elemMatch` semantics of field matching.

use super::{compile, leaf, LiteralNode, Matcher, MatcherKind};
use crate::arena::Arena;
use crate::registry::{self, ExternContext};
use crate::value::{Kind, Value, ValueView};

/// Chooses the scalar-path delegate for a literal condition.
fn literal_delegate(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    match condition.kind() {
        Kind::Table => compile::table_condition(arena, condition, ctx),
        Kind::Regex => leaf::regex_operator(arena, condition, ctx),
        Kind::Null => null_literal(arena, ctx),
        _ => leaf::eq_operator(arena, condition, ctx),
    }
}

/// A `null` condition means "missing or explicitly null":
/// `$or: [{$eq: null}, {$exists: false}]`.
fn null_literal(arena: &Arena, ctx: Option<&ExternContext>) -> Option<Matcher> {
    let or_condition = arena.array_of(&[
        arena.table_of(&[("$eq", arena.null())]),
        arena.table_of(&[("$exists", arena.boolean(false))]),
    ]);
    compile::or_operator(arena, &or_condition, ctx)
}

pub(crate) fn field_new(
    arena: &Arena,
    field: &str,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    let delegate = literal_delegate(arena, condition, ctx)?;
    let priority = 1.0 + delegate.priority();
    Some(Matcher::with_kind(
        "Field",
        condition.clone(),
        priority,
        ctx.cloned(),
        MatcherKind::Field {
            field: field.into(),
            node: LiteralNode::new(delegate),
        },
    ))
}

pub(crate) fn not_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    let delegate = literal_delegate(arena, condition, ctx)?;
    let priority = 1.0 + delegate.priority();
    Some(Matcher::with_kind(
        "Not",
        condition.clone(),
        priority,
        ctx.cloned(),
        MatcherKind::Not {
            node: LiteralNode::new(delegate),
        },
    ))
}

pub(crate) fn size_operator(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    let delegate = literal_delegate(arena, condition, ctx)?;
    let priority = 1.0 + delegate.priority();
    Some(Matcher::with_kind(
        "Size",
        condition.clone(),
        priority,
        ctx.cloned(),
        MatcherKind::Size {
            node: LiteralNode::new(delegate),
        },
    ))
}

/// Scalar inputs go to the delegate; array inputs go to the array record,
/// built on first use into the compilation arena. A failed build leaves the
/// slot empty, matches nothing, and is retried on the next array input.
pub(crate) fn literal_eval(
    node: &LiteralNode,
    condition: &Value,
    ctx: Option<&ExternContext>,
    value: Option<&Value>,
) -> bool {
    if let Some(value) = value {
        if value.kind() == Kind::Array {
            if node.array_record.get().is_none() {
                if let Some(built) = array_record_new(condition.arena(), condition, ctx) {
                    let _ = node.array_record.set(Box::new(built));
                }
            }
            return match node.array_record.get() {
                Some(record) => record.matches_opt(Some(value)),
                None => false,
            };
        }
    }
    node.delegate.matches_opt(value)
}

/// Field extraction followed by literal matching.
///
/// Tables are looked up by key; arrays parse the key as an integer index,
/// negative counting from the end, and reject unparseable keys or
/// out-of-range indices outright. A pointer hit is substituted through the
/// value converter's shallow conversion when one is registered.
pub(crate) fn field_eval(
    field: &str,
    node: &LiteralNode,
    condition: &Value,
    ctx: Option<&ExternContext>,
    value: Option<&Value>,
) -> bool {
    let Some(value) = value else {
        return false;
    };
    let extracted = match value.kind() {
        Kind::Table => value.table_get(field),
        Kind::Array => {
            let Ok(index) = field.parse::<i64>() else {
                return false;
            };
            let count = value.len() as i64;
            let index = if index < 0 { count + index } else { index };
            if index < 0 || index >= count {
                return false;
            }
            value.get(index as usize)
        }
        _ => return false,
    };
    let extracted = shallow_convert_pointer(extracted);
    literal_eval(node, condition, ctx, extracted.as_ref())
}

fn shallow_convert_pointer(extracted: Option<Value>) -> Option<Value> {
    let Some(value) = extracted else {
        return None;
    };
    if let ValueView::Pointer(payload) = value.view() {
        if let Some(converted) = registry::registry().shallow_convert(value.arena(), &payload) {
            return converted;
        }
    }
    Some(value)
}

/// `$size` wraps the array length as an integer in the input's arena and
/// evaluates the size condition against it.
pub(crate) fn size_eval(
    node: &LiteralNode,
    condition: &Value,
    ctx: Option<&ExternContext>,
    value: Option<&Value>,
) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.kind() != Kind::Array {
        return false;
    }
    let length = value.arena().int(value.len() as i64);
    literal_eval(node, condition, ctx, Some(&length))
}

/// Builds the array-input specialization for a literal condition.
///
/// - Table conditions are split into direct array operators and element
///   conditions; the element bucket becomes an `$elemMatch`.
/// - Array conditions become whole-array equality or element equality.
/// - Regexes and plain literals become element-wise tests.
pub(crate) fn array_record_new(
    arena: &Arena,
    condition: &Value,
    ctx: Option<&ExternContext>,
) -> Option<Matcher> {
    match condition.kind() {
        Kind::Table => {
            let parsed = parse_array_table(arena, condition);
            compile::table_condition(arena, &parsed, ctx)
        }
        Kind::Array => {
            let whole = arena.table_of(&[("$eq", condition.clone())]);
            let element = arena.table_of(&[(
                "$elemMatch",
                arena.table_of(&[("$eq", condition.clone())]),
            )]);
            compile::or_operator(arena, &arena.array_of(&[whole, element]), ctx)
        }
        Kind::Regex => compile::elem_match_operator(
            arena,
            &arena.table_of(&[("$regex", condition.clone())]),
            ctx,
        ),
        _ => compile::elem_match_operator(
            arena,
            &arena.table_of(&[("$eq", condition.clone())]),
            ctx,
        ),
    }
}

/// Splits a table condition into the direct bucket (operators and numeric
/// indices) and the element bucket (plain fields plus the contents of any
/// explicit `$elemMatch`), reattaching the element bucket as `$elemMatch`.
fn parse_array_table(arena: &Arena, condition: &Value) -> Value {
    let direct = arena.table_new();
    let element = arena.table_new();
    for (key, sub) in condition.table_entries() {
        if key.as_ref() == "$elemMatch" && sub.kind() == Kind::Table {
            element.table_merge(&sub);
        } else if key.starts_with('$') || key.parse::<i64>().is_ok() {
            direct.table_set(&key, &sub);
        } else {
            element.table_set(&key, &sub);
        }
    }
    if element.table_len() > 0 {
        direct.table_set("$elemMatch", &element);
    }
    direct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CompareResult;

    fn compile(arena: &Arena, condition: &Value) -> Matcher {
        Matcher::compile(arena, condition).unwrap()
    }

    #[test]
    fn test_field_extraction_from_table() {
        let arena = Arena::new();
        let condition = arena.table_of(&[("name", arena.string("ana"))]);
        let matcher = compile(&arena, &condition);

        assert!(matcher.matches(&arena.table_of(&[("name", arena.string("ana"))])));
        assert!(!matcher.matches(&arena.table_of(&[("name", arena.string("bob"))])));
        assert!(!matcher.matches(&arena.table_new()));
        assert!(!matcher.matches(&arena.int(1)));
    }

    #[test]
    fn test_field_extraction_by_array_index() {
        let arena = Arena::new();
        let record = arena.array_of(&[arena.string("a"), arena.string("b"), arena.string("c")]);

        let first = compile(&arena, &arena.table_of(&[("0", arena.string("a"))]));
        assert!(first.matches(&record));

        let last = compile(&arena, &arena.table_of(&[("-1", arena.string("c"))]));
        assert!(last.matches(&record));

        let out_of_range = compile(&arena, &arena.table_of(&[("5", arena.string("a"))]));
        assert!(!out_of_range.matches(&record));

        let negative_oob = compile(&arena, &arena.table_of(&[("-4", arena.string("a"))]));
        assert!(!negative_oob.matches(&record));
    }

    #[test]
    fn test_null_condition_matches_missing_or_null() {
        let arena = Arena::new();
        let matcher = compile(&arena, &arena.table_of(&[("name", arena.null())]));

        assert!(matcher.matches(&arena.table_of(&[("name", arena.null())])));
        assert!(matcher.matches(&arena.table_new()));
        assert!(!matcher.matches(&arena.table_of(&[("name", arena.string("x"))])));
    }

    #[test]
    fn test_array_record_built_lazily() {
        let arena = Arena::new();
        let matcher = compile(&arena, &arena.table_of(&[("tags", arena.string("red"))]));
        let before = matcher.node_count();

        let record = arena.table_of(&[(
            "tags",
            arena.array_of(&[arena.string("red"), arena.string("blue")]),
        )]);
        assert!(matcher.matches(&record));

        // The array specialization now exists and traversal sees it.
        assert!(matcher.node_count() > before);
    }

    #[test]
    fn test_parse_array_table_buckets() {
        let arena = Arena::new();
        let condition = arena.table_of(&[
            ("$size", arena.int(2)),
            ("0", arena.string("head")),
            ("color", arena.string("red")),
            ("$elemMatch", arena.table_of(&[("price", arena.int(5))])),
        ]);
        let parsed = parse_array_table(&arena, &condition);

        assert!(parsed.table_get("$size").is_some());
        assert!(parsed.table_get("0").is_some());
        assert!(parsed.table_get("color").is_none());

        let elem = parsed.table_get("$elemMatch").unwrap();
        assert_eq!(elem.table_len(), 2);
        assert!(elem.table_get("color").is_some());
        assert_eq!(
            elem.table_get("price")
                .unwrap()
                .compare(&arena.int(5)),
            CompareResult::Equal
        );
    }

    #[test]
    fn test_size_against_scratch_arena() {
        let arena = Arena::new();
        let matcher = compile(
            &arena,
            &arena.table_of(&[("scores", arena.table_of(&[("$size", arena.int(3))]))]),
        );

        let scratch = Arena::new();
        let record = scratch.table_of(&[(
            "scores",
            scratch.array_of(&[scratch.int(1), scratch.int(2), scratch.int(3)]),
        )]);
        assert!(matcher.matches(&record));

        scratch.reset();
        let record = scratch.table_of(&[(
            "scores",
            scratch.array_of(&[scratch.int(1), scratch.int(2)]),
        )]);
        assert!(!matcher.matches(&record));
    }
}
