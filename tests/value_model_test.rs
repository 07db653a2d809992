//! Value model behavior through the public API: comparison, rendering,
//! container boundaries, and the JSON bridge.

use mongory_core::{convert, Arena, CompareResult, Kind, ShallowArray, ShallowTable, Value};
use serde_json::json;
use std::rc::Rc;

#[test]
fn test_compare_reflexive_for_comparable_kinds() {
    let arena = Arena::new();
    for json in [
        json!(null),
        json!(true),
        json!(-3),
        json!(2.25),
        json!("text"),
        json!([1, "two", null]),
    ] {
        let value = convert::json_to_value(&arena, &json);
        assert_eq!(
            value.compare(&value),
            CompareResult::Equal,
            "not reflexive for {json}"
        );
    }
}

#[test]
fn test_numeric_promotion_and_strings() {
    let arena = Arena::new();
    assert_eq!(arena.int(3).compare(&arena.double(3.0)), CompareResult::Equal);
    assert_eq!(arena.double(2.5).compare(&arena.int(3)), CompareResult::Less);
    assert_eq!(
        arena.string("b").compare(&arena.string("a")),
        CompareResult::Greater
    );
    assert_eq!(
        arena.string("a").compare(&arena.int(1)),
        CompareResult::Incomparable
    );
}

#[test]
fn test_shorter_array_sorts_first() {
    let arena = Arena::new();
    let two = convert::json_to_value(&arena, &json!([9, 9]));
    let three = convert::json_to_value(&arena, &json!([1, 1, 1]));
    assert_eq!(two.compare(&three), CompareResult::Less);
    assert_eq!(three.compare(&two), CompareResult::Greater);
}

#[test]
fn test_tables_are_incomparable() {
    let arena = Arena::new();
    let a = convert::json_to_value(&arena, &json!({"k": 1}));
    let b = convert::json_to_value(&arena, &json!({"k": 1}));
    assert_eq!(a.compare(&b), CompareResult::Incomparable);
}

#[test]
fn test_render_is_structurally_parseable_for_json_kinds() {
    let arena = Arena::new();
    for json in [
        json!(null),
        json!(true),
        json!(false),
        json!(123),
        json!(-5),
        json!("quote\"inside"),
        json!([1, [2, 3], "x"]),
    ] {
        let value = convert::json_to_value(&arena, &json);
        let rendered = value.render();
        let parsed: serde_json::Value = serde_json::from_str(&rendered)
            .unwrap_or_else(|e| panic!("render {rendered:?} did not parse: {e}"));
        if json.is_f64() {
            continue; // doubles round-trip structurally, not byte-exact
        }
        assert_eq!(parsed, json, "render changed {json} into {rendered}");
    }
}

#[test]
fn test_array_set_far_past_end() {
    let arena = Arena::new();
    let array = arena.array_new();
    assert!(array.set(9, &arena.int(1)));
    assert_eq!(array.len(), 10);
    for index in 0..9 {
        assert!(array.get(index).is_none(), "slot {index} should be empty");
    }
    assert!(array.get(9).is_some());
}

#[test]
fn test_negative_index_lookup() {
    let arena = Arena::new();
    let array = convert::json_to_value(&arena, &json!(["a", "b", "c"]));
    assert_eq!(
        array.lookup("-1").unwrap().compare(&arena.string("c")),
        CompareResult::Equal
    );
    assert!(array.lookup("-4").is_none());
    assert!(array.lookup("abc").is_none());
}

#[test]
fn test_table_survives_many_inserts() {
    let arena = Arena::new();
    let table = arena.table_new();
    // Push well past the rehash threshold and make sure nothing is lost.
    for i in 0..100 {
        table.table_set(&format!("key-{i}"), &arena.int(i));
    }
    assert_eq!(table.table_len(), 100);
    for i in 0..100 {
        let value = table.table_get(&format!("key-{i}")).unwrap();
        assert_eq!(value.compare(&arena.int(i)), CompareResult::Equal);
    }
}

struct HostRow {
    cells: Vec<i64>,
}

impl ShallowArray for HostRow {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn get(&self, arena: &Arena, index: usize) -> Option<Value> {
        self.cells.get(index).map(|cell| arena.int(*cell))
    }
}

struct HostDoc;

impl ShallowTable for HostDoc {
    fn len(&self) -> usize {
        1
    }

    fn get(&self, arena: &Arena, key: &str) -> Option<Value> {
        (key == "status").then(|| arena.string("active"))
    }
}

#[test]
fn test_shallow_wrappers_participate_in_matching() {
    let arena = Arena::new();
    let row = arena.shallow_array(Rc::new(HostRow {
        cells: vec![10, 20, 30],
    }));
    assert_eq!(row.kind(), Kind::Array);
    assert_eq!(row.len(), 3);

    let condition = convert::json_to_value(&arena, &json!({"numbers": {"$in": [20]}}));
    let matcher = mongory_core::Matcher::compile(&arena, &condition).unwrap();
    let record = arena.table_of(&[("numbers", row)]);
    assert!(matcher.matches(&record));

    let doc = arena.shallow_table(Rc::new(HostDoc));
    let condition = convert::json_to_value(&arena, &json!({"status": "active"}));
    let matcher = mongory_core::Matcher::compile(&arena, &condition).unwrap();
    assert!(matcher.matches(&doc));
}

#[test]
fn test_stale_values_never_match() {
    let arena = Arena::new();
    let condition = convert::json_to_value(&arena, &json!({"n": 1}));
    let matcher = mongory_core::Matcher::compile(&arena, &condition).unwrap();

    let scratch = Arena::new();
    let record = convert::json_to_value(&scratch, &json!({"n": 1}));
    assert!(matcher.matches(&record));

    scratch.reset();
    // The record handle is stale now; evaluation degrades to false rather
    // than reading reused storage.
    assert!(!matcher.matches(&record));
}

#[test]
fn test_json_round_trip_through_values() {
    let arena = Arena::new();
    let json = json!({
        "id": 7,
        "active": true,
        "score": 1.5,
        "tags": ["a", "b"],
        "nested": {"null_field": null}
    });
    let value = convert::json_to_value(&arena, &json);
    assert_eq!(convert::value_to_json(&value).unwrap(), json);
}
