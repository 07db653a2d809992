//! Per-node match tracing.
//!
//! Enabling trace walks the tree and arms every node with a shared record
//! stack and its depth. Each subsequent `matches` call appends one record per
//! node evaluated, after the node's own result is known, so the flat stack is
//! in post-order. Printing sorts the stack back into tree order by depth and
//! indents each record by `2 * level` spaces.

use super::{Frame, Matcher, MatcherKind, Visitor};
use crate::registry;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub(crate) struct TraceRecord {
    level: usize,
    message: String,
}

/// Trace hookup for one node: the stack shared across the tree plus the
/// node's depth.
#[derive(Clone)]
pub(crate) struct TraceState {
    stack: Rc<RefCell<Vec<TraceRecord>>>,
    level: usize,
    colorful: bool,
}

impl TraceState {
    pub(crate) fn record(&self, node: &Matcher, value: Option<&Value>, matched: bool) {
        let result = if self.colorful {
            if matched {
                "\x1b[30;42mMatched\x1b[0m"
            } else {
                "\x1b[30;41mDismatch\x1b[0m"
            }
        } else if matched {
            "Matched"
        } else {
            "Dismatch"
        };
        let condition = node.condition().render();
        let record = value
            .map(Value::render)
            .unwrap_or_else(|| "Nothing".to_string());
        let message = match &node.kind {
            MatcherKind::Field { field, .. } => format!(
                "{}: {}, field: \"{}\", condition: {}, record: {}",
                node.name(),
                result,
                field,
                condition,
                record
            ),
            _ => format!(
                "{}: {}, condition: {}, record: {}",
                node.name(),
                result,
                condition,
                record
            ),
        };
        self.stack.borrow_mut().push(TraceRecord {
            level: self.level,
            message,
        });
    }
}

struct EnableVisitor {
    stack: Rc<RefCell<Vec<TraceRecord>>>,
    colorful: bool,
}

impl Visitor for EnableVisitor {
    type Acc = ();

    fn visit(&mut self, node: &Matcher, frame: &Frame, _acc: &()) -> Option<()> {
        *node.trace.borrow_mut() = Some(TraceState {
            stack: self.stack.clone(),
            level: frame.level,
            colorful: self.colorful,
        });
        Some(())
    }
}

struct DisableVisitor;

impl Visitor for DisableVisitor {
    type Acc = ();

    fn visit(&mut self, node: &Matcher, _frame: &Frame, _acc: &()) -> Option<()> {
        node.trace.borrow_mut().take();
        Some(())
    }
}

/// Recovers tree order from the post-order stack: the next record at the
/// current level is emitted, then the records accumulated before it (its
/// subtree, all at deeper levels) are sorted recursively and follow it.
fn sort_records(records: &[TraceRecord], level: usize) -> Vec<TraceRecord> {
    let mut sorted = Vec::new();
    let mut group: Vec<TraceRecord> = Vec::new();
    for record in records {
        if record.level == level {
            sorted.push(record.clone());
            sorted.extend(sort_records(&group, level + 1));
            group = Vec::new();
        } else {
            group.push(record.clone());
        }
    }
    sorted
}

impl Matcher {
    /// Arms every node with a fresh shared trace stack. Subsequent `matches`
    /// calls append per-node outcome records until [`disable_trace`].
    ///
    /// [`disable_trace`]: Matcher::disable_trace
    pub fn enable_trace(&self) {
        let mut visitor = EnableVisitor {
            stack: Rc::new(RefCell::new(Vec::new())),
            colorful: registry::registry().trace_colorful(),
        };
        self.traverse(&mut visitor, Frame::root(), &());
    }

    /// Detaches the trace stack from every node; `matches` returns to plain
    /// evaluation.
    pub fn disable_trace(&self) {
        self.traverse(&mut DisableVisitor, Frame::root(), &());
    }

    /// True while a trace stack is attached.
    pub fn trace_enabled(&self) -> bool {
        self.trace.borrow().is_some()
    }

    /// The recorded outcomes in tree order, indented two spaces per level.
    /// Empty unless trace is enabled.
    pub fn trace_lines(&self) -> Vec<String> {
        let Some(state) = self.trace.borrow().clone() else {
            return Vec::new();
        };
        let records = state.stack.borrow().clone();
        sort_records(&records, 0)
            .into_iter()
            .map(|record| format!("{}{}", "  ".repeat(record.level), record.message))
            .collect()
    }

    /// Prints the recorded outcomes to stdout.
    pub fn print_trace(&self) {
        for line in self.trace_lines() {
            println!("{line}");
        }
    }

    /// One-shot convenience: enable trace, match, print, disable.
    pub fn trace(&self, value: &Value) -> bool {
        self.enable_trace();
        let matched = self.matches(value);
        self.print_trace();
        self.disable_trace();
        matched
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::Arena;
    use crate::matcher::Matcher;
    use crate::registry;

    #[test]
    fn test_trace_records_every_evaluated_node() {
        registry::set_trace_colorful(false);
        let arena = Arena::new();
        let condition = arena.table_of(&[("age", arena.table_of(&[("$gte", arena.int(18))]))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();

        matcher.enable_trace();
        assert!(matcher.trace_enabled());
        assert!(matcher.matches(&arena.table_of(&[("age", arena.int(20))])));

        let lines = matcher.trace_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Field: Matched, field: \"age\""));
        assert!(lines[1].starts_with("  Gte: Matched,"));
        assert!(lines[1].contains("record: 20"));

        matcher.disable_trace();
        assert!(!matcher.trace_enabled());
        assert!(matcher.trace_lines().is_empty());
    }

    #[test]
    fn test_trace_absent_value_prints_nothing_marker() {
        registry::set_trace_colorful(false);
        let arena = Arena::new();
        let condition = arena.table_of(&[("age", arena.int(1))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();

        matcher.enable_trace();
        assert!(!matcher.matches(&arena.table_new()));
        let lines = matcher.trace_lines();
        // The field lookup finds nothing; the delegate sees an absent value.
        assert!(lines[1].contains("record: Nothing"));
        matcher.disable_trace();
    }

    #[test]
    fn test_disable_restores_plain_matching() {
        registry::set_trace_colorful(false);
        let arena = Arena::new();
        let condition = arena.table_of(&[("n", arena.int(1))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();
        let record = arena.table_of(&[("n", arena.int(1))]);

        let before = matcher.matches(&record);
        matcher.enable_trace();
        let during = matcher.matches(&record);
        matcher.disable_trace();
        let after = matcher.matches(&record);
        assert!(before && during && after);
    }

    #[test]
    fn test_one_shot_trace_returns_match_result() {
        registry::set_trace_colorful(false);
        let arena = Arena::new();
        let condition = arena.table_of(&[("n", arena.int(1))]);
        let matcher = Matcher::compile(&arena, &condition).unwrap();

        assert!(matcher.trace(&arena.table_of(&[("n", arena.int(1))])));
        assert!(!matcher.trace(&arena.table_of(&[("n", arena.int(2))])));
        // The one-shot form detaches its stack afterwards.
        assert!(!matcher.trace_enabled());
    }
}
