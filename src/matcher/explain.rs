//! Rendering of a compiled tree as indented text.
//!
//! One line per node, prefixed with tree-drawing connectors. Field nodes
//! print their field name and the condition they descend into; every other
//! node prints its name and condition.

use super::{Frame, Matcher, MatcherKind, Visitor};

struct ExplainVisitor {
    out: String,
}

impl Visitor for ExplainVisitor {
    type Acc = String;

    fn visit(&mut self, node: &Matcher, frame: &Frame, acc: &String) -> Option<String> {
        let title = match &node.kind {
            MatcherKind::Field { field, .. } => format!(
                "Field: \"{}\", to match: {}",
                field,
                node.condition().render()
            ),
            _ => format!("{}: {}", node.name(), node.condition().render()),
        };
        self.out.push_str(acc);
        self.out.push_str(tail_connector(frame));
        self.out.push_str(&title);
        self.out.push('\n');
        Some(format!("{}{}", acc, indent_connector(frame)))
    }
}

fn tail_connector(frame: &Frame) -> &'static str {
    if frame.total == 0 {
        ""
    } else if frame.total - frame.index == 1 {
        "└─ "
    } else {
        "├─ "
    }
}

fn indent_connector(frame: &Frame) -> &'static str {
    if frame.total == 0 {
        ""
    } else if frame.total - frame.index == 1 {
        "   "
    } else {
        "│  "
    }
}

impl Matcher {
    /// Renders the compiled predicate tree as indented text.
    pub fn explain_to_string(&self) -> String {
        let mut visitor = ExplainVisitor { out: String::new() };
        self.traverse(&mut visitor, Frame::root(), &String::new());
        visitor.out
    }

    /// Prints the compiled predicate tree to stdout.
    pub fn explain(&self) {
        print!("{}", self.explain_to_string());
    }
}
