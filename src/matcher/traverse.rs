//! Structural traversal shared by explain and trace.
//!
//! Every node is visited exactly once, parents before children. The visitor
//! receives the node, a [`Frame`] describing its position among its siblings,
//! and the accumulator its parent produced; it returns the accumulator for
//! the node's children, or `None` to stop the walk.

use super::{Matcher, MatcherKind};

/// Position of a node within its parent: nesting depth, sibling index, and
/// sibling count. The root frame has `total == 0`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub(crate) level: usize,
    pub(crate) index: usize,
    pub(crate) total: usize,
}

impl Frame {
    pub(crate) fn root() -> Self {
        Self {
            level: 0,
            index: 0,
            total: 0,
        }
    }

    fn child_of(parent: &Frame, index: usize, total: usize) -> Self {
        Self {
            level: parent.level + 1,
            index,
            total,
        }
    }
}

pub(crate) trait Visitor {
    type Acc: Clone;

    /// Visits one node. Returns the accumulator handed to the node's
    /// children, or `None` to stop the traversal.
    fn visit(&mut self, node: &Matcher, frame: &Frame, acc: &Self::Acc) -> Option<Self::Acc>;
}

impl Matcher {
    pub(crate) fn traverse<V: Visitor>(
        &self,
        visitor: &mut V,
        frame: Frame,
        acc: &V::Acc,
    ) -> bool {
        let Some(child_acc) = visitor.visit(self, &frame, acc) else {
            return false;
        };
        match &self.kind {
            MatcherKind::Composite { children, .. } => {
                let total = children.len();
                for (index, child) in children.iter().enumerate() {
                    if !child.traverse(visitor, Frame::child_of(&frame, index, total), &child_acc) {
                        return false;
                    }
                }
                true
            }
            MatcherKind::Field { node, .. }
            | MatcherKind::Not { node }
            | MatcherKind::Size { node } => {
                // Descend into the array specialization once it exists,
                // otherwise into the scalar delegate.
                let next: &Matcher = node
                    .array_record
                    .get()
                    .map(|boxed| boxed.as_ref())
                    .unwrap_or_else(|| node.delegate.as_ref());
                next.traverse(visitor, Frame::child_of(&frame, 0, 1), &child_acc)
            }
            _ => true,
        }
    }

    /// Number of nodes in the tree, counting the lazily built array
    /// specializations that exist at call time.
    pub fn node_count(&self) -> usize {
        struct Count(usize);
        impl Visitor for Count {
            type Acc = ();
            fn visit(&mut self, _node: &Matcher, _frame: &Frame, _acc: &()) -> Option<()> {
                self.0 += 1;
                Some(())
            }
        }
        let mut counter = Count(0);
        self.traverse(&mut counter, Frame::root(), &());
        counter.0
    }
}
