//! Tree visitors: the executable half of a recipe.

use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::tree::Tree;

/// Maps one tree to another.
///
/// Implementations must not mutate anything but the execution context's
/// message sink. A visitor that has nothing to do must hand back the tree
/// it was given (same reference), which is what the defaults do.
pub trait TreeVisitor: Send + Sync {
    /// Whether this visitor should run on `tree` at all
    fn is_acceptable(&self, tree: &Tree, ctx: &ExecutionContext) -> bool {
        let _ = (tree, ctx);
        true
    }

    /// Entry point for one source tree. Defaults to a post-order [`walk`].
    fn visit(&self, tree: &Tree, ctx: &ExecutionContext) -> VisitResult<Tree> {
        walk(self, tree, ctx)
    }

    /// Called once per node by [`walk`], after the node's children were visited
    fn visit_node(&self, node: &Tree, ctx: &ExecutionContext) -> VisitResult<Tree> {
        let _ = ctx;
        Ok(node.clone())
    }
}

/// Visit every node of `tree` bottom-up.
///
/// Parents are only rebuilt when a child came back as a different object,
/// so a visitor that changes nothing returns the input reference.
pub fn walk<V: TreeVisitor + ?Sized>(visitor: &V, tree: &Tree, ctx: &ExecutionContext) -> VisitResult<Tree> {
    let children = tree
        .children()
        .iter()
        .map(|child| walk(visitor, child, ctx))
        .collect::<VisitResult<Vec<_>>>()?;
    let rebuilt = tree.with_children(children);
    visitor.visit_node(&rebuilt, ctx)
}
