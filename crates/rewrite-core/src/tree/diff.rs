//! Structural comparison between two versions of a tree.

use std::collections::HashSet;

use super::{Marker, MarkerId, NodePath, Tree};

/// Minimal set of node paths whose content differs between `before` and `after`.
///
/// Shared subtrees are skipped by reference. A node whose kind, value or
/// child count changed is reported as a whole; otherwise the comparison
/// descends into its children.
pub fn changed_paths(before: &Tree, after: &Tree) -> Vec<NodePath> {
    let mut paths = Vec::new();
    collect_changes(before, after, NodePath::root(), &mut paths);
    paths
}

fn collect_changes(before: &Tree, after: &Tree, path: NodePath, paths: &mut Vec<NodePath>) {
    if before.ptr_eq(after) {
        return;
    }
    if before.kind() != after.kind()
        || before.value() != after.value()
        || before.children().len() != after.children().len()
    {
        paths.push(path);
        return;
    }
    for (index, (old, new)) in before.children().iter().zip(after.children()).enumerate() {
        collect_changes(old, new, path.child(index), paths);
    }
}

/// Markers present anywhere in `after` whose id does not appear in `before`
pub fn new_markers(before: &Tree, after: &Tree) -> Vec<Marker> {
    let known: HashSet<MarkerId> = before.markers_deep().iter().map(|marker| marker.id).collect();
    after
        .markers_deep()
        .into_iter()
        .filter(|marker| !known.contains(&marker.id))
        .cloned()
        .collect()
}
