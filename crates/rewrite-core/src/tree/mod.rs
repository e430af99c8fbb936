//! Generic persistent source tree.
//!
//! A [`Tree`] is a cheap-to-clone handle over a shared, immutable node.
//! Every edit returns a new handle that shares all untouched subtrees with
//! the old one, and an edit that changes nothing returns the same handle,
//! so "did this visitor change anything" can be answered by pointer
//! comparison first and structural comparison second.

pub mod diff;
pub mod marker;

pub use marker::{Marker, MarkerId, MarkerKind, Markers};

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::TreeError;

/// Node kind used for plain-text sources
pub const TEXT_KIND: &str = "text";

/// Node identity, preserved across edits of the same logical node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Child-index path from a root to one of its nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "{}", parts.join("/"))
    }
}

#[derive(Debug)]
struct Node {
    id: NodeId,
    kind: String,
    value: Option<String>,
    markers: Markers,
    children: Vec<Tree>,
}

impl Node {
    fn edit(&self) -> Node {
        Node {
            id: self.id,
            kind: self.kind.clone(),
            value: self.value.clone(),
            markers: self.markers.clone(),
            children: self.children.clone(),
        }
    }
}

/// Immutable, structurally shared tree node
#[derive(Clone)]
pub struct Tree(Arc<Node>);

impl Tree {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    /// A node with a text value and no children
    pub fn leaf(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_node(Node {
            id: NodeId::new(),
            kind: kind.into(),
            value: Some(value.into()),
            markers: Markers::new(),
            children: Vec::new(),
        })
    }

    /// A node without a value of its own
    pub fn branch(kind: impl Into<String>, children: Vec<Tree>) -> Self {
        Self::from_node(Node {
            id: NodeId::new(),
            kind: kind.into(),
            value: None,
            markers: Markers::new(),
            children,
        })
    }

    /// A plain-text source unit
    pub fn text(content: impl Into<String>) -> Self {
        Self::leaf(TEXT_KIND, content)
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.0.value.as_deref()
    }

    pub fn markers(&self) -> &Markers {
        &self.0.markers
    }

    pub fn children(&self) -> &[Tree] {
        &self.0.children
    }

    pub fn is_text(&self) -> bool {
        self.kind() == TEXT_KIND
    }

    /// Same node object, not merely equal content
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn with_value(&self, value: impl Into<String>) -> Tree {
        let value = value.into();
        if self.value() == Some(value.as_str()) {
            return self.clone();
        }
        let mut node = self.0.edit();
        node.value = Some(value);
        Tree::from_node(node)
    }

    /// Replace the children. Returns `self` when every child is the same object.
    pub fn with_children(&self, children: Vec<Tree>) -> Tree {
        let unchanged = children.len() == self.children().len()
            && children
                .iter()
                .zip(self.children())
                .all(|(new, old)| new.ptr_eq(old));
        if unchanged {
            return self.clone();
        }
        let mut node = self.0.edit();
        node.children = children;
        Tree::from_node(node)
    }

    pub fn with_markers(&self, markers: Markers) -> Tree {
        if self.markers() == &markers {
            return self.clone();
        }
        let mut node = self.0.edit();
        node.markers = markers;
        Tree::from_node(node)
    }

    /// Add or supersede a marker on this node
    pub fn add_marker(&self, marker: Marker) -> Tree {
        self.with_markers(self.markers().clone().with(marker))
    }

    /// Attach a marker to the node at `path`, copying only the nodes on the path.
    pub fn attach(&self, path: &NodePath, marker: Marker) -> Result<Tree, TreeError> {
        self.attach_at(path.indices(), marker).ok_or_else(|| TreeError::InvalidPath {
            path: path.to_string(),
        })
    }

    fn attach_at(&self, indices: &[usize], marker: Marker) -> Option<Tree> {
        let Some((&first, rest)) = indices.split_first() else {
            return Some(self.add_marker(marker));
        };
        let child = self.children().get(first)?.attach_at(rest, marker)?;
        let mut children = self.children().to_vec();
        children[first] = child;
        Some(self.with_children(children))
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&Tree> {
        path.indices()
            .iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    /// First marker of `kind`, searching depth-first in pre-order
    pub fn find_first(&self, kind: MarkerKind) -> Option<&Marker> {
        self.markers()
            .find_first(kind)
            .or_else(|| self.children().iter().find_map(|child| child.find_first(kind)))
    }

    /// Every marker in the tree, depth-first in pre-order
    pub fn markers_deep(&self) -> Vec<&Marker> {
        let mut found = Vec::new();
        self.collect_markers(&mut found);
        found
    }

    fn collect_markers<'a>(&'a self, found: &mut Vec<&'a Marker>) {
        found.extend(self.markers().iter());
        for child in self.children() {
            child.collect_markers(found);
        }
    }

    /// Source text: node values concatenated depth-first
    pub fn print(&self) -> String {
        let mut out = String::new();
        self.print_into(&mut out);
        out
    }

    fn print_into(&self, out: &mut String) {
        if let Some(value) = self.value() {
            out.push_str(value);
        }
        for child in self.children() {
            child.print_into(out);
        }
    }

    /// Structural equality of kind, value and children, ignoring markers and ids
    pub fn content_eq(&self, other: &Tree) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.kind() == other.kind()
            && self.value() == other.value()
            && self.children().len() == other.children().len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(a, b)| a.content_eq(b))
    }
}

/// Deep equality over content and markers. Node ids are not compared.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.kind() == other.kind()
            && self.value() == other.value()
            && self.markers() == other.markers()
            && self.children() == other.children()
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Tree");
        debug.field("kind", &self.0.kind);
        if let Some(value) = &self.0.value {
            debug.field("value", value);
        }
        if !self.0.markers.is_empty() {
            debug.field("markers", &self.0.markers);
        }
        if !self.0.children.is_empty() {
            debug.field("children", &self.0.children);
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        Tree::branch(
            "file",
            vec![
                Tree::leaf("word", "hello"),
                Tree::branch("group", vec![Tree::leaf("word", " "), Tree::leaf("word", "world")]),
            ],
        )
    }

    #[test]
    fn print_concatenates_values() {
        assert_eq!(sample().print(), "hello world");
    }

    #[test]
    fn no_op_edits_keep_the_same_reference() {
        let tree = sample();
        assert!(tree.with_children(tree.children().to_vec()).ptr_eq(&tree));
        let word = &tree.children()[0];
        assert!(word.with_value("hello").ptr_eq(word));
        assert!(tree.with_markers(Markers::new()).ptr_eq(&tree));
    }

    #[test]
    fn edits_preserve_node_identity() {
        let word = Tree::leaf("word", "hello");
        let edited = word.with_value("bye");
        assert!(!edited.ptr_eq(&word));
        assert_eq!(edited.id(), word.id());
    }

    #[test]
    fn attach_copies_only_the_path() -> anyhow::Result<()> {
        let tree = sample();
        let path = NodePath::from(vec![1, 1]);
        let marked = tree.attach(&path, Marker::info("here"))?;

        assert!(!marked.ptr_eq(&tree));
        assert!(marked.children()[0].ptr_eq(&tree.children()[0]));
        assert!(marked.children()[1].children()[0].ptr_eq(&tree.children()[1].children()[0]));
        assert_eq!(marked.node_at(&path).unwrap().markers().len(), 1);
        assert!(tree.markers_deep().is_empty());
        Ok(())
    }

    #[test]
    fn attach_rejects_bad_paths() {
        let err = sample().attach(&NodePath::from(vec![0, 3]), Marker::info("x"));
        assert_eq!(
            err.unwrap_err(),
            TreeError::InvalidPath {
                path: "/0/3".to_string()
            }
        );
    }

    #[test]
    fn find_first_is_depth_first_pre_order() -> anyhow::Result<()> {
        let tree = sample()
            .attach(&NodePath::from(vec![1, 0]), Marker::warning("deep"))?
            .attach(&NodePath::from(vec![1]), Marker::warning("shallow"))?;
        assert_eq!(tree.find_first(MarkerKind::Warning).unwrap().message, "shallow");
        assert!(tree.find_first(MarkerKind::Error).is_none());
        Ok(())
    }

    #[test]
    fn equality_flavours() {
        let a = Tree::text("hello");
        let b = Tree::text("hello");
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);

        let marked = a.add_marker(Marker::error("boom"));
        assert!(marked.content_eq(&a));
        assert_ne!(marked, a);
    }
}
