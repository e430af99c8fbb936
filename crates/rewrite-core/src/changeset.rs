//! Per-source results of a scheduling run.

use serde::Serialize;

use crate::tree::diff;
use crate::tree::{Marker, NodePath, Tree};

/// One input unit: a parsed tree and the path it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub tree: Tree,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, tree: Tree) -> Self {
        Self {
            path: path.into(),
            tree,
        }
    }

    /// A plain-text source
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(path, Tree::text(content))
    }
}

/// How a source's final tree relates to its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    /// Content differs
    Modified,
    /// Content is the same but new error or warning markers were attached
    Annotated,
}

#[derive(Debug, Clone)]
pub struct SourceResult {
    pub path: String,
    /// Tree as supplied to the first cycle
    pub before: Tree,
    /// Tree produced by the last cycle that ran
    pub after: Tree,
    /// Recipes that changed this source, in the order they first did so
    pub recipes_that_made_changes: Vec<String>,
    /// Markers in `after` that were not in `before`
    pub new_markers: Vec<Marker>,
    pub change: ChangeKind,
}

impl SourceResult {
    pub(crate) fn new(path: String, before: Tree, after: Tree, recipes_that_made_changes: Vec<String>) -> Self {
        let new_markers = diff::new_markers(&before, &after);
        let change = if !before.content_eq(&after) {
            ChangeKind::Modified
        } else if new_markers.iter().any(|marker| marker.kind.is_reportable()) {
            ChangeKind::Annotated
        } else {
            ChangeKind::Unchanged
        };
        Self {
            path,
            before,
            after,
            recipes_that_made_changes,
            new_markers,
            change,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.change != ChangeKind::Unchanged
    }

    /// Node paths whose content differs between `before` and `after`
    pub fn changed_paths(&self) -> Vec<NodePath> {
        diff::changed_paths(&self.before, &self.after)
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            path: self.path.clone(),
            change: self.change,
            before: self.before.print(),
            after: self.after.print(),
            recipes_that_made_changes: self.recipes_that_made_changes.clone(),
            markers: self.new_markers.clone(),
        }
    }
}

/// Serializable view of a [`SourceResult`] for rendering collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub path: String,
    pub change: ChangeKind,
    pub before: String,
    pub after: String,
    pub recipes_that_made_changes: Vec<String>,
    pub markers: Vec<Marker>,
}

/// Results of one run, in input order
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    entries: Vec<SourceResult>,
    include_unchanged: bool,
}

impl Changeset {
    pub(crate) fn new(entries: Vec<SourceResult>, include_unchanged: bool) -> Self {
        Self {
            entries,
            include_unchanged,
        }
    }

    /// Every source, changed or not
    pub fn all_results(&self) -> &[SourceResult] {
        &self.entries
    }

    /// Externally visible results: changed sources, plus unchanged ones when
    /// the run was configured to include them
    pub fn results(&self) -> Vec<&SourceResult> {
        self.entries
            .iter()
            .filter(|entry| self.include_unchanged || entry.is_changed())
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<&SourceResult> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// True when no source changed
    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(SourceResult::is_changed)
    }

    /// Final trees in input order, ready to feed into another run
    pub fn after_sources(&self) -> Vec<SourceFile> {
        self.entries
            .iter()
            .map(|entry| SourceFile::new(entry.path.clone(), entry.after.clone()))
            .collect()
    }
}
