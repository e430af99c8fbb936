//! Typed metadata attached to tree nodes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Info,
    Warning,
    Error,
    SearchResult,
}

impl MarkerKind {
    /// Error and warning markers are surfaced even when the text is unchanged
    pub fn is_reportable(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::SearchResult => write!(f, "search_result"),
        }
    }
}

/// Marker identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id derived from the parts that name a logical marker
    pub fn stable(kind: MarkerKind, recipe: Option<&str>, message: &str) -> Self {
        let name = format!("{kind}\u{1f}{}\u{1f}{message}", recipe.unwrap_or_default());
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub kind: MarkerKind,
    pub message: String,
    /// Extra diagnostic text, e.g. the recipe frames behind an error
    pub detail: Option<String>,
    /// Name of the recipe that produced this marker
    pub recipe: Option<String>,
}

impl Marker {
    /// A marker with a fresh random id
    pub fn new(kind: MarkerKind, message: impl Into<String>) -> Self {
        Self {
            id: MarkerId::new(),
            kind,
            message: message.into(),
            detail: None,
            recipe: None,
        }
    }

    /// A marker whose id is the same every time it is built from the same
    /// kind, recipe and message. Re-attaching it supersedes the old entry.
    pub fn stable(kind: MarkerKind, recipe: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            id: MarkerId::stable(kind, recipe, &message),
            kind,
            message,
            detail: None,
            recipe: recipe.map(str::to_string),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(MarkerKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(MarkerKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(MarkerKind::Error, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.recipe = Some(recipe.into());
        self
    }
}

/// Ordered marker bag with id-based deduplication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    entries: Vec<Marker>,
}

impl Markers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker. A marker with the same id is replaced in place.
    pub fn add(&mut self, marker: Marker) {
        match self.entries.iter_mut().find(|existing| existing.id == marker.id) {
            Some(existing) => *existing = marker,
            None => self.entries.push(marker),
        }
    }

    pub fn with(mut self, marker: Marker) -> Self {
        self.add(marker);
        self
    }

    pub fn remove(&mut self, id: MarkerId) -> Option<Marker> {
        let index = self.entries.iter().position(|marker| marker.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.entries.iter().find(|marker| marker.id == id)
    }

    pub fn find_first(&self, kind: MarkerKind) -> Option<&Marker> {
        self.entries.iter().find(|marker| marker.kind == kind)
    }

    pub fn of_kind(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.entries.iter().filter(move |marker| marker.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Marker> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Markers {
    type Item = &'a Marker;
    type IntoIter = std::slice::Iter<'a, Marker>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<Marker> for Markers {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        let mut markers = Markers::new();
        for marker in iter {
            markers.add(marker);
        }
        markers
    }
}
