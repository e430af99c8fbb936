//! Error types for the rewrite core.
//!
//! Visitors and recipes return `anyhow::Result`; the scheduler converts
//! whatever they raise into markers. The typed errors here cover the few
//! cases that do cross the public boundary.

use thiserror::Error;

use crate::trace::{self, Frame};

/// Result type for visitor and recipe code
pub type VisitResult<T> = anyhow::Result<T>;

/// A failure raised from inside a visitor.
///
/// Construction snapshots the active frame stack (innermost first), so the
/// scheduler can report where inside the recipe the failure originated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RecipeFailure {
    message: String,
    frames: Vec<Frame>,
}

impl RecipeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: trace::snapshot(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Frames active when the failure was raised, innermost first
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Errors that escape [`crate::RecipeScheduler::run`]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The scheduler configuration cannot be used
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// A recipe failed while fail-fast mode was enabled
    #[error("Recipe '{recipe}' failed on {source_path}: {message}")]
    FailFast {
        recipe: String,
        source_path: String,
        message: String,
    },
}

/// Errors from tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("No node at path {path}")]
    InvalidPath { path: String },
}
