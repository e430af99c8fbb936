//! # Rewrite Core
//!
//! Multi-cycle source transformation engine:
//! - Immutable, structurally shared trees with typed marker bags
//! - Visitors and composable recipes
//! - A scheduler that runs recipes to a fixpoint, isolating failures as
//!   error markers instead of aborting the batch
//! - Before/after changesets per source
//!
//! Parsers, printers for concrete grammars and diff rendering live outside
//! this crate; they meet it at [`Tree`], [`Recipe`] and [`Changeset`].
//!
//! ```rust
//! use std::sync::Arc;
//! use rewrite_core::{ExecutionContext, Recipe, RecipeScheduler, RunState, SourceFile};
//! use rewrite_core::text::FindAndReplace;
//!
//! let recipes: Vec<Arc<dyn Recipe>> = vec![Arc::new(FindAndReplace::new("foo", "bar").unwrap())];
//! let ctx = ExecutionContext::new();
//! let run = RecipeScheduler::default()
//!     .run(&recipes, vec![SourceFile::text("a.txt", "foo")], &ctx)
//!     .unwrap();
//!
//! assert_eq!(run.state, RunState::Converged);
//! assert_eq!(run.changeset.all_results()[0].after.print(), "bar");
//! ```

#![warn(clippy::all)]

pub mod changeset;
pub mod config;
pub mod context;
pub mod error;
pub mod recipe;
pub mod scheduler;
pub mod stats;
pub mod text;
pub mod trace;
pub mod tree;
pub mod visitor;

// Re-export commonly used types
pub use changeset::{ChangeKind, Changeset, ResultSummary, SourceFile, SourceResult};
pub use config::{SchedulerConfig, StabilityCheck};
pub use context::{CapturedFailure, ErrorListener, ExecutionContext};
pub use error::{RecipeFailure, SchedulerError, TreeError, VisitResult};
pub use recipe::{CompositeRecipe, NodeRecipe, Recipe};
pub use scheduler::{RecipeRun, RecipeScheduler, RunState};
pub use stats::RecipeStats;
pub use tree::{Marker, MarkerId, MarkerKind, Markers, NodeId, NodePath, Tree};
pub use visitor::{walk, TreeVisitor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for rewrite core components.
///
/// Honours `RUST_LOG`; scheduler events default to `info`. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "rewrite_core=info"
            .parse()
            .expect("static tracing directive is valid"),
    );
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
