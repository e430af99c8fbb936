//! Per-recipe execution statistics.

use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

/// Recipe execution statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeStats {
    pub recipe_name: String,
    /// Visitor invocations, one per (source, cycle) the recipe ran on
    pub applications: u64,
    /// Invocations that returned a different tree
    pub changes: u64,
    /// Invocations that failed and were turned into markers
    pub errors: u64,
    pub total_time: Duration,
}

impl RecipeStats {
    pub fn new(recipe_name: impl Into<String>) -> Self {
        Self {
            recipe_name: recipe_name.into(),
            ..Self::default()
        }
    }

    pub fn change_rate(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.changes as f64) / (self.applications as f64)
        }
    }

    pub fn average_time(&self) -> Duration {
        if self.applications == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_time.as_nanos() / u128::from(self.applications);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

/// Outcome of one visitor invocation, as far as statistics care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    Unchanged,
    Changed,
    Failed,
}

/// Statistics shared by the parallel workers of one run, keyed by recipe name
/// in first-seen order
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    stats: Mutex<IndexMap<String, RecipeStats>>,
}

impl StatsCollector {
    pub(crate) fn record(&self, recipe: &str, outcome: Invocation, elapsed: Duration) {
        let mut stats = self.stats.lock();
        let entry = stats
            .entry(recipe.to_string())
            .or_insert_with(|| RecipeStats::new(recipe));
        entry.applications += 1;
        entry.total_time += elapsed;
        match outcome {
            Invocation::Unchanged => {}
            Invocation::Changed => entry.changes += 1,
            Invocation::Failed => entry.errors += 1,
        }
    }

    pub(crate) fn into_inner(self) -> IndexMap<String, RecipeStats> {
        self.stats.into_inner()
    }
}
