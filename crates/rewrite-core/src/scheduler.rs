/*!
# Recipe Scheduler

Drives recipes over a set of sources in cycles until nothing changes any
more or the cycle budget runs out.

Within a cycle every source is processed independently (in parallel when
configured), each one running every top-level recipe in declared order.
The cycle boundary is a barrier: results are collected for all sources
before the convergence check decides whether another cycle runs.

A recipe that fails on a source, by returning an error or by panicking,
does not stop the run. The scheduler discards that visitor's output, tags
the tree it was given with an error marker and moves on to the next
recipe.
*/

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span, info, info_span, warn, Span};

use crate::changeset::{Changeset, SourceFile, SourceResult};
use crate::config::{SchedulerConfig, StabilityCheck};
use crate::context::{CapturedFailure, ExecutionContext};
use crate::error::{RecipeFailure, SchedulerError, VisitResult};
use crate::recipe::Recipe;
use crate::stats::{Invocation, RecipeStats, StatsCollector};
use crate::trace::{self, Frame};
use crate::tree::{Marker, MarkerKind, Tree};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// A full cycle left every source unchanged
    Converged,
    /// The cycle budget ran out while some source was still changing
    MaxCyclesReached,
    /// The execution context was cancelled
    Cancelled,
}

/// Outcome of [`RecipeScheduler::run`]
#[derive(Debug)]
pub struct RecipeRun {
    pub state: RunState,
    /// Cycles that started
    pub cycles: usize,
    pub changeset: Changeset,
    pub stats: IndexMap<String, RecipeStats>,
}

impl RecipeRun {
    pub fn is_converged(&self) -> bool {
        self.state == RunState::Converged
    }
}

pub struct RecipeScheduler {
    config: SchedulerConfig,
}

impl RecipeScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run `recipes` over `sources` until convergence, cancellation or the
    /// cycle budget is spent.
    ///
    /// Recipe failures never surface here unless fail-fast is enabled; they
    /// end up as error markers on the affected source.
    pub fn run(
        &self,
        recipes: &[Arc<dyn Recipe>],
        sources: Vec<SourceFile>,
        ctx: &ExecutionContext,
    ) -> Result<RecipeRun, SchedulerError> {
        self.config.validate()?;

        let span = info_span!("recipe_run", recipes = recipes.len(), sources = sources.len());
        let _enter = span.enter();

        let stats = StatsCollector::default();
        let mut current: Vec<Tree> = sources.iter().map(|source| source.tree.clone()).collect();
        let mut changed_by: Vec<IndexSet<String>> = vec![IndexSet::new(); sources.len()];
        let mut state = RunState::MaxCyclesReached;
        let mut cycles = 0;

        for cycle in 1..=self.config.max_cycles {
            if ctx.is_cancelled() {
                state = RunState::Cancelled;
                break;
            }
            ctx.set_cycle(cycle);
            cycles = cycle;
            let cycle_span = debug_span!("cycle", cycle);
            let _cycle_enter = cycle_span.enter();

            let outcomes: Vec<Option<SourceCycle>> = if self.config.parallel {
                sources
                    .par_iter()
                    .zip(current.par_iter())
                    .map(|(source, tree)| self.run_source(recipes, source, tree, ctx, &stats, &cycle_span))
                    .collect()
            } else {
                sources
                    .iter()
                    .zip(current.iter())
                    .map(|(source, tree)| self.run_source(recipes, source, tree, ctx, &stats, &cycle_span))
                    .collect()
            };

            let mut stable = true;
            let mut cancelled = false;
            for (index, outcome) in outcomes.into_iter().enumerate() {
                let Some(outcome) = outcome else {
                    cancelled = true;
                    continue;
                };
                if self.config.fail_fast {
                    if let Some(failure) = outcome.failures.into_iter().next() {
                        return Err(SchedulerError::FailFast {
                            recipe: failure.recipe,
                            source_path: failure.source_path,
                            message: failure.message,
                        });
                    }
                }
                if !self.is_same(&current[index], &outcome.tree) {
                    stable = false;
                }
                changed_by[index].extend(outcome.changed_by);
                current[index] = outcome.tree;
            }

            if cancelled {
                state = RunState::Cancelled;
                break;
            }
            if stable {
                state = RunState::Converged;
                break;
            }
            debug!(cycle, "sources changed, another cycle is needed");
        }

        info!(?state, cycles, "recipe run finished");

        let entries = sources
            .into_iter()
            .zip(current)
            .zip(changed_by)
            .map(|((source, after), names)| {
                SourceResult::new(source.path, source.tree, after, names.into_iter().collect())
            })
            .collect();

        Ok(RecipeRun {
            state,
            cycles,
            changeset: Changeset::new(entries, self.config.include_unchanged),
            stats: stats.into_inner(),
        })
    }

    fn is_same(&self, before: &Tree, after: &Tree) -> bool {
        match self.config.stability {
            StabilityCheck::Reference => before.ptr_eq(after),
            StabilityCheck::Structural => before.ptr_eq(after) || before == after,
        }
    }

    /// One cycle of every top-level recipe over one source. `None` when the
    /// run was cancelled before this source started.
    ///
    /// The source span hangs off `cycle_span` explicitly, since rayon workers
    /// have no current span of their own.
    fn run_source(
        &self,
        recipes: &[Arc<dyn Recipe>],
        source: &SourceFile,
        tree: &Tree,
        ctx: &ExecutionContext,
        stats: &StatsCollector,
        cycle_span: &Span,
    ) -> Option<SourceCycle> {
        if ctx.is_cancelled() {
            return None;
        }
        let _span = debug_span!(parent: cycle_span, "source", path = %source.path).entered();

        let mut run = SourceRun {
            scheduler: self,
            ctx,
            stats,
            path: &source.path,
            changed_by: Vec::new(),
            failures: Vec::new(),
        };
        let mut tree = tree.clone();
        for recipe in recipes {
            tree = run.apply(recipe.as_ref(), tree);
        }
        Some(SourceCycle {
            tree,
            changed_by: run.changed_by,
            failures: run.failures,
        })
    }
}

impl Default for RecipeScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

struct SourceCycle {
    tree: Tree,
    changed_by: Vec<String>,
    failures: Vec<CapturedFailure>,
}

/// Mutable state for one source during one cycle
struct SourceRun<'a> {
    scheduler: &'a RecipeScheduler,
    ctx: &'a ExecutionContext,
    stats: &'a StatsCollector,
    path: &'a str,
    changed_by: Vec<String>,
    failures: Vec<CapturedFailure>,
}

/// What the scheduler needs to know about a recipe, read once per application
struct Identity {
    name: String,
    scope: &'static str,
}

impl Identity {
    /// Stand-in for a recipe whose `name()` or `frame_scope()` panicked
    fn unknown() -> Self {
        Self {
            name: "<unnamed recipe>".to_string(),
            scope: "",
        }
    }
}

impl SourceRun<'_> {
    /// Apply a recipe's own visitor, then its children in order
    fn apply(&mut self, recipe: &dyn Recipe, tree: Tree) -> Tree {
        if self.halted() {
            return tree;
        }
        let identity = match isolated(|| Identity {
            name: recipe.name().to_string(),
            scope: recipe.frame_scope(),
        }) {
            Ok(identity) => identity,
            Err(message) => return self.capture(&Identity::unknown(), tree, message, &[]),
        };

        let mut tree = self.invoke(recipe, &identity, tree);
        let children = match isolated(|| recipe.recipe_list().to_vec()) {
            Ok(children) => children,
            Err(message) => return self.capture(&identity, tree, message, &[]),
        };
        for child in &children {
            tree = self.apply(child.as_ref(), tree);
        }
        tree
    }

    fn halted(&self) -> bool {
        self.scheduler.config.fail_fast && !self.failures.is_empty()
    }

    fn invoke(&mut self, recipe: &dyn Recipe, identity: &Identity, tree: Tree) -> Tree {
        let ctx = self.ctx;
        let started = Instant::now();

        trace::reset();
        let (outcome, unwound) = {
            let _frame = trace::enter::<RecipeScheduler>("invoke");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> VisitResult<Option<Tree>> {
                let Some(visitor) = recipe.visitor(ctx)? else {
                    return Ok(None);
                };
                if !visitor.is_acceptable(&tree, ctx) {
                    return Ok(None);
                }
                visitor.visit(&tree, ctx).map(Some)
            }));
            (outcome, trace::take_unwound())
        };

        match outcome {
            Ok(Ok(None)) => tree,
            Ok(Ok(Some(after))) => {
                let changed = !self.scheduler.is_same(&tree, &after);
                let invocation = if changed {
                    if !self.changed_by.contains(&identity.name) {
                        self.changed_by.push(identity.name.clone());
                    }
                    Invocation::Changed
                } else {
                    Invocation::Unchanged
                };
                self.stats.record(&identity.name, invocation, started.elapsed());
                after
            }
            Ok(Err(err)) => {
                let frames = err
                    .downcast_ref::<RecipeFailure>()
                    .map(|failure| failure.frames().to_vec())
                    .unwrap_or_default();
                self.stats.record(&identity.name, Invocation::Failed, started.elapsed());
                self.capture(identity, tree, err.to_string(), &frames)
            }
            Err(payload) => {
                self.stats.record(&identity.name, Invocation::Failed, started.elapsed());
                let frames = unwound.unwrap_or_default();
                self.capture(identity, tree, panic_message(payload.as_ref()), &frames)
            }
        }
    }

    /// Turn a failure into an error marker on the tree the visitor was given
    fn capture(&mut self, identity: &Identity, tree: Tree, message: String, frames: &[Frame]) -> Tree {
        let own_frames = trace::filter_to_scope(frames, identity.scope);
        let detail = (!own_frames.is_empty()).then(|| trace::render(&own_frames));

        warn!(
            recipe = %identity.name,
            source = self.path,
            cycle = self.ctx.cycle(),
            "recipe failed: {message}"
        );

        let mut marker = Marker::stable(MarkerKind::Error, Some(identity.name.as_str()), message.clone());
        marker.detail = detail.clone();

        let failure = CapturedFailure {
            recipe: identity.name.clone(),
            source_path: self.path.to_string(),
            cycle: self.ctx.cycle(),
            message,
            detail,
        };
        self.ctx.notify_error(&failure);
        self.failures.push(failure);

        tree.add_marker(marker)
    }
}

/// Run a recipe callback, turning a panic into its message
fn isolated<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "visitor panicked".to_string()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
