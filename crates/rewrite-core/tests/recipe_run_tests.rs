/*!
# Recipe Run Integration Tests

End-to-end runs of the scheduler through the public API.
*/

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rewrite_core::text::{FindAndReplace, FindText};
use rewrite_core::{
    ChangeKind, CompositeRecipe, ExecutionContext, MarkerKind, NodeRecipe, Recipe, RecipeScheduler,
    RunState, SchedulerConfig, SourceFile, Tree, TreeVisitor, VisitResult,
};

mod boom {
    use rewrite_core::{trace, ExecutionContext, Recipe, RecipeFailure, Tree, TreeVisitor, VisitResult};

    /// Fails on every source it sees
    pub struct BoomRecipe;

    impl Recipe for BoomRecipe {
        fn name(&self) -> &str {
            "We go boom"
        }

        fn description(&self) -> &str {
            "Test recipe."
        }

        fn visitor(&self, _ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
            Ok(Some(Box::new(BoomVisitor)))
        }
    }

    pub struct BoomVisitor;

    impl BoomVisitor {
        fn visit_text(&self, _text: &Tree) -> VisitResult<Tree> {
            let _frame = trace::enter::<Self>("visit_text");
            Err(RecipeFailure::new("boom").into())
        }
    }

    impl TreeVisitor for BoomVisitor {
        fn visit(&self, tree: &Tree, _ctx: &ExecutionContext) -> VisitResult<Tree> {
            let _frame = trace::enter::<Self>("visit");
            self.visit_text(tree)
        }
    }
}

use boom::BoomRecipe;

fn recipes(list: Vec<Arc<dyn Recipe>>) -> Vec<Arc<dyn Recipe>> {
    list
}

fn replace(find: &str, with: &str) -> Arc<dyn Recipe> {
    Arc::new(FindAndReplace::new(find, with).expect("valid pattern"))
}

#[test]
fn exceptions_cause_result() -> anyhow::Result<()> {
    let ctx = ExecutionContext::new();
    let run = RecipeScheduler::default().run(
        &recipes(vec![Arc::new(BoomRecipe)]),
        vec![SourceFile::text("hello.txt", "hello")],
        &ctx,
    )?;

    let all = run.changeset.all_results();
    assert_eq!(all.len(), 1);
    let result = &all[0];
    assert_eq!(result.after.print(), "hello");
    assert_eq!(result.change, ChangeKind::Annotated);
    assert_eq!(run.changeset.results().len(), 1);

    let errors: Vec<_> = result
        .after
        .markers_deep()
        .into_iter()
        .filter(|marker| marker.kind == MarkerKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    let error = errors[0];
    assert_eq!(error.message, "boom");
    assert_eq!(error.recipe.as_deref(), Some("We go boom"));

    let detail = error.detail.as_deref().expect("error detail");
    let lines: Vec<&str> = detail.lines().collect();
    assert!(lines.len() >= 2, "expected at least two frames, got {detail:?}");
    for line in &lines {
        assert!(line.contains("boom::BoomVisitor::"), "foreign frame in detail: {line}");
        assert!(!line.contains("rewrite_core"), "scheduler frame leaked: {line}");
    }
    assert_eq!(
        lines,
        vec![
            "recipe_run_tests::boom::BoomVisitor::visit_text",
            "recipe_run_tests::boom::BoomVisitor::visit",
        ]
    );
    Ok(())
}

#[test]
fn failures_repeat_without_piling_up_markers() -> anyhow::Result<()> {
    let ctx = ExecutionContext::new();
    let scheduler = RecipeScheduler::new(SchedulerConfig::default().max_cycles(5));
    let run = scheduler.run(
        &recipes(vec![Arc::new(BoomRecipe)]),
        vec![SourceFile::text("hello.txt", "hello")],
        &ctx,
    )?;

    // the marker lands in cycle 1 and is merely re-attached in cycle 2
    assert_eq!(run.state, RunState::Converged);
    assert_eq!(run.cycles, 2);
    let after = &run.changeset.all_results()[0].after;
    assert_eq!(after.markers_deep().len(), 1);
    assert_eq!(run.stats["We go boom"].errors, 2);
    Ok(())
}

#[test]
fn one_failure_does_not_abort_the_batch() -> anyhow::Result<()> {
    let ctx = ExecutionContext::new();
    let run = RecipeScheduler::default().run(
        &recipes(vec![Arc::new(BoomRecipe), replace("foo", "bar")]),
        vec![
            SourceFile::text("a.txt", "foo"),
            SourceFile::text("b.txt", "more foo"),
        ],
        &ctx,
    )?;

    for (path, expected) in [("a.txt", "bar"), ("b.txt", "more bar")] {
        let result = run.changeset.get(path).expect("result per source");
        assert_eq!(result.after.print(), expected);
        assert_eq!(result.change, ChangeKind::Modified);
        assert!(result.after.find_first(MarkerKind::Error).is_some());
    }
    assert_eq!(run.state, RunState::Converged);
    Ok(())
}

#[test]
fn replace_converges_on_second_cycle() -> anyhow::Result<()> {
    let ctx = ExecutionContext::new();
    let run = RecipeScheduler::default().run(
        &recipes(vec![replace("foo", "bar")]),
        vec![SourceFile::text("foo.txt", "foo")],
        &ctx,
    )?;

    assert_eq!(run.state, RunState::Converged);
    assert_eq!(run.cycles, 2);
    let result = &run.changeset.all_results()[0];
    assert_eq!(result.before.print(), "foo");
    assert_eq!(result.after.print(), "bar");
    assert!(result.new_markers.is_empty());
    assert_eq!(result.recipes_that_made_changes, vec!["Find and replace".to_string()]);
    assert_eq!(result.changed_paths().len(), 1);
    Ok(())
}

#[test]
fn converged_output_is_a_fixpoint() -> anyhow::Result<()> {
    let list = recipes(vec![
        replace("foo", "bar"),
        Arc::new(FindText::new("bar")?),
        Arc::new(BoomRecipe),
    ]);
    let scheduler = RecipeScheduler::default();
    let first = scheduler.run(&list, vec![SourceFile::text("a.txt", "foo")], &ExecutionContext::new())?;
    assert!(first.is_converged());

    let second = scheduler.run(&list, first.changeset.after_sources(), &ExecutionContext::new())?;
    assert_eq!(second.state, RunState::Converged);
    assert_eq!(second.cycles, 1);

    let before = &first.changeset.all_results()[0].after;
    let after = &second.changeset.all_results()[0].after;
    assert_eq!(after, before);
    assert_eq!(second.changeset.all_results()[0].change, ChangeKind::Unchanged);
    Ok(())
}

#[test]
fn composite_children_see_earlier_edits_in_the_same_cycle() -> anyhow::Result<()> {
    let chain = CompositeRecipe::new("Chain", "foo to bar to baz")
        .add_shared(replace("foo", "bar"))
        .add_shared(replace("bar", "baz"));
    let scheduler = RecipeScheduler::new(SchedulerConfig::default().max_cycles(1));
    let run = scheduler.run(
        &recipes(vec![Arc::new(chain)]),
        vec![SourceFile::text("a.txt", "foo")],
        &ExecutionContext::new(),
    )?;

    assert_eq!(run.changeset.all_results()[0].after.print(), "baz");
    Ok(())
}

#[test]
fn budget_of_one_cycle_stops_early() -> anyhow::Result<()> {
    // declared in the "wrong" order, so the second edit needs another cycle
    let list = recipes(vec![replace("bar", "baz"), replace("foo", "bar")]);
    let source = || vec![SourceFile::text("a.txt", "foo")];

    let short = RecipeScheduler::new(SchedulerConfig::default().max_cycles(1));
    let run = short.run(&list, source(), &ExecutionContext::new())?;
    assert_eq!(run.state, RunState::MaxCyclesReached);
    assert_eq!(run.cycles, 1);
    assert_eq!(run.changeset.all_results()[0].after.print(), "bar");

    let run = RecipeScheduler::default().run(&list, source(), &ExecutionContext::new())?;
    assert_eq!(run.state, RunState::Converged);
    assert_eq!(run.cycles, 3);
    assert_eq!(run.changeset.all_results()[0].after.print(), "baz");
    Ok(())
}

#[test]
fn results_preserve_input_order_and_hide_unchanged() -> anyhow::Result<()> {
    let sources = vec![
        SourceFile::text("1.txt", "foo"),
        SourceFile::text("2.txt", "nothing here"),
        SourceFile::text("3.txt", "foo foo"),
    ];
    let list = recipes(vec![replace("foo", "bar")]);

    let run = RecipeScheduler::default().run(&list, sources.clone(), &ExecutionContext::new())?;
    let visible: Vec<&str> = run.changeset.results().iter().map(|r| r.path.as_str()).collect();
    assert_eq!(visible, vec!["1.txt", "3.txt"]);

    let all = RecipeScheduler::new(SchedulerConfig::default().include_unchanged(true));
    let run = all.run(&list, sources, &ExecutionContext::new())?;
    let visible: Vec<&str> = run.changeset.results().iter().map(|r| r.path.as_str()).collect();
    assert_eq!(visible, vec!["1.txt", "2.txt", "3.txt"]);
    let untouched = run.changeset.get("2.txt").expect("unchanged source");
    assert!(untouched.after.ptr_eq(&untouched.before));
    Ok(())
}

struct RecordVisits;

struct RecordVisitor;

impl TreeVisitor for RecordVisitor {
    fn visit(&self, tree: &Tree, ctx: &ExecutionContext) -> VisitResult<Tree> {
        ctx.append_message("visited", format!("{}@{}", tree.print(), ctx.cycle()))?;
        Ok(tree.clone())
    }
}

impl Recipe for RecordVisits {
    fn name(&self) -> &str {
        "Record visits"
    }

    fn description(&self) -> &str {
        "Writes one message per visit."
    }

    fn visitor(&self, _ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
        Ok(Some(Box::new(RecordVisitor)))
    }
}

#[test]
fn parallel_sources_share_the_message_sink() -> anyhow::Result<()> {
    let sources: Vec<SourceFile> = (0..64)
        .map(|i| SourceFile::text(format!("{i}.txt"), i.to_string()))
        .collect();
    let ctx = ExecutionContext::new();
    let run = RecipeScheduler::default().run(&recipes(vec![Arc::new(RecordVisits)]), sources, &ctx)?;

    assert_eq!(run.state, RunState::Converged);
    let mut visited: Vec<String> = ctx.get_message("visited").expect("visits recorded");
    visited.sort();
    let mut expected: Vec<String> = (0..64).map(|i| format!("{i}@1")).collect();
    expected.sort();
    assert_eq!(visited, expected);
    Ok(())
}

fn is_text(tree: &Tree) -> bool {
    tree.is_text()
}

#[test]
fn node_recipes_can_read_the_current_cycle() -> anyhow::Result<()> {
    let stamp = NodeRecipe::new("Stamp", "Append the first cycle number", is_text, |node, ctx| {
        let text = node.value().unwrap_or_default();
        if text.contains('#') {
            Ok(node.clone())
        } else {
            Ok(node.with_value(format!("{text}#{}", ctx.cycle())))
        }
    });
    let run = RecipeScheduler::default().run(
        &recipes(vec![Arc::new(stamp)]),
        vec![SourceFile::text("a.txt", "v")],
        &ExecutionContext::new(),
    )?;

    assert_eq!(run.changeset.all_results()[0].after.print(), "v#1");
    Ok(())
}

#[test]
fn summaries_are_json_ready() -> anyhow::Result<()> {
    let run = RecipeScheduler::default().run(
        &recipes(vec![Arc::new(BoomRecipe)]),
        vec![SourceFile::text("hello.txt", "hello")],
        &ExecutionContext::new(),
    )?;

    let json = serde_json::to_value(run.changeset.all_results()[0].summary())?;
    assert_eq!(json["path"], "hello.txt");
    assert_eq!(json["change"], "annotated");
    assert_eq!(json["markers"][0]["message"], "boom");
    assert_eq!(json["markers"][0]["kind"], "error");
    Ok(())
}
