/*!
# Recipes

Core trait and building blocks for named, composable transformations.

A recipe is plain data: a display name, a description, an optional visitor
factory and an ordered list of child recipes. The scheduler applies a
recipe's own visitor first and then each child in declared order, every
step seeing the tree the previous step produced.
*/

use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::trace;
use crate::tree::Tree;
use crate::visitor::TreeVisitor;

/// Core trait for recipes
///
/// Recipes are re-invoked every cycle and must be cheap and side-effect
/// free to construct visitors from. A visitor that finds nothing to do
/// must return the tree it was given so the scheduler can detect
/// convergence.
pub trait Recipe: Send + Sync {
    /// Human-readable name for this recipe
    fn name(&self) -> &str;

    /// What this recipe does
    fn description(&self) -> &str;

    /// Build the visitor for one invocation. `None` means this recipe only
    /// sequences its children.
    fn visitor(&self, ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
        let _ = ctx;
        Ok(None)
    }

    /// Child recipes, run after this recipe's own visitor
    fn recipe_list(&self) -> &[Arc<dyn Recipe>] {
        &[]
    }

    /// Path prefix identifying the types that belong to this recipe.
    ///
    /// Failure details keep only frames whose owner lies under this path.
    /// Defaults to the module the recipe type is declared in.
    fn frame_scope(&self) -> &'static str {
        trace::module_path_of(std::any::type_name::<Self>())
    }
}

impl fmt::Debug for dyn Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name())
            .field("recipe_list", &self.recipe_list())
            .finish()
    }
}

/// A recipe that applies its children in sequence
pub struct CompositeRecipe {
    name: String,
    description: String,
    recipes: Vec<Arc<dyn Recipe>>,
}

impl CompositeRecipe {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            recipes: Vec::new(),
        }
    }

    pub fn add_recipe(mut self, recipe: impl Recipe + 'static) -> Self {
        self.recipes.push(Arc::new(recipe));
        self
    }

    pub fn add_shared(mut self, recipe: Arc<dyn Recipe>) -> Self {
        self.recipes.push(recipe);
        self
    }
}

impl Recipe for CompositeRecipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn recipe_list(&self) -> &[Arc<dyn Recipe>] {
        &self.recipes
    }
}

/// A recipe that rewrites every node a matcher accepts
pub struct NodeRecipe<F>
where
    F: Fn(&Tree, &ExecutionContext) -> VisitResult<Tree> + Send + Sync,
{
    name: String,
    description: String,
    matcher: fn(&Tree) -> bool,
    transformer: F,
}

impl<F> NodeRecipe<F>
where
    F: Fn(&Tree, &ExecutionContext) -> VisitResult<Tree> + Send + Sync,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        matcher: fn(&Tree) -> bool,
        transformer: F,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            matcher,
            transformer,
        }
    }
}

impl<F> Recipe for NodeRecipe<F>
where
    F: Fn(&Tree, &ExecutionContext) -> VisitResult<Tree> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn visitor(&self, _ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
        Ok(Some(Box::new(NodeVisitor { recipe: self })))
    }
}

struct NodeVisitor<'a, F>
where
    F: Fn(&Tree, &ExecutionContext) -> VisitResult<Tree> + Send + Sync,
{
    recipe: &'a NodeRecipe<F>,
}

impl<F> TreeVisitor for NodeVisitor<'_, F>
where
    F: Fn(&Tree, &ExecutionContext) -> VisitResult<Tree> + Send + Sync,
{
    fn visit_node(&self, node: &Tree, ctx: &ExecutionContext) -> VisitResult<Tree> {
        if !(self.recipe.matcher)(node) {
            return Ok(node.clone());
        }
        let _frame = trace::enter::<Self>("visit_node");
        (self.recipe.transformer)(node, ctx)
    }
}
