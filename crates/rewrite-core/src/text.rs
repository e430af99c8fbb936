/*!
# Plain-Text Recipes

Recipes that work on the values of `text` nodes. They make no assumptions
about any grammar and are handy for exercising a scheduler run end to end.
*/

use regex::Regex;

use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::recipe::Recipe;
use crate::trace;
use crate::tree::{Marker, MarkerKind, Tree};
use crate::visitor::TreeVisitor;

/// Replace every match of a regular expression in text nodes
pub struct FindAndReplace {
    find: Regex,
    replace: String,
    description: String,
}

impl FindAndReplace {
    /// `replace` may use `$1`-style references to capture groups
    pub fn new(find: &str, replace: impl Into<String>) -> Result<Self, regex::Error> {
        let find = Regex::new(find)?;
        let replace = replace.into();
        let description = format!("Replace `{}` with `{}` in plain text.", find.as_str(), replace);
        Ok(Self {
            find,
            replace,
            description,
        })
    }
}

impl Recipe for FindAndReplace {
    fn name(&self) -> &str {
        "Find and replace"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn visitor(&self, _ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
        Ok(Some(Box::new(ReplaceVisitor { recipe: self })))
    }
}

struct ReplaceVisitor<'a> {
    recipe: &'a FindAndReplace,
}

impl TreeVisitor for ReplaceVisitor<'_> {
    fn visit_node(&self, node: &Tree, _ctx: &ExecutionContext) -> VisitResult<Tree> {
        let _frame = trace::enter::<Self>("visit_node");
        let Some(value) = node.value().filter(|_| node.is_text()) else {
            return Ok(node.clone());
        };
        let replaced = self.recipe.find.replace_all(value, self.recipe.replace.as_str());
        Ok(node.with_value(replaced.into_owned()))
    }
}

/// Mark text nodes that contain a match with a search-result marker
pub struct FindText {
    find: Regex,
    description: String,
}

impl FindText {
    pub fn new(find: &str) -> Result<Self, regex::Error> {
        let find = Regex::new(find)?;
        let description = format!("Mark plain text matching `{}`.", find.as_str());
        Ok(Self { find, description })
    }
}

impl Recipe for FindText {
    fn name(&self) -> &str {
        "Find text"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn visitor(&self, _ctx: &ExecutionContext) -> VisitResult<Option<Box<dyn TreeVisitor + '_>>> {
        Ok(Some(Box::new(FindVisitor { recipe: self })))
    }
}

struct FindVisitor<'a> {
    recipe: &'a FindText,
}

impl TreeVisitor for FindVisitor<'_> {
    fn visit_node(&self, node: &Tree, _ctx: &ExecutionContext) -> VisitResult<Tree> {
        let _frame = trace::enter::<Self>("visit_node");
        let found = node
            .value()
            .filter(|_| node.is_text())
            .and_then(|value| self.recipe.find.find(value));
        match found {
            Some(found) => Ok(node.add_marker(Marker::stable(
                MarkerKind::SearchResult,
                Some(self.recipe.name()),
                found.as_str(),
            ))),
            None => Ok(node.clone()),
        }
    }
}
