//! Drops implicit globals that are assigned but never read anywhere.

use super::{Rule, RuleSettings, Step, expression_statement};
use crate::census::Census;
use crate::context::FileContext;
use crate::globals::{self, GlobalRef};
use crate::layout;
use crate::rewriter::EditSet;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::SyntaxNode;

pub struct UnusedAssigned<'a> {
    census: Option<&'a Census>,
    settings: &'a RuleSettings,
}

impl<'a> UnusedAssigned<'a> {
    pub fn new(census: Option<&'a Census>, settings: &'a RuleSettings) -> Self {
        UnusedAssigned { census, settings }
    }

    fn is_unused(&self, global: &GlobalRef) -> bool {
        let name = global.name.as_str();
        if global.read || self.settings.externals.contains(name) {
            return false;
        }
        if let Some(census) = self.census
            && (census.is_read(name) || census.is_exposed(name))
        {
            return false;
        }
        let statements: Option<Vec<SyntaxNode>> =
            global.sites.iter().map(assignment_statement).collect();
        statements.is_some_and(|stmts| {
            !stmts.is_empty()
                && stmts
                    .iter()
                    .all(|stmt| stmt.parent().is_some_and(|p| p.kind() != SOURCE_FILE))
        })
    }
}

/// The expression statement `name = value;` whose target is `site`.
fn assignment_statement(site: &SyntaxNode) -> Option<SyntaxNode> {
    let assign = site.parent().filter(|p| p.kind() == ASSIGN_EXPR)?;
    let parts = ast::assignment(&assign)?;
    if !parts.is_plain() || parts.target != *site {
        return None;
    }
    assign.parent().filter(|p| p.kind() == EXPR_STMT)
}

impl Rule for UnusedAssigned<'_> {
    type Symbol = String;

    const NAME: &'static str = "unused-assigned-vars";

    fn eligible(&self, cx: &FileContext) -> Vec<String> {
        globals::find_globals(cx.tree(), cx.scopes())
            .into_iter()
            .filter(|g| self.is_unused(g))
            .map(|g| g.name)
            .collect()
    }

    fn step(&self, cx: &FileContext, name: &String) -> Step {
        let Some(global) = globals::find_globals(cx.tree(), cx.scopes())
            .into_iter()
            .find(|g| g.name == *name && self.is_unused(g))
        else {
            return Step::Done;
        };
        let Some(stmt) = global.sites.first().and_then(assignment_statement) else {
            return Step::Done;
        };
        let mut edits = EditSet::new();
        match stmt.first_child().and_then(|expr| ast::assignment(&expr)) {
            Some(parts) if ast::has_side_effects(&parts.value) => {
                layout::replace_statement(&stmt, &expression_statement(&parts.value), &mut edits);
            }
            _ => layout::remove_statement(&stmt, &mut edits),
        }
        Step::edit(edits)
    }
}
