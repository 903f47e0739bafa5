//! Per-step view of one file: its text, syntax tree and scope tree.
//!
//! A context is never updated. Applying edits produces a new context built
//! from the rewritten text, so scope and usage data can never outlive the
//! tree they were computed from.

use crate::report::{Diagnostic, DiagnosticKind};
use crate::rewriter::{EditConflict, EditSet};
use crate::scope::ScopeTree;
use crate::syntax::{ParseError, SyntaxNode, SyntaxTree};

#[derive(Debug, Clone)]
pub struct FileContext {
    source: String,
    tree: SyntaxTree,
    scopes: ScopeTree,
}

/// Why a set of edits could not produce a new context.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Conflict(#[from] EditConflict),
    #[error("rewritten text does not parse: {0}")]
    Reparse(#[from] ParseError),
}

impl FileContext {
    pub fn parse(source: impl Into<String>) -> Result<Self, ParseError> {
        let source = source.into();
        let tree = SyntaxTree::parse(&source)?;
        let scopes = ScopeTree::build(&tree);
        Ok(FileContext {
            source,
            tree,
            scopes,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn root(&self) -> &SyntaxNode {
        self.tree.root()
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// Applies `edits` and rebuilds everything from the new text.
    pub fn apply(&self, edits: &EditSet) -> Result<FileContext, RewriteError> {
        let text = edits.apply(&self.source)?;
        Ok(FileContext::parse(text)?)
    }

    /// A diagnostic anchored at the start of `node`.
    pub fn diagnostic(
        &self,
        kind: DiagnosticKind,
        symbol: &str,
        message: impl Into<String>,
        node: &SyntaxNode,
    ) -> Diagnostic {
        Diagnostic::new(kind, symbol, message).at(&self.source, node.text_range().start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TextRange;

    #[test]
    fn apply_rebuilds_scopes() {
        let cx = FileContext::parse("x = 1;").unwrap();
        assert!(cx.scopes().scope(cx.scopes().root()).bindings.is_empty());
        let mut edits = EditSet::new();
        edits.insert(0.into(), "var ");
        let next = cx.apply(&edits).unwrap();
        assert_eq!(next.source(), "var x = 1;");
        assert!(next.scopes().scope(next.scopes().root()).declares("x"));
    }

    #[test]
    fn apply_rejects_unparsable_result() {
        let cx = FileContext::parse("f(a);").unwrap();
        let mut edits = EditSet::new();
        edits.delete(TextRange::new(3.into(), 4.into()));
        assert!(matches!(cx.apply(&edits), Err(RewriteError::Reparse(_))));
    }
}
