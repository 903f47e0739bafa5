//! Free names: references that resolve to no declaration in the file.

use crate::scope::ScopeTree;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::{SyntaxNode, SyntaxTree, TextRange};
use crate::usage::{self, UsageRole};
use std::collections::BTreeMap;

/// An undeclared name and every reference to it.
#[derive(Debug, Clone)]
pub struct GlobalRef {
    pub name: String,
    pub sites: Vec<SyntaxNode>,
    pub read: bool,
    pub written: bool,
}

impl GlobalRef {
    pub fn ranges(&self) -> Vec<TextRange> {
        self.sites.iter().map(|n| n.text_range()).collect()
    }
}

/// Undeclared names of `tree`, sorted by name.
pub fn find_globals(tree: &SyntaxTree, scopes: &ScopeTree) -> Vec<GlobalRef> {
    let mut globals: BTreeMap<String, GlobalRef> = BTreeMap::new();
    for node in tree.root().descendants().filter(|n| n.kind() == NAME_REF) {
        let Some(name) = ast::ident_text(&node) else {
            continue;
        };
        if scopes.resolve(&name, scopes.scope_of(&node)).is_some() {
            continue;
        }
        let access = usage::reference_access(&node);
        let entry = globals.entry(name.clone()).or_insert_with(|| GlobalRef {
            name,
            sites: Vec::new(),
            read: false,
            written: false,
        });
        entry.read |= access.reads();
        entry.written |= matches!(access, UsageRole::Write | UsageRole::ReadWrite);
        entry.sites.push(node);
    }
    globals.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals(source: &str) -> Vec<(String, bool, bool)> {
        let tree = SyntaxTree::parse(source).unwrap();
        let scopes = ScopeTree::build(&tree);
        find_globals(&tree, &scopes)
            .into_iter()
            .map(|g| (g.name, g.read, g.written))
            .collect()
    }

    #[test]
    fn reports_unresolved_names_with_access() {
        let found = globals("var a = b; function f(c) { d = c + a; return window.e; }");
        assert_eq!(
            found,
            [
                ("b".to_string(), true, false),
                ("d".to_string(), false, true),
                ("window".to_string(), true, false),
            ]
        );
    }

    #[test]
    fn hoisted_declarations_are_not_globals() {
        assert!(globals("f(); x = 1; function f() {} var x;").is_empty());
    }

    #[test]
    fn block_bindings_do_not_leak() {
        let found = globals("{ let t = 1; } t = 2;");
        assert_eq!(found, [("t".to_string(), false, true)]);
    }

    #[test]
    fn arguments_only_inside_non_arrow_functions() {
        let found = globals("function f() { return arguments; }\nvar g = () => arguments;");
        assert_eq!(found, [("arguments".to_string(), true, false)]);
    }
}
