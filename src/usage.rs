//! Usage index: every place a name occurs within a subtree.
//!
//! Matching is done on identifier nodes only. Object keys and member property
//! names are plain tokens in the tree, so `o.name` and `{ name: 1 }` never
//! count as uses of `name`.

use crate::scope::{self, ScopeId, ScopeKey, ScopeTree};
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::{SyntaxNode, TextRange};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageRole {
    Read,
    Write,
    ReadWrite,
    /// The target of a variable declarator.
    Declarator,
    /// Any other declaring occurrence: a function, class or import name.
    Binding,
}

impl UsageRole {
    pub fn reads(self) -> bool {
        matches!(self, UsageRole::Read | UsageRole::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, UsageRole::Write | UsageRole::ReadWrite)
    }
}

#[derive(Debug, Clone)]
pub struct UsageSite {
    /// A `NAME` or `NAME_REF` node.
    pub node: SyntaxNode,
    pub scope: ScopeId,
    pub role: UsageRole,
}

impl UsageSite {
    pub fn range(&self) -> TextRange {
        self.node.text_range()
    }
}

/// Usage sites of one name in document order.
#[derive(Debug, Clone, Default)]
pub struct Usages {
    sites: Vec<UsageSite>,
}

impl Usages {
    pub fn sites(&self) -> &[UsageSite] {
        &self.sites
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn ranges(&self) -> Vec<TextRange> {
        self.sites.iter().map(UsageSite::range).collect()
    }

    /// Sites grouped by their nearest enclosing scope, in scope order.
    pub fn by_scope(&self, scopes: &ScopeTree) -> BTreeMap<ScopeKey, Vec<&UsageSite>> {
        let mut grouped: BTreeMap<ScopeKey, Vec<&UsageSite>> = BTreeMap::new();
        for site in &self.sites {
            grouped
                .entry(scopes.scope(site.scope).key())
                .or_default()
                .push(site);
        }
        grouped
    }

    /// Per-scope groups merged by the top-level subtree they sit in: the
    /// child of the program scope on the scope's chain, or the program itself
    /// for sites directly at program level. Sites stay in document order.
    pub fn by_top_level_scope(&self, scopes: &ScopeTree) -> BTreeMap<ScopeKey, Vec<&UsageSite>> {
        let mut merged: BTreeMap<ScopeKey, Vec<&UsageSite>> = BTreeMap::new();
        for sites in self.by_scope(scopes).into_values() {
            let Some(first) = sites.first() else {
                continue;
            };
            let chain = scopes.chain(first.scope);
            let top = chain[chain.len().saturating_sub(2)];
            merged.entry(scopes.scope(top).key()).or_default().extend(sites);
        }
        for sites in merged.values_mut() {
            sites.sort_by_key(|site| site.range().start());
        }
        merged
    }

    pub fn retain(&mut self, keep: impl FnMut(&UsageSite) -> bool) {
        self.sites.retain(keep);
    }
}

/// Collects the usages of `name` under `within`.
///
/// With `origin`, only identifier nodes whose ranges appear there are kept;
/// this pins the search to the occurrences found by an earlier scan of the
/// same tree version. Parameter names are never included.
pub fn find(
    scopes: &ScopeTree,
    within: &SyntaxNode,
    name: &str,
    origin: Option<&[TextRange]>,
) -> Usages {
    let sites = within
        .descendants()
        .filter(|node| ast::is_identifier(node))
        .filter(|node| ast::ident_text(node).as_deref() == Some(name))
        .filter(|node| origin.is_none_or(|ranges| ranges.contains(&node.text_range())))
        .filter_map(|node| {
            let role = role_of(&node)?;
            Some(UsageSite {
                scope: scopes.scope_of(&node),
                node,
                role,
            })
        })
        .collect();
    Usages { sites }
}

/// Role of an identifier occurrence; `None` for parameters.
pub fn role_of(node: &SyntaxNode) -> Option<UsageRole> {
    if node.kind() == NAME {
        if scope::is_parameter(node) {
            return None;
        }
        return Some(if scope::is_declarator_name(node) {
            UsageRole::Declarator
        } else {
            UsageRole::Binding
        });
    }
    Some(reference_access(node))
}

/// How a `NAME_REF` is accessed.
pub fn reference_access(node: &SyntaxNode) -> UsageRole {
    let Some(parent) = node.parent() else {
        return UsageRole::Read;
    };
    match parent.kind() {
        ASSIGN_EXPR => match ast::assignment(&parent) {
            Some(assign) if assign.target == *node => {
                if assign.is_plain() {
                    UsageRole::Write
                } else {
                    UsageRole::ReadWrite
                }
            }
            _ => UsageRole::Read,
        },
        PREFIX_EXPR | POSTFIX_EXPR if ast::has_token(&parent, UPDATE_OP) => UsageRole::ReadWrite,
        FOR_IN_STMT | FOR_OF_STMT if parent.first_child().as_ref() == Some(node) => {
            UsageRole::Write
        }
        _ => UsageRole::Read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxTree;

    fn roles(source: &str, name: &str) -> Vec<UsageRole> {
        let tree = SyntaxTree::parse(source).unwrap();
        let scopes = ScopeTree::build(&tree);
        find(&scopes, tree.root(), name, None)
            .sites()
            .iter()
            .map(|s| s.role)
            .collect()
    }

    #[test]
    fn classifies_access() {
        use UsageRole::*;
        assert_eq!(
            roles("a = 1; a += 2; a++; --a; f(a); for (a in o) {}", "a"),
            [Write, ReadWrite, ReadWrite, ReadWrite, Read, Write]
        );
    }

    #[test]
    fn keys_and_members_are_not_usages() {
        let source = "var o = { name: 1, [name]: 2 }; o.name = name;";
        assert_eq!(
            roles(source, "name"),
            [UsageRole::Read, UsageRole::Read]
        );
    }

    #[test]
    fn declarators_and_bindings() {
        use UsageRole::*;
        assert_eq!(
            roles("var f = 1; function f() {} class f {}", "f"),
            [Declarator, Binding, Binding]
        );
    }

    #[test]
    fn parameters_are_excluded() {
        assert_eq!(roles("function g(p, { p: q }) { return p; }", "p"), [UsageRole::Read]);
    }

    #[test]
    fn origin_pins_occurrences() {
        let tree = SyntaxTree::parse("a = 1; a = 2;").unwrap();
        let scopes = ScopeTree::build(&tree);
        let all = find(&scopes, tree.root(), "a", None);
        let first = [all.sites()[0].range()];
        let pinned = find(&scopes, tree.root(), "a", Some(&first));
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned.ranges(), first);
    }

    #[test]
    fn groups_by_scope_in_document_order() {
        let tree = SyntaxTree::parse("x = 1;\nfunction f() { x = 2; }\n{ x; }").unwrap();
        let scopes = ScopeTree::build(&tree);
        let usages = find(&scopes, tree.root(), "x", None);
        let grouped = usages.by_scope(&scopes);
        let kinds: Vec<_> = grouped.keys().map(|k| k.kind).collect();
        assert_eq!(
            kinds,
            [
                crate::scope::ScopeKind::Program,
                crate::scope::ScopeKind::Function,
                crate::scope::ScopeKind::Block
            ]
        );
    }

    #[test]
    fn groups_by_top_level_scope_in_document_order() {
        let tree =
            SyntaxTree::parse("x = 1;\nfunction f() { x = 2; { x; } }\n{ x; }").unwrap();
        let scopes = ScopeTree::build(&tree);
        let usages = find(&scopes, tree.root(), "x", None);
        let grouped = usages.by_top_level_scope(&scopes);
        let shape: Vec<_> = grouped.iter().map(|(k, sites)| (k.kind, sites.len())).collect();
        assert_eq!(
            shape,
            [
                (crate::scope::ScopeKind::Program, 1),
                (crate::scope::ScopeKind::Function, 2),
                (crate::scope::ScopeKind::Block, 1)
            ]
        );
    }
}
