//! Lexical scopes of a syntax tree.
//!
//! Scopes live in an arena indexed by [`ScopeId`]; each records its parent,
//! its children and the bindings it declares. The tree is rebuilt from
//! scratch after every rewrite, so nothing here is ever mutated after
//! [`ScopeTree::build`] returns.

use crate::syntax::SyntaxKind::*;
use crate::syntax::ast::{self, DeclKind};
use crate::syntax::{SyntaxNode, SyntaxTree, TextSize, WalkEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    Program,
    Block,
    Function,
    Catch,
    Object,
    SwitchCase,
    ForHeader,
}

impl ScopeKind {
    /// The kind of scope `node` opens, if any.
    pub fn of(node: &SyntaxNode) -> Option<ScopeKind> {
        let kind = match node.kind() {
            SOURCE_FILE => ScopeKind::Program,
            FUNCTION_DECL | FUNCTION_EXPR | ARROW_FUNCTION | METHOD => ScopeKind::Function,
            CATCH_CLAUSE => ScopeKind::Catch,
            OBJECT_EXPR => ScopeKind::Object,
            SWITCH_CASE => ScopeKind::SwitchCase,
            FOR_STMT | FOR_IN_STMT | FOR_OF_STMT => ScopeKind::ForHeader,
            BLOCK_STMT => {
                let owned = node
                    .parent()
                    .is_some_and(|p| p.kind().is_function() || p.kind() == CATCH_CLAUSE);
                if owned {
                    return None;
                }
                ScopeKind::Block
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Whether `var` declarations hoist to this scope.
    pub fn is_hoisting(self) -> bool {
        matches!(self, ScopeKind::Program | ScopeKind::Function)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Program => "program",
            ScopeKind::Block => "block",
            ScopeKind::Function => "function",
            ScopeKind::Catch => "catch",
            ScopeKind::Object => "object",
            ScopeKind::SwitchCase => "switch-case",
            ScopeKind::ForHeader => "for-header",
        };
        f.write_str(name)
    }
}

/// Stable identity of a scope within one tree version: the start offset of
/// its node. Kinds break ties between scopes starting at the same byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    pub start: TextSize,
    pub kind: ScopeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Param,
    CatchParam,
    Import,
    /// The own name of a function expression, visible only inside it.
    SelfName,
}

impl BindingKind {
    fn from_decl(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Var => BindingKind::Var,
            DeclKind::Let => BindingKind::Let,
            DeclKind::Const => BindingKind::Const,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// The `NAME` node that introduces the binding.
    pub node: SyntaxNode,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub node: SyntaxNode,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub bindings: Vec<Binding>,
}

impl Scope {
    pub fn key(&self) -> ScopeKey {
        ScopeKey {
            start: self.node.text_range().start(),
            kind: self.kind,
        }
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    /// Non-arrow functions bind `arguments` implicitly.
    pub fn binds_arguments(&self) -> bool {
        self.kind == ScopeKind::Function && self.node.kind() != ARROW_FUNCTION
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_node: HashMap<SyntaxNode, ScopeId>,
}

impl ScopeTree {
    /// Builds the scope tree of `tree` and records every declaration.
    pub fn build(tree: &SyntaxTree) -> ScopeTree {
        let mut scopes = ScopeTree {
            scopes: Vec::new(),
            by_node: HashMap::new(),
        };
        let mut stack: Vec<ScopeId> = Vec::new();

        for event in tree.root().preorder() {
            match event {
                WalkEvent::Enter(node) => {
                    if let Some(kind) = ScopeKind::of(&node) {
                        let id = scopes.push(kind, node.clone(), stack.last().copied());
                        stack.push(id);
                    }
                    if node.kind() == NAME
                        && let Some(&current) = stack.last()
                    {
                        scopes.declare(&node, current);
                    }
                }
                WalkEvent::Leave(node) => {
                    if ScopeKind::of(&node).is_some() {
                        stack.pop();
                    }
                }
            }
        }
        scopes
    }

    fn push(&mut self, kind: ScopeKind, node: SyntaxNode, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        if let Some(parent) = parent {
            self.scopes[parent.index()].children.push(id);
        }
        self.by_node.insert(node.clone(), id);
        self.scopes.push(Scope {
            kind,
            node,
            parent,
            children: Vec::new(),
            bindings: Vec::new(),
        });
        id
    }

    fn declare(&mut self, name: &SyntaxNode, current: ScopeId) {
        let Some((kind, target)) = self.binding_site(name, current) else {
            return;
        };
        let Some(text) = ast::ident_text(name) else {
            return;
        };
        let scope = &mut self.scopes[target.index()];
        if !scope.declares(&text) {
            scope.bindings.push(Binding {
                name: text,
                kind,
                node: name.clone(),
            });
        }
    }

    /// Classifies a `NAME` node and picks the scope its binding lands in.
    fn binding_site(&self, name: &SyntaxNode, current: ScopeId) -> Option<(BindingKind, ScopeId)> {
        let owner = binding_owner(name)?;
        let site = match owner.kind() {
            DECLARATOR => {
                let decl = owner.parent()?;
                let kind = BindingKind::from_decl(ast::decl_kind(&decl)?);
                let target = if kind == BindingKind::Var {
                    self.hoisting_scope(current)
                } else {
                    self.lexical_scope(current)
                };
                (kind, target)
            }
            PARAM_LIST => (BindingKind::Param, current),
            CATCH_CLAUSE => (BindingKind::CatchParam, current),
            FUNCTION_DECL => {
                let parent = self.scope(current).parent.unwrap_or(current);
                (BindingKind::Function, self.hoisting_scope(parent))
            }
            FUNCTION_EXPR => (BindingKind::SelfName, current),
            CLASS_DECL => (BindingKind::Class, self.lexical_scope(current)),
            IMPORT_DECL => (BindingKind::Import, self.root()),
            _ => return None,
        };
        Some(site)
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, scope)| (ScopeId(i as u32), scope))
    }

    /// The scope opened by `node` itself.
    pub fn opened_by(&self, node: &SyntaxNode) -> Option<ScopeId> {
        self.by_node.get(node).copied()
    }

    /// The innermost scope containing `node` (the scope `node` opens, if any).
    pub fn scope_of(&self, node: &SyntaxNode) -> ScopeId {
        node.ancestors()
            .find_map(|n| self.opened_by(&n))
            .unwrap_or_else(|| self.root())
    }

    /// `id` followed by its ancestors up to the program scope.
    pub fn chain(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.scope(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Nearest function or program scope at or above `id`.
    pub fn hoisting_scope(&self, id: ScopeId) -> ScopeId {
        self.chain(id)
            .into_iter()
            .find(|&s| self.scope(s).kind.is_hoisting())
            .unwrap_or_else(|| self.root())
    }

    /// Nearest scope at or above `id` that can hold lexical declarations.
    pub fn lexical_scope(&self, id: ScopeId) -> ScopeId {
        self.chain(id)
            .into_iter()
            .find(|&s| self.scope(s).kind != ScopeKind::Object)
            .unwrap_or_else(|| self.root())
    }

    /// The scope that declares `name` as seen from `from`.
    pub fn resolve(&self, name: &str, from: ScopeId) -> Option<ScopeId> {
        self.chain(from).into_iter().find(|&id| {
            let scope = self.scope(id);
            scope.declares(name) || (name == "arguments" && scope.binds_arguments())
        })
    }

    pub fn binding(&self, name: &str, from: ScopeId) -> Option<&Binding> {
        self.resolve(name, from)
            .and_then(|id| self.scope(id).binding(name))
    }
}

/// Climbs out of destructuring patterns to the construct that owns a
/// binding name.
fn binding_owner(name: &SyntaxNode) -> Option<SyntaxNode> {
    let mut current = name.parent()?;
    while matches!(
        current.kind(),
        OBJECT_PATTERN | ARRAY_PATTERN | PATTERN_PROP | ASSIGN_PATTERN | REST_PATTERN
    ) {
        current = current.parent()?;
    }
    Some(current)
}

/// Whether a `NAME` node is a function or catch parameter.
pub fn is_parameter(name: &SyntaxNode) -> bool {
    binding_owner(name).is_some_and(|owner| matches!(owner.kind(), PARAM_LIST | CATCH_CLAUSE))
}

/// Whether a `NAME` node is declared by a variable declarator.
pub fn is_declarator_name(name: &SyntaxNode) -> bool {
    binding_owner(name).is_some_and(|owner| owner.kind() == DECLARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> (SyntaxTree, ScopeTree) {
        let tree = SyntaxTree::parse(source).unwrap();
        let scopes = ScopeTree::build(&tree);
        (tree, scopes)
    }

    fn names(scope: &Scope) -> Vec<&str> {
        scope.bindings.iter().map(|b| b.name.as_str()).collect()
    }

    fn kinds(scopes: &ScopeTree) -> Vec<ScopeKind> {
        scopes.iter().map(|(_, s)| s.kind).collect()
    }

    #[test]
    fn function_and_catch_bodies_are_not_blocks() {
        let (_, scopes) = build("function f() { try { g(); } catch (e) { h(e); } }");
        assert_eq!(
            kinds(&scopes),
            [
                ScopeKind::Program,
                ScopeKind::Function,
                ScopeKind::Block,
                ScopeKind::Catch
            ]
        );
    }

    #[test]
    fn var_hoists_past_blocks() {
        let (_, scopes) = build("function f() { if (x) { var a = 1; let b = 2; } }");
        let function = scopes.scope(scopes.root()).children[0];
        assert_eq!(names(scopes.scope(function)), ["a"]);
        let block = scopes.scope(function).children[0];
        assert_eq!(names(scopes.scope(block)), ["b"]);
    }

    #[test]
    fn function_declaration_name_binds_outside() {
        let (_, scopes) = build("function outer(p) { function inner() {} }");
        let root = scopes.scope(scopes.root());
        assert_eq!(names(root), ["outer"]);
        let outer = scopes.scope(root.children[0]);
        assert_eq!(names(outer), ["p", "inner"]);
    }

    #[test]
    fn for_header_holds_let_but_not_var() {
        let (_, scopes) = build("for (let i = 0; i < 1; i++) {}\nfor (var j in o) {}");
        let root = scopes.scope(scopes.root());
        assert_eq!(names(root), ["j"]);
        let header = scopes.scope(root.children[0]);
        assert_eq!(header.kind, ScopeKind::ForHeader);
        assert_eq!(names(header), ["i"]);
    }

    #[test]
    fn destructured_bindings_and_imports() {
        let (_, scopes) = build("import a, { b as c } from 'm';\nconst { d, e: [f] } = a;");
        assert_eq!(names(scopes.scope(scopes.root())), ["a", "c", "d", "f"]);
    }

    #[test]
    fn resolve_walks_outward_and_knows_arguments() {
        let (tree, scopes) = build("var x; function f() { return () => arguments[0] + x; }");
        let arrow = tree
            .root()
            .descendants()
            .find(|n| n.kind() == ARROW_FUNCTION)
            .unwrap();
        let arrow_scope = scopes.opened_by(&arrow).unwrap();
        assert_eq!(scopes.resolve("x", arrow_scope), Some(scopes.root()));
        let function = scopes.scope(scopes.root()).children[0];
        assert_eq!(scopes.resolve("arguments", arrow_scope), Some(function));
        assert_eq!(scopes.resolve("y", arrow_scope), None);
    }

    #[test]
    fn object_literals_open_scopes_that_hold_nothing() {
        let (_, scopes) = build("var ns = { a: function () { let t; } };");
        let root = scopes.scope(scopes.root());
        assert_eq!(names(root), ["ns"]);
        let object = scopes.scope(root.children[0]);
        assert_eq!(object.kind, ScopeKind::Object);
        assert!(object.bindings.is_empty());
    }

    #[test]
    fn catch_parameter_binds_in_catch_scope() {
        let (_, scopes) = build("try {} catch (err) {}");
        let catch = scopes
            .iter()
            .find(|(_, s)| s.kind == ScopeKind::Catch)
            .unwrap()
            .1;
        assert_eq!(names(catch), ["err"]);
    }
}
