//! Typed queries over the untyped syntax tree.
//!
//! Every helper returns node handles in document order. None of them look at
//! identifier text to decide structure; kinds alone do that.

use super::SyntaxKind::{self, *};
use super::{SyntaxElement, SyntaxNode, SyntaxToken, TextRange, TextSize};
use rowan::{NodeOrToken, WalkEvent};

/// Kind of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Let => "let",
            DeclKind::Const => "const",
        }
    }
}

/// Text of the identifier token of a `NAME` or `NAME_REF` node.
pub fn ident_text(node: &SyntaxNode) -> Option<String> {
    ident_token(node).map(|token| token.text().to_string())
}

pub fn ident_token(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(NodeOrToken::into_token)
        .find(|token| token.kind() == IDENT)
}

pub fn is_identifier(node: &SyntaxNode) -> bool {
    matches!(node.kind(), NAME | NAME_REF)
}

/// Nodes holding an ordered statement list.
pub fn is_statement_list(node: &SyntaxNode) -> bool {
    matches!(node.kind(), SOURCE_FILE | BLOCK_STMT | SWITCH_CASE)
}

pub fn statements(list: &SyntaxNode) -> impl Iterator<Item = SyntaxNode> + use<> {
    list.children().filter(|node| node.kind().is_statement())
}

/// A leading `'use strict'`-style string expression statement.
pub fn is_directive(stmt: &SyntaxNode) -> bool {
    stmt.kind() == EXPR_STMT
        && stmt.children().count() == 1
        && stmt.first_child().is_some_and(|expr| {
            expr.kind() == LITERAL && expr.first_token().is_some_and(|t| t.kind() == STRING)
        })
}

pub fn decl_kind(decl: &SyntaxNode) -> Option<DeclKind> {
    let keyword = significant_tokens(decl).next()?;
    match keyword.kind() {
        VAR_KW => Some(DeclKind::Var),
        CONST_KW => Some(DeclKind::Const),
        IDENT if keyword.text() == "let" => Some(DeclKind::Let),
        _ => None,
    }
}

pub fn declarators(decl: &SyntaxNode) -> Vec<SyntaxNode> {
    decl.children().filter(|n| n.kind() == DECLARATOR).collect()
}

/// The binding target of a declarator: a `NAME` or a pattern.
pub fn declarator_target(declarator: &SyntaxNode) -> Option<SyntaxNode> {
    declarator.first_child()
}

/// The declarator's identifier when its target is a plain name.
pub fn declarator_name(declarator: &SyntaxNode) -> Option<String> {
    declarator_target(declarator)
        .filter(|target| target.kind() == NAME)
        .and_then(|name| ident_text(&name))
}

pub fn declarator_init(declarator: &SyntaxNode) -> Option<SyntaxNode> {
    node_after_token(declarator, EQ)
}

/// First child node following the first token of `kind` among `node`'s children.
pub fn node_after_token(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxNode> {
    node.children_with_tokens()
        .skip_while(|element| element.kind() != kind)
        .skip(1)
        .find_map(NodeOrToken::into_node)
}

pub fn has_token(node: &SyntaxNode, kind: SyntaxKind) -> bool {
    node.children_with_tokens()
        .any(|element| element.kind() == kind)
}

pub fn function_body(function: &SyntaxNode) -> Option<SyntaxNode> {
    function.children().find(|n| n.kind() == BLOCK_STMT)
}

pub fn param_list(function: &SyntaxNode) -> Option<SyntaxNode> {
    function.children().find(|n| n.kind() == PARAM_LIST)
}

pub fn params(function: &SyntaxNode) -> Vec<SyntaxNode> {
    param_list(function)
        .map(|list| list.children().collect())
        .unwrap_or_default()
}

/// The declared name of a function or class.
pub fn own_name(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.children().find(|n| n.kind() == NAME)
}

/// Parts of an `ASSIGN_EXPR`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: SyntaxNode,
    pub operator: SyntaxToken,
    pub value: SyntaxNode,
}

impl Assignment {
    pub fn is_plain(&self) -> bool {
        self.operator.kind() == EQ
    }
}

pub fn assignment(node: &SyntaxNode) -> Option<Assignment> {
    if node.kind() != ASSIGN_EXPR {
        return None;
    }
    let target = node.first_child()?;
    let operator = node
        .children_with_tokens()
        .filter_map(NodeOrToken::into_token)
        .find(|t| matches!(t.kind(), EQ | ASSIGN_OP))?;
    let value = node.children().nth(1)?;
    Some(Assignment {
        target,
        operator,
        value,
    })
}

/// Test, consequent and alternate of an `IF_STMT` or `COND_EXPR`.
pub fn branches(node: &SyntaxNode) -> (Option<SyntaxNode>, Option<SyntaxNode>, Option<SyntaxNode>) {
    let mut children = node.children();
    (children.next(), children.next(), children.next())
}

/// Strips any number of enclosing parentheses.
pub fn unparen(node: &SyntaxNode) -> SyntaxNode {
    let mut current = node.clone();
    while current.kind() == PAREN_EXPR {
        match current.first_child() {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Key text of a `PROPERTY`, `METHOD` or `CLASS_PROPERTY` when it is a plain name.
pub fn property_key(node: &SyntaxNode) -> Option<String> {
    let key = node.children().find(|n| n.kind() == PROP_KEY)?;
    let token = significant_tokens(&key).next()?;
    if token.kind() == IDENT || token.kind().is_keyword() {
        Some(token.text().to_string())
    } else {
        None
    }
}

/// The value expression of a `PROPERTY` or `CLASS_PROPERTY`.
pub fn property_value(node: &SyntaxNode) -> Option<SyntaxNode> {
    match node.kind() {
        PROPERTY => node_after_token(node, COLON),
        CLASS_PROPERTY => node_after_token(node, EQ),
        _ => None,
    }
}

/// A `PROPERTY` written as `{ name }`.
pub fn is_shorthand_property(node: &SyntaxNode) -> bool {
    node.kind() == PROPERTY && node.first_child().is_some_and(|child| child.kind() == NAME_REF)
}

/// Property name of a non-computed `MEMBER_EXPR`.
pub fn member_property(member: &SyntaxNode) -> Option<SyntaxToken> {
    if member.kind() != MEMBER_EXPR {
        return None;
    }
    member
        .children_with_tokens()
        .filter_map(NodeOrToken::into_token)
        .filter(|t| !t.kind().is_trivia())
        .last()
        .filter(|t| t.kind() == IDENT || t.kind().is_keyword())
}

pub fn significant_tokens(node: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> + use<> {
    node.descendants_with_tokens()
        .filter_map(NodeOrToken::into_token)
        .filter(|t| !t.kind().is_trivia())
}

/// Range from the first to the last significant token, leaving out the
/// comments a statement carries.
pub fn code_range(node: &SyntaxNode) -> TextRange {
    let mut tokens = significant_tokens(node);
    let Some(first) = tokens.next() else {
        return node.text_range();
    };
    let last = tokens.last().unwrap_or_else(|| first.clone());
    TextRange::new(first.text_range().start(), last.text_range().end())
}

pub fn code_text(node: &SyntaxNode) -> String {
    let range = code_range(node) - node.text_range().start();
    node.text().slice(range).to_string()
}

/// Whether a statement ends with an explicit semicolon.
pub fn has_semicolon(stmt: &SyntaxNode) -> bool {
    significant_tokens(stmt)
        .last()
        .is_some_and(|t| t.kind() == SEMICOLON)
}

/// Whether evaluating `expr` may have an observable effect beyond
/// producing its value. Function and class bodies are not evaluated.
pub fn has_side_effects(expr: &SyntaxNode) -> bool {
    let mut preorder = expr.preorder();
    while let Some(event) = preorder.next() {
        let WalkEvent::Enter(node) = event else {
            continue;
        };
        match node.kind() {
            CALL_EXPR | NEW_EXPR | ASSIGN_EXPR | POSTFIX_EXPR | TAGGED_TEMPLATE => return true,
            PREFIX_EXPR => {
                let effectful = node.first_token().is_some_and(|t| {
                    matches!(t.kind(), UPDATE_OP | DELETE_KW)
                        || (t.kind() == IDENT && matches!(t.text(), "await" | "yield"))
                });
                if effectful {
                    return true;
                }
            }
            FUNCTION_EXPR | ARROW_FUNCTION | CLASS_EXPR if node != *expr => {
                preorder.skip_subtree();
            }
            _ => {}
        }
    }
    false
}

/// Leading and trailing comments a statement carries, so that a replacement
/// keeps them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPayload {
    pub leading: String,
    pub trailing: String,
}

impl CommentPayload {
    pub fn of(stmt: &SyntaxNode) -> Self {
        let full = stmt.text_range();
        let code = code_range(stmt);
        let text = stmt.text().to_string();
        let start = usize::from(code.start() - full.start());
        let end = usize::from(code.end() - full.start());
        CommentPayload {
            leading: text[..start].to_string(),
            trailing: text[end..].to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty()
    }

    /// Surrounds replacement code with the carried comments.
    pub fn wrap(&self, code: &str) -> String {
        format!("{}{}{}", self.leading, code, self.trailing)
    }
}

/// Whitespace at the start of the line containing `offset`.
pub fn line_indent(source: &str, offset: TextSize) -> &str {
    let offset = usize::from(offset).min(source.len());
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}

pub fn prev_token_sibling(element: &SyntaxElement) -> Option<SyntaxToken> {
    let prev = match element {
        NodeOrToken::Node(node) => node.prev_sibling_or_token(),
        NodeOrToken::Token(token) => token.prev_sibling_or_token(),
    };
    prev.and_then(NodeOrToken::into_token)
}

pub fn next_token_sibling(element: &SyntaxElement) -> Option<SyntaxToken> {
    let next = match element {
        NodeOrToken::Node(node) => node.next_sibling_or_token(),
        NodeOrToken::Token(token) => token.next_sibling_or_token(),
    };
    next.and_then(NodeOrToken::into_token)
}
