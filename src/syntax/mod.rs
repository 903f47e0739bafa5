//! Lossless JavaScript syntax trees.
//!
//! Source text is tokenized and parsed into a `rowan` green tree in which every
//! byte of the input, whitespace and comments included, is owned by exactly one
//! token. Printing a tree is therefore just concatenating its tokens, and any
//! region that no edit touched comes back byte-identical.
//!
//! Comments that directly precede a statement, and a line comment trailing it
//! on the same line, are placed inside that statement's node so they travel
//! with it when the statement is moved or replaced.

pub mod ast;
mod kind;
mod lexer;
mod parser;

pub use kind::SyntaxKind;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JsLanguage {}

impl rowan::Language for JsLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> SyntaxKind {
        SyntaxKind::from_raw(raw.0)
    }

    fn kind_to_raw(kind: SyntaxKind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<JsLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<JsLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<JsLanguage>;
pub use rowan::{TextRange, TextSize, WalkEvent};

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: SyntaxNode,
}

impl SyntaxTree {
    /// Parses `source` into a lossless tree.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let green = parser::parse(source)?;
        Ok(SyntaxTree {
            root: SyntaxNode::new_root(green),
        })
    }

    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    /// Prints the tree back to source text.
    pub fn text(&self) -> String {
        self.root.to_string()
    }
}

/// Malformed source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset of the offending input.
    pub offset: usize,
    /// Line number, 1-indexed.
    pub line: usize,
    /// Column number, 1-indexed.
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at(source: &str, offset: usize, message: impl fmt::Display) -> Self {
        let (line, column) = offset_to_line_col(source, offset);
        ParseError {
            message: message.to_string(),
            offset,
            line,
            column,
        }
    }
}

/// Converts a byte offset into a 1-indexed line and column.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Renders the node structure of `node`, one element per line. Used by tests.
#[cfg(test)]
pub(crate) fn debug_tree(node: &SyntaxNode) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let mut depth = 0;
    for event in node.preorder_with_tokens() {
        match event {
            WalkEvent::Enter(element) => {
                match &element {
                    rowan::NodeOrToken::Node(node) => {
                        let _ = writeln!(out, "{}{:?}", "  ".repeat(depth), node.kind());
                    }
                    rowan::NodeOrToken::Token(token) if !token.kind().is_trivia() => {
                        let _ = writeln!(
                            out,
                            "{}{:?} {:?}",
                            "  ".repeat(depth),
                            token.kind(),
                            token.text()
                        );
                    }
                    rowan::NodeOrToken::Token(_) => {}
                }
                if element.as_node().is_some() {
                    depth += 1;
                }
            }
            WalkEvent::Leave(element) => {
                if element.as_node().is_some() {
                    depth -= 1;
                }
            }
        }
    }
    out
}
