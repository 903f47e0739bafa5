//! Collapses `else { if (..) .. }` into `else if (..) ..`.

use super::{Rule, Snippet, Step};
use crate::context::FileContext;
use crate::rewriter::EditSet;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast::{self, CommentPayload};
use crate::syntax::SyntaxNode;

pub struct LonelyIf;

/// The `if` that is alone in the `else` block of `stmt`, with that block.
fn lonely(stmt: &SyntaxNode) -> Option<(SyntaxNode, SyntaxNode)> {
    if stmt.kind() != IF_STMT {
        return None;
    }
    let (_, _, alternate) = ast::branches(stmt);
    let block = alternate.filter(|alt| alt.kind() == BLOCK_STMT)?;
    let has_comment = block
        .children_with_tokens()
        .any(|element| element.kind().is_comment());
    if has_comment || !CommentPayload::of(&block).is_empty() {
        return None;
    }
    let mut inner = ast::statements(&block);
    let only = inner.next().filter(|s| s.kind() == IF_STMT)?;
    if inner.next().is_some() || !CommentPayload::of(&only).is_empty() {
        return None;
    }
    Some((only, block))
}

fn candidates(cx: &FileContext) -> impl Iterator<Item = (SyntaxNode, SyntaxNode)> + use<> {
    cx.root().descendants().filter_map(|node| lonely(&node))
}

/// Code of `stmt` with continuation lines shifted left by `width` columns.
fn dedent(stmt: &SyntaxNode, width: usize) -> String {
    let code = ast::code_text(stmt);
    let multiline_literal = ast::significant_tokens(stmt)
        .any(|t| matches!(t.kind(), TEMPLATE_CHUNK | STRING) && t.text().contains('\n'));
    if width == 0 || multiline_literal {
        return code;
    }
    let mut lines = code.split('\n');
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        let strip = line
            .char_indices()
            .take(width)
            .take_while(|(_, c)| *c == ' ' || *c == '\t')
            .count();
        out.push('\n');
        out.push_str(&line[strip..]);
    }
    out
}

impl Rule for LonelyIf {
    type Symbol = Snippet;

    const NAME: &'static str = "no-lonely-if";

    fn eligible(&self, cx: &FileContext) -> Vec<Snippet> {
        let mut found: Vec<Snippet> = Vec::new();
        for (inner, _) in candidates(cx) {
            let snippet = Snippet::of(&inner);
            if !found.contains(&snippet) {
                found.push(snippet);
            }
        }
        found
    }

    fn step(&self, cx: &FileContext, symbol: &Snippet) -> Step {
        let Some((inner, block)) = candidates(cx).find(|(inner, _)| symbol.matches(inner)) else {
            return Step::Done;
        };
        let outer = ast::line_indent(cx.source(), block.text_range().start());
        let own = ast::line_indent(cx.source(), inner.text_range().start());
        let width = own.strip_prefix(outer).map_or(0, str::len);
        let mut edits = EditSet::new();
        edits.replace(ast::code_range(&block), dedent(&inner, width));
        Step::edit(edits)
    }
}
