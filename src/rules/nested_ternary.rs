//! Turns nested conditional expressions into an immediately invoked
//! function of `if`/`else` branches.

use super::{Rule, Snippet, Step};
use crate::context::FileContext;
use crate::layout;
use crate::report::DiagnosticKind;
use crate::rewriter::EditSet;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::SyntaxNode;

const INDENT: &str = "  ";

pub struct NestedTernary;

/// Parent of `node` after stepping out of parentheses.
fn outer_parent(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.ancestors().skip(1).find(|n| n.kind() != PAREN_EXPR)
}

fn is_conditional(node: &Option<SyntaxNode>) -> bool {
    node.as_ref()
        .is_some_and(|n| ast::unparen(n).kind() == COND_EXPR)
}

/// An outermost conditional with a conditional branch, in a position whose
/// value can come from a function call.
fn is_nested_ternary(node: &SyntaxNode) -> bool {
    if node.kind() != COND_EXPR {
        return false;
    }
    let (_, consequent, alternate) = ast::branches(node);
    if !is_conditional(&consequent) && !is_conditional(&alternate) {
        return false;
    }
    let Some(parent) = outer_parent(node) else {
        return false;
    };
    match parent.kind() {
        COND_EXPR => false,
        DECLARATOR | ASSIGN_EXPR => ast::node_after_token(&parent, EQ)
            .or_else(|| ast::node_after_token(&parent, ASSIGN_OP))
            .is_some_and(|value| value.text_range().contains_range(node.text_range())),
        PROPERTY => ast::property_value(&parent)
            .is_some_and(|value| value.text_range().contains_range(node.text_range())),
        BINARY_EXPR | RETURN_STMT | ARG_LIST => true,
        _ => false,
    }
}

/// Why a conditional cannot move into a function of its own.
fn blocker(node: &SyntaxNode) -> Option<&'static str> {
    node.descendants_with_tokens().find_map(|element| match element.kind() {
        THIS_KW => Some("`this` would change meaning"),
        SUPER_KW => Some("`super` would change meaning"),
        IDENT => match element.as_token().map(|t| t.text()) {
            Some("arguments") => Some("`arguments` would change meaning"),
            Some("await") if element.parent().is_some_and(|p| p.kind() == PREFIX_EXPR) => {
                Some("`await` is not allowed in the new function")
            }
            Some("yield") if element.parent().is_some_and(|p| p.kind() == PREFIX_EXPR) => {
                Some("`yield` is not allowed in the new function")
            }
            _ => None,
        },
        _ => None,
    })
}

/// Writes `if (test) { ... } else ...` for a conditional, nesting branches
/// that are conditionals themselves.
fn render_if(cond: &SyntaxNode, indent: &str, eol: &str, out: &mut String) {
    let (test, consequent, alternate) = ast::branches(cond);
    let test = test.map(|t| ast::code_text(&t)).unwrap_or_default();
    out.push_str(&format!("if ({test}) {{{eol}"));
    render_branch(consequent.as_ref(), &format!("{indent}{INDENT}"), eol, out);
    out.push_str(&format!("{indent}}} else "));
    match alternate.as_ref().map(ast::unparen) {
        Some(alt) if alt.kind() == COND_EXPR => render_if(&alt, indent, eol, out),
        _ => {
            out.push_str(&format!("{{{eol}"));
            render_branch(alternate.as_ref(), &format!("{indent}{INDENT}"), eol, out);
            out.push_str(&format!("{indent}}}"));
        }
    }
}

fn render_branch(branch: Option<&SyntaxNode>, indent: &str, eol: &str, out: &mut String) {
    let Some(branch) = branch else {
        return;
    };
    let inner = ast::unparen(branch);
    if inner.kind() == COND_EXPR {
        out.push_str(indent);
        render_if(&inner, indent, eol, out);
        out.push_str(eol);
    } else {
        out.push_str(&format!("{indent}return {};{eol}", ast::code_text(branch)));
    }
}

/// `(function () { if ... })()` replacing `cond`.
fn rewrite(cx: &FileContext, cond: &SyntaxNode) -> String {
    let base = ast::line_indent(cx.source(), cond.text_range().start());
    let inner = format!("{base}{INDENT}");
    let eol = layout::line_ending(cx.source());
    let mut out = format!("(function () {{{eol}{inner}");
    render_if(cond, &inner, eol, &mut out);
    out.push_str(&format!("{eol}{base}}})()"));
    out
}

fn candidates(cx: &FileContext) -> impl Iterator<Item = SyntaxNode> + use<> {
    cx.root().descendants().filter(is_nested_ternary)
}

impl Rule for NestedTernary {
    type Symbol = Snippet;

    const NAME: &'static str = "no-nested-ternary";

    fn eligible(&self, cx: &FileContext) -> Vec<Snippet> {
        let mut found: Vec<Snippet> = Vec::new();
        for node in candidates(cx) {
            let snippet = Snippet::of(&node);
            if !found.contains(&snippet) {
                found.push(snippet);
            }
        }
        found
    }

    fn step(&self, cx: &FileContext, symbol: &Snippet) -> Step {
        let Some(cond) = candidates(cx).find(|n| symbol.matches(n)) else {
            return Step::Done;
        };
        if let Some(reason) = blocker(&cond) {
            return Step::Skip(cx.diagnostic(
                DiagnosticKind::Ineligible,
                &symbol.to_string(),
                reason,
                &cond,
            ));
        }
        let mut edits = EditSet::new();
        edits.replace(cond.text_range(), rewrite(cx, &cond));
        Step::edit(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::run;

    fn fix(source: &str) -> String {
        run(&NestedTernary, source).unwrap().source
    }

    #[test]
    fn declarator_value_becomes_if_chain() {
        insta::assert_snapshot!(fix("var size = n > 10 ? 'big' : n > 5 ? 'medium' : 'small';"), @r"
        var size = (function () {
          if (n > 10) {
            return 'big';
          } else if (n > 5) {
            return 'medium';
          } else {
            return 'small';
          }
        })();
        ");
    }

    #[test]
    fn nested_consequent_is_indented() {
        insta::assert_snapshot!(fix("function f(a, b) {\n  return a ? (b ? 1 : 2) : 3;\n}"), @r"
        function f(a, b) {
          return (function () {
            if (a) {
              if (b) {
                return 1;
              } else {
                return 2;
              }
            } else {
              return 3;
            }
          })();
        }
        ");
    }

    #[test]
    fn crlf_source_gets_crlf_branches() {
        let out = fix("var s = a ? 1 : b ? 2 : 3;\r\ngo();\r\n");
        assert_eq!(out.matches('\n').count(), out.matches("\r\n").count());
        assert!(out.starts_with("var s = (function () {\r\n  if (a) {\r\n"));
    }

    #[test]
    fn single_conditionals_are_left_alone() {
        let source = "var x = a ? b : c;\nf(a ? b : c);";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn statement_position_is_not_rewritten() {
        let source = "a ? b() : c ? d() : e();";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn this_blocks_the_rewrite() {
        let outcome = run(&NestedTernary, "var v = a ? this.x : b ? 1 : 2;").unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Ineligible);
    }

    #[test]
    fn call_argument_and_property_positions() {
        let once = fix("log(a ? 1 : b ? 2 : 3, { k: c ? 4 : d ? 5 : 6 });");
        assert!(!once.contains('?'), "{once}");
        assert_eq!(fix(&once), once);
    }
}
