//! Moves `var` declarations out of nested blocks and loop headers.
//!
//! A `var` binds in its function (or the program) no matter where it is
//! written. Declarations written inside blocks, loop headers or case clauses
//! are rewritten in place as assignments and declared once at the top of
//! the function, catch clause or program they belong to.

use super::{Rule, Step};
use crate::context::FileContext;
use crate::layout;
use crate::placement;
use crate::rewriter::EditSet;
use crate::scope::ScopeKind;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast::{self, DeclKind};
use crate::syntax::SyntaxNode;
use tracing::debug;

pub struct BlockScoped;

/// The statement list a `var` statement belongs in.
fn home_list(cx: &FileContext, decl: &SyntaxNode) -> Option<SyntaxNode> {
    let scopes = cx.scopes();
    let home = scopes
        .chain(scopes.scope_of(decl))
        .into_iter()
        .find(|&id| {
            matches!(
                scopes.scope(id).kind,
                ScopeKind::Function | ScopeKind::Catch | ScopeKind::Program
            )
        })
        .unwrap_or_else(|| scopes.root());
    layout::statement_list_of(&scopes.scope(home).node)
}

/// `var` statements not written directly in their home list, with that list.
fn misplaced(cx: &FileContext) -> Vec<(SyntaxNode, SyntaxNode)> {
    cx.root()
        .descendants()
        .filter(|node| node.kind() == VAR_DECL && ast::decl_kind(node) == Some(DeclKind::Var))
        .filter(|decl| decl.parent().is_some_and(|p| p.kind() != EXPORT_DECL))
        .filter_map(|decl| {
            let home = home_list(cx, &decl)?;
            (decl.parent().as_ref() != Some(&home)).then_some((decl, home))
        })
        .collect()
}

/// Declared names; a destructuring target stands for itself.
fn declared_names(decl: &SyntaxNode) -> Vec<String> {
    ast::declarators(decl)
        .iter()
        .filter_map(|declarator| {
            ast::declarator_name(declarator)
                .or_else(|| ast::declarator_target(declarator).map(|t| ast::code_text(&t)))
        })
        .collect()
}

impl Rule for BlockScoped {
    type Symbol = String;

    const NAME: &'static str = "block-scoped-vars";

    fn eligible(&self, cx: &FileContext) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (decl, _) in misplaced(cx) {
            for name in declared_names(&decl) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn step(&self, cx: &FileContext, name: &String) -> Step {
        let Some((decl, home)) = misplaced(cx)
            .into_iter()
            .find(|(decl, _)| declared_names(decl).contains(name))
        else {
            return Step::Done;
        };
        let mut edits = EditSet::new();
        let released = match placement::release(cx, &decl, &mut edits) {
            Ok(names) => names,
            Err(diagnostic) => return Step::Skip(diagnostic),
        };
        let mut pending: Vec<String> = Vec::new();
        for released_name in released {
            if !layout::list_declares(&home, &released_name) && !pending.contains(&released_name) {
                pending.push(released_name);
            }
        }
        debug!(names = ?pending, "hoisting var declaration");
        layout::declare_vars(cx.source(), &home, &pending, &mut edits);
        Step::edit(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::DiagnosticKind;
    use crate::rules::run;

    fn fix(source: &str) -> String {
        run(&BlockScoped, source).unwrap().source
    }

    #[test]
    fn for_in_header_is_promoted() {
        assert_eq!(
            fix("for (var k in obj) { use(k); }"),
            "var k;\nfor (k in obj) { use(k); }"
        );
    }

    #[test]
    fn loop_header_with_several_declarators() {
        insta::assert_snapshot!(fix("function sum(list) {\n  var total = 0;\n  for (var i = 0, n = list.length; i < n; i++) {\n    total += list[i];\n  }\n  return total;\n}"), @r"
        function sum(list) {
          var total = 0, i, n;
          for (i = 0, n = list.length; i < n; i++) {
            total += list[i];
          }
          return total;
        }
        ");
    }

    #[test]
    fn block_declaration_becomes_assignment() {
        insta::assert_snapshot!(fix("function f(x) {\n  if (x) {\n    var y = x * 2, z;\n    log(y, z);\n  }\n}"), @r"
        function f(x) {
          var y, z;
          if (x) {
            y = x * 2;
            log(y, z);
          }
        }
        ");
    }

    #[test]
    fn existing_declarations_are_not_duplicated() {
        assert_eq!(
            fix("function f(a) {\n  if (a) {\n    var a = 1;\n  }\n  return a;\n}"),
            "function f(a) {\n  if (a) {\n    a = 1;\n  }\n  return a;\n}"
        );
    }

    #[test]
    fn uninitialized_declaration_is_removed() {
        assert_eq!(
            fix("while (more()) {\n  var item;\n  item = next();\n}\n"),
            "var item;\nwhile (more()) {\n  item = next();\n}\n"
        );
    }

    #[test]
    fn catch_body_is_a_home() {
        let source = "try { go(); } catch (e) { var reason = e.message; report(reason); }";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn destructuring_is_reported() {
        let outcome = run(&BlockScoped, "if (x) { var { a } = x; }").unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnsupportedShape);
    }

    #[test]
    fn let_and_const_stay_where_they_are() {
        let source = "for (let i = 0; i < 2; i++) { const j = i; }";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn result_is_stable() {
        let once = fix("switch (v) {\n  case 1:\n    var x = 1;\n    break;\n}\n");
        assert_eq!(once, "var x;\nswitch (v) {\n  case 1:\n    x = 1;\n    break;\n}\n");
        assert_eq!(fix(&once), once);
    }
}
