//! Removes declarations nothing reads.
//!
//! Three shapes are handled: trailing parameters no code refers to,
//! variable declarators that are never read (together with the plain
//! assignments to them), and named function declarations nested in another
//! function that nothing references. Removing one can leave another unused,
//! so the dispatcher's passes carry this to a fixed point.

use super::{Rule, Step, expression_statement};
use crate::census::Census;
use crate::context::FileContext;
use crate::layout;
use crate::report::{Diagnostic, DiagnosticKind};
use crate::rewriter::EditSet;
use crate::scope::{BindingKind, ScopeId, ScopeKind};
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::{SyntaxNode, TextRange};
use rowan::NodeOrToken;
use std::collections::HashMap;

pub struct UnusedVars<'a> {
    census: Option<&'a Census>,
}

impl<'a> UnusedVars<'a> {
    pub fn new(census: Option<&'a Census>) -> Self {
        UnusedVars { census }
    }
}

#[derive(Debug, Clone)]
enum Candidate {
    /// The parameter at `index` and every parameter after it.
    Params {
        function: SyntaxNode,
        index: usize,
        name: String,
    },
    Declarator {
        decl: SyntaxNode,
        declarator: SyntaxNode,
        name: String,
        /// Plain-assignment targets referring to the declared variable.
        writes: Vec<SyntaxNode>,
    },
    Function {
        stmt: SyntaxNode,
        name: String,
    },
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Candidate::Params { name, .. }
            | Candidate::Declarator { name, .. }
            | Candidate::Function { name, .. } => name,
        }
    }

    fn anchor(&self) -> SyntaxNode {
        match self {
            Candidate::Params {
                function, index, ..
            } => ast::params(function)
                .get(*index)
                .cloned()
                .unwrap_or_else(|| function.clone()),
            Candidate::Declarator { declarator, .. } => declarator.clone(),
            Candidate::Function { stmt, .. } => stmt.clone(),
        }
    }
}

/// Name references and declaring names of one tree, keyed by the scope
/// they resolve to.
#[derive(Default)]
struct Index {
    references: HashMap<(ScopeId, String), Vec<SyntaxNode>>,
    declarations: HashMap<(ScopeId, String), usize>,
}

impl Index {
    fn build(cx: &FileContext) -> Index {
        let scopes = cx.scopes();
        let mut index = Index::default();
        for node in cx.root().descendants().filter(ast::is_identifier) {
            let Some(name) = ast::ident_text(&node) else {
                continue;
            };
            let Some(scope) = scopes.resolve(&name, scopes.scope_of(&node)) else {
                continue;
            };
            if node.kind() == NAME_REF {
                index.references.entry((scope, name)).or_default().push(node);
            } else {
                *index.declarations.entry((scope, name)).or_default() += 1;
            }
        }
        index
    }

    fn references(&self, scope: ScopeId, name: &str) -> &[SyntaxNode] {
        self.references
            .get(&(scope, name.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// Whether `name` is introduced exactly once in `scope`.
    fn declared_once(&self, scope: ScopeId, name: &str) -> bool {
        self.declarations.get(&(scope, name.to_string())) == Some(&1)
    }
}

/// `name = value` with `site` as its whole target.
fn plain_assignment(site: &SyntaxNode) -> Option<SyntaxNode> {
    let assign = site.parent().filter(|p| p.kind() == ASSIGN_EXPR)?;
    let parts = ast::assignment(&assign)?;
    (parts.is_plain() && parts.target == *site).then_some(assign)
}

impl UnusedVars<'_> {
    fn candidates(&self, cx: &FileContext) -> Vec<Candidate> {
        let scopes = cx.scopes();
        let index = Index::build(cx);
        let mut found = Vec::new();

        for (id, scope) in scopes.iter() {
            let at_program = id == scopes.root();
            for binding in &scope.bindings {
                if !index.declared_once(id, &binding.name) {
                    continue;
                }
                let references = index.references(id, &binding.name);
                match binding.kind {
                    BindingKind::Var | BindingKind::Let | BindingKind::Const => {
                        if at_program
                            && self.census.is_none_or(|census| census.is_read(&binding.name))
                        {
                            continue;
                        }
                        if let Some(candidate) =
                            declarator_candidate(&binding.node, &binding.name, references)
                        {
                            found.push(candidate);
                        }
                    }
                    BindingKind::Function if !at_program => {
                        let Some(stmt) = binding.node.parent().filter(|p| p.kind() == FUNCTION_DECL)
                        else {
                            continue;
                        };
                        let inside = stmt.text_range();
                        let referenced = references
                            .iter()
                            .any(|r| !inside.contains_range(r.text_range()));
                        let in_list = stmt.parent().is_some_and(|p| ast::is_statement_list(&p));
                        if !referenced && in_list {
                            found.push(Candidate::Function {
                                stmt,
                                name: binding.name.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            if scope.kind == ScopeKind::Function {
                found.extend(unused_trailing_params(&scope.node, id, &index));
            }
        }
        found.sort_by_key(|c| c.anchor().text_range().start());
        found
    }
}

fn declarator_candidate(name_node: &SyntaxNode, name: &str, references: &[SyntaxNode]) -> Option<Candidate> {
    let declarator = name_node.parent().filter(|p| p.kind() == DECLARATOR)?;
    let decl = declarator.parent()?;
    if !decl.parent().is_some_and(|p| ast::is_statement_list(&p)) {
        return None;
    }
    let writes: Option<Vec<SyntaxNode>> = references
        .iter()
        .map(|r| plain_assignment(r).map(|_| r.clone()))
        .collect();
    Some(Candidate::Declarator {
        decl,
        declarator,
        name: name.to_string(),
        writes: writes?,
    })
}

fn unused_trailing_params(function: &SyntaxNode, scope: ScopeId, index: &Index) -> Vec<Candidate> {
    let Some(list) = ast::param_list(function) else {
        return Vec::new();
    };
    let parenthesized = ast::has_token(&list, L_PAREN);
    let setter = function.kind() == METHOD
        && ast::significant_tokens(function)
            .take_while(|t| t.kind() != L_PAREN)
            .any(|t| t.kind() == IDENT && t.text() == "set");
    if !parenthesized || setter {
        return Vec::new();
    }

    let params = ast::params(function);
    let mut start = params.len();
    while start > 0 {
        let param = &params[start - 1];
        let unused = param.kind() == NAME
            && ast::ident_text(param).is_some_and(|name| {
                index.references(scope, &name).is_empty() && index.declared_once(scope, &name)
            });
        if !unused {
            break;
        }
        start -= 1;
    }
    (start..params.len())
        .filter_map(|i| {
            Some(Candidate::Params {
                function: function.clone(),
                index: i,
                name: ast::ident_text(&params[i])?,
            })
        })
        .collect()
}

impl Rule for UnusedVars<'_> {
    type Symbol = String;

    const NAME: &'static str = "no-unused-vars";

    fn eligible(&self, cx: &FileContext) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for candidate in self.candidates(cx) {
            if !names.iter().any(|n| n == candidate.name()) {
                names.push(candidate.name().to_string());
            }
        }
        names
    }

    fn step(&self, cx: &FileContext, name: &String) -> Step {
        let Some(candidate) = self
            .candidates(cx)
            .into_iter()
            .find(|c| c.name() == name)
        else {
            return Step::Done;
        };
        let mut edits = EditSet::new();
        let fixed = match &candidate {
            Candidate::Params {
                function, index, ..
            } => {
                trim_params(function, *index, &mut edits);
                Ok(())
            }
            Candidate::Declarator {
                decl,
                declarator,
                writes,
                ..
            } => remove_variable(cx, name, decl, declarator, writes, &mut edits),
            Candidate::Function { stmt, .. } => {
                layout::remove_statements(std::slice::from_ref(stmt), &mut edits);
                Ok(())
            }
        };
        match fixed {
            Ok(()) => Step::edit(edits),
            Err(diagnostic) => Step::Skip(diagnostic),
        }
    }
}

/// Deletes the parameters from `index` to the end of the list.
fn trim_params(function: &SyntaxNode, index: usize, edits: &mut EditSet) {
    let params = ast::params(function);
    let (Some(first), Some(last)) = (params.get(index), params.last()) else {
        return;
    };
    if index > 0 {
        let previous = &params[index - 1];
        edits.delete(TextRange::new(previous.text_range().end(), last.text_range().end()));
        return;
    }
    let mut end = last.text_range().end();
    let trailing_comma = last
        .siblings_with_tokens(rowan::Direction::Next)
        .skip(1)
        .filter_map(NodeOrToken::into_token)
        .find(|t| !t.kind().is_trivia())
        .filter(|t| t.kind() == COMMA);
    if let Some(comma) = trailing_comma {
        end = comma.text_range().end();
    }
    edits.delete(TextRange::new(first.text_range().start(), end));
}

/// Removes a declarator and every plain assignment to it, keeping the
/// side effects of their values.
fn remove_variable(
    cx: &FileContext,
    name: &str,
    decl: &SyntaxNode,
    declarator: &SyntaxNode,
    writes: &[SyntaxNode],
    edits: &mut EditSet,
) -> Result<(), Diagnostic> {
    let kept = ast::declarator_init(declarator).filter(ast::has_side_effects);
    let list = ast::declarators(decl);
    let mut removed = Vec::new();

    if list.len() == 1 {
        match &kept {
            Some(init) => layout::replace_statement(decl, &expression_statement(init), edits),
            None => removed.push(decl.clone()),
        }
    } else {
        if kept.is_some() {
            let position = list.iter().position(|d| d == declarator).unwrap_or(0);
            let reordered = list[position + 1..].iter().any(|d| {
                ast::declarator_init(d).is_some_and(|init| ast::has_side_effects(&init))
            });
            if reordered {
                return Err(cx.diagnostic(
                    DiagnosticKind::UnsupportedShape,
                    name,
                    "its initializer would run after the ones following it",
                    declarator,
                ));
            }
        }
        layout::remove_declarator(decl, declarator, edits);
        if let Some(init) = &kept {
            layout::insert_after(cx.source(), decl, &expression_statement(init), edits);
        }
    }

    for target in writes {
        let Some(assign) = plain_assignment(target) else {
            continue;
        };
        let Some(parts) = ast::assignment(&assign) else {
            continue;
        };
        if edits.touches(assign.text_range()) {
            return Err(cx.diagnostic(
                DiagnosticKind::UnsupportedShape,
                name,
                "assignment nested in another removed construct",
                &assign,
            ));
        }
        let stmt = assign.parent().filter(|p| p.kind() == EXPR_STMT);
        match stmt {
            Some(stmt) if ast::has_side_effects(&parts.value) => {
                layout::replace_statement(&stmt, &expression_statement(&parts.value), edits);
            }
            Some(stmt) => removed.push(emptied_if(&stmt).unwrap_or(stmt)),
            None => edits.replace(assign.text_range(), ast::code_text(&parts.value)),
        }
    }
    layout::remove_statements(&removed, edits);
    Ok(())
}

/// The `if` without `else` whose only statement is `stmt`, when its test
/// can be dropped too.
fn emptied_if(stmt: &SyntaxNode) -> Option<SyntaxNode> {
    let mut body = stmt.clone();
    let mut parent = stmt.parent()?;
    if parent.kind() == BLOCK_STMT {
        if ast::statements(&parent).count() != 1 {
            return None;
        }
        body = parent.clone();
        parent = parent.parent()?;
    }
    if parent.kind() != IF_STMT {
        return None;
    }
    let (test, consequent, alternate) = ast::branches(&parent);
    let pure_test = test.is_some_and(|t| !ast::has_side_effects(&t));
    let in_list = parent.parent().is_some_and(|p| ast::is_statement_list(&p));
    (pure_test && consequent.as_ref() == Some(&body) && alternate.is_none() && in_list)
        .then_some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::run;
    use std::collections::BTreeSet;

    fn fix_with(source: &str, census: Option<&Census>) -> String {
        run(&UnusedVars::new(census), source).unwrap().source
    }

    fn fix(source: &str) -> String {
        fix_with(source, None)
    }

    #[test]
    fn drops_unused_declarator_from_list() {
        assert_eq!(
            fix("function f(){ var a = 1, b = 2; return a; }"),
            "function f(){ var a = 1; return a; }"
        );
    }

    #[test]
    fn keeps_side_effecting_initializer() {
        assert_eq!(
            fix("function f(){ var a = 1, b = g(); return a; }"),
            "function f(){ var a = 1; g(); return a; }"
        );
    }

    #[test]
    fn single_declarator_with_call_becomes_statement() {
        insta::assert_snapshot!(fix("function f() {\n  var handle = open();\n  return 1;\n}"), @r"
        function f() {
          open();
          return 1;
        }
        ");
    }

    #[test]
    fn trims_trailing_unused_params() {
        assert_eq!(
            fix("function f(a, b, c) { return a; }"),
            "function f(a) { return a; }"
        );
        assert_eq!(fix("var g = function (x, y) { return y; };"), "var g = function (x, y) { return y; };");
        assert_eq!(fix("[1].map((item, i) => 0);"), "[1].map(() => 0);");
    }

    #[test]
    fn setters_keep_their_parameter() {
        let source = "var o = { set value(v) {} };";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn removes_assignments_to_unused_variables() {
        insta::assert_snapshot!(fix("function f(flag) {\n  var last;\n  if (flag) {\n    last = 1;\n  }\n  last = compute();\n  return flag;\n}"), @r"
        function f(flag) {
          compute();
          return flag;
        }
        ");
    }

    #[test]
    fn unused_inner_functions_are_removed() {
        assert_eq!(
            fix("function outer() {\n  function helper() { return helper(); }\n  return 1;\n}"),
            "function outer() {\n  return 1;\n}"
        );
        let used = "function outer() { function helper() {} return helper; }";
        assert_eq!(fix(used), used);
    }

    #[test]
    fn removal_cascades_to_a_fixed_point() {
        assert_eq!(
            fix("function f() { var a = 1; var b = a; return 0; }"),
            "function f() { return 0; }"
        );
    }

    #[test]
    fn program_level_needs_a_census() {
        let source = "var unused = 1;\nexports.x = 2;\n";
        assert_eq!(fix(source), source);

        let mut census = Census::new();
        census.record(source, &BTreeSet::new()).unwrap();
        assert_eq!(fix_with(source, Some(&census)), "exports.x = 2;\n");

        census.record("console.log(unused);", &BTreeSet::new()).unwrap();
        assert_eq!(fix_with(source, Some(&census)), source);
    }

    #[test]
    fn read_modify_write_counts_as_use() {
        let source = "function f() { var n = 0; n++; }";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn loop_header_declarations_are_kept() {
        let source = "function f() { for (var i = 0; ; ) { break; } }";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn result_is_stable() {
        let once = fix("function f(a, b) { var c = a, d; function e() {} return c; }");
        assert_eq!(once, "function f(a) { var c = a; return c; }");
        assert_eq!(fix(&once), once);
    }
}
