//! Statement-level edits that keep the surrounding layout.
//!
//! Every function here only adds edits to an [`EditSet`]; nothing is applied
//! until the caller's step finishes. New statements copy the indentation of
//! their neighbours, and a single-line block that receives a new leading
//! statement is reflowed to one statement per line by rewriting only the
//! whitespace between its elements.

use crate::rewriter::EditSet;
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast::{self, CommentPayload, DeclKind};
use crate::syntax::{SyntaxElement, SyntaxNode, SyntaxToken, TextRange, TextSize};
use rowan::NodeOrToken;

const INDENT: &str = "  ";

/// The line terminator `source` already uses: `\r\n` when any line ends
/// with it, `\n` otherwise.
pub fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Whether only indentation precedes `offset` on its line.
fn starts_line(source: &str, offset: TextSize) -> bool {
    let offset = usize::from(offset).min(source.len());
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..offset].chars().all(|c| c == ' ' || c == '\t')
}

/// The statement list declarations for the scope opened by `node` go into.
pub fn statement_list_of(node: &SyntaxNode) -> Option<SyntaxNode> {
    match node.kind() {
        SOURCE_FILE | BLOCK_STMT | SWITCH_CASE => Some(node.clone()),
        CATCH_CLAUSE => node.children().find(|n| n.kind() == BLOCK_STMT),
        kind if kind.is_function() => ast::function_body(node),
        _ => None,
    }
}

/// First `var` statement directly in `list`.
pub fn first_var_decl(list: &SyntaxNode) -> Option<SyntaxNode> {
    ast::statements(list)
        .find(|stmt| stmt.kind() == VAR_DECL && ast::decl_kind(stmt) == Some(DeclKind::Var))
}

/// Whether `name` is already declared by a statement directly in `list`, or
/// by a parameter of the function or catch clause owning it.
pub fn list_declares(list: &SyntaxNode, name: &str) -> bool {
    let by_statement = ast::statements(list).any(|stmt| match stmt.kind() {
        VAR_DECL => ast::declarators(&stmt)
            .iter()
            .any(|d| ast::declarator_name(d).as_deref() == Some(name)),
        FUNCTION_DECL | CLASS_DECL => ast::own_name(&stmt)
            .and_then(|n| ast::ident_text(&n))
            .as_deref()
            == Some(name),
        _ => false,
    });
    if by_statement {
        return true;
    }
    let Some(owner) = list.parent() else {
        return false;
    };
    let params: Vec<SyntaxNode> = match owner.kind() {
        kind if kind.is_function() => ast::param_list(&owner)
            .map(|p| p.descendants().collect())
            .unwrap_or_default(),
        CATCH_CLAUSE => owner
            .children()
            .filter(|n| n.kind() != BLOCK_STMT)
            .flat_map(|n| n.descendants().collect::<Vec<_>>())
            .collect(),
        _ => Vec::new(),
    };
    params
        .iter()
        .filter(|n| n.kind() == NAME)
        .any(|n| ast::ident_text(n).as_deref() == Some(name))
}

/// Declares `names` with `var` in `list`: appended to the first existing
/// `var` statement, or as a new statement after any directive prologue.
pub fn declare_vars(source: &str, list: &SyntaxNode, names: &[String], edits: &mut EditSet) {
    if names.is_empty() {
        return;
    }
    if let Some(decl) = first_var_decl(list)
        && let Some(last) = ast::declarators(&decl).last()
    {
        let appended: String = names.iter().map(|n| format!(", {n}")).collect();
        edits.insert(last.text_range().end(), appended);
        return;
    }
    prepend(source, list, &format!("var {};", names.join(", ")), edits);
}

/// Inserts `text` as the first statement of `list`, after any directives.
pub fn prepend(source: &str, list: &SyntaxNode, text: &str, edits: &mut EditSet) {
    match list.kind() {
        BLOCK_STMT => prepend_to_block(source, list, text, edits),
        SWITCH_CASE => prepend_to_case(source, list, text, edits),
        _ => prepend_to_program(source, list, text, edits),
    }
}

fn prepend_to_program(source: &str, program: &SyntaxNode, text: &str, edits: &mut EditSet) {
    let eol = line_ending(source);
    let stmts: Vec<SyntaxNode> = ast::statements(program).collect();
    let directives = stmts.iter().take_while(|s| ast::is_directive(s)).count();
    if let Some(anchor) = stmts.get(directives) {
        let mut start = anchor.text_range().start();
        if start == TextSize::from(0)
            && source.starts_with("#!")
            && let Some(newline) = source.find('\n')
        {
            start = TextSize::from(newline as u32 + 1);
        }
        edits.insert(start, format!("{text}{eol}{}", ast::line_indent(source, start)));
    } else if let Some(last) = stmts.last() {
        edits.insert(last.text_range().end(), format!("{eol}{text}"));
    } else {
        let sep = if source.is_empty() || source.ends_with('\n') {
            ""
        } else {
            eol
        };
        edits.insert(program.text_range().end(), format!("{sep}{text}{eol}"));
    }
}

fn prepend_to_block(source: &str, block: &SyntaxNode, text: &str, edits: &mut EditSet) {
    let Some((l_brace, r_brace)) = braces(block) else {
        return;
    };
    let elements: Vec<SyntaxElement> = block
        .children_with_tokens()
        .filter(|e| !matches!(e.kind(), WHITESPACE | L_BRACE | R_BRACE))
        .collect();
    let directives = elements
        .iter()
        .take_while(|e| e.as_node().is_some_and(ast::is_directive))
        .count();
    let interior = TextRange::new(l_brace.text_range().end(), r_brace.text_range().start());
    let eol = line_ending(source);
    let outer = ast::line_indent(source, l_brace.text_range().start()).to_string();

    if source[interior].contains('\n') {
        // Indentation of the first element that starts its own line.
        let inner = match elements
            .iter()
            .map(|e| e.text_range().start())
            .find(|&start| starts_line(source, start))
        {
            Some(start) => ast::line_indent(source, start).to_string(),
            None => format!("{outer}{INDENT}"),
        };
        if let Some(anchor) = elements.get(directives) {
            let start = anchor.text_range().start();
            if starts_line(source, start) {
                edits.insert(start, format!("{text}{eol}{}", ast::line_indent(source, start)));
            } else {
                let gap_start = match directives.checked_sub(1) {
                    Some(prev) => elements[prev].text_range().end(),
                    None => interior.start(),
                };
                edits.replace(
                    TextRange::new(gap_start, start),
                    format!("{eol}{inner}{text}{eol}{inner}"),
                );
            }
        } else if let Some(last) = elements.last() {
            edits.insert(last.text_range().end(), format!("{eol}{inner}{text}"));
        } else {
            edits.replace(interior, format!("{eol}{inner}{text}{eol}{outer}"));
        }
        return;
    }

    // Reflow: one element per line, touching only the gaps between elements.
    let inner = format!("{outer}{INDENT}");
    let mut gap_start = interior.start();
    for (i, element) in elements.iter().enumerate() {
        let gap = TextRange::new(gap_start, element.text_range().start());
        if i == directives {
            edits.replace(gap, format!("{eol}{inner}{text}{eol}{inner}"));
        } else {
            edits.replace(gap, format!("{eol}{inner}"));
        }
        gap_start = element.text_range().end();
    }
    let last_gap = TextRange::new(gap_start, interior.end());
    if directives == elements.len() {
        edits.replace(last_gap, format!("{eol}{inner}{text}{eol}{outer}"));
    } else {
        edits.replace(last_gap, format!("{eol}{outer}"));
    }
}

fn prepend_to_case(source: &str, case: &SyntaxNode, text: &str, edits: &mut EditSet) {
    if let Some(first) = ast::statements(case).next() {
        let start = first.text_range().start();
        let on_new_line = ast::prev_token_sibling(&NodeOrToken::Node(first.clone()))
            .is_some_and(|t| t.kind() == WHITESPACE && t.text().contains('\n'));
        if on_new_line {
            let eol = line_ending(source);
            edits.insert(start, format!("{text}{eol}{}", ast::line_indent(source, start)));
        } else {
            edits.insert(start, format!("{text} "));
        }
    } else if let Some(colon) = direct_tokens(case).filter(|t| t.kind() == COLON).last() {
        edits.insert(colon.text_range().end(), format!(" {text}"));
    }
}

/// Whitespace to put between `stmt` and a statement inserted after it.
pub fn separator(source: &str, stmt: &SyntaxNode) -> String {
    let element = NodeOrToken::Node(stmt.clone());
    let neighbour = ast::prev_token_sibling(&element)
        .filter(|t| t.kind() == WHITESPACE)
        .or_else(|| ast::next_token_sibling(&element).filter(|t| t.kind() == WHITESPACE));
    match neighbour {
        Some(ws) if !ws.text().contains('\n') => " ".to_string(),
        None if stmt.parent().is_some_and(|p| p.kind() == BLOCK_STMT) => " ".to_string(),
        _ => format!(
            "{}{}",
            line_ending(source),
            ast::line_indent(source, ast::code_range(stmt).start())
        ),
    }
}

/// Inserts the statement `text` right after `stmt`, which must sit in a
/// statement list.
pub fn insert_after(source: &str, stmt: &SyntaxNode, text: &str, edits: &mut EditSet) {
    let payload = CommentPayload::of(stmt);
    let code = ast::code_range(stmt);
    if payload.trailing.trim().is_empty() {
        edits.insert(code.end(), format!("{}{text}", separator(source, stmt)));
    } else {
        let indent = ast::line_indent(source, code.start());
        let eol = line_ending(source);
        edits.insert(stmt.text_range().end(), format!("{eol}{indent}{text}"));
    }
}

/// Replaces a statement's code, keeping the comments it carries.
pub fn replace_statement(stmt: &SyntaxNode, code: &str, edits: &mut EditSet) {
    let payload = CommentPayload::of(stmt);
    edits.replace(stmt.text_range(), payload.wrap(code));
}

/// Replaces a statement with several. Leading comments go to the first,
/// trailing comments to the last. Outside a statement list the replacements
/// are wrapped in a block.
pub fn replace_with_statements(source: &str, stmt: &SyntaxNode, codes: &[String], edits: &mut EditSet) {
    match codes {
        [] => remove_statement(stmt, edits),
        [single] => replace_statement(stmt, single, edits),
        _ => {
            let in_list = stmt.parent().is_some_and(|p| ast::is_statement_list(&p));
            let joined = if in_list {
                codes.join(&separator(source, stmt))
            } else {
                format!("{{ {} }}", codes.join(" "))
            };
            replace_statement(stmt, &joined, edits);
        }
    }
}

/// Deletes a statement together with its comments and the whitespace that
/// separated it from its neighbours. A block left empty collapses to `{}`;
/// outside a statement list the statement becomes `{}`.
pub fn remove_statement(stmt: &SyntaxNode, edits: &mut EditSet) {
    let Some(parent) = stmt.parent() else {
        return;
    };
    if !ast::is_statement_list(&parent) {
        edits.replace(ast::code_range(stmt), "{}");
        return;
    }
    if parent.kind() == BLOCK_STMT
        && ast::statements(&parent).count() == 1
        && !direct_tokens(&parent).any(|t| t.kind().is_comment())
        && let Some((l_brace, r_brace)) = braces(&parent)
    {
        edits.delete(TextRange::new(
            l_brace.text_range().end(),
            r_brace.text_range().start(),
        ));
        return;
    }
    let element = NodeOrToken::Node(stmt.clone());
    let range = stmt.text_range();
    if let Some(ws) = ast::prev_token_sibling(&element).filter(|t| t.kind() == WHITESPACE) {
        edits.delete(TextRange::new(ws.text_range().start(), range.end()));
    } else if let Some(ws) = ast::next_token_sibling(&element).filter(|t| t.kind() == WHITESPACE) {
        edits.delete(TextRange::new(range.start(), ws.text_range().end()));
    } else {
        edits.delete(range);
    }
}

/// Removes several statements at once. A block losing all of its statements
/// collapses to `{}` instead of keeping the whitespace between them.
pub fn remove_statements(stmts: &[SyntaxNode], edits: &mut EditSet) {
    let mut groups: Vec<(SyntaxNode, Vec<SyntaxNode>)> = Vec::new();
    for stmt in stmts {
        let Some(parent) = stmt.parent() else {
            continue;
        };
        match groups.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, group)) if group.contains(stmt) => {}
            Some((_, group)) => group.push(stmt.clone()),
            None => groups.push((parent, vec![stmt.clone()])),
        }
    }
    for (parent, group) in groups {
        let emptied = parent.kind() == BLOCK_STMT
            && group.len() > 1
            && ast::statements(&parent).count() == group.len()
            && !direct_tokens(&parent).any(|t| t.kind().is_comment());
        if emptied && let Some((l_brace, r_brace)) = braces(&parent) {
            edits.delete(TextRange::new(
                l_brace.text_range().end(),
                r_brace.text_range().start(),
            ));
            continue;
        }
        for stmt in &group {
            remove_statement(stmt, edits);
        }
    }
}

/// Removes one declarator from a declaration that keeps at least one other.
pub fn remove_declarator(decl: &SyntaxNode, declarator: &SyntaxNode, edits: &mut EditSet) {
    let list = ast::declarators(decl);
    let Some(index) = list.iter().position(|d| d == declarator) else {
        return;
    };
    let range = declarator.text_range();
    if index > 0 {
        let prev = &list[index - 1];
        edits.delete(TextRange::new(prev.text_range().end(), range.end()));
    } else if let Some(next) = list.get(1) {
        edits.delete(TextRange::new(range.start(), next.text_range().start()));
    }
}

/// Inserts `text` as the first property of an object literal.
pub fn insert_first_property(source: &str, object: &SyntaxNode, text: &str, edits: &mut EditSet) {
    let Some((l_brace, r_brace)) = braces(object) else {
        return;
    };
    let first = object
        .children()
        .find(|n| matches!(n.kind(), PROPERTY | METHOD | SPREAD_ELEMENT));
    match first {
        Some(first) => {
            let start = first.text_range().start();
            let before = TextRange::new(l_brace.text_range().end(), start);
            if source[before].contains('\n') {
                let eol = line_ending(source);
                edits.insert(start, format!("{text},{eol}{}", ast::line_indent(source, start)));
            } else {
                edits.insert(start, format!("{text}, "));
            }
        }
        None => edits.replace(
            TextRange::new(l_brace.text_range().end(), r_brace.text_range().start()),
            format!(" {text} "),
        ),
    }
}

fn direct_tokens(node: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> + use<> {
    node.children_with_tokens().filter_map(NodeOrToken::into_token)
}

fn braces(node: &SyntaxNode) -> Option<(SyntaxToken, SyntaxToken)> {
    let l_brace = direct_tokens(node).find(|t| t.kind() == L_BRACE)?;
    let r_brace = direct_tokens(node).filter(|t| t.kind() == R_BRACE).last()?;
    Some((l_brace, r_brace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxTree;

    fn edit(source: &str, f: impl FnOnce(&str, &SyntaxNode, &mut EditSet)) -> String {
        let tree = SyntaxTree::parse(source).unwrap();
        let mut edits = EditSet::new();
        f(source, tree.root(), &mut edits);
        edits.apply(source).unwrap()
    }

    fn body(root: &SyntaxNode) -> SyntaxNode {
        root.descendants().find(|n| n.kind() == BLOCK_STMT).unwrap()
    }

    fn nth_stmt(root: &SyntaxNode, kind: crate::syntax::SyntaxKind, n: usize) -> SyntaxNode {
        root.descendants().filter(|s| s.kind() == kind).nth(n).unwrap()
    }

    #[test]
    fn prepend_reflows_single_line_block() {
        let out = edit("function test() { i = 0; }", |s, root, e| {
            prepend(s, &body(root), "var i;", e)
        });
        assert_eq!(out, "function test() {\n  var i;\n  i = 0;\n}");
    }

    #[test]
    fn prepend_into_multiline_block_copies_indent() {
        let out = edit("function f() {\n    'use strict';\n    go();\n}", |s, root, e| {
            prepend(s, &body(root), "var x;", e)
        });
        assert_eq!(out, "function f() {\n    'use strict';\n    var x;\n    go();\n}");
    }

    #[test]
    fn prepend_moves_brace_line_statement_to_its_own_line() {
        let out = edit("function f() { if (a) {\n    b();\n  }\n}", |s, root, e| {
            prepend(s, &body(root), "var x;", e)
        });
        assert_eq!(out, "function f() {\n  var x;\n  if (a) {\n    b();\n  }\n}");

        let out = edit("function f() { go();\n    stop();\n}", |s, root, e| {
            prepend(s, &body(root), "var x;", e)
        });
        assert_eq!(out, "function f() {\n    var x;\n    go();\n    stop();\n}");
    }

    #[test]
    fn inserted_lines_keep_crlf_endings() {
        let out = edit("{\r\n  x = 1;\r\n}", |s, root, e| prepend(s, &body(root), "var x;", e));
        assert_eq!(out, "{\r\n  var x;\r\n  x = 1;\r\n}");

        let out = edit("function test() { i = 0; }\r\n", |s, root, e| {
            prepend(s, &body(root), "var i;", e)
        });
        assert_eq!(out, "function test() {\r\n  var i;\r\n  i = 0;\r\n}\r\n");

        let out = edit("a();\r\nb();\r\n", |s, root, e| {
            insert_after(s, &nth_stmt(root, EXPR_STMT, 0), "g();", e)
        });
        assert_eq!(out, "a();\r\ng();\r\nb();\r\n");
    }

    #[test]
    fn prepend_into_empty_block() {
        let out = edit("if (a) {}", |s, root, e| prepend(s, &body(root), "var x;", e));
        assert_eq!(out, "if (a) {\n  var x;\n}");
    }

    #[test]
    fn prepend_to_program_after_shebang() {
        let out = edit("#!/usr/bin/env node\nrun();\n", |s, root, e| {
            prepend(s, root, "var k;", e)
        });
        assert_eq!(out, "#!/usr/bin/env node\nvar k;\nrun();\n");
    }

    #[test]
    fn declare_vars_appends_to_existing_var() {
        let out = edit("function f() { var a = 1; b = 2; }", |s, root, e| {
            declare_vars(s, &body(root), &["b".to_string()], e)
        });
        assert_eq!(out, "function f() { var a = 1, b; b = 2; }");
    }

    #[test]
    fn list_declares_sees_params_and_functions() {
        let tree = SyntaxTree::parse("function f(a, { b }) { function c() {} var d; }").unwrap();
        let list = body(tree.root());
        for name in ["a", "b", "c", "d"] {
            assert!(list_declares(&list, name), "{name}");
        }
        assert!(!list_declares(&list, "f"));
    }

    #[test]
    fn removing_only_statement_collapses_block() {
        let out = edit("function test() { i = 0; }", |_, root, e| {
            remove_statement(&nth_stmt(root, EXPR_STMT, 0), e)
        });
        assert_eq!(out, "function test() {}");
    }

    #[test]
    fn removing_statement_takes_its_comments() {
        let source = "a();\n// about b\nb(); // trailing\nc();\n";
        let out = edit(source, |_, root, e| remove_statement(&nth_stmt(root, EXPR_STMT, 1), e));
        assert_eq!(out, "a();\nc();\n");
    }

    #[test]
    fn removing_statement_outside_list_leaves_empty_block() {
        let out = edit("if (x) i = 0;", |_, root, e| {
            remove_statement(&nth_stmt(root, EXPR_STMT, 0), e)
        });
        assert_eq!(out, "if (x) {}");
    }

    #[test]
    fn removing_every_statement_empties_block() {
        let out = edit("function f() { var x; x = 1; }\ng();", |_, root, e| {
            let stmts: Vec<SyntaxNode> = ast::statements(&body(root)).collect();
            remove_statements(&stmts, e)
        });
        assert_eq!(out, "function f() {}\ng();");
        let out = edit("a(); b(); c();", |_, root, e| {
            let stmts: Vec<SyntaxNode> = ast::statements(root).skip(1).collect();
            remove_statements(&stmts, e)
        });
        assert_eq!(out, "a();");
    }

    #[test]
    fn remove_first_and_last_declarator() {
        let source = "var a = 1, b = 2, c;";
        let out = edit(source, |_, root, e| {
            let decl = nth_stmt(root, VAR_DECL, 0);
            remove_declarator(&decl, &ast::declarators(&decl)[0], e)
        });
        assert_eq!(out, "var b = 2, c;");
        let out = edit(source, |_, root, e| {
            let decl = nth_stmt(root, VAR_DECL, 0);
            remove_declarator(&decl, &ast::declarators(&decl)[2], e)
        });
        assert_eq!(out, "var a = 1, b = 2;");
    }

    #[test]
    fn insert_after_uses_neighbour_spacing() {
        let out = edit("function f(){ var a = 1; return a; }", |s, root, e| {
            insert_after(s, &nth_stmt(root, VAR_DECL, 0), "g();", e)
        });
        assert_eq!(out, "function f(){ var a = 1; g(); return a; }");
        let out = edit("{\n  x(); // note\n  y();\n}", |s, root, e| {
            insert_after(s, &nth_stmt(root, EXPR_STMT, 0), "z();", e)
        });
        assert_eq!(out, "{\n  x(); // note\n  z();\n  y();\n}");
    }

    #[test]
    fn replace_with_statements_keeps_comments() {
        let source = "{\n  // init\n  var a = 1, b = 2;\n}";
        let out = edit(source, |s, root, e| {
            replace_with_statements(
                s,
                &nth_stmt(root, VAR_DECL, 0),
                &["a = 1;".to_string(), "b = 2;".to_string()],
                e,
            )
        });
        assert_eq!(out, "{\n  // init\n  a = 1;\n  b = 2;\n}");
    }

    #[test]
    fn insert_first_property_matches_layout() {
        let out = edit("var ns = { a: 1 };", |s, root, e| {
            let object = root.descendants().find(|n| n.kind() == OBJECT_EXPR).unwrap();
            insert_first_property(s, &object, "x: null", e)
        });
        assert_eq!(out, "var ns = { x: null, a: 1 };");
        let out = edit("var ns = {\n    a: 1\n};", |s, root, e| {
            let object = root.descendants().find(|n| n.kind() == OBJECT_EXPR).unwrap();
            insert_first_property(s, &object, "x: null", e)
        });
        assert_eq!(out, "var ns = {\n    x: null,\n    a: 1\n};");
    }

    #[test]
    fn prepend_into_switch_case() {
        let out = edit("switch (v) { case 1: go(); }", |s, root, e| {
            let case = root.descendants().find(|n| n.kind() == SWITCH_CASE).unwrap();
            prepend(s, &case, "var x;", e)
        });
        assert_eq!(out, "switch (v) { case 1: var x; go(); }");
    }
}
