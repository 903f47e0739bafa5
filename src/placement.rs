//! Declaration placement.
//!
//! Given a symbol and its usage sites, decides which scope must own the
//! declaration and produces the edits that put it there. The closest common
//! scope of all usages is the target; its kind selects the insertion policy:
//!
//! | Scope kind                        | Policy                                             |
//! |-----------------------------------|----------------------------------------------------|
//! | Program                           | turn the first top-level `name = value` into `var` |
//! | Block, Function, Catch, SwitchCase| append to the first `var`, else prepend `var name;`|
//! | Object at program level           | namespace property, usages become `base.name`      |
//! | Object inside a function          | nearest enclosing non-object scope                 |
//! | ForHeader                         | the scope owning the loop                          |
//!
//! When usages share no scope below the program, [`SplitMode`] decides
//! between one declaration per top-level subtree and refusing.
//!
//! Releasing a declaration (moving it out of a nested position) is the other
//! half: the statement is rewritten in place as plain assignments.

use crate::context::FileContext;
use crate::layout;
use crate::report::{Diagnostic, DiagnosticKind};
use crate::rewriter::EditSet;
use crate::scope::{ScopeId, ScopeKind, ScopeTree};
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::SyntaxNode;
use crate::usage::{UsageRole, UsageSite, Usages};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do when a symbol's usages share no scope below the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    /// Declare once per top-level subtree holding usages. Sibling
    /// declarations are independent variables afterwards.
    #[default]
    Split,
    /// Report the symbol and leave it untouched.
    Strict,
}

#[derive(Debug)]
pub enum Placement {
    Placed {
        edits: EditSet,
        diagnostics: Vec<Diagnostic>,
    },
    Unplaced(Diagnostic),
}

/// Deepest scope appearing on every site's scope chain.
pub fn deepest_shared_scope(scopes: &ScopeTree, sites: &[&UsageSite]) -> Option<ScopeId> {
    let chains: Vec<Vec<ScopeId>> = sites.iter().map(|s| scopes.chain(s.scope)).collect();
    let (first, rest) = chains.split_first()?;
    first
        .iter()
        .copied()
        .find(|id| rest.iter().all(|chain| chain.contains(id)))
}

/// The closest common scope of `sites`. `None` when the only shared scope is
/// the program and no site sits directly at program level.
pub fn closest_common_scope(scopes: &ScopeTree, sites: &[&UsageSite]) -> Option<ScopeId> {
    let common = deepest_shared_scope(scopes, sites)?;
    let root = scopes.root();
    if common == root && !sites.iter().any(|s| scopes.lexical_scope(s.scope) == root) {
        return None;
    }
    Some(common)
}

/// Places a declaration of `name` covering every site in `usages`.
pub fn place(cx: &FileContext, name: &str, usages: &Usages, mode: SplitMode) -> Placement {
    let sites: Vec<&UsageSite> = usages.sites().iter().collect();
    let Some(first) = sites.first() else {
        return Placement::Placed {
            edits: EditSet::new(),
            diagnostics: Vec::new(),
        };
    };
    let scopes = cx.scopes();

    if let Some(target) = closest_common_scope(scopes, &sites) {
        return match place_in(cx, name, target, &sites) {
            Ok(edits) => Placement::Placed {
                edits,
                diagnostics: Vec::new(),
            },
            Err(diagnostic) => unplaced(diagnostic),
        };
    }

    if mode == SplitMode::Strict {
        return unplaced(cx.diagnostic(
            DiagnosticKind::NoCommonScope,
            name,
            "usages share no scope below the program",
            &first.node,
        ));
    }

    let groups = usages.by_top_level_scope(scopes);
    let mut edits = EditSet::new();
    for group in groups.values() {
        let Some(target) = deepest_shared_scope(scopes, group) else {
            continue;
        };
        match place_in(cx, name, target, group) {
            Ok(group_edits) => edits.extend(group_edits),
            Err(diagnostic) => return unplaced(diagnostic),
        }
    }
    let diagnostic = cx.diagnostic(
        DiagnosticKind::SplitDeclaration,
        name,
        format!(
            "declared separately in {} sibling scopes; the declarations are independent variables",
            groups.len()
        ),
        &first.node,
    );
    debug!(symbol = name, scopes = groups.len(), "split declaration");
    Placement::Placed {
        edits,
        diagnostics: vec![diagnostic],
    }
}

fn unplaced(diagnostic: Diagnostic) -> Placement {
    warn!(symbol = %diagnostic.symbol, kind = %diagnostic.kind, "{}", diagnostic.message);
    Placement::Unplaced(diagnostic)
}

fn place_in(
    cx: &FileContext,
    name: &str,
    target: ScopeId,
    sites: &[&UsageSite],
) -> Result<EditSet, Diagnostic> {
    let scopes = cx.scopes();
    let scope = scopes.scope(target);
    debug!(symbol = name, scope = %scope.kind, offset = ?scope.node.text_range().start(), "placing declaration");
    match scope.kind {
        ScopeKind::Program => program_assignment(cx, name),
        ScopeKind::Object => {
            if scopes.hoisting_scope(target) == scopes.root() {
                namespace_property(cx, name, &scope.node, sites)
            } else {
                place_in(cx, name, scopes.lexical_scope(target), sites)
            }
        }
        ScopeKind::ForHeader => match scope.parent {
            Some(owner) => place_in(cx, name, owner, sites),
            None => Err(cx.diagnostic(
                DiagnosticKind::UnresolvedScopeType,
                name,
                "loop header without an owning scope",
                &scope.node,
            )),
        },
        ScopeKind::Block | ScopeKind::Function | ScopeKind::Catch | ScopeKind::SwitchCase => {
            let Some(list) = layout::statement_list_of(&scope.node) else {
                return Err(cx.diagnostic(
                    DiagnosticKind::UnresolvedScopeType,
                    name,
                    format!("no statement list to declare in for {} scope", scope.kind),
                    &scope.node,
                ));
            };
            let mut edits = EditSet::new();
            if !layout::list_declares(&list, name) {
                layout::declare_vars(cx.source(), &list, &[name.to_string()], &mut edits);
            }
            Ok(edits)
        }
    }
}

/// Program policy: `name = value;` at top level becomes `var name = value;`.
/// A top-level `for` whose header assigns or iterates into `name` counts too.
fn program_assignment(cx: &FileContext, name: &str) -> Result<EditSet, Diagnostic> {
    let targets_name = |node: &SyntaxNode| {
        node.kind() == NAME_REF && ast::ident_text(node).as_deref() == Some(name)
    };
    let assigns_name = |expr: &SyntaxNode| {
        ast::assignment(expr).is_some_and(|a| a.is_plain() && targets_name(&a.target))
    };

    for stmt in ast::statements(cx.root()) {
        let anchor = match stmt.kind() {
            EXPR_STMT => stmt.first_child().filter(|e| assigns_name(e)),
            FOR_STMT => stmt
                .children()
                .find(|n| n.kind() == FOR_INIT)
                .and_then(|init| init.first_child())
                .filter(|e| assigns_name(e)),
            FOR_IN_STMT | FOR_OF_STMT => stmt.first_child().filter(|n| targets_name(n)),
            _ => None,
        };
        if let Some(anchor) = anchor {
            let mut edits = EditSet::new();
            edits.insert(anchor.text_range().start(), "var ");
            return Ok(edits);
        }
    }
    Err(Diagnostic::new(
        DiagnosticKind::MissingProgramAssignment,
        name,
        "no top-level assignment to turn into a declaration",
    ))
}

/// Dotted expression naming an object literal: the variable it initializes,
/// the property chain leading to it, or the target it is assigned to.
pub fn namespace_base(object: &SyntaxNode) -> Option<String> {
    let parent = object.parent()?;
    match parent.kind() {
        DECLARATOR if ast::declarator_init(&parent).as_ref() == Some(object) => {
            ast::declarator_name(&parent)
        }
        PROPERTY if ast::property_value(&parent).as_ref() == Some(object) => {
            let key = ast::property_key(&parent)?;
            let outer = parent.parent()?;
            Some(format!("{}.{key}", namespace_base(&outer)?))
        }
        ASSIGN_EXPR => {
            let assign = ast::assignment(&parent)?;
            (assign.value == *object).then(|| ast::code_text(&assign.target))
        }
        _ => None,
    }
}

/// Namespace policy: the object gets a `name: null` property and every usage
/// becomes a member access on the object.
fn namespace_property(
    cx: &FileContext,
    name: &str,
    object: &SyntaxNode,
    sites: &[&UsageSite],
) -> Result<EditSet, Diagnostic> {
    let Some(base) = namespace_base(object) else {
        return Err(cx.diagnostic(
            DiagnosticKind::UnresolvedScopeType,
            name,
            "object literal is neither bound to a name nor assigned",
            object,
        ));
    };
    let scopes = cx.scopes();
    let object_scope = scopes.scope_of(object);
    let eager = sites.iter().find(|site| {
        !scopes
            .chain(site.scope)
            .into_iter()
            .take_while(|&id| id != object_scope)
            .any(|id| scopes.scope(id).kind == ScopeKind::Function)
    });
    if let Some(site) = eager {
        return Err(cx.diagnostic(
            DiagnosticKind::UnsupportedShape,
            name,
            format!("used while `{base}` is still being built"),
            &site.node,
        ));
    }

    let member = format!("{base}.{name}");
    let mut edits = EditSet::new();
    let has_key = object
        .children()
        .any(|prop| ast::property_key(&prop).as_deref() == Some(name));
    if !has_key {
        layout::insert_first_property(cx.source(), object, &format!("{name}: null"), &mut edits);
    }

    for site in sites {
        match site.role {
            UsageRole::Declarator => fold_declarator(cx, name, &member, site, &mut edits)?,
            UsageRole::Binding => {
                return Err(cx.diagnostic(
                    DiagnosticKind::UnsupportedShape,
                    name,
                    "declared as a function or class inside the namespace",
                    &site.node,
                ));
            }
            UsageRole::Read | UsageRole::Write | UsageRole::ReadWrite => {
                let shorthand = site.node.parent().filter(ast::is_shorthand_property);
                match shorthand {
                    Some(prop) => edits.replace(prop.text_range(), format!("{name}: {member}")),
                    None => edits.replace(site.range(), member.clone()),
                }
            }
        }
    }
    Ok(edits)
}

/// `var name = init;` inside a namespace becomes `base.name = init;`.
fn fold_declarator(
    cx: &FileContext,
    name: &str,
    member: &str,
    site: &UsageSite,
    edits: &mut EditSet,
) -> Result<(), Diagnostic> {
    let declarator = site.node.parent().filter(|p| p.kind() == DECLARATOR);
    let decl = declarator.as_ref().and_then(|d| d.parent());
    let in_list = decl
        .as_ref()
        .and_then(|d| d.parent())
        .is_some_and(|p| ast::is_statement_list(&p));
    let (Some(declarator), Some(decl), true) = (declarator, decl, in_list) else {
        return Err(cx.diagnostic(
            DiagnosticKind::UnsupportedShape,
            name,
            "declaration cannot be folded into the namespace",
            &site.node,
        ));
    };
    let assignment = ast::declarator_init(&declarator).map(|init| format!("{member} = {init};"));
    if ast::declarators(&decl).len() == 1 {
        match assignment {
            Some(code) => layout::replace_statement(&decl, &code, edits),
            None => layout::remove_statement(&decl, edits),
        }
    } else {
        layout::remove_declarator(&decl, &declarator, edits);
        if let Some(code) = assignment {
            layout::insert_after(cx.source(), &decl, &code, edits);
        }
    }
    Ok(())
}

/// Rewrites a `var` statement in place so that it no longer declares
/// anything, returning the names it declared.
///
/// Loop headers keep their assignments (`for (i = 0, j = 1; ...)`, or the
/// bare name for `for-in`/`for-of`); elsewhere each initialized declarator
/// becomes an assignment statement and the rest disappear.
pub fn release(cx: &FileContext, decl: &SyntaxNode, edits: &mut EditSet) -> Result<Vec<String>, Diagnostic> {
    let mut parts = Vec::new();
    for declarator in ast::declarators(decl) {
        let Some(name) = ast::declarator_name(&declarator) else {
            return Err(cx.diagnostic(
                DiagnosticKind::UnsupportedShape,
                &ast::code_text(&declarator),
                "destructuring declarations are left in place",
                &declarator,
            ));
        };
        let init = ast::declarator_init(&declarator).map(|init| init.to_string());
        parts.push((name, init));
    }
    let names: Vec<String> = parts.iter().map(|(name, _)| name.clone()).collect();
    let Some(parent) = decl.parent() else {
        return Ok(names);
    };

    match parent.kind() {
        FOR_INIT => {
            let header: Vec<String> = parts
                .iter()
                .map(|(name, init)| match init {
                    Some(init) => format!("{name} = {init}"),
                    None => name.clone(),
                })
                .collect();
            edits.replace(ast::code_range(decl), header.join(", "));
        }
        FOR_IN_STMT | FOR_OF_STMT => edits.replace(ast::code_range(decl), names.join(", ")),
        _ => {
            let codes: Vec<String> = parts
                .iter()
                .filter_map(|(name, init)| init.as_ref().map(|init| format!("{name} = {init};")))
                .collect();
            layout::replace_with_statements(cx.source(), decl, &codes, edits);
        }
    }
    Ok(names)
}
