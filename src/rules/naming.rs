//! Renames bindings whose names break a naming convention.
//!
//! Both conventions share [`Rename`]: a binding is renamed at its
//! declaration and every reference that resolves to it. Program-level
//! bindings are part of what a file exposes and are only renamed with
//! `fix_exposed_functions`; undeclared names only with `fix_dependencies`.

use super::{Rule, RuleSettings, Step};
use crate::census::{Census, SymbolClass};
use crate::context::FileContext;
use crate::globals;
use crate::report::DiagnosticKind;
use crate::rewriter::EditSet;
use crate::scope::{BindingKind, ScopeId};
use crate::syntax::SyntaxKind::{self, *};
use crate::syntax::ast;
use crate::syntax::SyntaxNode;
use std::marker::PhantomData;
use tracing::debug;

/// A naming convention and its mechanical fix.
pub trait NamingPredicate {
    const NAME: &'static str;

    fn violates(name: &str) -> bool;

    fn fix(name: &str) -> String;
}

/// Splits `_$_name__` into its leading `_`/`$` run, the core and the
/// trailing `_` run.
fn affixes(name: &str) -> (&str, &str, &str) {
    let core_start = name
        .find(|c: char| c != '_' && c != '$')
        .unwrap_or(name.len());
    let (prefix, rest) = name.split_at(core_start);
    let core_end = rest.trim_end_matches('_').len();
    let (core, suffix) = rest.split_at(core_end);
    (prefix, core, suffix)
}

fn is_screaming(core: &str) -> bool {
    core.chars().any(char::is_alphabetic) && core.to_uppercase() == core
}

/// `snake_case` to `camelCase`. Constants in `SCREAMING_CASE` are fine.
pub struct Camelcase;

impl NamingPredicate for Camelcase {
    const NAME: &'static str = "no-camelcase";

    fn violates(name: &str) -> bool {
        let (_, core, _) = affixes(name);
        core.contains('_') && !core.contains("__") && !is_screaming(core)
    }

    fn fix(name: &str) -> String {
        let (prefix, core, suffix) = affixes(name);
        let mut out = prefix.to_string();
        for (i, word) in core.split('_').filter(|w| !w.is_empty()).enumerate() {
            if i == 0 {
                out.push_str(word);
                continue;
            }
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                let rest = chars.as_str();
                if is_screaming(word) {
                    out.push_str(&rest.to_lowercase());
                } else {
                    out.push_str(rest);
                }
            }
        }
        out.push_str(suffix);
        out
    }
}

/// Leading or trailing underscores.
pub struct UnderscoreDangle;

const DUNDER_ALLOWED: [&str; 3] = ["__proto__", "__dirname", "__filename"];

impl NamingPredicate for UnderscoreDangle {
    const NAME: &'static str = "no-underscore-dangle";

    fn violates(name: &str) -> bool {
        let core = name.trim_matches('_');
        core.len() != name.len()
            && !core.is_empty()
            && !is_screaming(core)
            && !DUNDER_ALLOWED.contains(&name)
    }

    fn fix(name: &str) -> String {
        name.trim_matches('_').to_string()
    }
}

pub struct Rename<'a, P> {
    census: Option<&'a Census>,
    settings: &'a RuleSettings,
    convention: PhantomData<P>,
}

impl<'a, P: NamingPredicate> Rename<'a, P> {
    pub fn new(census: Option<&'a Census>, settings: &'a RuleSettings) -> Self {
        Rename {
            census,
            settings,
            convention: PhantomData,
        }
    }

    fn subjects(&self, cx: &FileContext) -> Vec<Subject> {
        let scopes = cx.scopes();
        let mut subjects = Vec::new();
        for (id, scope) in scopes.iter() {
            if id == scopes.root() && !self.settings.fix_exposed_functions {
                continue;
            }
            for binding in &scope.bindings {
                if binding.kind == BindingKind::Import
                    || !P::violates(&binding.name)
                    || self.settings.externals.contains(&binding.name)
                    || under_export(&binding.node)
                {
                    continue;
                }
                let sites = binding_sites(cx, id, &binding.name);
                if sites.iter().any(under_export) {
                    continue;
                }
                subjects.push(Subject {
                    name: binding.name.clone(),
                    scope: Some(id),
                    sites,
                });
            }
        }
        if self.settings.fix_dependencies {
            for global in globals::find_globals(cx.tree(), cx.scopes()) {
                let implicit = match self.census {
                    Some(census) => {
                        census.classify(&global.name, false, &self.settings.externals)
                            == SymbolClass::ImplicitGlobal
                    }
                    None => !self.settings.externals.contains(&global.name),
                };
                if implicit && P::violates(&global.name) && !global.sites.iter().any(under_export) {
                    subjects.push(Subject {
                        name: global.name,
                        scope: None,
                        sites: global.sites,
                    });
                }
            }
        }
        subjects
    }

    /// Why `new_name` cannot replace the subject's name.
    fn collision(&self, cx: &FileContext, subject: &Subject, new_name: &str) -> Option<&'static str> {
        if !is_identifier_name(new_name) {
            return Some("the fixed name is not a valid identifier");
        }
        let within = match subject.scope {
            Some(id) => cx.scopes().scope(id).node.clone(),
            None => cx.root().clone(),
        };
        let in_use = within
            .descendants()
            .filter(|n| ast::is_identifier(n))
            .any(|n| ast::ident_text(&n).as_deref() == Some(new_name));
        if in_use {
            return Some("the fixed name is already in use");
        }
        let known_elsewhere = subject.scope.is_none()
            && (self.settings.externals.contains(new_name)
                || self.census.is_some_and(|census| {
                    census.is_exposed(new_name)
                        || census.is_read(new_name)
                        || census.implicit_globals().contains(new_name)
                }));
        known_elsewhere.then_some("the fixed name is a global elsewhere")
    }
}

/// One binding, or one undeclared name, with every occurrence.
struct Subject {
    name: String,
    scope: Option<ScopeId>,
    sites: Vec<SyntaxNode>,
}

fn under_export(node: &SyntaxNode) -> bool {
    node.ancestors().any(|n| n.kind() == EXPORT_DECL)
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
    valid_start
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && SyntaxKind::from_keyword(name).is_none()
        && !matches!(name, "let" | "static" | "yield" | "await" | "arguments" | "eval")
}

/// Identifiers named `name` that resolve to the binding in `scope`.
fn binding_sites(cx: &FileContext, scope: ScopeId, name: &str) -> Vec<SyntaxNode> {
    let scopes = cx.scopes();
    scopes
        .scope(scope)
        .node
        .descendants()
        .filter(|n| ast::is_identifier(n) && ast::ident_text(n).as_deref() == Some(name))
        .filter(|n| scopes.resolve(name, scopes.scope_of(n)) == Some(scope))
        .collect()
}

/// Whether an identifier is both key and value of an object literal or
/// pattern property.
fn is_shorthand(node: &SyntaxNode) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        PROPERTY => ast::is_shorthand_property(&parent),
        PATTERN_PROP => parent.first_child().as_ref() == Some(node),
        ASSIGN_PATTERN => {
            parent.first_child().as_ref() == Some(node)
                && parent
                    .parent()
                    .is_some_and(|p| p.kind() == PATTERN_PROP && p.first_child() == Some(parent.clone()))
        }
        _ => false,
    }
}

impl<P: NamingPredicate> Rule for Rename<'_, P> {
    type Symbol = String;

    const NAME: &'static str = P::NAME;

    fn eligible(&self, cx: &FileContext) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for subject in self.subjects(cx) {
            if !names.contains(&subject.name) {
                names.push(subject.name);
            }
        }
        names
    }

    fn step(&self, cx: &FileContext, name: &String) -> Step {
        let Some(subject) = self.subjects(cx).into_iter().find(|s| s.name == *name) else {
            return Step::Done;
        };
        let Some(anchor) = subject.sites.first() else {
            return Step::Done;
        };
        let new_name = P::fix(name);
        if let Some(reason) = self.collision(cx, &subject, &new_name) {
            return Step::Skip(cx.diagnostic(
                DiagnosticKind::NameCollision,
                name,
                format!("cannot rename to `{new_name}`: {reason}"),
                anchor,
            ));
        }
        debug!(rule = P::NAME, from = %name, to = %new_name, sites = subject.sites.len(), "renaming");
        let mut edits = EditSet::new();
        for site in &subject.sites {
            let Some(token) = ast::ident_token(site) else {
                continue;
            };
            if is_shorthand(site) {
                edits.replace(token.text_range(), format!("{name}: {new_name}"));
            } else {
                edits.replace(token.text_range(), new_name.as_str());
            }
        }
        Step::edit(edits)
    }
}
