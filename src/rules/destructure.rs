//! Destructures component props and state.
//!
//! In class members, `this.props.x` and `this.state.x` reads become `x`,
//! declared by `const { x } = this.props;` at the top of the member body.
//! Arrow functions taking `props` get a destructuring parameter instead,
//! absorbing `const alias = props.x;` declarations as `x: alias`.

use super::{Rule, Snippet, Step};
use crate::context::FileContext;
use crate::layout;
use crate::report::{Diagnostic, DiagnosticKind};
use crate::rewriter::EditSet;
use crate::syntax::SyntaxKind::{self, *};
use crate::syntax::ast::{self, DeclKind};
use crate::syntax::SyntaxNode;
use crate::usage;
use rowan::WalkEvent;
use std::collections::{HashMap, HashSet};
use std::fmt;

const SOURCES: [&str; 2] = ["props", "state"];

const PROPS_PARAM: &str = "props";

pub struct Destructure;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A class member, as `Class.member`, and the object read from `this`.
    Method { name: String, source: &'static str },
    /// An arrow function taking `props`.
    Arrow(Snippet),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Method { name, source } => write!(f, "{name} this.{source}"),
            Target::Arrow(snippet) => write!(f, "{snippet}"),
        }
    }
}

/// A class member with a body `this` refers into.
struct Member {
    name: String,
    body: SyntaxNode,
}

fn class_members(cx: &FileContext) -> Vec<Member> {
    let mut members = Vec::new();
    for body in cx.root().descendants().filter(|n| n.kind() == CLASS_BODY) {
        let class = body
            .parent()
            .and_then(|class| ast::own_name(&class))
            .and_then(|name| ast::ident_text(&name))
            .unwrap_or_else(|| "(anonymous)".to_string());
        for member in body.children() {
            let Some(key) = ast::property_key(&member) else {
                continue;
            };
            let function = match member.kind() {
                METHOD if key != "constructor" => Some(member.clone()),
                CLASS_PROPERTY => ast::property_value(&member)
                    .map(|value| ast::unparen(&value))
                    .filter(|value| value.kind() == ARROW_FUNCTION),
                _ => None,
            };
            if let Some(body) = function.as_ref().and_then(ast::function_body) {
                members.push(Member {
                    name: format!("{class}.{key}"),
                    body,
                });
            }
        }
    }
    members
}

/// `this.<source>` as written in `node`.
fn is_this_member(node: &SyntaxNode, source: &str) -> bool {
    node.kind() == MEMBER_EXPR
        && ast::has_token(node, DOT)
        && node.first_child().is_some_and(|object| object.kind() == THIS_EXPR)
        && ast::member_property(node).is_some_and(|p| p.text() == source)
}

/// Whether a member expression is assigned, updated or deleted.
fn is_written(member: &SyntaxNode) -> bool {
    usage::reference_access(member).writes()
        || member.parent().is_some_and(|parent| {
            parent.kind() == PREFIX_EXPR && ast::has_token(&parent, DELETE_KW)
        })
}

fn is_callee(member: &SyntaxNode) -> bool {
    member
        .parent()
        .is_some_and(|p| p.kind() == CALL_EXPR && p.first_child().as_ref() == Some(member))
}

/// Whether `name` can be declared as a plain binding.
fn is_bindable(name: &str) -> bool {
    SyntaxKind::from_keyword(name).is_none()
        && !matches!(name, "let" | "static" | "yield" | "await" | "arguments" | "eval")
}

fn identifiers_in(node: &SyntaxNode, except: &[SyntaxNode]) -> HashSet<String> {
    node.descendants()
        .filter(|n| ast::is_identifier(n))
        .filter(|n| !except.iter().any(|e| e.text_range().contains_range(n.text_range())))
        .filter_map(|n| ast::ident_text(&n))
        .collect()
}

/// Property accesses `this.<source>.x` under `body`, leaving out nested
/// functions and classes where `this` is rebound.
fn this_reads(body: &SyntaxNode, source: &str) -> (Vec<(SyntaxNode, String)>, Option<SyntaxNode>) {
    let mut sites = Vec::new();
    let mut computed = None;
    let mut preorder = body.preorder();
    while let Some(event) = preorder.next() {
        let WalkEvent::Enter(node) = event else {
            continue;
        };
        match node.kind() {
            FUNCTION_EXPR | FUNCTION_DECL | METHOD | CLASS_BODY => preorder.skip_subtree(),
            MEMBER_EXPR | INDEX_EXPR
                if node.first_child().is_some_and(|object| is_this_member(&object, source)) =>
            {
                let property = ast::member_property(&node).filter(|_| ast::has_token(&node, DOT));
                match property {
                    Some(property) => sites.push((node.clone(), property.text().to_string())),
                    None if computed.is_none() => computed = Some(node.clone()),
                    None => {}
                }
            }
            _ => {}
        }
    }
    (sites, computed)
}

/// An existing `const { .. } = this.<source>;` heading the member body.
struct Existing {
    pattern: SyntaxNode,
    /// Destructured key to local name.
    locals: HashMap<String, String>,
    mergeable: bool,
}

fn existing_destructuring(body: &SyntaxNode, source: &str) -> Option<Existing> {
    let decl = ast::statements(body).find(|stmt| {
        stmt.kind() == VAR_DECL
            && ast::decl_kind(stmt) == Some(DeclKind::Const)
            && ast::declarators(stmt).len() == 1
            && ast::declarators(stmt).first().is_some_and(|d| {
                ast::declarator_target(d).is_some_and(|t| t.kind() == OBJECT_PATTERN)
                    && ast::declarator_init(d).is_some_and(|init| is_this_member(&ast::unparen(&init), source))
            })
    })?;
    let pattern = ast::declarators(&decl)
        .first()
        .and_then(ast::declarator_target)?;
    let mut locals = HashMap::new();
    let mut mergeable = true;
    for prop in pattern.children() {
        match prop.kind() {
            PATTERN_PROP => {
                let first = prop.first_child();
                let shorthand = first.as_ref().and_then(|first| match first.kind() {
                    NAME => Some(first.clone()),
                    ASSIGN_PATTERN => first.first_child().filter(|n| n.kind() == NAME),
                    _ => None,
                });
                if let Some(name) = shorthand.and_then(|n| ast::ident_text(&n)) {
                    locals.insert(name.clone(), name);
                } else if let Some(key) = ast::property_key(&prop)
                    && let Some(local) = ast::node_after_token(&prop, COLON)
                        .filter(|n| n.kind() == NAME)
                        .and_then(|n| ast::ident_text(&n))
                {
                    locals.insert(key, local);
                }
            }
            _ => mergeable = false,
        }
    }
    Some(Existing {
        pattern,
        locals,
        mergeable,
    })
}

/// Declares `names` in `existing` or in a new statement.
fn declare(
    cx: &FileContext,
    body: &SyntaxNode,
    existing: Option<&Existing>,
    source: &str,
    names: &[String],
    edits: &mut EditSet,
) {
    if names.is_empty() {
        return;
    }
    let Some(existing) = existing else {
        let text = format!("const {{ {} }} = this.{source};", names.join(", "));
        layout::prepend(cx.source(), body, &text, edits);
        return;
    };
    match existing.pattern.children().last() {
        Some(last) => edits.insert(last.text_range().end(), format!(", {}", names.join(", "))),
        None => {
            if let Some(l_brace) = existing
                .pattern
                .children_with_tokens()
                .find(|e| e.kind() == L_BRACE)
            {
                edits.insert(l_brace.text_range().end(), format!(" {} ", names.join(", ")));
            }
        }
    }
}

fn plan_member(
    cx: &FileContext,
    member: &Member,
    source: &'static str,
    symbol: &str,
) -> Result<Option<EditSet>, Diagnostic> {
    let (sites, computed) = this_reads(&member.body, source);
    if let Some(node) = computed {
        return Err(cx.diagnostic(
            DiagnosticKind::Ineligible,
            symbol,
            format!("this.{source} is accessed with a computed key"),
            &node,
        ));
    }
    let sites: Vec<(SyntaxNode, String)> = sites
        .into_iter()
        .filter(|(node, _)| !is_callee(node))
        .collect();
    if sites.is_empty() {
        return Ok(None);
    }

    let existing = existing_destructuring(&member.body, source).filter(|existing| {
        existing.mergeable
            && sites
                .iter()
                .all(|(node, _)| node.text_range().start() >= existing.pattern.text_range().end())
    });
    let except: Vec<SyntaxNode> = existing.iter().map(|e| e.pattern.clone()).collect();
    let function = member.body.parent().unwrap_or_else(|| member.body.clone());
    let taken = identifiers_in(&function, &except);

    let written: Vec<&String> = sites
        .iter()
        .filter(|(node, _)| is_written(node))
        .map(|(_, prop)| prop)
        .collect();
    let mut blocked: Vec<(DiagnosticKind, String, SyntaxNode)> = Vec::new();
    let mut locals: Vec<(String, String)> = Vec::new();
    let mut added: Vec<String> = Vec::new();
    for (node, prop) in &sites {
        if locals.iter().any(|(p, _)| p == prop) || blocked.iter().any(|(_, p, _)| p == prop) {
            continue;
        }
        if written.contains(&prop) {
            blocked.push((DiagnosticKind::Ineligible, prop.clone(), node.clone()));
            continue;
        }
        match existing.as_ref().and_then(|e| e.locals.get(prop)) {
            Some(local) => locals.push((prop.clone(), local.clone())),
            None if is_bindable(prop) && !taken.contains(prop) => {
                locals.push((prop.clone(), prop.clone()));
                added.push(prop.clone());
            }
            None => blocked.push((DiagnosticKind::NameCollision, prop.clone(), node.clone())),
        }
    }

    if locals.is_empty() {
        let Some((kind, _, node)) = blocked.first() else {
            return Ok(None);
        };
        let names: Vec<String> = blocked
            .iter()
            .map(|(_, prop, _)| format!("this.{source}.{prop}"))
            .collect();
        let reason = match kind {
            DiagnosticKind::Ineligible => "written in this member",
            _ => "would collide with existing names",
        };
        return Err(cx.diagnostic(*kind, symbol, format!("{} {reason}", names.join(", ")), node));
    }

    let mut edits = EditSet::new();
    for (node, prop) in &sites {
        if let Some((_, local)) = locals.iter().find(|(p, _)| p == prop) {
            edits.replace(node.text_range(), local.as_str());
        }
    }
    declare(cx, &member.body, existing.as_ref(), source, &added, &mut edits);
    Ok(Some(edits))
}

/// Arrow functions with a plain `props` parameter.
fn props_arrows(cx: &FileContext) -> Vec<(SyntaxNode, SyntaxNode)> {
    cx.root()
        .descendants()
        .filter(|n| n.kind() == ARROW_FUNCTION)
        .filter_map(|arrow| {
            let param = ast::params(&arrow).into_iter().find(|p| {
                p.kind() == NAME && ast::ident_text(p).as_deref() == Some(PROPS_PARAM)
            })?;
            Some((arrow, param))
        })
        .collect()
}

/// `const alias = props.x;` directly in the arrow body.
fn alias_declaration(
    member: &SyntaxNode,
    body: Option<&SyntaxNode>,
) -> Option<(SyntaxNode, SyntaxNode)> {
    let declarator = member.parent().filter(|p| p.kind() == DECLARATOR)?;
    if ast::declarator_init(&declarator).as_ref() != Some(member) {
        return None;
    }
    let name = ast::declarator_target(&declarator).filter(|t| t.kind() == NAME)?;
    let decl = declarator.parent()?;
    let in_body = decl.parent().is_some_and(|p| Some(&p) == body);
    (in_body && ast::decl_kind(&decl) == Some(DeclKind::Const) && ast::declarators(&decl).len() == 1)
        .then_some((decl, name))
}

fn plan_arrow(
    cx: &FileContext,
    arrow: &SyntaxNode,
    param: &SyntaxNode,
    symbol: &str,
) -> Result<Option<EditSet>, Diagnostic> {
    let scopes = cx.scopes();
    let Some(arrow_scope) = scopes.opened_by(arrow) else {
        return Ok(None);
    };
    let refs: Vec<SyntaxNode> = arrow
        .descendants()
        .filter(|n| n.kind() == NAME_REF && ast::ident_text(n).as_deref() == Some(PROPS_PARAM))
        .filter(|n| scopes.resolve(PROPS_PARAM, scopes.scope_of(n)) == Some(arrow_scope))
        .collect();
    if refs.is_empty() {
        return Ok(None);
    }

    let body = ast::function_body(arrow);
    let mut sites: Vec<(SyntaxNode, String)> = Vec::new();
    for reference in &refs {
        let member = reference
            .parent()
            .filter(|m| m.kind() == MEMBER_EXPR && ast::has_token(m, DOT))
            .filter(|m| m.first_child().as_ref() == Some(reference));
        let Some((member, property)) = member.and_then(|m| {
            let property = ast::member_property(&m)?;
            Some((m, property.text().to_string()))
        }) else {
            return Err(cx.diagnostic(
                DiagnosticKind::Ineligible,
                symbol,
                "`props` is used as a whole",
                reference,
            ));
        };
        if is_written(&member) || is_callee(&member) {
            return Err(cx.diagnostic(
                DiagnosticKind::Ineligible,
                symbol,
                format!("props.{property} is written or called"),
                &member,
            ));
        }
        sites.push((member, property));
    }

    let mut aliases: HashMap<String, String> = HashMap::new();
    let mut alias_decls: Vec<SyntaxNode> = Vec::new();
    let mut alias_names: Vec<SyntaxNode> = Vec::new();
    for (member, property) in &sites {
        if aliases.contains_key(property) {
            continue;
        }
        if let Some((decl, name)) = alias_declaration(member, body.as_ref())
            && let Some(alias) = ast::ident_text(&name)
        {
            aliases.insert(property.clone(), alias);
            alias_decls.push(decl);
            alias_names.push(name);
        }
    }

    let mut except = alias_names;
    except.push(param.clone());
    except.extend(refs.iter().cloned());
    let taken = identifiers_in(arrow, &except);
    let mut fields: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (member, property) in &sites {
        if !seen.insert(property.as_str()) {
            continue;
        }
        match aliases.get(property) {
            Some(alias) if alias == property => fields.push(property.clone()),
            Some(alias) => fields.push(format!("{property}: {alias}")),
            None if is_bindable(property) && !taken.contains(property) => {
                fields.push(property.clone())
            }
            None => {
                return Err(cx.diagnostic(
                    DiagnosticKind::NameCollision,
                    symbol,
                    format!("props.{property} would collide with an existing name"),
                    member,
                ));
            }
        }
    }

    let mut edits = EditSet::new();
    let pattern = format!("{{ {} }}", fields.join(", "));
    let parenthesized = ast::param_list(arrow).is_some_and(|list| ast::has_token(&list, L_PAREN));
    if parenthesized {
        edits.replace(param.text_range(), pattern);
    } else {
        edits.replace(param.text_range(), format!("({pattern})"));
    }
    for (member, property) in &sites {
        let removed = alias_decls
            .iter()
            .any(|decl| decl.text_range().contains_range(member.text_range()));
        if removed {
            continue;
        }
        let local = aliases.get(property).unwrap_or(property);
        edits.replace(member.text_range(), local.as_str());
    }
    layout::remove_statements(&alias_decls, &mut edits);
    Ok(Some(edits))
}

impl Rule for Destructure {
    type Symbol = Target;

    const NAME: &'static str = "destruct-assign";

    fn eligible(&self, cx: &FileContext) -> Vec<Target> {
        let mut targets: Vec<Target> = Vec::new();
        for member in class_members(cx) {
            for source in SOURCES {
                if this_reads(&member.body, source).0.is_empty() {
                    continue;
                }
                let target = Target::Method {
                    name: member.name.clone(),
                    source,
                };
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        for (arrow, _) in props_arrows(cx) {
            let target = Target::Arrow(Snippet::of(&arrow));
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    fn step(&self, cx: &FileContext, target: &Target) -> Step {
        let symbol = target.to_string();
        let planned = match target {
            Target::Method { name, source } => class_members(cx)
                .iter()
                .filter(|member| member.name == *name)
                .map(|member| plan_member(cx, member, source, &symbol))
                .find(|plan| !matches!(plan, Ok(None))),
            Target::Arrow(snippet) => props_arrows(cx)
                .iter()
                .filter(|(arrow, _)| snippet.matches(arrow))
                .map(|(arrow, param)| plan_arrow(cx, arrow, param, &symbol))
                .find(|plan| !matches!(plan, Ok(None))),
        };
        match planned {
            Some(Ok(Some(edits))) => Step::edit(edits),
            Some(Err(diagnostic)) => Step::Skip(diagnostic),
            _ => Step::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::run;

    fn fix(source: &str) -> String {
        run(&Destructure, source).unwrap().source
    }

    #[test]
    fn class_method_reads_props_and_state() {
        insta::assert_snapshot!(fix("class Panel extends Component {\n  render() {\n    return this.props.title + this.state.count + this.props.title;\n  }\n}\n"), @r"
        class Panel extends Component {
          render() {
            const { count } = this.state;
            const { title } = this.props;
            return title + count + title;
          }
        }
        ");
    }

    #[test]
    fn class_property_arrows_are_members() {
        insta::assert_snapshot!(fix("class Panel {\n  onSelect = () => {\n    return this.props.item;\n  };\n}\n"), @r"
        class Panel {
          onSelect = () => {
            const { item } = this.props;
            return item;
          };
        }
        ");
    }

    #[test]
    fn merges_into_existing_destructuring() {
        assert_eq!(
            fix("class A {\n  render() {\n    const { a } = this.props;\n    return a + this.props.b;\n  }\n}"),
            "class A {\n  render() {\n    const { a, b } = this.props;\n    return a + b;\n  }\n}"
        );
    }

    #[test]
    fn existing_aliases_are_reused() {
        assert_eq!(
            fix("class A {\n  render() {\n    const { a: first } = this.props;\n    return first + this.props.a;\n  }\n}"),
            "class A {\n  render() {\n    const { a: first } = this.props;\n    return first + first;\n  }\n}"
        );
    }

    #[test]
    fn collisions_are_skipped() {
        let source = "class A {\n  render() {\n    const b = 1;\n    return this.props.b + b;\n  }\n}";
        let outcome = run(&Destructure, source).unwrap();
        assert_eq!(outcome.source, source);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::NameCollision);
    }

    #[test]
    fn writes_are_ineligible() {
        let source = "class A {\n  reset() {\n    this.state.count = 0;\n  }\n}";
        let outcome = run(&Destructure, source).unwrap();
        assert_eq!(outcome.source, source);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Ineligible);
    }

    #[test]
    fn callees_keep_their_receiver() {
        let source = "class A {\n  save() {\n    this.props.onSave();\n  }\n}";
        let outcome = run(&Destructure, source).unwrap();
        assert_eq!(outcome.source, source);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn constructors_and_nested_functions_are_left_alone() {
        let source = "class A {\n  constructor(props) {\n    super(props);\n    this.x = this.props.x;\n  }\n  later() {\n    return function () { return this.props.y; };\n  }\n}";
        assert_eq!(fix(source), source);
    }

    #[test]
    fn arrow_props_become_a_pattern() {
        insta::assert_snapshot!(fix("const Card = (props) => {\n  const label = props.title;\n  return label + props.body;\n};\n"), @r"
        const Card = ({ title: label, body }) => {
          return label + body;
        };
        ");
    }

    #[test]
    fn bare_arrow_parameter_gets_parentheses() {
        assert_eq!(fix("const f = props => props.a;"), "const f = ({ a }) => a;");
    }

    #[test]
    fn whole_props_use_is_ineligible() {
        let source = "const g = (props) => h(props, props.a);";
        let outcome = run(&Destructure, source).unwrap();
        assert_eq!(outcome.source, source);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Ineligible);
    }

    #[test]
    fn arrow_collisions_are_skipped() {
        let source = "const g = (props) => { const a = 1; return a + props.a; };";
        let outcome = run(&Destructure, source).unwrap();
        assert_eq!(outcome.source, source);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::NameCollision);
    }
}
