//! Rewrite rules and the dispatcher that drives them.
//!
//! A rule enumerates the symbols it could fix in the current text and then
//! fixes them one step at a time. Every step sees a freshly parsed
//! [`FileContext`], so offsets are always resolved against the text the
//! edits will be applied to. Passes repeat until one makes no edit.

pub mod block_scoped;
pub mod destructure;
pub mod leaking_globals;
pub mod lonely_if;
pub mod naming;
pub mod nested_ternary;
pub mod unused_assigned;
pub mod unused_vars;

use crate::census::Census;
use crate::context::FileContext;
use crate::error::FixError;
use crate::placement::SplitMode;
use crate::report::{Diagnostic, DiagnosticKind};
use crate::rewriter::{self, EditSet};
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::{ParseError, SyntaxNode};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::path::Path;
use tracing::{debug, warn};

/// Passes over one file before giving up on reaching a fixed point.
pub const MAX_PASSES: usize = 16;

/// Consecutive steps on one symbol within a pass.
const MAX_STEPS_PER_SYMBOL: usize = 64;

/// Result of one step on one symbol.
#[derive(Debug)]
pub enum Step {
    /// Edits to apply, plus notes about the fix. Empty edits end the symbol.
    Edit {
        edits: EditSet,
        diagnostics: Vec<Diagnostic>,
    },
    /// Nothing left to do for this symbol.
    Done,
    /// The symbol cannot be fixed; it is not retried in later passes.
    Skip(Diagnostic),
}

impl Step {
    pub fn edit(edits: EditSet) -> Self {
        Step::Edit {
            edits,
            diagnostics: Vec::new(),
        }
    }
}

pub trait Rule {
    type Symbol: Clone + Eq + Hash + fmt::Display;

    const NAME: &'static str;

    /// Symbols the rule could fix in `cx`, in discovery order.
    fn eligible(&self, cx: &FileContext) -> Vec<Self::Symbol>;

    /// Makes progress on `symbol` against the current text.
    fn step(&self, cx: &FileContext, symbol: &Self::Symbol) -> Step;
}

/// Selectable rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    LeakingGlobalVars,
    UnusedAssignedVars,
    NoUnusedVars,
    BlockScopedVars,
    NoNestedTernary,
    NoLonelyIf,
    DestructAssign,
    NoCamelcase,
    NoUnderscoreDangle,
}

impl RuleKind {
    pub const ALL: [RuleKind; 9] = [
        RuleKind::LeakingGlobalVars,
        RuleKind::UnusedAssignedVars,
        RuleKind::NoUnusedVars,
        RuleKind::BlockScopedVars,
        RuleKind::NoNestedTernary,
        RuleKind::NoLonelyIf,
        RuleKind::DestructAssign,
        RuleKind::NoCamelcase,
        RuleKind::NoUnderscoreDangle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuleKind::LeakingGlobalVars => "leaking-global-vars",
            RuleKind::UnusedAssignedVars => "unused-assigned-vars",
            RuleKind::NoUnusedVars => "no-unused-vars",
            RuleKind::BlockScopedVars => "block-scoped-vars",
            RuleKind::NoNestedTernary => "no-nested-ternary",
            RuleKind::NoLonelyIf => "no-lonely-if",
            RuleKind::DestructAssign => "destruct-assign",
            RuleKind::NoCamelcase => "no-camelcase",
            RuleKind::NoUnderscoreDangle => "no-underscore-dangle",
        }
    }

    /// Whether the rule reads the directory-wide census. The driver builds
    /// one before the rewrite pass only for these rules.
    pub fn needs_census(self) -> bool {
        matches!(
            self,
            RuleKind::LeakingGlobalVars
                | RuleKind::UnusedAssignedVars
                | RuleKind::NoUnusedVars
                | RuleKind::NoCamelcase
                | RuleKind::NoUnderscoreDangle
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleKind::LeakingGlobalVars => "declare variables that are assigned without a declaration",
            RuleKind::UnusedAssignedVars => "drop implicit globals that are only ever assigned",
            RuleKind::NoUnusedVars => "remove unused declarations, trailing parameters and inner functions",
            RuleKind::BlockScopedVars => "move `var` declarations out of blocks and loop headers",
            RuleKind::NoNestedTernary => "turn nested conditionals into if/else",
            RuleKind::NoLonelyIf => "collapse `else { if }` into `else if`",
            RuleKind::DestructAssign => "destructure repeated props and state reads",
            RuleKind::NoCamelcase => "rename snake_case bindings to camelCase",
            RuleKind::NoUnderscoreDangle => "strip leading and trailing underscores from bindings",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by all rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSettings {
    pub split_mode: SplitMode,
    /// Names supplied from outside the codebase; never fixed.
    pub externals: BTreeSet<String>,
    /// Let naming rules rename program-level bindings.
    pub fix_exposed_functions: bool,
    /// Let naming rules rename implicit globals.
    pub fix_dependencies: bool,
}

/// What a rule did to one source text.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub source: String,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Edits applied.
    pub steps: usize,
}

/// Runs `rule` over `source` until a pass makes no edit.
pub fn run<R: Rule>(rule: &R, source: &str) -> Result<Outcome, ParseError> {
    let mut cx = FileContext::parse(source)?;
    let mut diagnostics = Vec::new();
    let mut skipped: HashSet<R::Symbol> = HashSet::new();
    let mut steps = 0;

    for pass in 1..=MAX_PASSES {
        let mut progressed = false;
        for symbol in rule.eligible(&cx) {
            if skipped.contains(&symbol) {
                continue;
            }
            for _ in 0..MAX_STEPS_PER_SYMBOL {
                match rule.step(&cx, &symbol) {
                    Step::Done => break,
                    Step::Skip(diagnostic) => {
                        debug!(rule = R::NAME, %symbol, kind = %diagnostic.kind, "skipped");
                        diagnostics.push(diagnostic);
                        skipped.insert(symbol.clone());
                        break;
                    }
                    Step::Edit {
                        edits,
                        diagnostics: notes,
                    } => {
                        diagnostics.extend(notes);
                        if edits.is_empty() {
                            break;
                        }
                        match cx.apply(&edits) {
                            Ok(next) => {
                                cx = next;
                                steps += 1;
                                progressed = true;
                            }
                            Err(err) => {
                                warn!(rule = R::NAME, %symbol, "discarding edit: {err}");
                                diagnostics.push(Diagnostic::new(
                                    DiagnosticKind::InvalidRewrite,
                                    symbol.to_string(),
                                    err.to_string(),
                                ));
                                skipped.insert(symbol.clone());
                                break;
                            }
                        }
                    }
                }
            }
        }
        if !progressed {
            break;
        }
        if pass == MAX_PASSES {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::PassLimit,
                R::NAME,
                format!("still changing after {MAX_PASSES} passes"),
            ));
        }
    }

    let changed = cx.source() != source;
    Ok(Outcome {
        source: cx.into_source(),
        changed,
        diagnostics,
        steps,
    })
}

/// Applies the rule `kind` to `source`.
pub fn apply_source(
    kind: RuleKind,
    source: &str,
    census: Option<&Census>,
    settings: &RuleSettings,
) -> Result<Outcome, ParseError> {
    match kind {
        RuleKind::LeakingGlobalVars => run(&leaking_globals::LeakingGlobals::new(census, settings), source),
        RuleKind::UnusedAssignedVars => run(&unused_assigned::UnusedAssigned::new(census, settings), source),
        RuleKind::NoUnusedVars => run(&unused_vars::UnusedVars::new(census), source),
        RuleKind::BlockScopedVars => run(&block_scoped::BlockScoped, source),
        RuleKind::NoNestedTernary => run(&nested_ternary::NestedTernary, source),
        RuleKind::NoLonelyIf => run(&lonely_if::LonelyIf, source),
        RuleKind::DestructAssign => run(&destructure::Destructure, source),
        RuleKind::NoCamelcase => run(&naming::Rename::<naming::Camelcase>::new(census, settings), source),
        RuleKind::NoUnderscoreDangle => run(
            &naming::Rename::<naming::UnderscoreDangle>::new(census, settings),
            source,
        ),
    }
}

/// Applies the rule `kind` to the file at `path`. Returns the new text, or
/// `None` when nothing changed; with `in_place` the new text is written back.
/// If that write fails, the new text comes back in [`FixError::Write`].
pub fn apply_file(
    kind: RuleKind,
    path: &Path,
    census: Option<&Census>,
    settings: &RuleSettings,
    in_place: bool,
) -> Result<Option<String>, FixError> {
    let source = fs::read_to_string(path).map_err(|source| FixError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let outcome =
        apply_source(kind, &source, census, settings).map_err(|err| FixError::parse(path, err))?;
    if !outcome.changed {
        return Ok(None);
    }
    if in_place {
        rewriter::persist(path, &outcome.source)?;
    }
    Ok(Some(outcome.source))
}

/// Source text of `expr` as a statement on its own, parenthesized where a
/// leading token would otherwise start a declaration or a block.
pub fn expression_statement(expr: &SyntaxNode) -> String {
    let code = ast::code_text(expr);
    let ambiguous = ast::significant_tokens(expr).next().is_some_and(|first| {
        matches!(first.kind(), L_BRACE | FUNCTION_KW | CLASS_KW)
            || (first.kind() == IDENT && first.text() == "let")
    }) || expr.kind() == FUNCTION_EXPR;
    if ambiguous {
        format!("({code});")
    } else {
        format!("{code};")
    }
}

/// A symbol identified by the code of the construct it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snippet(String);

impl Snippet {
    pub fn of(node: &SyntaxNode) -> Self {
        Snippet(ast::code_text(node))
    }

    pub fn matches(&self, node: &SyntaxNode) -> bool {
        ast::code_text(node) == self.0
    }
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 40;
        let line = self.0.lines().next().unwrap_or_default();
        let shortened: String = line.chars().take(WIDTH).collect();
        if shortened.len() < self.0.len() {
            write!(f, "{shortened}...")
        } else {
            f.write_str(&shortened)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxTree;

    /// Appends `;` to every expression statement that lacks one.
    struct Semicolons;

    impl Rule for Semicolons {
        type Symbol = usize;
        const NAME: &'static str = "semicolons";

        fn eligible(&self, cx: &FileContext) -> Vec<usize> {
            let missing = ast::statements(cx.root())
                .filter(|s| s.kind() == EXPR_STMT && !ast::has_semicolon(s))
                .count();
            if missing > 0 { vec![0] } else { Vec::new() }
        }

        fn step(&self, cx: &FileContext, _: &usize) -> Step {
            let Some(stmt) = ast::statements(cx.root())
                .find(|s| s.kind() == EXPR_STMT && !ast::has_semicolon(s))
            else {
                return Step::Done;
            };
            let mut edits = EditSet::new();
            edits.insert(ast::code_range(&stmt).end(), ";");
            Step::edit(edits)
        }
    }

    /// Produces an edit that breaks the syntax.
    struct Breaker;

    impl Rule for Breaker {
        type Symbol = String;
        const NAME: &'static str = "breaker";

        fn eligible(&self, _: &FileContext) -> Vec<String> {
            vec!["x".to_string()]
        }

        fn step(&self, _: &FileContext, _: &String) -> Step {
            let mut edits = EditSet::new();
            edits.insert(0.into(), "(");
            Step::edit(edits)
        }
    }

    #[test]
    fn steps_until_done() {
        let outcome = run(&Semicolons, "a()\nb()\nc();\n").unwrap();
        assert_eq!(outcome.source, "a();\nb();\nc();\n");
        assert!(outcome.changed);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn unparsable_edit_is_discarded() {
        let outcome = run(&Breaker, "x = 1;").unwrap();
        assert_eq!(outcome.source, "x = 1;");
        assert!(!outcome.changed);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::InvalidRewrite);
    }

    #[test]
    fn parse_failure_is_an_error() {
        assert!(run(&Semicolons, "var = ;").is_err());
    }

    #[test]
    fn rule_names_match_command_line_values() {
        use clap::ValueEnum;
        for kind in RuleKind::ALL {
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.name());
        }
    }

    #[test]
    fn census_is_built_only_for_rules_that_read_it() {
        let census_rules: Vec<_> = RuleKind::ALL
            .into_iter()
            .filter(|kind| kind.needs_census())
            .map(RuleKind::name)
            .collect();
        assert_eq!(
            census_rules,
            [
                "leaking-global-vars",
                "unused-assigned-vars",
                "no-unused-vars",
                "no-camelcase",
                "no-underscore-dangle"
            ]
        );
    }

    #[test]
    fn expression_statements_keep_their_meaning() {
        let tree = SyntaxTree::parse("x = [g(), {a: 1}, function () {}];").unwrap();
        let exprs: Vec<String> = tree
            .root()
            .descendants()
            .filter(|n| n.parent().is_some_and(|p| p.kind() == ARRAY_EXPR))
            .map(|n| expression_statement(&n))
            .collect();
        assert_eq!(exprs, ["g();", "({a: 1});", "(function () {});"]);
    }

    #[test]
    fn apply_file_writes_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leak.js");
        fs::write(&path, "function test() { i = 0; }").unwrap();
        let settings = RuleSettings::default();

        let preview = apply_file(RuleKind::LeakingGlobalVars, &path, None, &settings, false).unwrap();
        assert!(preview.is_some());
        assert_eq!(fs::read_to_string(&path).unwrap(), "function test() { i = 0; }");

        let written = apply_file(RuleKind::LeakingGlobalVars, &path, None, &settings, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written.unwrap());
        let again = apply_file(RuleKind::LeakingGlobalVars, &path, None, &settings, true).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn snippet_display_is_one_short_line() {
        let snippet = Snippet("a ? b : c ? d : e".to_string());
        assert_eq!(snippet.to_string(), "a ? b : c ? d : e");
        let long = Snippet(format!("if (x) {{\n{}\n}}", "y();".repeat(20)));
        assert_eq!(long.to_string(), "if (x) {...");
    }
}
