//! Diagnostics and run reports.
//!
//! Rules never fail on a symbol they cannot fix; they leave it untouched and
//! record a [`Diagnostic`] instead. Per-file outcomes roll up into a
//! [`RunReport`] that the command line prints as text or JSON.

use crate::syntax::offset_to_line_col;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// No placement policy exists for the scope the declaration would go to.
    UnresolvedScopeType,
    /// A program-level declaration needs an existing `name = value` statement.
    MissingProgramAssignment,
    /// Usages share no scope and split declarations are disabled.
    NoCommonScope,
    /// The symbol was declared separately in several sibling scopes.
    SplitDeclaration,
    /// A destructuring pattern or other shape the rewrite does not handle.
    UnsupportedShape,
    /// A rename would clash with an existing binding.
    NameCollision,
    /// The construct mentions something that cannot move into a new function.
    Ineligible,
    /// An edit produced text that no longer parses; the edit was discarded.
    InvalidRewrite,
    /// The rule kept producing edits past the pass limit.
    PassLimit,
}

impl DiagnosticKind {
    /// Whether the symbol was left untouched. A split declaration is applied
    /// and only carries a shadowing caveat.
    pub fn left_unfixed(self) -> bool {
        !matches!(self, DiagnosticKind::SplitDeclaration)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::UnresolvedScopeType => "unresolved-scope-type",
            DiagnosticKind::MissingProgramAssignment => "missing-program-assignment",
            DiagnosticKind::NoCommonScope => "no-common-scope",
            DiagnosticKind::SplitDeclaration => "split-declaration",
            DiagnosticKind::UnsupportedShape => "unsupported-shape",
            DiagnosticKind::NameCollision => "name-collision",
            DiagnosticKind::Ineligible => "ineligible",
            DiagnosticKind::InvalidRewrite => "invalid-rewrite",
            DiagnosticKind::PassLimit => "pass-limit",
        };
        f.write_str(name)
    }
}

/// A condition a rule reported instead of (or alongside) fixing a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub symbol: String,
    pub message: String,
    /// Line number, 1-indexed, in the text the condition was found in.
    pub line: usize,
    /// Column number, 1-indexed.
    pub column: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            symbol: symbol.into(),
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    /// Anchors the diagnostic at a byte offset of `source`.
    pub fn at(mut self, source: &str, offset: impl Into<usize>) -> Self {
        let (line, column) = offset_to_line_col(source, offset.into());
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}: ", self.line, self.column)?;
        }
        write!(f, "[{}] {}: {}", self.kind, self.symbol, self.message)
    }
}

/// Where a file ended up in its rewrite lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    /// Changed and persisted.
    Written,
    /// Changed, not persisted because of a dry run or a declined prompt.
    Changed,
    /// Changed, but persisting the new text failed.
    WriteFailed,
    Unchanged,
    /// Could not be read or parsed.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub diagnostics: Vec<Diagnostic>,
    /// Read, parse or write failure, if any.
    pub error: Option<String>,
    /// Original text, kept for diffs.
    #[serde(skip)]
    pub original: Option<String>,
    /// Rewritten text; kept even when persisting it failed.
    #[serde(skip)]
    pub output: Option<String>,
}

impl FileReport {
    pub fn failed(path: PathBuf, error: impl fmt::Display) -> Self {
        FileReport {
            path,
            status: FileStatus::Failed,
            diagnostics: Vec::new(),
            error: Some(error.to_string()),
            original: None,
            output: None,
        }
    }
}

/// Summary statistics from a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_written: usize,
    pub files_failed: usize,
    pub diagnostics: usize,
}

/// Complete results of running one rule over a batch of files.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rule: String,
    pub files: Vec<FileReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(rule: impl Into<String>, files: Vec<FileReport>) -> Self {
        let mut summary = Summary {
            files_scanned: files.len(),
            ..Summary::default()
        };
        for file in &files {
            match file.status {
                FileStatus::Written => {
                    summary.files_changed += 1;
                    summary.files_written += 1;
                }
                FileStatus::Changed => summary.files_changed += 1,
                FileStatus::WriteFailed => {
                    summary.files_changed += 1;
                    summary.files_failed += 1;
                }
                FileStatus::Failed => summary.files_failed += 1,
                FileStatus::Unchanged => {}
            }
            summary.diagnostics += file.diagnostics.len();
        }
        RunReport {
            rule: rule.into(),
            files,
            summary,
        }
    }

    pub fn changed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| {
                matches!(
                    f.status,
                    FileStatus::Written | FileStatus::Changed | FileStatus::WriteFailed
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, status: FileStatus, diagnostics: usize) -> FileReport {
        FileReport {
            path: PathBuf::from(name),
            status,
            diagnostics: vec![
                Diagnostic::new(DiagnosticKind::NoCommonScope, "x", "skipped");
                diagnostics
            ],
            error: None,
            original: None,
            output: None,
        }
    }

    #[test]
    fn summary_counts_statuses() {
        let report = RunReport::new(
            "leaking-global-vars",
            vec![
                file("a.js", FileStatus::Written, 1),
                file("b.js", FileStatus::Changed, 0),
                file("c.js", FileStatus::Unchanged, 2),
                file("d.js", FileStatus::Failed, 0),
                file("e.js", FileStatus::WriteFailed, 0),
            ],
        );
        assert_eq!(
            report.summary,
            Summary {
                files_scanned: 5,
                files_changed: 3,
                files_written: 1,
                files_failed: 2,
                diagnostics: 3,
            }
        );
        assert_eq!(report.changed().count(), 3);
    }

    #[test]
    fn diagnostic_display_includes_position() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::MissingProgramAssignment,
            "count",
            "no top-level assignment to convert",
        )
        .at("a;\nb;", 3usize);
        assert_eq!(
            diagnostic.to_string(),
            "2:1: [missing-program-assignment] count: no top-level assignment to convert"
        );
    }

    #[test]
    fn serializes_kinds_in_kebab_case() {
        let diagnostic = Diagnostic::new(DiagnosticKind::UnresolvedScopeType, "x", "m");
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "unresolved-scope-type");
    }
}
