//! Batch driver.
//!
//! Runs one rule over every collected file. When the rule needs a census it
//! is built over the whole batch first and any failure stops the run. After
//! that, failures are per file: they are recorded in the report and the
//! batch moves on.

use crate::census::Census;
use crate::error::FixError;
use crate::report::{FileReport, FileStatus, RunReport};
use crate::rewriter;
use crate::rules::{self, RuleKind, RuleSettings};
use crate::scanner::{self, IgnorePatterns};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which files to visit and whether to write results back.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub roots: Vec<PathBuf>,
    pub ignore: IgnorePatterns,
    /// Persist changed files. Without it the run is a dry run.
    pub write: bool,
}

impl BatchOptions {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        BatchOptions {
            roots,
            ignore: IgnorePatterns::default(),
            write: false,
        }
    }
}

/// Builds the census over every file the batch would visit.
pub fn census(options: &BatchOptions, settings: &RuleSettings) -> Result<Census, FixError> {
    let files = scanner::collect_js_files(&options.roots, &options.ignore)?;
    Census::build(&files, &settings.externals)
}

/// Runs `rule` over the batch.
///
/// `decide` is asked before each changed file is written, with the path, the
/// original text and the rewritten text; returning `false` keeps the file as
/// it is. It is only consulted when `options.write` is set.
pub fn run<F>(
    rule: RuleKind,
    options: &BatchOptions,
    settings: &RuleSettings,
    mut decide: F,
) -> Result<RunReport, FixError>
where
    F: FnMut(&Path, &str, &str) -> bool,
{
    let files = scanner::collect_js_files(&options.roots, &options.ignore)?;
    debug!(%rule, files = files.len(), write = options.write, "starting batch");

    let census = if rule.needs_census() {
        Some(Census::build(&files, &settings.externals)?)
    } else {
        None
    };

    let reports = files
        .into_iter()
        .map(|path| process(rule, path, census.as_ref(), settings, options.write, &mut decide))
        .collect();
    Ok(RunReport::new(rule.name(), reports))
}

fn process<F>(
    rule: RuleKind,
    path: PathBuf,
    census: Option<&Census>,
    settings: &RuleSettings,
    write: bool,
    decide: &mut F,
) -> FileReport
where
    F: FnMut(&Path, &str, &str) -> bool,
{
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(source) => {
            let err = FixError::Read {
                path: path.clone(),
                source,
            };
            warn!("{err}");
            return FileReport::failed(path, err);
        }
    };

    let outcome = match rules::apply_source(rule, &source, census, settings) {
        Ok(outcome) => outcome,
        Err(err) => {
            let err = FixError::parse(&path, err);
            warn!("{err}");
            return FileReport::failed(path, err);
        }
    };

    for diagnostic in outcome.diagnostics.iter().filter(|d| d.kind.left_unfixed()) {
        warn!(file = %path.display(), "{diagnostic}");
    }

    if !outcome.changed {
        return FileReport {
            path,
            status: FileStatus::Unchanged,
            diagnostics: outcome.diagnostics,
            error: None,
            original: None,
            output: None,
        };
    }

    let mut status = FileStatus::Changed;
    let mut error = None;
    if write && decide(&path, &source, &outcome.source) {
        match rewriter::persist(&path, &outcome.source) {
            Ok(()) => status = FileStatus::Written,
            Err(err) => {
                warn!("{err}");
                status = FileStatus::WriteFailed;
                error = Some(err.to_string());
            }
        }
    }
    debug!(file = %path.display(), steps = outcome.steps, ?status, "file done");

    FileReport {
        path,
        status,
        diagnostics: outcome.diagnostics,
        error,
        original: Some(source),
        output: Some(outcome.source),
    }
}
