//! JavaScript file scanner.
//!
//! Recursively walks the given roots to collect `.js`, `.mjs` and `.cjs`
//! files. Entries matching an ignore glob are skipped, and so are
//! `.`-prefixed entries and `node_modules` unless default excludes are off.

use crate::error::FixError;
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

/// Glob patterns deciding which entries the scanner never enters.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    /// Matched against file names.
    pub files: Vec<Pattern>,
    /// Matched against directory names.
    pub dirs: Vec<Pattern>,
    /// Skip `.`-prefixed entries and `node_modules`.
    pub default_excludes: bool,
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        IgnorePatterns {
            files: Vec::new(),
            dirs: Vec::new(),
            default_excludes: true,
        }
    }
}

impl IgnorePatterns {
    /// Compiles file and directory globs.
    pub fn new(files: &[String], dirs: &[String], default_excludes: bool) -> Result<Self, FixError> {
        Ok(IgnorePatterns {
            files: compile(files)?,
            dirs: compile(dirs)?,
            default_excludes,
        })
    }

    fn skips(&self, entry: &walkdir::DirEntry) -> bool {
        // Roots are always walked.
        if entry.depth() == 0 {
            return false;
        }
        let Some(name) = entry.file_name().to_str() else {
            return false;
        };
        if self.default_excludes && is_hidden_or_vendored(name) {
            return true;
        }
        let patterns = if entry.file_type().is_dir() {
            &self.dirs
        } else {
            &self.files
        };
        patterns.iter().any(|p| p.matches(name))
    }
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>, FixError> {
    globs
        .iter()
        .map(|glob| {
            Pattern::new(glob)
                .map_err(|err| FixError::InvalidArgument(format!("bad glob '{glob}': {err}")))
        })
        .collect()
}

fn is_hidden_or_vendored(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

/// Collects all script files under `roots`, sorted and without duplicates.
///
/// A root that is itself a file is returned as-is when it has a script
/// extension. A missing root is an error.
pub fn collect_js_files(roots: &[PathBuf], ignore: &IgnorePatterns) -> Result<Vec<PathBuf>, FixError> {
    let mut files = Vec::new();

    for root in roots {
        if !root.exists() {
            return Err(FixError::InvalidArgument(format!(
                "path does not exist: {}",
                root.display()
            )));
        }
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !ignore.skips(e))
        {
            let entry = entry.map_err(|err| FixError::Read {
                path: err.path().unwrap_or(root).to_path_buf(),
                source: err.into(),
            })?;
            if entry.file_type().is_file() && is_script(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
