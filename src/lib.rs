//! jsfix library for scope-aware automatic fixes to JavaScript sources.
//!
//! The core workflow involves three phases:
//!
//! 1. **Scanning**: Collect script files and, for rules that need it, build a
//!    [`Census`] of the names every file exposes or leaks
//! 2. **Analysis**: Parse each file into a lossless tree, build its scope
//!    tree and find the symbols a rule can fix
//! 3. **Rewriting**: Place or release declarations and apply the edits, one
//!    symbol at a time, re-parsing after every step
//!
//! # Example
//!
//! ```no_run
//! use jsfix::driver::{self, BatchOptions};
//! use jsfix::rules::{RuleKind, RuleSettings};
//! use std::path::PathBuf;
//!
//! let options = BatchOptions::new(vec![PathBuf::from("./src")]);
//! let settings = RuleSettings::default();
//! let report = driver::run(RuleKind::LeakingGlobalVars, &options, &settings, |_, _, _| true).unwrap();
//!
//! println!("{} files would change", report.summary.files_changed);
//! ```

pub mod census;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod globals;
pub mod layout;
pub mod placement;
pub mod registry;
pub mod report;
pub mod rewriter;
pub mod rules;
pub mod scanner;
pub mod scope;
pub mod syntax;
pub mod usage;

// Re-export commonly used types at crate root
pub use census::{Census, SymbolClass};
pub use error::FixError;
pub use placement::SplitMode;
pub use report::{Diagnostic, DiagnosticKind, FileReport, FileStatus, RunReport};
pub use rules::{Outcome, RuleKind, RuleSettings, apply_file, apply_source};
pub use syntax::{ParseError, SyntaxTree};
