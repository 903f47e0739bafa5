//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: fixing files with a
//! rule, printing the census, listing scan targets, listing rules, or
//! inspecting the externals registry.

use clap::{Parser, Subcommand};
use jsfix::config::Config;
use jsfix::error::FixError;
use jsfix::placement::SplitMode;
use jsfix::rules::RuleKind;
use std::path::PathBuf;

/// Scope-aware automatic fixes for JavaScript style violations.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Which files to visit and which names the environment provides.
#[derive(Debug, clap::Args)]
pub struct Selection {
    /// Files or directories to scan. Defaults to the configured paths, or
    /// the current directory.
    pub paths: Vec<PathBuf>,

    /// JSON config file. Defaults to `jsfix.json` when present.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Glob matched against file names to skip (e.g. "*.min.js").
    #[arg(long = "ignore-file")]
    pub ignore_files: Vec<String>,

    /// Glob matched against directory names to skip (e.g. "vendor").
    /// Entries starting with `.` and `node_modules` are skipped by default.
    #[arg(long = "ignore-dir")]
    pub ignore_dirs: Vec<String>,

    /// Disable default exclusion of `.` prefixed entries and `node_modules`.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// Name provided by the environment; never declared or renamed.
    #[arg(long = "external")]
    pub externals: Vec<String>,

    /// Registry file of extra environment names.
    #[arg(long)]
    pub externals_file: Option<PathBuf>,
}

impl Selection {
    /// Loads the config file and extends it with these flags.
    pub fn resolve(self) -> Result<Config, FixError> {
        let mut config = Config::discover(self.config.as_deref())?;
        if !self.paths.is_empty() {
            config.paths = self.paths;
        }
        config.ignore_files.extend(self.ignore_files);
        config.ignore_dirs.extend(self.ignore_dirs);
        config.no_default_excludes |= self.no_default_excludes;
        config.externals.extend(self.externals);
        if self.externals_file.is_some() {
            config.externals_file = self.externals_file;
        }
        Ok(config)
    }
}

#[derive(Debug, clap::Args)]
pub struct FixArgs {
    /// Rule to apply.
    #[arg(value_enum)]
    pub rule: RuleKind,

    #[command(flatten)]
    pub selection: Selection,

    /// Write changes back to the files.
    #[arg(short, long)]
    pub write: bool,

    /// Confirm each file's changes before writing. Implies --write.
    #[arg(short, long)]
    pub interactive: bool,

    /// Print a unified diff of every change.
    #[arg(short, long)]
    pub diff: bool,

    /// Emit the run report as JSON instead of human-readable output.
    #[arg(long)]
    pub json: bool,

    /// What to do when usages share no common scope.
    #[arg(long, value_enum)]
    pub split_mode: Option<SplitMode>,

    /// Let naming rules rename program-level bindings.
    #[arg(long)]
    pub fix_exposed_functions: bool,

    /// Let naming rules rename implicit globals.
    #[arg(long)]
    pub fix_dependencies: bool,

    /// Name no rule may touch.
    #[arg(long = "ignore-name")]
    pub ignore_names: Vec<String>,

    /// Print diagnostics for every file, not only a summary.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply a rule to every selected file. Dry run unless --write is given.
    Fix(FixArgs),

    /// Print the names shared across the selected files.
    Census {
        #[command(flatten)]
        selection: Selection,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// List files that would be processed without processing them.
    Scan {
        #[command(flatten)]
        selection: Selection,
    },

    /// List the available rules.
    Rules,

    /// Print the registry of names provided by the environment.
    Externals {
        /// Registry file to print instead of the built-in one.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Maximum tree depth to display.
        #[arg(long)]
        depth: Option<usize>,
    },
}
