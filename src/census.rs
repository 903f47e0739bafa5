//! Directory-wide name census.
//!
//! Before any file is rewritten, every file of the batch is parsed once and
//! reduced to three name sets: what each file exposes at program level, the
//! implicit globals it writes or reads, and the undeclared names it reads.
//! The trees are dropped as soon as the names are extracted. Sets are
//! ordered, so the result does not depend on the order files are visited.

use crate::error::FixError;
use crate::globals;
use crate::scope::{BindingKind, ScopeTree};
use crate::syntax::SyntaxKind::*;
use crate::syntax::ast;
use crate::syntax::{ParseError, SyntaxTree};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// How a name is classified once the census and the file's own scopes are
/// taken into account. The classes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolClass {
    DeclaredLocal,
    ImplicitGlobal,
    ExposedTopLevel,
    ExternalDependency,
}

impl fmt::Display for SymbolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolClass::DeclaredLocal => "declared-local",
            SymbolClass::ImplicitGlobal => "implicit-global",
            SymbolClass::ExposedTopLevel => "exposed-top-level",
            SymbolClass::ExternalDependency => "external-dependency",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    files: usize,
    /// Program-level declarations and top-level `name = value` targets.
    exposed: BTreeSet<String>,
    /// Undeclared names that are not known externals.
    implicit_globals: BTreeSet<String>,
    /// Undeclared names read somewhere, externals included.
    global_reads: BTreeSet<String>,
}

impl Census {
    pub fn new() -> Self {
        Census::default()
    }

    /// Parses every file and records its names. Any read or parse failure
    /// aborts the census.
    pub fn build(files: &[PathBuf], externals: &BTreeSet<String>) -> Result<Census, FixError> {
        let mut census = Census::new();
        for path in files {
            let source = fs::read_to_string(path).map_err(|source| FixError::Read {
                path: path.clone(),
                source,
            })?;
            census
                .record(&source, externals)
                .map_err(|source| FixError::Census {
                    path: path.clone(),
                    source,
                })?;
        }
        debug!(
            files = census.files,
            exposed = census.exposed.len(),
            implicit = census.implicit_globals.len(),
            "census complete"
        );
        Ok(census)
    }

    /// Adds the names of one file.
    pub fn record(&mut self, source: &str, externals: &BTreeSet<String>) -> Result<(), ParseError> {
        let tree = SyntaxTree::parse(source)?;
        let scopes = ScopeTree::build(&tree);

        let program = scopes.scope(scopes.root());
        self.exposed.extend(
            program
                .bindings
                .iter()
                .filter(|b| b.kind != BindingKind::Import)
                .map(|b| b.name.clone()),
        );
        for stmt in ast::statements(tree.root()).filter(|s| s.kind() == EXPR_STMT) {
            let target = stmt
                .first_child()
                .and_then(|expr| ast::assignment(&expr))
                .filter(|a| a.is_plain() && a.target.kind() == NAME_REF)
                .and_then(|a| ast::ident_text(&a.target));
            if let Some(name) = target {
                self.exposed.insert(name);
            }
        }

        for global in globals::find_globals(&tree, &scopes) {
            if global.read {
                self.global_reads.insert(global.name.clone());
            }
            if !externals.contains(&global.name) {
                self.implicit_globals.insert(global.name);
            }
        }
        self.files += 1;
        Ok(())
    }

    pub fn files(&self) -> usize {
        self.files
    }

    pub fn exposed(&self) -> &BTreeSet<String> {
        &self.exposed
    }

    pub fn implicit_globals(&self) -> &BTreeSet<String> {
        &self.implicit_globals
    }

    pub fn global_reads(&self) -> &BTreeSet<String> {
        &self.global_reads
    }

    pub fn is_exposed(&self, name: &str) -> bool {
        self.exposed.contains(name)
    }

    /// Whether any file reads `name` without declaring it.
    pub fn is_read(&self, name: &str) -> bool {
        self.global_reads.contains(name)
    }

    /// Classifies `name` as seen from a file that does or does not declare
    /// it locally.
    pub fn classify(&self, name: &str, declared_locally: bool, externals: &BTreeSet<String>) -> SymbolClass {
        if externals.contains(name) {
            SymbolClass::ExternalDependency
        } else if self.exposed.contains(name) {
            SymbolClass::ExposedTopLevel
        } else if declared_locally || !self.implicit_globals.contains(name) {
            SymbolClass::DeclaredLocal
        } else {
            SymbolClass::ImplicitGlobal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn externals() -> BTreeSet<String> {
        ["window", "console"].iter().map(|s| s.to_string()).collect()
    }

    fn census_of(sources: &[&str]) -> Census {
        let mut census = Census::new();
        for source in sources {
            census.record(source, &externals()).unwrap();
        }
        census
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exposed_names_come_from_program_level() {
        let census = census_of(&[
            "import dep from 'dep';\nvar a = 1;\nfunction b() { var hidden; }\nc = 2;\nclass D {}",
        ]);
        assert_eq!(census.exposed(), &set(&["D", "a", "b", "c"]));
    }

    #[test]
    fn globals_split_into_implicit_and_read() {
        let census = census_of(&["function f() { leak = 1; console.log(other); window.x = 2; }"]);
        assert_eq!(census.implicit_globals(), &set(&["leak", "other"]));
        assert_eq!(census.global_reads(), &set(&["console", "other", "window"]));
        assert!(census.is_read("other"));
        assert!(!census.is_read("leak"));
    }

    #[test]
    fn visiting_order_does_not_matter() {
        let files = [
            "var shared = 1; function g() { counter = shared; }",
            "function h() { return counter + missing; }",
            "total = 0;\nfor (var i = 0; i < 3; i++) total += i;",
        ];
        let forward = census_of(&files);
        let mut reversed = files;
        reversed.reverse();
        assert_eq!(forward, census_of(&reversed));
        assert_eq!(census_of(&[files[1], files[2], files[0]]), forward);
    }

    #[test]
    fn classification_is_exclusive() {
        let census = census_of(&["var top = 1; function f() { leak = 2; }"]);
        let externals = externals();
        assert_eq!(
            census.classify("window", false, &externals),
            SymbolClass::ExternalDependency
        );
        assert_eq!(census.classify("top", true, &externals), SymbolClass::ExposedTopLevel);
        assert_eq!(census.classify("leak", false, &externals), SymbolClass::ImplicitGlobal);
        assert_eq!(census.classify("leak", true, &externals), SymbolClass::DeclaredLocal);
    }

    #[test]
    fn build_fails_fast_on_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.js");
        let bad = dir.path().join("bad.js");
        fs::write(&good, "var ok = 1;").unwrap();
        let mut file = fs::File::create(&bad).unwrap();
        file.write_all(b"var = ;").unwrap();

        let err = Census::build(&[good.clone(), bad.clone()], &externals()).unwrap_err();
        assert!(matches!(err, FixError::Census { ref path, .. } if *path == bad));

        let census = Census::build(&[good], &externals()).unwrap();
        assert_eq!(census.files(), 1);
        assert!(census.is_exposed("ok"));
    }
}
