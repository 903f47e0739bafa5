//! Run configuration.
//!
//! Settings come from an optional JSON file and are then extended by
//! command-line flags. Everything is validated before any source file is
//! touched.

use crate::error::FixError;
use crate::placement::SplitMode;
use crate::registry;
use crate::rules::RuleSettings;
use crate::scanner::IgnorePatterns;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Conventional config file name, looked up in the working directory.
pub const DEFAULT_FILE: &str = "jsfix.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Roots to scan. Empty means the current directory.
    pub paths: Vec<PathBuf>,
    /// Globs matched against file names.
    pub ignore_files: Vec<String>,
    /// Globs matched against directory names.
    pub ignore_dirs: Vec<String>,
    /// Also walk `.`-prefixed entries and `node_modules`.
    pub no_default_excludes: bool,
    /// Extra names provided by the environment.
    pub externals: Vec<String>,
    /// Registry file in the same shape as the built-in one.
    pub externals_file: Option<PathBuf>,
    /// Names no rule may touch.
    pub ignore_names: Vec<String>,
    pub split_mode: SplitMode,
    pub fix_exposed_functions: bool,
    pub fix_dependencies: bool,
}

impl Config {
    /// Reads a config file. Relative paths inside it are resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Config, FixError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            FixError::InvalidArgument(format!("cannot read config {}: {err}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&text).map_err(|err| {
            FixError::InvalidArgument(format!("invalid config {}: {err}", path.display()))
        })?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.paths = config.paths.iter().map(|p| base.join(p)).collect();
            config.externals_file = config.externals_file.map(|p| base.join(p));
        }
        Ok(config)
    }

    /// Loads `path` when given, else [`DEFAULT_FILE`] when it exists, else
    /// the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Config, FixError> {
        match path {
            Some(path) => Config::load(path),
            None if Path::new(DEFAULT_FILE).is_file() => Config::load(Path::new(DEFAULT_FILE)),
            None => Ok(Config::default()),
        }
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.paths.clone()
        }
    }

    pub fn ignore_patterns(&self) -> Result<IgnorePatterns, FixError> {
        IgnorePatterns::new(&self.ignore_files, &self.ignore_dirs, !self.no_default_excludes)
    }

    /// Every name treated as supplied by the environment: the built-in
    /// registry, the registry file, and the listed externals and ignored
    /// names.
    pub fn externals(&self) -> Result<BTreeSet<String>, FixError> {
        let mut names = registry::flatten_names(&registry::builtin()?);
        if let Some(file) = &self.externals_file {
            names.extend(registry::flatten_names(&registry::load(file)?));
        }
        for name in self.externals.iter().chain(&self.ignore_names) {
            let name = name.trim();
            if name.is_empty() {
                return Err(FixError::InvalidArgument("empty dependency name".into()));
            }
            names.insert(name.to_string());
        }
        Ok(names)
    }

    pub fn settings(&self) -> Result<RuleSettings, FixError> {
        Ok(RuleSettings {
            split_mode: self.split_mode,
            externals: self.externals()?,
            fix_exposed_functions: self.fix_exposed_functions,
            fix_dependencies: self.fix_dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.roots(), vec![PathBuf::from(".")]);
        assert_eq!(config.split_mode, SplitMode::Split);
        assert!(config.ignore_patterns().unwrap().default_excludes);
        let settings = config.settings().unwrap();
        assert!(settings.externals.contains("window"));
        assert!(!settings.fix_dependencies);
    }

    #[test]
    fn loads_file_relative_to_its_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jsfix.json");
        fs::write(
            &path,
            r#"{
                "paths": ["src"],
                "ignore-files": ["*.min.js"],
                "externals": ["CONFIG"],
                "ignore-names": ["legacy_flag"],
                "split-mode": "strict",
                "fix-dependencies": true
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.roots(), vec![dir.path().join("src")]);
        assert_eq!(config.split_mode, SplitMode::Strict);

        let settings = config.settings().unwrap();
        assert!(settings.externals.contains("CONFIG"));
        assert!(settings.externals.contains("legacy_flag"));
        assert!(settings.fix_dependencies);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jsfix.json");
        fs::write(&path, r#"{ "ignore": [] }"#).unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config"), "{err}");
    }

    #[test]
    fn missing_file_is_an_invalid_argument() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, FixError::InvalidArgument(_)));
    }

    #[test]
    fn empty_names_and_bad_globs_fail_early() {
        let config = Config {
            externals: vec!["  ".into()],
            ..Config::default()
        };
        assert!(config.settings().is_err());

        let config = Config {
            ignore_dirs: vec!["[".into()],
            ..Config::default()
        };
        assert!(config.ignore_patterns().is_err());
    }
}
