//! Registry of names supplied by the environment.
//!
//! The built-in registry is a JSON object embedded at compile time, grouping
//! well-known globals by where they come from (`ecmascript`, `browser`,
//! `node`, ...). Groups may nest; every string found in an array is a name.
//! Projects can load a registry file of the same shape in addition.

use crate::error::FixError;
use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

const BUILTIN: &str = include_str!("../static/externals.json");

/// The embedded registry.
pub fn builtin() -> Result<Value, FixError> {
    serde_json::from_str(BUILTIN)
        .map_err(|err| FixError::InvalidArgument(format!("built-in externals registry: {err}")))
}

/// Reads a registry file.
pub fn load(path: &Path) -> Result<Value, FixError> {
    let text = std::fs::read_to_string(path).map_err(|source| FixError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|err| {
        FixError::InvalidArgument(format!("{} is not valid JSON: {err}", path.display()))
    })?;
    if !value.is_object() {
        return Err(FixError::InvalidArgument(format!(
            "{} must hold an object of name groups",
            path.display()
        )));
    }
    Ok(value)
}

/// Recursively collects every name in a registry value.
///
/// Given `{ "node": ["require"], "libs": { "jquery": ["$"] } }`, returns
/// `["$", "require"]`.
pub fn flatten_names(value: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    match value {
        Value::Object(map) => {
            for group in map.values() {
                names.extend(flatten_names(group));
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => {
                        names.insert(name.clone());
                    }
                    other => names.extend(flatten_names(other)),
                }
            }
        }
        _ => {}
    }

    names
}

/// Prints the registry as an indented tree to stdout.
///
/// Groups are printed plain and names dimmed. Recurses up to `max_depth`
/// levels.
pub fn print_tree(value: &Value, max_depth: usize, depth: usize) {
    if depth >= max_depth {
        return;
    }

    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, group) in map {
                println!("{}{}", indent, key);
                print_tree(group, max_depth, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => println!("{}{}", indent, name.dimmed()),
                    other => print_tree(other, max_depth, depth),
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_names_empty() {
        assert!(flatten_names(&json!({})).is_empty());
    }

    #[test]
    fn flatten_names_across_groups() {
        let value = json!({
            "node": ["require", "process"],
            "browser": ["window", "process"]
        });
        let names: Vec<_> = flatten_names(&value).into_iter().collect();
        assert_eq!(names, vec!["process", "require", "window"]);
    }

    #[test]
    fn flatten_names_nested_groups() {
        let value = json!({
            "libraries": {
                "jquery": ["$", "jQuery"],
                "lodash": ["_"]
            },
            "odd": [1, null, ["inner"]]
        });
        let names: Vec<_> = flatten_names(&value).into_iter().collect();
        assert_eq!(names, vec!["$", "_", "inner", "jQuery"]);
    }

    #[test]
    fn builtin_registry_covers_common_environments() {
        let names = flatten_names(&builtin().unwrap());
        for name in ["Math", "window", "document", "require", "module", "$", "console"] {
            assert!(names.contains(name), "{name} missing");
        }
    }

    #[test]
    fn load_reads_project_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("externals.json");
        std::fs::write(&path, r#"{ "app": ["CONFIG", "analytics"] }"#).unwrap();
        let names = flatten_names(&load(&path).unwrap());
        assert_eq!(names.len(), 2);

        std::fs::write(&path, r#"["CONFIG"]"#).unwrap();
        assert!(matches!(load(&path), Err(FixError::InvalidArgument(_))));
    }
}
