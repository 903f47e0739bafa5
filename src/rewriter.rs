//! Text edits and write-back.
//!
//! Rules never mutate a tree in place. They describe a rewrite as a set of
//! non-overlapping byte-range edits against the current source text; the set
//! is applied in offset order and the result is reparsed. Regions no edit
//! touches come back byte-identical.

use crate::error::FixError;
use crate::syntax::{TextRange, TextSize};
use std::path::Path;

/// A single replacement of a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

/// Two edits claimed the same bytes, or an edit fell outside the text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting edit at {start}..{end}")]
pub struct EditConflict {
    pub start: usize,
    pub end: usize,
}

/// The edits making up one rewrite step.
#[derive(Debug, Clone, Default)]
pub struct EditSet {
    edits: Vec<TextEdit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn replace(&mut self, range: TextRange, new_text: impl Into<String>) {
        self.edits.push(TextEdit {
            start: range.start().into(),
            end: range.end().into(),
            new_text: new_text.into(),
        });
    }

    pub fn insert(&mut self, offset: TextSize, text: impl Into<String>) {
        self.replace(TextRange::empty(offset), text);
    }

    pub fn delete(&mut self, range: TextRange) {
        self.replace(range, "");
    }

    pub fn extend(&mut self, other: EditSet) {
        self.edits.extend(other.edits);
    }

    /// Whether any edit touches bytes inside `range`.
    pub fn touches(&self, range: TextRange) -> bool {
        let (start, end): (usize, usize) = (range.start().into(), range.end().into());
        self.edits.iter().any(|e| e.start < end && start < e.end)
    }

    /// Applies the edits to `source`.
    ///
    /// Edits are ordered by position; insertions at the same offset keep the
    /// order they were added in and land before a replacement starting there.
    pub fn apply(&self, source: &str) -> Result<String, EditConflict> {
        let mut edits: Vec<&TextEdit> = self.edits.iter().collect();
        edits.sort_by_key(|e| (e.start, e.end));

        let mut result = String::with_capacity(source.len());
        let mut cursor = 0;
        for edit in edits {
            let in_bounds = edit.start <= edit.end
                && edit.end <= source.len()
                && source.is_char_boundary(edit.start)
                && source.is_char_boundary(edit.end);
            if !in_bounds || edit.start < cursor {
                return Err(EditConflict {
                    start: edit.start,
                    end: edit.end,
                });
            }
            result.push_str(&source[cursor..edit.start]);
            result.push_str(&edit.new_text);
            cursor = edit.end;
        }
        result.push_str(&source[cursor..]);
        Ok(result)
    }
}

/// Writes rewritten content back to `file`.
pub fn persist(file: &Path, content: &str) -> Result<(), FixError> {
    std::fs::write(file, content).map_err(|source| FixError::Write {
        path: file.to_path_buf(),
        output: content.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn replaces_single_range() {
        let content = "var a = 1;";
        let mut edits = EditSet::new();
        edits.replace(range(4, 5), "b");
        assert_eq!(edits.apply(content).unwrap(), "var b = 1;");
    }

    #[test]
    fn applies_edits_added_out_of_order() {
        let content = "a(); b(); c();";
        let mut edits = EditSet::new();
        edits.replace(range(10, 11), "z");
        edits.replace(range(0, 1), "x");
        assert_eq!(edits.apply(content).unwrap(), "x(); b(); z();");
    }

    #[test]
    fn insertion_lands_before_replacement_at_same_offset() {
        let content = "i = 0;";
        let mut edits = EditSet::new();
        edits.replace(range(0, 1), "j");
        edits.insert(0.into(), "var ");
        assert_eq!(edits.apply(content).unwrap(), "var j = 0;");
    }

    #[test]
    fn insertions_at_same_offset_keep_order() {
        let mut edits = EditSet::new();
        edits.insert(0.into(), "a");
        edits.insert(0.into(), "b");
        assert_eq!(edits.apply("c").unwrap(), "abc");
    }

    #[test]
    fn overlapping_edits_conflict() {
        let mut edits = EditSet::new();
        edits.replace(range(0, 4), "x");
        edits.replace(range(2, 6), "y");
        assert_eq!(
            edits.apply("abcdefg").unwrap_err(),
            EditConflict { start: 2, end: 6 }
        );
    }

    #[test]
    fn out_of_bounds_edit_conflicts() {
        let mut edits = EditSet::new();
        edits.delete(range(2, 10));
        assert!(edits.apply("abc").is_err());
    }

    #[test]
    fn empty_set_returns_original() {
        let content = "// untouched\nfoo();";
        assert_eq!(EditSet::new().apply(content).unwrap(), content);
    }

    #[test]
    fn touches_reports_overlap_only() {
        let mut edits = EditSet::new();
        edits.replace(range(4, 6), "x");
        assert!(edits.touches(range(5, 9)));
        assert!(!edits.touches(range(6, 9)));
    }

    #[test]
    fn persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.js");
        persist(&file, "var a;\n").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "var a;\n");
    }

    #[test]
    fn persist_failure_returns_the_unwritten_text() {
        let dir = tempfile::tempdir().unwrap();
        let err = persist(dir.path(), "var a;\n").unwrap_err();
        match err {
            FixError::Write { path, output, .. } => {
                assert_eq!(path, dir.path());
                assert_eq!(output, "var a;\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
