//! Errors surfaced by the library API.
//!
//! Per-symbol problems are not errors; rules report them as diagnostics and
//! keep going. A `FixError` means a file (or the whole batch) could not be
//! processed at all.

use crate::rewriter::EditConflict;
use crate::syntax::ParseError;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The census pass could not parse a file; the whole batch stops.
    #[error("census failed on {}: {source}", path.display())]
    Census {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        /// The rewritten text that could not be persisted.
        output: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Conflict(#[from] EditConflict),
}

impl FixError {
    pub fn parse(path: impl Into<PathBuf>, source: ParseError) -> Self {
        FixError::Parse {
            path: path.into(),
            source,
        }
    }
}
