use thiserror::Error;

use crate::QueryId;

#[derive(Debug, Error)]
pub enum TrieError {
    /// A path segment does not name an existing child.
    #[error("path `{path}` not found: no cluster `{segment}`")]
    PathNotFound { path: String, segment: String },

    /// A label contains the reserved path delimiter and could never be addressed.
    #[error("label `{label}` contains the path delimiter `{delimiter}`")]
    InvalidLabel { label: String, delimiter: char },

    #[error("query id {0} is not in the query table")]
    UnknownQueryId(QueryId),

    #[error("corrupt table line {line}: {reason}")]
    CorruptTable { line: usize, reason: String },

    #[error(transparent)]
    Parse(#[from] syntaviz_parse::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrieError>;
