use thiserror::Error;

/// Structural errors raised while rebuilding one query's tree.
///
/// These are fatal for the transcript that raised them and for nothing else:
/// callers drop the transcript and move on to the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error(
        "line {line}: indentation jumps from depth {current} to {found}; at least one tree node is missing"
    )]
    SkippedLevel {
        line: usize,
        current: isize,
        found: usize,
    },

    #[error("line {line}: second root `{label}` in a single transcript")]
    MultipleRoots { line: usize, label: String },

    #[error("line {line}: `{label}` is indented but no root has been read yet")]
    MissingRoot { line: usize, label: String },

    #[error("transcript contains no tree lines")]
    EmptyTranscript,

    #[error("no token is attached to the artificial root (head 0)")]
    NoRootToken,

    #[error("tokens {first} and {second} are both attached to the artificial root")]
    MultipleRootTokens { first: usize, second: usize },

    #[error("token {token}: invalid head `{head}`")]
    InvalidHead { token: usize, head: String },

    #[error("token {token}: missing column {column}")]
    MissingColumn { token: usize, column: usize },

    #[error("{detached} tokens are not reachable from the root (head cycle)")]
    HeadCycle { detached: usize },
}

/// Errors in the canonical nested-sequence form of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeFormatError {
    #[error("invalid tree json: {0}")]
    Json(String),

    #[error("empty group")]
    EmptyGroup,

    #[error("subtree at position {position} does not follow a label")]
    OrphanSubtree { position: usize },

    #[error("expected exactly one root, found {0}")]
    RootCount(usize),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),

    #[error("corrupt record on line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
