use covenant_dsl::{DuplicateFunction, SyntaxError};

/// Configuration-time errors.
///
/// These surface synchronously from registration calls; evaluation-time
/// faults never appear here (they are absorbed per constraint and reported
/// as inconsistency, see the interpreter contract).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    DuplicateFunction(#[from] DuplicateFunction),

    #[error("failed to serialize model or state: {0}")]
    Serialize(#[from] serde_json::Error),
}
