//! Error types for the voting and merge layer.

use thiserror::Error;

/// Errors that can occur while submitting, voting on or merging changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("Change not found: {0}")]
    ChangeNotFound(String),

    #[error("Change already merged: {0}")]
    AlreadyMerged(String),

    #[error("Change is below the merge threshold: {yes_votes} of {required_yes_votes} required yes votes")]
    BelowThreshold {
        required_yes_votes: usize,
        yes_votes: usize,
    },

    #[error("Change needs to be updated before it can merge: {0}")]
    NeedsUpdate(String),

    #[error("Change does not need an update: {0}")]
    NotStale(String),

    #[error("Invalid vote value: {0}")]
    InvalidVote(i8),

    #[error("Change has no operations")]
    EmptyChange,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
