//! Error types for drafting and composing changes.

use thiserror::Error;

/// Errors raised while editing a draft or preparing it for publication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("No changes to publish")]
    NoChanges,

    #[error("A summary is required to publish a change")]
    MissingSummary,

    #[error("A new section needs a heading, body or subsections")]
    EmptyNewSection,

    #[error("No section at path {0:?}")]
    InvalidPath(Vec<usize>),

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("No draft is active")]
    NotActive,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DraftError {
    fn from(err: serde_json::Error) -> Self {
        DraftError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DraftError>;
