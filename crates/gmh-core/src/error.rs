//! Error types for the core layer.
//!
//! Operation application is total and never fails; errors only arise at the
//! serialization boundary.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
