//! Error types for the GroupMind SDK.

use gmh_compose::DraftError;
use gmh_governance::GovernanceError;
use std::fmt;

/// Error type for SDK operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// Project not found.
    ProjectNotFound(String),
    /// Change not found.
    ChangeNotFound(String),
    /// Manual merge refused because the change lacks yes votes.
    MergeRejected {
        required_yes_votes: usize,
        yes_votes: usize,
    },
    /// Change was invalidated by another merge and must be resubmitted.
    Stale(String),
    /// Draft could not be composed.
    Draft(DraftError),
    /// Governance rule violation.
    Governance(GovernanceError),
    /// Invalid configuration.
    Config(String),
    /// Serialization error.
    Serialization(String),
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::ProjectNotFound(id) => write!(f, "Project not found: {}", id),
            SdkError::ChangeNotFound(id) => write!(f, "Change not found: {}", id),
            SdkError::MergeRejected {
                required_yes_votes,
                yes_votes,
            } => write!(
                f,
                "Merge rejected: {} of {} required yes votes",
                yes_votes, required_yes_votes
            ),
            SdkError::Stale(id) => write!(f, "Change needs update: {}", id),
            SdkError::Draft(e) => write!(f, "Draft error: {}", e),
            SdkError::Governance(e) => write!(f, "Governance error: {}", e),
            SdkError::Config(e) => write!(f, "Configuration error: {}", e),
            SdkError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<DraftError> for SdkError {
    fn from(err: DraftError) -> Self {
        SdkError::Draft(err)
    }
}

impl From<GovernanceError> for SdkError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::ChangeNotFound(id) => SdkError::ChangeNotFound(id),
            GovernanceError::BelowThreshold {
                required_yes_votes,
                yes_votes,
            } => SdkError::MergeRejected {
                required_yes_votes,
                yes_votes,
            },
            GovernanceError::NeedsUpdate(id) => SdkError::Stale(id),
            GovernanceError::Config(e) => SdkError::Config(e),
            other => SdkError::Governance(other),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_governance_mapping() {
        let err: SdkError = GovernanceError::BelowThreshold {
            required_yes_votes: 3,
            yes_votes: 1,
        }
        .into();
        assert_eq!(err.to_string(), "Merge rejected: 1 of 3 required yes votes");

        let err: SdkError = GovernanceError::NeedsUpdate("c1".into()).into();
        assert_eq!(err, SdkError::Stale("c1".into()));

        let err: SdkError = GovernanceError::EmptyChange.into();
        assert!(matches!(err, SdkError::Governance(GovernanceError::EmptyChange)));
    }
}
