//! Quorum configuration.

use crate::error::{GovernanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which parts of two changes' footprints count as overlapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Shared affected blocks or shared anchors.
    #[default]
    BlocksAndAnchors,
    /// Shared affected blocks only.
    BlocksOnly,
}

/// Merge threshold and presentation settings for one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Share of eligible voters whose yes votes a change needs, in percent.
    pub threshold_percent: u32,
    pub eligible_voters: usize,
    /// How many changes per section are open for voting at once.
    pub pool_size: usize,
    pub overlap: OverlapPolicy,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 40,
            eligible_voters: 5,
            pool_size: 3,
            overlap: OverlapPolicy::BlocksAndAnchors,
        }
    }
}

impl QuorumConfig {
    pub fn with_eligible_voters(mut self, eligible_voters: usize) -> Self {
        self.eligible_voters = eligible_voters;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold_percent == 0 || self.threshold_percent > 100 {
            return Err(GovernanceError::Config(format!(
                "threshold_percent must be within 1..=100, got {}",
                self.threshold_percent
            )));
        }
        if self.pool_size == 0 {
            return Err(GovernanceError::Config("pool_size must be positive".into()));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: QuorumConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GovernanceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = QuorumConfig::from_json_str(r#"{"eligible_voters": 12}"#).unwrap();
        assert_eq!(config.eligible_voters, 12);
        assert_eq!(config.threshold_percent, 40);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.overlap, OverlapPolicy::BlocksAndAnchors);
    }

    #[test]
    fn test_overlap_policy_wire_format() {
        let config = QuorumConfig::from_json_str(r#"{"overlap": "blocks_only"}"#).unwrap();
        assert_eq!(config.overlap, OverlapPolicy::BlocksOnly);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            QuorumConfig::from_json_str(r#"{"threshold_percent": 150}"#),
            Err(GovernanceError::Config(_))
        ));
        assert!(matches!(
            QuorumConfig::from_json_str(r#"{"pool_size": 0}"#),
            Err(GovernanceError::Config(_))
        ));
        assert!(matches!(
            QuorumConfig::from_json_str("not json"),
            Err(GovernanceError::Serialization(_))
        ));
    }
}
