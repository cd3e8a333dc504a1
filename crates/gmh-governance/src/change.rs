//! Change proposals and votes.

use crate::error::GovernanceError;
use chrono::{DateTime, Utc};
use gmh_compose::{ComposedChange, SectionId};
use gmh_core::{BlockId, Operation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ulid::Ulid;

pub type UserId = String;

/// Unique identifier for a change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(pub String);

impl ChangeId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's vote, carried on the wire as -1, 0 or 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteValue {
    No,
    #[default]
    Neutral,
    Yes,
}

impl VoteValue {
    /// The vote that results from pressing `requested` while holding `self`:
    /// pressing the held value again clears it.
    pub fn toggle(self, requested: VoteValue) -> VoteValue {
        if self == requested {
            VoteValue::Neutral
        } else {
            requested
        }
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = GovernanceError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::No),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Yes),
            other => Err(GovernanceError::InvalidVote(other)),
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::No => -1,
            VoteValue::Neutral => 0,
            VoteValue::Yes => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Published,
    NeedsUpdate,
    Merged,
}

/// Payload of a change submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSubmission {
    pub entry_id: String,
    pub section_id: SectionId,
    pub summary: String,
    pub ops: Vec<Operation>,
    #[serde(default)]
    pub affected_blocks: BTreeSet<BlockId>,
    #[serde(default)]
    pub anchors: BTreeSet<String>,
    #[serde(default)]
    pub before_outline: String,
    #[serde(default)]
    pub after_outline: String,
    pub author: UserId,
}

impl ChangeSubmission {
    pub fn from_composed(
        composed: ComposedChange,
        entry_id: impl Into<String>,
        author: impl Into<UserId>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            section_id: composed.section_id,
            summary: composed.summary,
            ops: composed.ops,
            affected_blocks: composed.affected_blocks,
            anchors: composed.anchors,
            before_outline: composed.before_outline,
            after_outline: composed.after_outline,
            author: author.into(),
        }
    }
}

/// A proposed, votable set of block operations targeting one section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub entry_id: String,
    pub target_section_id: SectionId,
    pub author: UserId,
    pub summary: String,
    pub ops: Vec<Operation>,
    pub affected_blocks: BTreeSet<BlockId>,
    pub anchors: BTreeSet<String>,
    pub before_outline: String,
    pub after_outline: String,
    /// Non-neutral votes only.
    pub votes: BTreeMap<UserId, VoteValue>,
    pub status: ChangeStatus,
    pub base_entry_version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl Change {
    pub fn vote_of(&self, user: &str) -> VoteValue {
        self.votes.get(user).copied().unwrap_or_default()
    }

    /// Record `value` for `user`; a neutral vote clears the entry.
    pub(crate) fn set_vote(&mut self, user: &str, value: VoteValue) {
        match value {
            VoteValue::Neutral => {
                self.votes.remove(user);
            }
            _ => {
                self.votes.insert(user.to_string(), value);
            }
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == ChangeStatus::Merged
    }
}
