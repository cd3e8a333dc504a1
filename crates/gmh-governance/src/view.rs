//! Per-user vote reporting.

use crate::change::{Change, VoteValue};
use serde::{Deserialize, Serialize};

/// A change annotated with vote counts and the requesting user's own vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeView {
    #[serde(flatten)]
    pub change: Change,
    pub current_user_vote: VoteValue,
    pub yes: usize,
    pub no: usize,
    /// Yes minus no; displayed only.
    pub score: i64,
    pub is_passing: bool,
    pub required_yes_votes: usize,
    /// Another open change shares a block or anchor with this one.
    pub competing: bool,
}
