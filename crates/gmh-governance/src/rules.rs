//! Quorum arithmetic and overlap detection.

use crate::change::{Change, VoteValue};
use crate::config::{OverlapPolicy, QuorumConfig};
use serde::{Deserialize, Serialize};

/// Yes votes needed to pass: `ceil(threshold_percent * eligible / 100)`, at least one.
pub fn required_yes_votes(threshold_percent: u32, eligible_voters: usize) -> usize {
    let scaled = threshold_percent as usize * eligible_voters;
    scaled.div_ceil(100).max(1)
}

/// Vote counts of one change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
}

impl Tally {
    pub fn of(change: &Change) -> Self {
        change.votes.values().fold(Tally::default(), |mut t, v| {
            match v {
                VoteValue::Yes => t.yes += 1,
                VoteValue::No => t.no += 1,
                VoteValue::Neutral => {}
            }
            t
        })
    }

    /// Yes minus no. Informational only; passing depends on yes votes alone.
    pub fn score(&self) -> i64 {
        self.yes as i64 - self.no as i64
    }
}

pub fn is_passing(change: &Change, config: &QuorumConfig) -> bool {
    Tally::of(change).yes >= required_yes_votes(config.threshold_percent, config.eligible_voters)
}

/// Whether two changes touch a common block (or anchor, per `policy`).
pub fn overlaps(a: &Change, b: &Change, policy: OverlapPolicy) -> bool {
    let shared_blocks = !a.affected_blocks.is_disjoint(&b.affected_blocks);
    match policy {
        OverlapPolicy::BlocksOnly => shared_blocks,
        OverlapPolicy::BlocksAndAnchors => shared_blocks || !a.anchors.is_disjoint(&b.anchors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_yes_votes() {
        assert_eq!(required_yes_votes(40, 5), 2);
        assert_eq!(required_yes_votes(40, 6), 3);
        assert_eq!(required_yes_votes(40, 10), 4);
        assert_eq!(required_yes_votes(40, 1), 1);
        assert_eq!(required_yes_votes(40, 0), 1);
        assert_eq!(required_yes_votes(100, 7), 7);
    }
}
