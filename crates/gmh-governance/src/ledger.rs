//! The voting and merge state machine for one entry.
//!
//! A [`ChangeLedger`] owns the canonical entry together with every change
//! proposed against it. The entry is only ever mutated by a merge, and
//! merges run one at a time through `&mut self`.

use crate::change::{Change, ChangeId, ChangeStatus, ChangeSubmission, VoteValue};
use crate::config::QuorumConfig;
use crate::entry::{Entry, HistoryRecord};
use crate::error::{GovernanceError, Result};
use crate::pool::{prepare_buckets, ChangeBuckets};
use crate::rules::{is_passing, overlaps, required_yes_votes, Tally};
use crate::view::ChangeView;
use chrono::Utc;
use gmh_core::{apply_ops, numbered_outline, BlockId, Operation};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Result of merging one change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub change_id: ChangeId,
    pub version: u64,
    /// Changes moved to `needs_update` by this merge.
    pub invalidated: Vec<ChangeId>,
}

/// A fresh footprint for a change that fell behind the entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resubmission {
    pub ops: Vec<Operation>,
    pub affected_blocks: BTreeSet<BlockId>,
    pub anchors: BTreeSet<String>,
    pub before_outline: String,
    pub after_outline: String,
}

#[derive(Clone, Debug)]
pub struct ChangeLedger {
    entry: Entry,
    changes: Vec<Change>,
    config: QuorumConfig,
}

impl ChangeLedger {
    pub fn new(entry: Entry, config: QuorumConfig) -> Self {
        Self {
            entry,
            changes: Vec::new(),
            config,
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// All changes in arrival order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn get(&self, id: &ChangeId) -> Option<&Change> {
        self.changes.iter().find(|c| &c.id == id)
    }

    fn position(&self, id: &ChangeId) -> Result<usize> {
        self.changes
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| GovernanceError::ChangeNotFound(id.to_string()))
    }

    pub fn required_yes_votes(&self) -> usize {
        required_yes_votes(self.config.threshold_percent, self.config.eligible_voters)
    }

    /// Record a new change with the author's yes vote, then run an auto-merge tick.
    ///
    /// Returns the change as it stands after the tick, so a change that
    /// passes on the author's vote alone comes back merged.
    pub fn submit(&mut self, submission: ChangeSubmission) -> Result<Change> {
        if submission.ops.is_empty() {
            return Err(GovernanceError::EmptyChange);
        }

        let mut change = Change {
            id: ChangeId::new(),
            entry_id: submission.entry_id,
            target_section_id: submission.section_id,
            author: submission.author,
            summary: submission.summary,
            ops: submission.ops,
            affected_blocks: submission.affected_blocks,
            anchors: submission.anchors,
            before_outline: submission.before_outline,
            after_outline: submission.after_outline,
            votes: Default::default(),
            status: ChangeStatus::Published,
            base_entry_version: self.entry.version,
            created_at: Utc::now(),
            merged_at: None,
        };
        let author = change.author.clone();
        change.set_vote(&author, VoteValue::Yes);

        info!(
            change_id = %change.id,
            section = %change.target_section_id,
            author = %change.author,
            ops = change.ops.len(),
            "change submitted"
        );
        let id = change.id.clone();
        self.changes.push(change);
        self.auto_merge_tick();
        self.snapshot(&id)
    }

    /// Set or clear `user`'s vote, then run an auto-merge tick.
    ///
    /// Votes on `needs_update` changes are recorded but cannot merge them.
    pub fn vote(&mut self, id: &ChangeId, user: &str, value: VoteValue) -> Result<Change> {
        let idx = self.position(id)?;
        let change = &mut self.changes[idx];
        if change.is_merged() {
            return Err(GovernanceError::AlreadyMerged(id.to_string()));
        }
        change.set_vote(user, value);
        debug!(change_id = %id, user, value = i8::from(value), "vote recorded");

        self.auto_merge_tick();
        self.snapshot(id)
    }

    /// Press a vote button for `user`: pressing the value already stored
    /// clears the vote, anything else replaces it.
    pub fn press_vote(&mut self, id: &ChangeId, user: &str, requested: VoteValue) -> Result<Change> {
        let idx = self.position(id)?;
        let value = self.changes[idx].vote_of(user).toggle(requested);
        self.vote(id, user, value)
    }

    /// Merge passing changes one at a time until none is left.
    ///
    /// Each merge may invalidate later candidates before they are
    /// considered, and a second run without new votes does nothing.
    pub fn auto_merge_tick(&mut self) -> Vec<MergeOutcome> {
        let mut merged = Vec::new();
        while let Some(idx) = self.changes.iter().position(|c| {
            c.status == ChangeStatus::Published && is_passing(c, &self.config)
        }) {
            merged.push(self.merge_core(idx));
        }
        merged
    }

    /// Merge a change on request. Fails without side effects unless the
    /// change is published and passing.
    pub fn merge(&mut self, id: &ChangeId) -> Result<MergeOutcome> {
        let idx = self.position(id)?;
        let change = &self.changes[idx];
        match change.status {
            ChangeStatus::Merged => return Err(GovernanceError::AlreadyMerged(id.to_string())),
            ChangeStatus::NeedsUpdate => {
                warn!(change_id = %id, "merge rejected: change needs update");
                return Err(GovernanceError::NeedsUpdate(id.to_string()));
            }
            ChangeStatus::Published => {}
        }

        let tally = Tally::of(change);
        let required = self.required_yes_votes();
        if tally.yes < required {
            warn!(change_id = %id, yes = tally.yes, required, "merge rejected: below threshold");
            return Err(GovernanceError::BelowThreshold {
                required_yes_votes: required,
                yes_votes: tally.yes,
            });
        }

        Ok(self.merge_core(idx))
    }

    fn merge_core(&mut self, idx: usize) -> MergeOutcome {
        let outline_before = numbered_outline(&self.entry.blocks);
        let blocks = apply_ops(&self.entry.blocks, &self.changes[idx].ops);
        self.entry.replace_blocks(blocks);
        self.entry.version += 1;
        let outline_after = numbered_outline(&self.entry.blocks);

        let now = Utc::now();
        let merged = &mut self.changes[idx];
        merged.status = ChangeStatus::Merged;
        merged.merged_at = Some(now);
        let merged = merged.clone();

        self.entry.history.push(HistoryRecord {
            version: self.entry.version,
            change_id: merged.id.clone(),
            outline_before,
            outline_after,
            merged_at: now,
        });

        let mut invalidated = Vec::new();
        for other in self.changes.iter_mut() {
            if other.id == merged.id || other.status != ChangeStatus::Published {
                continue;
            }
            if overlaps(&merged, other, self.config.overlap) {
                other.status = ChangeStatus::NeedsUpdate;
                invalidated.push(other.id.clone());
            }
        }

        info!(
            change_id = %merged.id,
            version = self.entry.version,
            invalidated = invalidated.len(),
            "change merged"
        );
        for id in &invalidated {
            debug!(change_id = %id, merged_by = %merged.id, "change needs update");
        }

        MergeOutcome {
            change_id: merged.id,
            version: self.entry.version,
            invalidated,
        }
    }

    /// Bring a `needs_update` change up to date with a freshly compiled footprint.
    ///
    /// Published changes are rejected with [`GovernanceError::NotStale`].
    ///
    /// The change returns to `published` with only its author's yes vote and
    /// is based on the current entry version.
    pub fn resubmit(&mut self, id: &ChangeId, update: Resubmission) -> Result<Change> {
        let idx = self.position(id)?;
        if update.ops.is_empty() {
            return Err(GovernanceError::EmptyChange);
        }
        let version = self.entry.version;
        let change = &mut self.changes[idx];
        match change.status {
            ChangeStatus::Merged => return Err(GovernanceError::AlreadyMerged(id.to_string())),
            ChangeStatus::Published => return Err(GovernanceError::NotStale(id.to_string())),
            ChangeStatus::NeedsUpdate => {}
        }

        change.ops = update.ops;
        change.affected_blocks = update.affected_blocks;
        change.anchors = update.anchors;
        change.before_outline = update.before_outline;
        change.after_outline = update.after_outline;
        change.status = ChangeStatus::Published;
        change.base_entry_version = version;
        change.votes.clear();
        let author = change.author.clone();
        change.set_vote(&author, VoteValue::Yes);
        info!(change_id = %id, base_version = version, "change resubmitted");

        self.auto_merge_tick();
        self.snapshot(id)
    }

    /// Whether another unmerged change shares a block or anchor with this one.
    pub fn is_competing(&self, change: &Change) -> bool {
        !change.is_merged()
            && self.changes.iter().any(|other| {
                other.id != change.id && !other.is_merged() && overlaps(change, other, self.config.overlap)
            })
    }

    /// Vote report of one change for `user`.
    pub fn view(&self, id: &ChangeId, user: &str) -> Result<ChangeView> {
        let change = self
            .get(id)
            .ok_or_else(|| GovernanceError::ChangeNotFound(id.to_string()))?;
        Ok(self.view_of(change, user))
    }

    /// Vote reports of every change for `user`, in arrival order.
    pub fn views(&self, user: &str) -> Vec<ChangeView> {
        self.changes.iter().map(|c| self.view_of(c, user)).collect()
    }

    fn view_of(&self, change: &Change, user: &str) -> ChangeView {
        let tally = Tally::of(change);
        ChangeView {
            current_user_vote: change.vote_of(user),
            yes: tally.yes,
            no: tally.no,
            score: tally.score(),
            is_passing: is_passing(change, &self.config),
            required_yes_votes: self.required_yes_votes(),
            competing: self.is_competing(change),
            change: change.clone(),
        }
    }

    /// Pool/queue windowing and root proposal placement.
    pub fn buckets(&self) -> ChangeBuckets {
        prepare_buckets(&self.changes, &self.entry.sections_tree, self.config.pool_size)
    }

    fn snapshot(&self, id: &ChangeId) -> Result<Change> {
        self.get(id)
            .cloned()
            .ok_or_else(|| GovernanceError::ChangeNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmh_core::Block;

    fn ledger() -> ChangeLedger {
        let entry = Entry::new(
            "e1",
            "Charter",
            vec![
                Block::heading("h_seed", "Seed", None),
                Block::paragraph("p_seed", "Body", Some("h_seed")),
            ],
        );
        ChangeLedger::new(entry, QuorumConfig::default())
    }

    fn body_edit(author: &str, text: &str) -> ChangeSubmission {
        ChangeSubmission {
            entry_id: "e1".into(),
            section_id: "seed".into(),
            summary: format!("Set body to {text}"),
            ops: vec![Operation::update_text("p_seed", text)],
            affected_blocks: BTreeSet::from(["p_seed".to_string()]),
            anchors: BTreeSet::new(),
            before_outline: String::new(),
            after_outline: String::new(),
            author: author.into(),
        }
    }

    #[test]
    fn test_tick_merges_one_of_two_overlapping_candidates() {
        let mut ledger = ledger();
        let first = ledger.submit(body_edit("alice", "First")).unwrap();
        let second = ledger.submit(body_edit("bob", "Second")).unwrap();

        // Make both passing before any tick runs.
        for idx in 0..2 {
            ledger.changes[idx].set_vote("carol", VoteValue::Yes);
        }
        let merged = ledger.auto_merge_tick();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].change_id, first.id);
        assert_eq!(merged[0].invalidated, vec![second.id.clone()]);
        assert_eq!(ledger.get(&second.id).unwrap().status, ChangeStatus::NeedsUpdate);
        assert_eq!(ledger.entry().version, 2);
        assert_eq!(ledger.entry().blocks[1].text, "First");

        assert!(ledger.auto_merge_tick().is_empty());
        assert_eq!(ledger.entry().version, 2);
    }

    #[test]
    fn test_submit_records_author_vote() {
        let mut ledger = ledger();
        let change = ledger.submit(body_edit("alice", "New")).unwrap();
        assert_eq!(change.vote_of("alice"), VoteValue::Yes);
        assert_eq!(change.status, ChangeStatus::Published);
        assert_eq!(change.base_entry_version, 1);
    }

    #[test]
    fn test_history_records_numbered_outlines() {
        let mut ledger = ledger();
        let change = ledger.submit(body_edit("alice", "New")).unwrap();
        ledger.vote(&change.id, "bob", VoteValue::Yes).unwrap();

        let record = &ledger.entry().history[0];
        assert_eq!(record.version, 2);
        assert_eq!(record.change_id, change.id);
        assert_eq!(record.outline_before, "1 Seed\n  ‣ Body");
        assert_eq!(record.outline_after, "1 Seed\n  ‣ New");
    }
}
