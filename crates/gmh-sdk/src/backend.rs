//! Persistence backend abstractions for GroupMind projects.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use gmh_governance::{
    Change, ChangeId, ChangeLedger, ChangeStatus, ChangeSubmission, ChangeView, Entry, QuorumConfig,
    Resubmission, UserId, VoteValue,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Events emitted by a backend as project state changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    ChangeSubmitted {
        project_id: String,
        change_id: ChangeId,
    },
    VoteCast {
        project_id: String,
        change_id: ChangeId,
        user: UserId,
        value: VoteValue,
    },
    ChangeMerged {
        project_id: String,
        change_id: ChangeId,
        version: u64,
    },
    /// A published change now overlaps a merged one.
    ChangeInvalidated {
        project_id: String,
        change_id: ChangeId,
    },
}

/// Request/response boundary to whatever persists entries and changes.
#[async_trait]
pub trait ChangeBackend: Send + Sync + 'static {
    /// Fetch the canonical entry of a project.
    async fn fetch_entry(&self, project_id: &str) -> Result<Entry>;

    /// Fetch every change of a project, annotated with `user`'s vote.
    async fn list_changes(&self, project_id: &str, user: &str) -> Result<Vec<ChangeView>>;

    /// Submit a new change.
    async fn submit_change(&self, project_id: &str, submission: ChangeSubmission) -> Result<Change>;

    /// Set or clear a user's vote.
    async fn cast_vote(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        user: &str,
        value: VoteValue,
    ) -> Result<Change>;

    /// Toggle a user's vote against the stored one: requesting the value
    /// already held clears it.
    async fn toggle_vote(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        user: &str,
        requested: VoteValue,
    ) -> Result<Change>;

    /// Merge a change on a user's request.
    async fn request_merge(&self, project_id: &str, change_id: &ChangeId, user: &str) -> Result<Change>;

    /// Replace the footprint of a `needs_update` change.
    async fn resubmit_change(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        update: Resubmission,
    ) -> Result<Change>;

    /// Subscribe to backend events.
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

type SharedLedger = Arc<Mutex<ChangeLedger>>;

/// In-memory backend for tests and simulation.
///
/// Each project's ledger sits behind its own lock, so merges on one entry
/// never interleave.
#[derive(Clone)]
pub struct MemoryBackend {
    projects: Arc<RwLock<HashMap<String, SharedLedger>>>,
    event_tx: broadcast::Sender<BackendEvent>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            projects: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a project, replacing any previous one with the same id.
    pub fn create_project(&self, project_id: impl Into<String>, entry: Entry, config: QuorumConfig) -> Result<()> {
        config.validate()?;
        let project_id = project_id.into();
        info!(project = %project_id, entry = %entry.id, "project created");
        self.projects
            .write()
            .insert(project_id, Arc::new(Mutex::new(ChangeLedger::new(entry, config))));
        Ok(())
    }

    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.projects.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn ledger(&self, project_id: &str) -> Result<SharedLedger> {
        self.projects
            .read()
            .get(project_id)
            .cloned()
            .ok_or_else(|| SdkError::ProjectNotFound(project_id.to_string()))
    }

    /// Run `f` under the project lock and publish the merges and
    /// invalidations it caused.
    fn transact<R>(
        &self,
        project_id: &str,
        f: impl FnOnce(&mut ChangeLedger) -> gmh_governance::Result<R>,
    ) -> Result<R> {
        let shared = self.ledger(project_id)?;
        let mut ledger = shared.lock();

        let merged_before = ledger.entry().history.len();
        let published: HashSet<ChangeId> = ledger
            .changes()
            .iter()
            .filter(|c| c.status == ChangeStatus::Published)
            .map(|c| c.id.clone())
            .collect();

        let result = f(&mut ledger);

        for record in ledger.entry().history.iter().skip(merged_before) {
            let _ = self.event_tx.send(BackendEvent::ChangeMerged {
                project_id: project_id.to_string(),
                change_id: record.change_id.clone(),
                version: record.version,
            });
        }
        for change in ledger.changes() {
            if change.status == ChangeStatus::NeedsUpdate && published.contains(&change.id) {
                let _ = self.event_tx.send(BackendEvent::ChangeInvalidated {
                    project_id: project_id.to_string(),
                    change_id: change.id.clone(),
                });
            }
        }

        Ok(result?)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeBackend for MemoryBackend {
    async fn fetch_entry(&self, project_id: &str) -> Result<Entry> {
        let shared = self.ledger(project_id)?;
        let entry = shared.lock().entry().clone();
        Ok(entry)
    }

    async fn list_changes(&self, project_id: &str, user: &str) -> Result<Vec<ChangeView>> {
        let shared = self.ledger(project_id)?;
        let views = shared.lock().views(user);
        Ok(views)
    }

    async fn submit_change(&self, project_id: &str, submission: ChangeSubmission) -> Result<Change> {
        debug!(project = project_id, section = %submission.section_id, "submit request");
        let change = self.transact(project_id, |ledger| ledger.submit(submission))?;
        let _ = self.event_tx.send(BackendEvent::ChangeSubmitted {
            project_id: project_id.to_string(),
            change_id: change.id.clone(),
        });
        Ok(change)
    }

    async fn cast_vote(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        user: &str,
        value: VoteValue,
    ) -> Result<Change> {
        debug!(project = project_id, change_id = %change_id, user, "vote request");
        let change = self.transact(project_id, |ledger| ledger.vote(change_id, user, value))?;
        let _ = self.event_tx.send(BackendEvent::VoteCast {
            project_id: project_id.to_string(),
            change_id: change_id.clone(),
            user: user.to_string(),
            value,
        });
        Ok(change)
    }

    async fn toggle_vote(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        user: &str,
        requested: VoteValue,
    ) -> Result<Change> {
        debug!(project = project_id, change_id = %change_id, user, "vote toggle request");
        let change = self.transact(project_id, |ledger| ledger.press_vote(change_id, user, requested))?;
        let _ = self.event_tx.send(BackendEvent::VoteCast {
            project_id: project_id.to_string(),
            change_id: change_id.clone(),
            user: user.to_string(),
            value: change.vote_of(user),
        });
        Ok(change)
    }

    async fn request_merge(&self, project_id: &str, change_id: &ChangeId, user: &str) -> Result<Change> {
        debug!(project = project_id, change_id = %change_id, user, "merge request");
        self.transact(project_id, |ledger| {
            ledger.merge(change_id)?;
            ledger
                .get(change_id)
                .cloned()
                .ok_or_else(|| gmh_governance::GovernanceError::ChangeNotFound(change_id.to_string()))
        })
    }

    async fn resubmit_change(
        &self,
        project_id: &str,
        change_id: &ChangeId,
        update: Resubmission,
    ) -> Result<Change> {
        debug!(project = project_id, change_id = %change_id, "resubmit request");
        self.transact(project_id, |ledger| ledger.resubmit(change_id, update))
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmh_core::{Block, Operation};

    fn seed_entry() -> Entry {
        Entry::new(
            "entry",
            "Charter",
            vec![
                Block::heading("h_intro", "Introduction", None),
                Block::paragraph("p_intro", "Why we exist", Some("h_intro")),
                Block::heading("h_rules", "Rules", None),
                Block::paragraph("p_rules", "Be kind", Some("h_rules")),
            ],
        )
    }

    fn submission(author: &str, block: &str, text: &str) -> ChangeSubmission {
        ChangeSubmission {
            entry_id: "entry".to_string(),
            section_id: "intro".to_string(),
            summary: format!("Reword {}", block),
            ops: vec![Operation::update_text(block, text)],
            affected_blocks: [block.to_string()].into_iter().collect(),
            anchors: Default::default(),
            before_outline: String::new(),
            after_outline: String::new(),
            author: author.to_string(),
        }
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .create_project("charter", seed_entry(), QuorumConfig::default())
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let backend = MemoryBackend::new();
        let err = backend.fetch_entry("missing").await.unwrap_err();
        assert_eq!(err, SdkError::ProjectNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let backend = MemoryBackend::new();
        let config = QuorumConfig {
            threshold_percent: 150,
            ..QuorumConfig::default()
        };
        let err = backend.create_project("p", seed_entry(), config).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
        assert!(backend.project_ids().is_empty());
    }

    #[tokio::test]
    async fn test_submit_vote_merge_events() {
        let backend = backend();
        let mut events = backend.subscribe();

        let change = backend
            .submit_change("charter", submission("alice", "p_intro", "Why we gather"))
            .await
            .unwrap();
        assert_eq!(change.status, ChangeStatus::Published);
        assert_eq!(
            events.recv().await.unwrap(),
            BackendEvent::ChangeSubmitted {
                project_id: "charter".to_string(),
                change_id: change.id.clone(),
            }
        );

        // 40% of 5 voters: the second yes vote merges.
        let merged = backend
            .cast_vote("charter", &change.id, "bob", VoteValue::Yes)
            .await
            .unwrap();
        assert_eq!(merged.status, ChangeStatus::Merged);
        assert_eq!(
            events.recv().await.unwrap(),
            BackendEvent::ChangeMerged {
                project_id: "charter".to_string(),
                change_id: change.id.clone(),
                version: 2,
            }
        );
        assert!(matches!(events.recv().await.unwrap(), BackendEvent::VoteCast { .. }));

        let entry = backend.fetch_entry("charter").await.unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.blocks[1].text, "Why we gather");
    }

    #[tokio::test]
    async fn test_toggle_vote_uses_stored_vote() {
        let backend = backend();
        let change = backend
            .submit_change("charter", submission("alice", "p_intro", "Why we gather"))
            .await
            .unwrap();
        let mut events = backend.subscribe();

        // The author already holds a yes vote, so pressing yes clears it.
        let cleared = backend
            .toggle_vote("charter", &change.id, "alice", VoteValue::Yes)
            .await
            .unwrap();
        assert_eq!(cleared.vote_of("alice"), VoteValue::Neutral);
        assert_eq!(
            events.recv().await.unwrap(),
            BackendEvent::VoteCast {
                project_id: "charter".to_string(),
                change_id: change.id.clone(),
                user: "alice".to_string(),
                value: VoteValue::Neutral,
            }
        );

        let flipped = backend
            .toggle_vote("charter", &change.id, "alice", VoteValue::No)
            .await
            .unwrap();
        assert_eq!(flipped.vote_of("alice"), VoteValue::No);
    }

    #[tokio::test]
    async fn test_invalidation_event() {
        let backend = backend();
        let first = backend
            .submit_change("charter", submission("alice", "p_intro", "One"))
            .await
            .unwrap();
        let second = backend
            .submit_change("charter", submission("carol", "p_intro", "Two"))
            .await
            .unwrap();

        let mut events = backend.subscribe();
        backend
            .cast_vote("charter", &first.id, "bob", VoteValue::Yes)
            .await
            .unwrap();

        let mut invalidated = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let BackendEvent::ChangeInvalidated { change_id, .. } = event {
                invalidated.push(change_id);
            }
        }
        assert_eq!(invalidated, vec![second.id.clone()]);

        let views = backend.list_changes("charter", "carol").await.unwrap();
        let view = views.iter().find(|v| v.change.id == second.id).unwrap();
        assert_eq!(view.change.status, ChangeStatus::NeedsUpdate);
        assert_eq!(view.current_user_vote, VoteValue::Yes);
    }

    #[tokio::test]
    async fn test_manual_merge_rejected_below_threshold() {
        let backend = backend();
        let change = backend
            .submit_change("charter", submission("alice", "p_rules", "Be kinder"))
            .await
            .unwrap();

        let err = backend
            .request_merge("charter", &change.id, "alice")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SdkError::MergeRejected {
                required_yes_votes: 2,
                yes_votes: 1,
            }
        );
        assert_eq!(backend.fetch_entry("charter").await.unwrap().version, 1);
    }
}
