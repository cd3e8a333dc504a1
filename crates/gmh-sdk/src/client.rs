//! High-level client for the GroupMind SDK.

use crate::backend::{ChangeBackend, MemoryBackend};
use crate::error::{Result, SdkError};
use gmh_compose::{ComposedChange, Draft, DraftError};
use gmh_core::UlidIds;
use gmh_governance::{Change, ChangeId, ChangeSubmission, ChangeView, Entry, Resubmission, VoteValue};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for the GroupMind client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// User acting through this client.
    pub user_id: String,
    /// Project whose entry is being edited.
    pub project_id: String,
    /// Re-fetch the entry and changes after every write.
    pub auto_refresh: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            project_id: "default".to_string(),
            auto_refresh: true,
        }
    }
}

/// Builder for client configuration.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.user_id = user_id.into();
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.project_id = project_id.into();
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.auto_refresh = enabled;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One user's view of a project: cached entry and changes plus at most one
/// draft in progress.
///
/// # Example
///
/// ```rust
/// use gmh_core::Block;
/// use gmh_governance::{Entry, QuorumConfig, VoteValue};
/// use gmh_sdk::{Client, ClientConfigBuilder, MemoryBackend};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let backend = Arc::new(MemoryBackend::new());
/// let entry = Entry::new("e", "Charter", vec![
///     Block::heading("h_seed", "Seed", None),
///     Block::paragraph("p_seed", "Body", Some("h_seed")),
/// ]);
/// backend.create_project("charter", entry, QuorumConfig::default()).unwrap();
///
/// let config = ClientConfigBuilder::new().user_id("alice").project_id("charter").build();
/// let alice = Client::new(backend.clone(), config);
/// alice.start_edit("seed").await.unwrap();
/// alice.with_draft(|d| d.working_mut().set_body(&[0], "Better body")).unwrap().unwrap();
/// let change = alice.publish().await.unwrap();
///
/// let config = ClientConfigBuilder::new().user_id("bob").project_id("charter").build();
/// let bob = Client::new(backend, config);
/// let merged = bob.vote(&change.id, VoteValue::Yes).await.unwrap();
/// assert!(merged.is_merged());
/// # });
/// ```
pub struct Client<B: ChangeBackend> {
    config: ClientConfig,
    backend: Arc<B>,
    entry: RwLock<Option<Entry>>,
    changes: RwLock<Vec<ChangeView>>,
    draft: RwLock<Option<Draft>>,
}

impl<B: ChangeBackend> Client<B> {
    pub fn new(backend: Arc<B>, config: ClientConfig) -> Self {
        Self {
            config,
            backend,
            entry: RwLock::new(None),
            changes: RwLock::new(Vec::new()),
            draft: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Fetch the entry and the change list together.
    pub async fn refresh(&self) -> Result<()> {
        let project = self.config.project_id.as_str();
        let (entry, changes) = futures::try_join!(
            self.backend.fetch_entry(project),
            self.backend.list_changes(project, &self.config.user_id),
        )?;
        debug!(
            project,
            version = entry.version,
            changes = changes.len(),
            "client refreshed"
        );
        *self.entry.write() = Some(entry);
        *self.changes.write() = changes;
        Ok(())
    }

    /// Cached entry, if fetched.
    pub fn entry(&self) -> Option<Entry> {
        self.entry.read().clone()
    }

    /// Cached change views.
    pub fn changes(&self) -> Vec<ChangeView> {
        self.changes.read().clone()
    }

    pub fn change(&self, id: &ChangeId) -> Option<ChangeView> {
        self.changes.read().iter().find(|v| &v.change.id == id).cloned()
    }

    async fn current_entry(&self) -> Result<Entry> {
        if let Some(entry) = self.entry() {
            return Ok(entry);
        }
        self.refresh().await?;
        self.entry()
            .ok_or_else(|| SdkError::ProjectNotFound(self.config.project_id.clone()))
    }

    async fn after_write(&self) -> Result<()> {
        if self.config.auto_refresh {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Start editing an existing section, discarding any draft in progress.
    pub async fn start_edit(&self, section_id: &str) -> Result<()> {
        let entry = self.current_entry().await?;
        let draft = Draft::edit(&entry.sections_tree, section_id)?;
        *self.draft.write() = Some(draft);
        Ok(())
    }

    /// Start proposing a new top-level section after `after_section_id`
    /// (document start for `None`).
    pub async fn start_new_section(&self, after_section_id: Option<&str>) -> Result<()> {
        let entry = self.current_entry().await?;
        let draft = Draft::propose_section_after(&entry.sections_tree, after_section_id, &mut UlidIds);
        *self.draft.write() = Some(draft);
        Ok(())
    }

    pub fn has_draft(&self) -> bool {
        self.draft.read().is_some()
    }

    pub fn discard_draft(&self) {
        *self.draft.write() = None;
    }

    /// Run `f` against the draft in progress.
    pub fn with_draft<R>(&self, f: impl FnOnce(&mut Draft) -> R) -> Result<R> {
        let mut draft = self.draft.write();
        let draft = draft.as_mut().ok_or(DraftError::NotActive)?;
        Ok(f(draft))
    }

    /// Compose the draft against the cached entry without submitting it.
    pub fn preview(&self) -> Result<ComposedChange> {
        let entry = self.entry.read();
        let blocks = entry.as_ref().map(|e| e.blocks.as_slice()).unwrap_or(&[]);
        let draft = self.draft.read();
        let draft = draft.as_ref().ok_or(DraftError::NotActive)?;
        Ok(draft.compose(blocks)?)
    }

    /// Submit the draft as a new change. The draft is kept if submission fails.
    pub async fn publish(&self) -> Result<Change> {
        let entry = self.current_entry().await?;
        let composed = self.preview()?;
        let submission = ChangeSubmission::from_composed(composed, entry.id, self.config.user_id.clone());

        let change = self
            .backend
            .submit_change(&self.config.project_id, submission)
            .await?;
        info!(
            user = %self.config.user_id,
            change_id = %change.id,
            status = ?change.status,
            "change published"
        );
        self.discard_draft();
        self.after_write().await?;
        Ok(change)
    }

    /// Bring one of this user's `needs_update` changes up to date with the
    /// draft in progress.
    pub async fn resubmit(&self, change_id: &ChangeId) -> Result<Change> {
        self.current_entry().await?;
        let composed = self.preview()?;
        let update = Resubmission {
            ops: composed.ops,
            affected_blocks: composed.affected_blocks,
            anchors: composed.anchors,
            before_outline: composed.before_outline,
            after_outline: composed.after_outline,
        };

        let change = self
            .backend
            .resubmit_change(&self.config.project_id, change_id, update)
            .await?;
        info!(user = %self.config.user_id, change_id = %change.id, "change resubmitted");
        self.discard_draft();
        self.after_write().await?;
        Ok(change)
    }

    /// Press a vote button: pressing the value already held clears the vote.
    ///
    /// The held value is read by the backend, not from the cached view.
    pub async fn vote(&self, change_id: &ChangeId, requested: VoteValue) -> Result<Change> {
        let change = self
            .backend
            .toggle_vote(&self.config.project_id, change_id, &self.config.user_id, requested)
            .await?;
        info!(
            user = %self.config.user_id,
            change_id = %change_id,
            value = i8::from(change.vote_of(&self.config.user_id)),
            status = ?change.status,
            "vote cast"
        );
        self.after_write().await?;
        Ok(change)
    }

    /// Ask for a manual merge.
    pub async fn merge(&self, change_id: &ChangeId) -> Result<Change> {
        let change = self
            .backend
            .request_merge(&self.config.project_id, change_id, &self.config.user_id)
            .await?;
        info!(user = %self.config.user_id, change_id = %change_id, "change merged");
        self.after_write().await?;
        Ok(change)
    }
}

/// Convenience functions for in-memory projects.
pub mod quick {
    use super::*;

    /// Clients for `users` sharing one in-memory project.
    pub fn create_clients(
        backend: Arc<MemoryBackend>,
        project_id: &str,
        users: &[&str],
    ) -> Vec<Client<MemoryBackend>> {
        users
            .iter()
            .map(|user| {
                let config = ClientConfigBuilder::new()
                    .user_id(*user)
                    .project_id(project_id)
                    .build();
                Client::new(backend.clone(), config)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmh_core::{Block, SequentialIds};
    use gmh_governance::{ChangeStatus, QuorumConfig};

    fn setup(users: &[&str]) -> (Arc<MemoryBackend>, Vec<Client<MemoryBackend>>) {
        let backend = Arc::new(MemoryBackend::new());
        let entry = Entry::new(
            "entry",
            "Charter",
            vec![
                Block::heading("h_intro", "Introduction", None),
                Block::paragraph("p_intro", "Why we exist", Some("h_intro")),
                Block::heading("h_rules", "Rules", None),
                Block::paragraph("p_rules", "Be kind", Some("h_rules")),
            ],
        );
        backend
            .create_project("charter", entry, QuorumConfig::default())
            .unwrap();
        let clients = quick::create_clients(backend.clone(), "charter", users);
        (backend, clients)
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfigBuilder::new()
            .user_id("alice")
            .project_id("charter")
            .auto_refresh(false)
            .build();

        assert_eq!(config.user_id, "alice");
        assert_eq!(config.project_id, "charter");
        assert!(!config.auto_refresh);
    }

    #[tokio::test]
    async fn test_publish_without_draft() {
        let (_, clients) = setup(&["alice"]);
        let err = clients[0].publish().await.unwrap_err();
        assert_eq!(err, SdkError::Draft(DraftError::NotActive));
    }

    #[tokio::test]
    async fn test_unchanged_draft_is_kept() {
        let (_, clients) = setup(&["alice"]);
        let alice = &clients[0];
        alice.start_edit("intro").await.unwrap();

        let err = alice.publish().await.unwrap_err();
        assert_eq!(err, SdkError::Draft(DraftError::NoChanges));
        assert!(alice.has_draft());
    }

    #[tokio::test]
    async fn test_publish_and_merge_by_vote() {
        let (_, clients) = setup(&["alice", "bob"]);
        let (alice, bob) = (&clients[0], &clients[1]);

        alice.start_edit("rules").await.unwrap();
        alice
            .with_draft(|d| d.working_mut().set_body(&[0], "Be kinder"))
            .unwrap()
            .unwrap();
        let change = alice.publish().await.unwrap();
        assert!(!alice.has_draft());
        assert_eq!(change.vote_of("alice"), VoteValue::Yes);
        assert!(change.after_outline.contains("~ ‣ Be kinder"));

        let merged = bob.vote(&change.id, VoteValue::Yes).await.unwrap();
        assert_eq!(merged.status, ChangeStatus::Merged);

        let entry = bob.entry().unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.blocks[3].text, "Be kinder");
    }

    #[tokio::test]
    async fn test_vote_toggle_clears() {
        let config = QuorumConfig::default().with_eligible_voters(20);
        let backend = Arc::new(MemoryBackend::new());
        let entry = Entry::new(
            "entry",
            "Charter",
            vec![
                Block::heading("h_intro", "Introduction", None),
                Block::paragraph("p_intro", "Why we exist", Some("h_intro")),
            ],
        );
        backend.create_project("charter", entry, config).unwrap();
        let clients = quick::create_clients(backend, "charter", &["alice", "bob"]);
        let (alice, bob) = (&clients[0], &clients[1]);

        alice.start_edit("intro").await.unwrap();
        alice
            .with_draft(|d| d.working_mut().set_heading(&[0], "Preface"))
            .unwrap()
            .unwrap();
        let change = alice.publish().await.unwrap();

        let voted = bob.vote(&change.id, VoteValue::No).await.unwrap();
        assert_eq!(voted.vote_of("bob"), VoteValue::No);

        let cleared = bob.vote(&change.id, VoteValue::No).await.unwrap();
        assert_eq!(cleared.vote_of("bob"), VoteValue::Neutral);
        assert!(!cleared.votes.contains_key("bob"));
    }

    #[tokio::test]
    async fn test_vote_toggle_reads_stored_vote() {
        let config = QuorumConfig::default().with_eligible_voters(20);
        let backend = Arc::new(MemoryBackend::new());
        let entry = Entry::new(
            "entry",
            "Charter",
            vec![
                Block::heading("h_intro", "Introduction", None),
                Block::paragraph("p_intro", "Why we exist", Some("h_intro")),
            ],
        );
        backend.create_project("charter", entry, config).unwrap();
        let alice = Client::new(
            backend.clone(),
            ClientConfigBuilder::new().user_id("alice").project_id("charter").build(),
        );
        let bob = Client::new(
            backend.clone(),
            ClientConfigBuilder::new()
                .user_id("bob")
                .project_id("charter")
                .auto_refresh(false)
                .build(),
        );

        alice.start_edit("intro").await.unwrap();
        alice
            .with_draft(|d| d.working_mut().set_body(&[0], "Why we gather"))
            .unwrap()
            .unwrap();
        let change = alice.publish().await.unwrap();
        bob.refresh().await.unwrap();
        assert_eq!(bob.change(&change.id).unwrap().current_user_vote, VoteValue::Neutral);

        // Bob votes from another session; this client's view is now behind.
        backend
            .cast_vote("charter", &change.id, "bob", VoteValue::Yes)
            .await
            .unwrap();
        assert_eq!(bob.change(&change.id).unwrap().current_user_vote, VoteValue::Neutral);

        let pressed = bob.vote(&change.id, VoteValue::Yes).await.unwrap();
        assert_eq!(pressed.vote_of("bob"), VoteValue::Neutral);
        assert_eq!(pressed.status, ChangeStatus::Published);
    }

    #[tokio::test]
    async fn test_manual_merge_rejection_and_stale_resubmit() {
        let (_, clients) = setup(&["alice", "bob", "carol"]);
        let (alice, bob, carol) = (&clients[0], &clients[1], &clients[2]);

        alice.start_edit("intro").await.unwrap();
        alice
            .with_draft(|d| d.working_mut().set_body(&[0], "Why we gather"))
            .unwrap()
            .unwrap();
        let first = alice.publish().await.unwrap();

        carol.start_edit("intro").await.unwrap();
        carol
            .with_draft(|d| {
                let tree = d.working_mut();
                tree.set_heading(&[0], "Preface")?;
                tree.set_body(&[0], "Why we meet")
            })
            .unwrap()
            .unwrap();
        let second = carol.publish().await.unwrap();

        let err = carol.merge(&second.id).await.unwrap_err();
        assert_eq!(
            err,
            SdkError::MergeRejected {
                required_yes_votes: 2,
                yes_votes: 1,
            }
        );

        bob.vote(&first.id, VoteValue::Yes).await.unwrap();
        carol.refresh().await.unwrap();
        assert_eq!(
            carol.change(&second.id).unwrap().change.status,
            ChangeStatus::NeedsUpdate
        );

        bob.vote(&second.id, VoteValue::Yes).await.unwrap();
        let err = carol.merge(&second.id).await.unwrap_err();
        assert_eq!(err, SdkError::Stale(second.id.to_string()));

        // Rebase onto the merged entry.
        carol.start_edit("intro").await.unwrap();
        carol
            .with_draft(|d| d.working_mut().set_heading(&[0], "Preface"))
            .unwrap()
            .unwrap();
        let rebased = carol.resubmit(&second.id).await.unwrap();
        assert_eq!(rebased.status, ChangeStatus::Published);
        assert_eq!(rebased.base_entry_version, 2);

        // Bob's cached vote predates the reset.
        bob.refresh().await.unwrap();
        assert_eq!(bob.change(&second.id).unwrap().current_user_vote, VoteValue::Neutral);
        let merged = bob.vote(&second.id, VoteValue::Yes).await.unwrap();
        assert!(merged.is_merged());
        let entry = bob.entry().unwrap();
        assert_eq!(entry.blocks[0].text, "Preface");
        assert_eq!(entry.blocks[1].text, "Why we gather");
    }

    #[tokio::test]
    async fn test_new_section_proposal() {
        let (_, clients) = setup(&["alice", "bob"]);
        let (alice, bob) = (&clients[0], &clients[1]);

        alice.start_new_section(Some("intro")).await.unwrap();
        let summary = alice.with_draft(|d| d.summary().to_string()).unwrap();
        assert_eq!(summary, "Add section 2");

        let err = alice.publish().await.unwrap_err();
        assert_eq!(err, SdkError::Draft(DraftError::EmptyNewSection));

        alice
            .with_draft(|d| {
                let tree = d.working_mut();
                tree.set_heading(&[0], "Scope")?;
                tree.set_body(&[0], "What we cover")?;
                tree.add_child(&[0], &mut SequentialIds::new()).map(|_| ())
            })
            .unwrap()
            .unwrap();
        let change = alice.publish().await.unwrap();
        bob.vote(&change.id, VoteValue::Yes).await.unwrap();

        let entry = bob.entry().unwrap();
        let headings: Vec<&str> = entry
            .blocks
            .iter()
            .filter(|b| b.is_heading())
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(headings, vec!["Introduction", "Scope", "", "Rules"]);
        assert_eq!(entry.sections_tree.len(), 3);
        assert_eq!(entry.sections_tree[1].numbering, "2");
    }
}
