use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use gmh_core::{Block, UlidIds};
use gmh_governance::{ChangeStatus, Entry, QuorumConfig, VoteValue};
use gmh_sdk::{quick, BackendEvent, ChangeBackend, Client, MemoryBackend, SdkError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

const PROJECT: &str = "charter";

/// Parameters of one simulated governance run.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub users: usize,
    pub rounds: usize,
    pub seed: u64,
    pub quorum: QuorumConfig,
}

/// Statistics collected during a simulation
#[derive(Clone, Debug, Default)]
pub struct SimulationStats {
    pub users: usize,
    pub rounds: usize,
    pub proposals: usize,
    pub rejected_drafts: usize,
    pub votes: usize,
    pub manual_merges: usize,
    pub rejected_merges: usize,
    pub resubmissions: usize,
    pub merges: usize,
    pub invalidations: usize,
    pub pending: usize,
    pub needs_update: usize,
    pub final_version: u64,
    pub final_blocks: usize,
    pub total_time: Duration,
}

impl SimulationStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Simulation Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Users:                     {:>30} ║", self.users);
        println!("║  Rounds:                    {:>30} ║", self.rounds);
        println!("║  Proposals published:       {:>30} ║", self.proposals);
        println!("║  Drafts rejected locally:   {:>30} ║", self.rejected_drafts);
        println!("║  Votes cast:                {:>30} ║", self.votes);
        println!("║  Manual merges:             {:>30} ║", self.manual_merges);
        println!("║  Manual merges refused:     {:>30} ║", self.rejected_merges);
        println!("║  Resubmissions:             {:>30} ║", self.resubmissions);
        println!("║  Merges:                    {:>30} ║", self.merges);
        println!("║  Invalidations:             {:>30} ║", self.invalidations);
        println!("║  Still published:           {:>30} ║", self.pending);
        println!("║  Still needing update:      {:>30} ║", self.needs_update);
        println!("║  Final entry version:       {:>30} ║", self.final_version);
        println!("║  Final block count:         {:>30} ║", self.final_blocks);
        println!("║  Total time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EditKind {
    Reword,
    Rename,
    AddChild,
    NewSection,
    Reorder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActionKind {
    Propose(EditKind),
    Vote(VoteValue),
    Merge,
    Resubmit,
}

/// One user's turn; `pick` selects a section or change modulo availability.
#[derive(Clone, Copy, Debug)]
struct Action {
    round: usize,
    user: usize,
    pick: usize,
    kind: ActionKind,
}

/// Seeded generator of user turns
fn action_generator(seed: u64, users: usize, rounds: usize) -> impl Stream<Item = Action> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for round in 0..rounds {
            for user in 0..users {
                let roll = rng.gen_range(0..100);
                let kind = match roll {
                    0..=9 => ActionKind::Propose(EditKind::Reword),
                    10..=14 => ActionKind::Propose(EditKind::Rename),
                    15..=19 => ActionKind::Propose(EditKind::AddChild),
                    20..=22 => ActionKind::Propose(EditKind::NewSection),
                    23..=25 => ActionKind::Propose(EditKind::Reorder),
                    26..=65 => ActionKind::Vote(VoteValue::Yes),
                    66..=80 => ActionKind::Vote(VoteValue::No),
                    81..=87 => ActionKind::Vote(VoteValue::Neutral),
                    88..=92 => ActionKind::Merge,
                    _ => ActionKind::Resubmit,
                };
                yield Action { round, user, pick: rng.gen(), kind };
            }
        }
    }
}

pub fn seed_entry() -> Entry {
    Entry::new(
        "charter",
        "Community Charter",
        vec![
            Block::heading("h_purpose", "Purpose", None),
            Block::paragraph("p_purpose", "Why this community exists.", Some("h_purpose")),
            Block::heading("h_members", "Membership", None),
            Block::paragraph("p_members", "Who may join.", Some("h_members")),
            Block::heading("h_dues", "Dues", Some("h_members")),
            Block::paragraph("p_dues", "Yearly contribution.", Some("h_dues")),
            Block::heading("h_meetings", "Meetings", None),
            Block::paragraph("p_meetings", "How often we meet.", Some("h_meetings")),
        ],
    )
}

/// Draft errors are a local precondition check; count them instead of
/// failing the run.
fn tolerate_draft(result: Result<(), SdkError>, stats: &mut SimulationStats) -> Result<bool, SdkError> {
    match result {
        Ok(()) => Ok(true),
        Err(SdkError::Draft(e)) => {
            debug!(error = %e, "draft rejected");
            stats.rejected_drafts += 1;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn propose(
    client: &Client<MemoryBackend>,
    action: Action,
    stats: &mut SimulationStats,
) -> Result<(), SdkError> {
    client.refresh().await?;
    let tree = client.entry().map(|e| e.sections_tree).unwrap_or_default();
    let label = format!("r{} u{}", action.round, action.user);

    let kind = edit_kind(action);
    if kind == EditKind::NewSection {
        let after = (!tree.is_empty()).then(|| tree[action.pick % tree.len()].id.clone());
        client.start_new_section(after.as_deref()).await?;
        let filled = client.with_draft(|d| {
            d.working_mut().set_heading(&[0], format!("Section {}", label))?;
            d.working_mut().set_body(&[0], format!("Proposed in {}.", label))
        })?;
        if tolerate_draft(filled.map_err(SdkError::from), stats)? {
            publish(client, stats).await?;
        }
        return Ok(());
    }

    if tree.is_empty() {
        return Ok(());
    }
    let section = &tree[action.pick % tree.len()];
    client.start_edit(&section.id).await?;
    let edited = client.with_draft(|d| {
        let working = d.working_mut();
        match kind {
            EditKind::Rename => working.set_heading(&[0], format!("{} ({})", section.heading, label)),
            EditKind::AddChild => {
                working.add_child(&[0], &mut UlidIds)?;
                let last = working.get(&[0]).map_or(0, |s| s.children.len().saturating_sub(1));
                working.set_heading(&[0, last], format!("Clause {}", label))?;
                working.set_body(&[0, last], format!("Added in {}.", label))
            }
            EditKind::Reorder if section.children.len() >= 2 => working.move_by(&[0, 0], 1).map(|_| ()),
            _ => working.set_body(&[0], format!("Revised in {}.", label)),
        }
    })?;
    if tolerate_draft(edited.map_err(SdkError::from), stats)? {
        publish(client, stats).await?;
    } else {
        client.discard_draft();
    }
    Ok(())
}

fn edit_kind(action: Action) -> EditKind {
    match action.kind {
        ActionKind::Propose(kind) => kind,
        _ => EditKind::Reword,
    }
}

async fn publish(client: &Client<MemoryBackend>, stats: &mut SimulationStats) -> Result<(), SdkError> {
    let published = client.publish().await.map(|_| ());
    if tolerate_draft(published, stats)? {
        stats.proposals += 1;
    } else {
        client.discard_draft();
    }
    Ok(())
}

async fn vote(
    client: &Client<MemoryBackend>,
    action: Action,
    value: VoteValue,
    stats: &mut SimulationStats,
) -> Result<(), SdkError> {
    client.refresh().await?;
    let open: Vec<_> = client
        .changes()
        .into_iter()
        .filter(|v| !v.change.is_merged())
        .collect();
    if open.is_empty() {
        return Ok(());
    }
    let target = &open[action.pick % open.len()];
    client.vote(&target.change.id, value).await?;
    stats.votes += 1;
    Ok(())
}

async fn merge(client: &Client<MemoryBackend>, action: Action, stats: &mut SimulationStats) -> Result<(), SdkError> {
    client.refresh().await?;
    let open: Vec<_> = client
        .changes()
        .into_iter()
        .filter(|v| !v.change.is_merged())
        .collect();
    if open.is_empty() {
        return Ok(());
    }
    let target = &open[action.pick % open.len()];
    match client.merge(&target.change.id).await {
        Ok(_) => stats.manual_merges += 1,
        Err(SdkError::MergeRejected { .. }) | Err(SdkError::Stale(_)) => stats.rejected_merges += 1,
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Rebase one of the user's stale edits by redoing a body revision on the
/// current entry.
async fn resubmit(
    client: &Client<MemoryBackend>,
    action: Action,
    stats: &mut SimulationStats,
) -> Result<(), SdkError> {
    client.refresh().await?;
    let user = client.user_id().to_string();
    let entry = match client.entry() {
        Some(entry) => entry,
        None => return Ok(()),
    };
    let stale = client.changes().into_iter().find(|v| {
        v.change.author == user
            && v.change.status == ChangeStatus::NeedsUpdate
            && entry.sections_tree.iter().any(|s| s.id == v.change.target_section_id)
    });
    let Some(stale) = stale else {
        return Ok(());
    };

    client.start_edit(&stale.change.target_section_id).await?;
    let label = format!("r{} u{}", action.round, action.user);
    let edited = client.with_draft(|d| d.working_mut().set_body(&[0], format!("Rebased in {}.", label)))?;
    if !tolerate_draft(edited.map_err(SdkError::from), stats)? {
        client.discard_draft();
        return Ok(());
    }
    match client.resubmit(&stale.change.id).await {
        Ok(_) => stats.resubmissions += 1,
        Err(SdkError::Draft(_)) => {
            stats.rejected_drafts += 1;
            client.discard_draft();
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Drive `config.users` clients through `config.rounds` seeded rounds of
/// proposals, votes, manual merges and rebases against one entry.
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationStats, SdkError> {
    let start = Instant::now();
    let mut stats = SimulationStats {
        users: config.users,
        rounds: config.rounds,
        ..Default::default()
    };

    let backend = Arc::new(MemoryBackend::new());
    backend.create_project(PROJECT, seed_entry(), config.quorum.clone())?;

    let mut events = backend.subscribe();
    let counter = tokio::spawn(async move {
        let mut invalidations = 0usize;
        loop {
            match events.recv().await {
                Ok(BackendEvent::ChangeInvalidated { change_id, .. }) => {
                    debug!(change_id = %change_id, "change invalidated");
                    invalidations += 1;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => debug!(missed, "event counter lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        invalidations
    });

    let names: Vec<String> = (0..config.users).map(|i| format!("user-{}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let clients = quick::create_clients(backend.clone(), PROJECT, &name_refs);

    let actions = action_generator(config.seed, config.users, config.rounds);
    futures::pin_mut!(actions);
    while let Some(action) = actions.next().await {
        let client = &clients[action.user];
        match action.kind {
            ActionKind::Propose(_) => propose(client, action, &mut stats).await?,
            ActionKind::Vote(value) => vote(client, action, value, &mut stats).await?,
            ActionKind::Merge => merge(client, action, &mut stats).await?,
            ActionKind::Resubmit => resubmit(client, action, &mut stats).await?,
        }
        // Let the event counter keep up with the broadcast buffer.
        tokio::task::yield_now().await;
    }

    let entry = backend.fetch_entry(PROJECT).await?;
    let views = backend.list_changes(PROJECT, "observer").await?;
    stats.final_version = entry.version;
    stats.merges = entry.history.len();
    stats.final_blocks = entry.blocks.len();
    stats.pending = views
        .iter()
        .filter(|v| v.change.status == ChangeStatus::Published)
        .count();
    stats.needs_update = views
        .iter()
        .filter(|v| v.change.status == ChangeStatus::NeedsUpdate)
        .count();

    drop(clients);
    drop(backend);
    stats.invalidations = counter.await.unwrap_or_default();
    stats.total_time = start.elapsed();

    info!(
        version = stats.final_version,
        merges = stats.merges,
        invalidations = stats.invalidations,
        "simulation finished"
    );
    Ok(stats)
}
