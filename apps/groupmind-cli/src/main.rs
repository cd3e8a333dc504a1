//! # GroupMind CLI
//!
//! Scripted walkthroughs of the propose/vote/merge cycle on an in-memory
//! project, plus a standalone outline diff over two JSON block files.
//!
//! ## Change lifecycle
//!
//! ```text
//! draft ──publish──▶ published ──enough yes votes──▶ merged
//!                        │
//!                        └─overlapping merge──▶ needs_update ──resubmit──▶ published
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use gmh_core::block::blocks_from_json;
use gmh_core::{decorate_outline, diff, extract_diff_lines, numbered_outline, Block, DiffSide, UlidIds};
use gmh_governance::{ChangeStatus, Entry, QuorumConfig, VoteValue};
use gmh_sdk::{quick, Client, MemoryBackend, SdkError};

type CliResult = Result<(), Box<dyn Error>>;

const PROJECT: &str = "charter";

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "groupmind")]
#[command(about = "Propose, vote on and merge changes to a shared outline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: one section edit, one vote, one merge
    Demo,
    /// Conflict scenario: overlapping proposals, invalidation and rebase
    Conflict,
    /// New top-level section: anchoring, numbering and merge
    NewSection,
    /// Diff two JSON block lists
    Diff {
        /// Block list before the change
        before: PathBuf,
        /// Block list after the change
        after: PathBuf,
        /// Print changed lines per side as JSON
        #[arg(long)]
        json: bool,
        /// Print the after side wrapped in HTML change spans
        #[arg(long)]
        decorate: bool,
    },
}

// ─── Project setup ─────────────────────────────────────────────────────────

fn seed_entry() -> Entry {
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

fn project(users: &[&str]) -> Result<Vec<Client<MemoryBackend>>, SdkError> {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_project(PROJECT, seed_entry(), QuorumConfig::default())?;
    Ok(quick::create_clients(backend, PROJECT, users))
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn marked_line(line: &str) -> ColoredString {
    match line.chars().next() {
        Some('-') => line.bright_red(),
        Some('+') => line.bright_green(),
        Some('~') => line.bright_yellow(),
        Some('↔') => line.bright_cyan(),
        _ => line.normal(),
    }
}

fn show_outline(title: &str, text: &str) {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    println!("  │ {:^42} │", title.bright_yellow().to_string());
    println!("  ├{}┤", border);
    if text.is_empty() {
        println!("  │ {}", "(empty)".dimmed());
    }
    for line in text.lines() {
        println!("  │ {}", marked_line(line));
    }
    println!("  └{}┘", border);
}

fn show_votes(client: &Client<MemoryBackend>) {
    for view in client.changes() {
        let status = match view.change.status {
            ChangeStatus::Published => "published".bright_white(),
            ChangeStatus::NeedsUpdate => "needs_update".bright_red(),
            ChangeStatus::Merged => "merged".bright_green(),
        };
        let competing = if view.competing { " competing".bright_magenta() } else { "".normal() };
        println!(
            "  {} {:<36} {} yes {}/{} no {} score {}{}",
            "◦".bright_cyan(),
            view.change.summary,
            status,
            view.yes,
            view.required_yes_votes,
            view.no,
            view.score,
            competing
        );
    }
}

fn show_entry(client: &Client<MemoryBackend>) {
    if let Some(entry) = client.entry() {
        show_outline(&format!("{} v{}", entry.title, entry.version), &numbered_outline(&entry.blocks));
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo() -> CliResult {
    header("DEMO — Propose, Vote, Merge");
    let clients = project(&["alice", "bob"])?;
    let (alice, bob) = (&clients[0], &clients[1]);

    section("Phase 1: alice drafts an edit to Membership");
    alice.refresh().await?;
    show_entry(alice);
    alice.start_edit("members").await?;
    alice.with_draft(|d| d.working_mut().set_body(&[0], "Anyone who shares our purpose may join."))??;
    let preview = alice.preview()?;
    step(&format!("summary: {}", preview.summary));
    show_outline("proposed", &preview.after_outline);

    section("Phase 2: alice publishes (the author's yes vote is recorded)");
    let change = alice.publish().await?;
    show_votes(alice);

    section("Phase 3: bob votes yes and the quorum is reached");
    let change = bob.vote(&change.id, VoteValue::Yes).await?;
    step(&format!("status: {:?}", change.status));
    show_votes(bob);
    show_entry(bob);

    if let Some(record) = bob.entry().and_then(|e| e.history.last().cloned()) {
        section(&format!("History: version {}", record.version));
        show_outline("before", &record.outline_before);
        show_outline("after", &record.outline_after);
    }
    Ok(())
}

// ─── Conflict ──────────────────────────────────────────────────────────────

async fn run_conflict() -> CliResult {
    header("CONFLICT — Overlapping Proposals, Invalidation, Rebase");
    let clients = project(&["alice", "bob", "carol"])?;
    let (alice, bob, carol) = (&clients[0], &clients[1], &clients[2]);

    section("Phase 1: alice and carol both rewrite the Membership body");
    alice.start_edit("members").await?;
    alice.with_draft(|d| d.working_mut().set_body(&[0], "Open to all residents."))??;
    let first = alice.publish().await?;
    step("alice published");

    carol.start_edit("members").await?;
    carol.with_draft(|d| {
        let tree = d.working_mut();
        tree.set_heading(&[0], "Members")?;
        tree.set_body(&[0], "Open to residents and friends.")
    })??;
    let second = carol.publish().await?;
    step("carol published");
    bob.refresh().await?;
    show_votes(bob);

    section("Phase 2: carol asks for a merge too early");
    match carol.merge(&second.id).await {
        Err(SdkError::MergeRejected {
            required_yes_votes,
            yes_votes,
        }) => step(&format!(
            "{} {} of {} yes votes",
            "rejected:".bright_red(),
            yes_votes,
            required_yes_votes
        )),
        other => step(&format!("unexpected: {:?}", other.map(|c| c.status))),
    }

    section("Phase 3: bob backs alice; carol's change goes stale");
    bob.vote(&first.id, VoteValue::Yes).await?;
    show_votes(bob);
    match carol.merge(&second.id).await {
        Err(SdkError::Stale(_)) => step(&format!("{} carol must rebase", "stale:".bright_red())),
        other => step(&format!("unexpected: {:?}", other.map(|c| c.status))),
    }

    section("Phase 4: carol rebases onto version 2 and resubmits");
    carol.refresh().await?;
    carol.start_edit("members").await?;
    carol.with_draft(|d| d.working_mut().set_heading(&[0], "Members"))??;
    let rebased = carol.resubmit(&second.id).await?;
    step(&format!("base version: {}", rebased.base_entry_version));

    bob.refresh().await?;
    bob.vote(&second.id, VoteValue::Yes).await?;
    show_votes(bob);
    show_entry(bob);
    Ok(())
}

// ─── New section ───────────────────────────────────────────────────────────

async fn run_new_section() -> CliResult {
    header("NEW SECTION — Anchoring and Numbering");
    let clients = project(&["alice", "bob"])?;
    let (alice, bob) = (&clients[0], &clients[1]);

    section("Phase 1: alice starts a section after Purpose");
    alice.start_new_section(Some("purpose")).await?;
    step(&alice.with_draft(|d| d.summary().to_string())?);

    let tree = alice.entry().map(|e| e.sections_tree).unwrap_or_default();
    if alice.with_draft(|d| d.shift_anchor(&tree, 1))? {
        let anchor = alice.with_draft(|d| d.anchor_after_section().map(str::to_string))?;
        step(&format!("anchor moved down: after {}", anchor.unwrap_or_else(|| "document start".into())));
    }

    section("Phase 2: an empty section cannot be published");
    if let Err(e) = alice.publish().await {
        step(&format!("{} {}", "rejected:".bright_red(), e));
    }

    section("Phase 3: fill it in and publish");
    alice.with_draft(|d| {
        d.set_summary("Add a code of conduct");
        let tree = d.working_mut();
        tree.set_heading(&[0], "Code of Conduct")?;
        tree.set_body(&[0], "How we treat each other.")?;
        tree.add_child(&[0], &mut UlidIds)?;
        tree.set_heading(&[0, 0], "Enforcement")?;
        tree.set_body(&[0, 0], "Who handles reports.")
    })??;
    show_outline("proposed", &alice.preview()?.after_outline);
    let change = alice.publish().await?;

    section("Phase 4: bob votes yes");
    bob.vote(&change.id, VoteValue::Yes).await?;
    show_entry(bob);
    Ok(())
}

// ─── Diff ──────────────────────────────────────────────────────────────────

fn run_diff(before: PathBuf, after: PathBuf, json: bool, decorate: bool) -> CliResult {
    let before = blocks_from_json(&std::fs::read_to_string(before)?)?;
    let after = blocks_from_json(&std::fs::read_to_string(after)?)?;
    let rendered = diff(&before, &after);

    if json {
        let lines = serde_json::json!({
            "before": extract_diff_lines(&rendered.before, DiffSide::Before),
            "after": extract_diff_lines(&rendered.after, DiffSide::After),
        });
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else if decorate {
        println!("{}", decorate_outline(&rendered.after));
    } else {
        show_outline("before", &rendered.before);
        show_outline("after", &rendered.after);
    }
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo => run_demo().await,
        Commands::Conflict => run_conflict().await,
        Commands::NewSection => run_new_section().await,
        Commands::Diff {
            before,
            after,
            json,
            decorate,
        } => run_diff(before, after, json, decorate),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
