//! # gmh-governance
//!
//! Voting and merge state machine for GroupMind. Changes are proposed
//! against an [`Entry`], collect votes, and merge once enough eligible
//! voters said yes. A merge applies the change's operations, bumps the
//! entry version, records history, and marks overlapping open changes as
//! needing an update.
//!
//! ## Example
//!
//! ```rust
//! use gmh_core::{Block, Operation};
//! use gmh_governance::{ChangeLedger, ChangeStatus, ChangeSubmission, Entry, QuorumConfig, VoteValue};
//!
//! let entry = Entry::new("e1", "Charter", vec![
//!     Block::heading("h_seed", "Seed", None),
//!     Block::paragraph("p_seed", "Body", Some("h_seed")),
//! ]);
//! let mut ledger = ChangeLedger::new(entry, QuorumConfig::default());
//!
//! let change = ledger.submit(ChangeSubmission {
//!     entry_id: "e1".into(),
//!     section_id: "seed".into(),
//!     summary: "Improve body".into(),
//!     ops: vec![Operation::update_text("p_seed", "Better body")],
//!     affected_blocks: ["p_seed".to_string()].into(),
//!     anchors: Default::default(),
//!     before_outline: String::new(),
//!     after_outline: String::new(),
//!     author: "alice".into(),
//! }).unwrap();
//! assert_eq!(change.status, ChangeStatus::Published);
//!
//! let change = ledger.vote(&change.id, "bob", VoteValue::Yes).unwrap();
//! assert_eq!(change.status, ChangeStatus::Merged);
//! assert_eq!(ledger.entry().version, 2);
//! ```

pub mod change;
pub mod config;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod pool;
pub mod rules;
pub mod view;

pub use change::{Change, ChangeId, ChangeStatus, ChangeSubmission, UserId, VoteValue};
pub use config::{OverlapPolicy, QuorumConfig};
pub use entry::{Entry, HistoryRecord};
pub use error::{GovernanceError, Result};
pub use ledger::{ChangeLedger, MergeOutcome, Resubmission};
pub use pool::{prepare_buckets, resolve_root_anchor, Bucket, ChangeBuckets, RootPlacement};
pub use rules::{is_passing, overlaps, required_yes_votes, Tally};
pub use view::ChangeView;
