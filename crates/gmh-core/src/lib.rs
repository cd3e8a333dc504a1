//! # gmh-core
//!
//! The leaf layer of GroupMind: a document ("entry") is a flat ordered list
//! of [`Block`]s, edited only through ordered batches of primitive
//! [`Operation`]s.
//!
//! This crate provides:
//! - The block model (headings and paragraphs with a parent heading reference)
//! - A pure, total operation engine ([`apply_ops`])
//! - Outline rendering and a before/after outline diff
//! - Injectable id generation ([`IdSource`])
//!
//! ## Example
//!
//! ```rust
//! use gmh_core::{apply_ops, diff, Block, Operation};
//!
//! let blocks = vec![
//!     Block::heading("h_seed", "Seed", None),
//!     Block::paragraph("p_seed", "Body", Some("h_seed")),
//! ];
//! let ops = vec![Operation::update_text("p_seed", "Better body")];
//!
//! let after = apply_ops(&blocks, &ops);
//! assert_eq!(after[1].text, "Better body");
//!
//! let rendered = diff(&blocks, &after);
//! assert!(rendered.after.contains("~ ‣ Better body"));
//! ```

pub mod block;
pub mod error;
pub mod ids;
pub mod ops;
pub mod outline;

pub use block::{Block, BlockId, BlockKind};
pub use error::{CoreError, Result};
pub use ids::{IdSource, SequentialIds, UlidIds};
pub use ops::{apply_ops, apply_ops_with, targeted_sets, NewBlock, Operation, TargetedSets};
pub use outline::{
    decorate_outline, diff, extract_diff_lines, heading_numbers, numbered_outline, outline, DiffLine,
    DiffLineKind, DiffMarker, DiffSide, HeadingNumber, OutlineDiff,
};
