//! # gmh-compose
//!
//! Drafting layer of GroupMind. A draft is an editable clone of one section
//! of an entry (or a new top-level section). Structural edits happen on the
//! clone; the compiler turns the difference between the original and the
//! edited forest into block [`Operation`](gmh_core::Operation)s.
//!
//! ## Example
//!
//! ```rust
//! use gmh_compose::{sections_from_blocks, Draft};
//! use gmh_core::Block;
//!
//! let blocks = vec![
//!     Block::heading("h_seed", "Seed", None),
//!     Block::paragraph("p_seed", "Body", Some("h_seed")),
//! ];
//! let tree = sections_from_blocks(&blocks);
//!
//! let mut draft = Draft::edit(&tree, "seed").unwrap();
//! draft.working_mut().set_body(&[0], "Better body").unwrap();
//! draft.set_summary("Improve body");
//!
//! let change = draft.compose(&blocks).unwrap();
//! assert_eq!(change.ops.len(), 1);
//! ```

pub mod compiler;
pub mod draft;
pub mod error;
pub mod index;
pub mod section;
pub mod tree;

pub use compiler::{compile, CompileContext, CompiledChange};
pub use draft::{insertion_number, ComposedChange, Draft, ROOT_SECTION_ID};
pub use error::{DraftError, Result};
pub use index::{section_at, sections_from_blocks, SectionIndex, SectionMeta};
pub use section::{find_section, Section, SectionId};
pub use tree::{renumber, NumberingSeed, WorkingTree};
