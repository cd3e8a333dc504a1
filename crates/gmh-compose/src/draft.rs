//! Draft composer: an editable clone of part of an entry's section tree.
//!
//! A draft either edits an existing section (and its subsections) or
//! proposes a new top-level section under the virtual root. Nothing here
//! touches the entry itself; [`Draft::compose`] only previews the change.

use crate::compiler::{compile, CompileContext, CompiledChange};
use crate::error::{DraftError, Result};
use crate::index::{section_at, SectionIndex};
use crate::section::{Section, SectionId};
use crate::tree::{NumberingSeed, WorkingTree};
use gmh_core::{apply_ops, diff, Block, BlockId, IdSource, Operation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Target id of proposals that add a new top-level section.
pub const ROOT_SECTION_ID: &str = "__root__";

/// A compiled, validated draft ready to be submitted as a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedChange {
    pub section_id: SectionId,
    pub summary: String,
    pub ops: Vec<Operation>,
    pub affected_blocks: BTreeSet<BlockId>,
    pub anchors: BTreeSet<String>,
    pub before_outline: String,
    pub after_outline: String,
}

/// Numbering a new top-level section gets when placed after `after_section_id`.
///
/// `None` means the start of the document.
pub fn insertion_number(top_level: &[SectionId], after_section_id: Option<&str>) -> usize {
    match after_section_id {
        _ if top_level.is_empty() => 1,
        None => 1,
        Some(id) => top_level
            .iter()
            .position(|s| s == id)
            .map_or(top_level.len() + 1, |idx| idx + 2),
    }
}

#[derive(Clone, Debug)]
pub struct Draft {
    section_id: SectionId,
    original: Vec<Section>,
    working: WorkingTree,
    parent_heading_id: Option<BlockId>,
    anchor_after_section_id: Option<SectionId>,
    anchor_after_block_id: Option<BlockId>,
    summary: String,
}

impl Draft {
    /// Start editing the section `section_id` of `tree`.
    pub fn edit(tree: &[Section], section_id: &str) -> Result<Self> {
        let index = SectionIndex::build(tree);
        let meta = index
            .get(section_id)
            .ok_or_else(|| DraftError::SectionNotFound(section_id.to_string()))?;
        let node = section_at(tree, &meta.path)
            .cloned()
            .ok_or_else(|| DraftError::SectionNotFound(section_id.to_string()))?;

        let base = if node.numbering.is_empty() {
            "1".to_string()
        } else {
            node.numbering.clone()
        };
        let summary = format!("Edit {} {}", node.numbering, node.heading)
            .trim()
            .to_string();
        let seed = NumberingSeed {
            base,
            depth: node.depth.max(1),
            parent_section_id: meta.parent_section_id.clone(),
        };

        Ok(Self {
            section_id: node.id.clone(),
            original: vec![node.clone()],
            working: WorkingTree::new(vec![node], seed),
            parent_heading_id: meta.parent_heading_id.clone(),
            anchor_after_section_id: None,
            anchor_after_block_id: meta.preceding_block_id.clone(),
            summary,
        })
    }

    /// Propose a new top-level section after the last existing one.
    pub fn propose_section<I: IdSource + ?Sized>(tree: &[Section], ids: &mut I) -> Self {
        let last = tree.last().map(|s| s.id.clone());
        Self::propose_section_after(tree, last.as_deref(), ids)
    }

    /// Propose a new top-level section placed after `after_section_id`
    /// (or at the start of the document for `None`).
    pub fn propose_section_after<I: IdSource + ?Sized>(
        tree: &[Section],
        after_section_id: Option<&str>,
        ids: &mut I,
    ) -> Self {
        let template = Section::top_level_template(ids, String::new());
        let mut draft = Self {
            section_id: ROOT_SECTION_ID.to_string(),
            original: Vec::new(),
            working: WorkingTree::new(vec![template], NumberingSeed::default()),
            parent_heading_id: None,
            anchor_after_section_id: None,
            anchor_after_block_id: None,
            summary: String::new(),
        };
        draft.set_anchor_after_section(tree, after_section_id);
        let numbering = draft.working.seed().base.clone();
        draft.summary = format!("Add section {numbering}");
        draft
    }

    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    pub fn is_new_section(&self) -> bool {
        self.section_id == ROOT_SECTION_ID
    }

    pub fn original(&self) -> &[Section] {
        &self.original
    }

    pub fn working(&self) -> &WorkingTree {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut WorkingTree {
        &mut self.working
    }

    pub fn parent_heading_id(&self) -> Option<&str> {
        self.parent_heading_id.as_deref()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    /// Top-level section a new-section proposal is placed after.
    pub fn anchor_after_section(&self) -> Option<&str> {
        self.anchor_after_section_id.as_deref()
    }

    pub fn anchor_after_block(&self) -> Option<&str> {
        self.anchor_after_block_id.as_deref()
    }

    /// Place a new-section proposal after `section_id` (its top-level
    /// ancestor when nested), or at the document start for `None`.
    ///
    /// Drafts of existing sections ignore the call.
    pub fn set_anchor_after_section(&mut self, tree: &[Section], section_id: Option<&str>) {
        if !self.is_new_section() {
            return;
        }
        let index = SectionIndex::build(tree);
        let anchor = section_id
            .and_then(|id| index.top_level_ancestor(id))
            .map(str::to_string);

        self.anchor_after_block_id = anchor
            .as_deref()
            .and_then(|id| index.get(id))
            .map(|meta| meta.last_block_id.clone());
        let number = insertion_number(index.top_level_order(), anchor.as_deref());
        self.anchor_after_section_id = anchor;
        self.working.set_seed(NumberingSeed {
            base: number.to_string(),
            depth: 1,
            parent_section_id: None,
        });
    }

    /// Move a new-section proposal's anchor one top-level section up or down.
    ///
    /// Returns `false` when the anchor is already at the boundary.
    pub fn shift_anchor(&mut self, tree: &[Section], delta: isize) -> bool {
        if !self.is_new_section() || tree.is_empty() || delta == 0 {
            return false;
        }
        let order: Vec<&str> = tree.iter().map(|s| s.id.as_str()).collect();
        let current = self
            .anchor_after_section_id
            .as_deref()
            .and_then(|id| order.iter().position(|s| *s == id));

        let next = match current {
            None if delta < 0 => return false,
            None => Some(0),
            Some(idx) => {
                let target = idx as isize + delta;
                if target >= order.len() as isize {
                    return false;
                }
                usize::try_from(target).ok()
            }
        };
        let next_id = next.map(|idx| order[idx].to_string());
        self.set_anchor_after_section(tree, next_id.as_deref());
        true
    }

    pub fn context(&self) -> CompileContext {
        CompileContext {
            parent_heading_id: self.parent_heading_id.clone(),
            anchor_after_id: self.anchor_after_block_id.clone(),
        }
    }

    /// Compile the current working tree without validation.
    pub fn compile(&self) -> CompiledChange {
        compile(&self.original, self.working.roots(), &self.context())
    }

    /// Validate the draft and build its submission payload, previewing the
    /// outlines against `entry_blocks`.
    pub fn compose(&self, entry_blocks: &[Block]) -> Result<ComposedChange> {
        let summary = self.summary.trim();
        if summary.is_empty() {
            return Err(DraftError::MissingSummary);
        }
        if self.is_new_section() && !self.working.roots().iter().any(Section::has_content) {
            return Err(DraftError::EmptyNewSection);
        }

        let compiled = self.compile();
        if compiled.is_empty() {
            return Err(DraftError::NoChanges);
        }

        let after = apply_ops(entry_blocks, &compiled.ops);
        let outlines = diff(entry_blocks, &after);

        Ok(ComposedChange {
            section_id: self.section_id.clone(),
            summary: summary.to_string(),
            ops: compiled.ops,
            affected_blocks: compiled.affected_blocks,
            anchors: compiled.anchors,
            before_outline: outlines.before,
            after_outline: outlines.after,
        })
    }
}
