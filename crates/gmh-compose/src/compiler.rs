//! Compiles a section-tree edit into block operations.
//!
//! Both forests are flattened into the block sequence they project to
//! (heading, body when non-empty, then children, pre-order). The compiler
//! then emits deletions, placements and text updates against that sequence.

use crate::section::{Section, SectionId};
use gmh_core::{BlockId, BlockKind, NewBlock, Operation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Placement context of the edited forest inside the entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileContext {
    /// Heading block the forest's roots hang under.
    pub parent_heading_id: Option<BlockId>,
    /// Where the first inserted heading goes when nothing precedes it.
    pub anchor_after_id: Option<BlockId>,
}

/// Ops plus their footprint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledChange {
    pub ops: Vec<Operation>,
    pub affected_blocks: BTreeSet<BlockId>,
    /// `after:<blockId>` strings for every anchor used to place a block.
    pub anchors: BTreeSet<String>,
}

impl CompiledChange {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Clone, Debug)]
struct FlatBlock {
    id: BlockId,
    kind: BlockKind,
    text: String,
    parent: Option<BlockId>,
}

fn flatten(forest: &[Section], parent_heading_id: Option<&str>) -> Vec<FlatBlock> {
    let mut out = Vec::new();
    for root in forest {
        flatten_into(root, parent_heading_id, &mut out);
    }
    out
}

fn flatten_into(node: &Section, parent_heading_id: Option<&str>, out: &mut Vec<FlatBlock>) {
    out.push(FlatBlock {
        id: node.heading_block_id.clone(),
        kind: BlockKind::Heading,
        text: node.heading.clone(),
        parent: parent_heading_id.map(str::to_string),
    });
    if node.has_body() {
        out.push(FlatBlock {
            id: node.body_block_id_or_derived(),
            kind: BlockKind::Paragraph,
            text: node.body.clone(),
            parent: Some(node.heading_block_id.clone()),
        });
    }
    for child in &node.children {
        flatten_into(child, Some(&node.heading_block_id), out);
    }
}

/// Block order of the forest as rewritten by the ops emitted so far.
struct Projection<'a> {
    order: Vec<&'a str>,
}

impl<'a> Projection<'a> {
    fn predecessor(&self, id: &str) -> Option<&'a str> {
        let at = self.order.iter().position(|b| *b == id)?;
        at.checked_sub(1).map(|i| self.order[i])
    }

    fn place_after(&mut self, id: &'a str, after: Option<&str>) {
        self.order.retain(|b| *b != id);
        let at = after
            .and_then(|a| self.order.iter().position(|b| *b == a))
            .map_or(0, |i| i + 1);
        self.order.insert(at, id);
    }
}

fn sections_by_id(forest: &[Section]) -> Vec<(&SectionId, &Section)> {
    let mut out = Vec::new();
    for root in forest {
        root.walk(&mut |s| out.push((&s.id, s)));
    }
    out
}

/// Diff `original` against `working` and emit the ops that turn one into the other.
pub fn compile(original: &[Section], working: &[Section], ctx: &CompileContext) -> CompiledChange {
    let parent = ctx.parent_heading_id.as_deref();
    let before = flatten(original, parent);
    let after = flatten(working, parent);

    let after_ids: HashSet<&str> = after.iter().map(|b| b.id.as_str()).collect();

    let mut out = CompiledChange::default();

    // Deletions run back to front over the original order.
    for block in before.iter().rev().filter(|b| !after_ids.contains(b.id.as_str())) {
        out.ops.push(Operation::delete(block.id.clone()));
        out.affected_blocks.insert(block.id.clone());
    }

    let before_by_id: HashMap<&str, &FlatBlock> =
        before.iter().map(|b| (b.id.as_str(), b)).collect();
    let mut projection = Projection {
        order: before
            .iter()
            .map(|b| b.id.as_str())
            .filter(|id| after_ids.contains(id))
            .collect(),
    };

    let mut last_seen: Option<&str> = None;
    let mut anchor_used = false;

    for block in &after {
        let id = block.id.as_str();

        match before_by_id.get(id) {
            None => {
                let mut after_id = last_seen;
                if after_id.is_none() && block.kind.is_heading() && !anchor_used {
                    if let Some(anchor) = ctx.anchor_after_id.as_deref() {
                        after_id = Some(anchor);
                        anchor_used = true;
                    }
                }
                out.ops.push(Operation::insert_after(
                    after_id,
                    NewBlock {
                        id: Some(block.id.clone()),
                        kind: block.kind,
                        text: block.text.clone(),
                        parent: block.parent.clone(),
                    },
                ));
                out.affected_blocks.insert(block.id.clone());
                if let Some(anchor) = after_id {
                    out.anchors.insert(format!("after:{anchor}"));
                }
                projection.place_after(id, last_seen);
            }
            Some(previous) => {
                let reparented = previous.parent != block.parent;
                let reordered = projection.predecessor(id) != last_seen;
                if reparented || reordered {
                    out.ops.push(Operation::move_after(
                        block.id.clone(),
                        last_seen,
                        Some(block.parent.as_deref()),
                    ));
                    out.affected_blocks.insert(block.id.clone());
                    if let Some(anchor) = last_seen {
                        out.anchors.insert(format!("after:{anchor}"));
                    }
                    projection.place_after(id, last_seen);
                }
            }
        }

        last_seen = Some(id);
    }

    let updated: HashMap<&SectionId, &Section> = sections_by_id(working).into_iter().collect();
    for (id, orig) in sections_by_id(original) {
        let Some(next) = updated.get(id) else {
            continue;
        };
        if orig.heading != next.heading {
            out.ops.push(Operation::update_text(
                next.heading_block_id.clone(),
                next.heading.clone(),
            ));
            out.affected_blocks.insert(next.heading_block_id.clone());
        }
        let (old_body, new_body) = (orig.body.trim(), next.body.trim());
        if !old_body.is_empty() && !new_body.is_empty() && old_body != new_body {
            let body_id = next
                .body_block_id
                .clone()
                .or_else(|| orig.body_block_id.clone())
                .unwrap_or_else(|| next.body_block_id_or_derived());
            out.ops.push(Operation::update_text(body_id.clone(), next.body.clone()));
            out.affected_blocks.insert(body_id);
        }
    }

    out
}
