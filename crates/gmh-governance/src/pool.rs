//! Candidate pool windowing and placement of new-section proposals.

use crate::change::{Change, ChangeId, ChangeStatus};
use gmh_compose::{Section, SectionId, SectionIndex, ROOT_SECTION_ID};
use gmh_core::Operation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open changes of one section split into the voting pool and the waiting queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub pool: Vec<ChangeId>,
    pub queue: Vec<ChangeId>,
}

/// Where a new top-level section proposal would land.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootPlacement {
    Start,
    After(SectionId),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBuckets {
    pub sections: BTreeMap<SectionId, Bucket>,
    /// Merged changes in arrival order.
    pub history: Vec<ChangeId>,
    /// New-section proposals keyed by the top-level section they follow.
    pub root_after: BTreeMap<SectionId, Vec<ChangeId>>,
    /// New-section proposals placed at the start of the document.
    pub root_start: Vec<ChangeId>,
}

impl ChangeBuckets {
    pub fn bucket(&self, section_id: &str) -> Option<&Bucket> {
        self.sections.get(section_id)
    }
}

/// Group changes by target section.
///
/// The first `pool_size` published changes of a section (by arrival) form
/// its pool; later ones and every `needs_update` change wait in its queue.
pub fn prepare_buckets(changes: &[Change], tree: &[Section], pool_size: usize) -> ChangeBuckets {
    let index = SectionIndex::build(tree);
    let mut out = ChangeBuckets::default();

    for change in changes {
        if change.status == ChangeStatus::Merged {
            out.history.push(change.id.clone());
            continue;
        }

        let bucket = out
            .sections
            .entry(change.target_section_id.clone())
            .or_default();
        if change.status == ChangeStatus::NeedsUpdate || bucket.pool.len() >= pool_size {
            bucket.queue.push(change.id.clone());
        } else {
            bucket.pool.push(change.id.clone());
        }

        if change.target_section_id == ROOT_SECTION_ID {
            match resolve_root_anchor(change, &index) {
                RootPlacement::After(section) => {
                    out.root_after.entry(section).or_default().push(change.id.clone())
                }
                RootPlacement::Start => out.root_start.push(change.id.clone()),
            }
        }
    }
    out
}

/// Resolve which top-level section a new-section proposal follows.
///
/// Anchors are `after:<blockId>`; a bare section id or the heading/body
/// variant of the referenced block is accepted too. The first anchor in op
/// order wins; the stored anchor set is only consulted after the ops.
pub fn resolve_root_anchor(change: &Change, index: &SectionIndex) -> RootPlacement {
    let in_op_order = change
        .ops
        .iter()
        .filter_map(Operation::after_id)
        .map(|after| format!("after:{after}"));
    for anchor in in_op_order.chain(change.anchors.iter().cloned()) {
        let Some((_, reference)) = anchor.split_once(':') else {
            continue;
        };
        if reference.is_empty() {
            continue;
        }

        let bare = reference
            .strip_prefix("h_")
            .or_else(|| reference.strip_prefix("p_"))
            .unwrap_or(reference);
        let candidates = [
            reference.to_string(),
            format!("h_{bare}"),
            format!("p_{bare}"),
        ];

        let section = candidates
            .iter()
            .find_map(|c| index.section_for_block(c))
            .and_then(|s| index.top_level_ancestor(s));
        if let Some(section) = section {
            return RootPlacement::After(section.to_string());
        }
    }
    RootPlacement::Start
}
