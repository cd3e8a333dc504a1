//! Operation engine - ordered primitive edits over a block list.
//!
//! Application is pure and total: the input slice is never mutated, and a
//! reference to a missing block degrades gracefully instead of failing.
//! Each operation observes the list as left by the operations before it in
//! the same batch.

use crate::block::{find_index, Block, BlockId, BlockKind};
use crate::ids::{IdSource, UlidIds};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Payload of an [`Operation::InsertBlock`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    /// Explicit id; generated on application when absent.
    #[serde(default)]
    pub id: Option<BlockId>,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent: Option<BlockId>,
}

/// A primitive mutation of a block list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Replace the text of a block.
    UpdateText { block_id: BlockId, new_text: String },
    /// Insert a block after `after_id`, or at the start when `None`/unresolved.
    InsertBlock {
        #[serde(default)]
        after_id: Option<BlockId>,
        new_block: NewBlock,
    },
    /// Remove a block.
    DeleteBlock { block_id: BlockId },
    /// Remove a block and reinsert it after `after_id`.
    ///
    /// `new_parent`: `None` keeps the current parent, `Some(None)` makes the
    /// block top-level, `Some(Some(id))` re-parents it.
    MoveBlock {
        block_id: BlockId,
        #[serde(default)]
        after_id: Option<BlockId>,
        #[serde(
            default,
            deserialize_with = "deserialize_present",
            skip_serializing_if = "Option::is_none"
        )]
        new_parent: Option<Option<BlockId>>,
    },
}

/// Distinguishes an explicit `null` from an absent field.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Operation {
    pub fn update_text(block_id: impl Into<BlockId>, new_text: impl Into<String>) -> Self {
        Operation::UpdateText {
            block_id: block_id.into(),
            new_text: new_text.into(),
        }
    }

    pub fn insert_after(after_id: Option<&str>, new_block: NewBlock) -> Self {
        Operation::InsertBlock {
            after_id: after_id.map(str::to_string),
            new_block,
        }
    }

    pub fn delete(block_id: impl Into<BlockId>) -> Self {
        Operation::DeleteBlock {
            block_id: block_id.into(),
        }
    }

    pub fn move_after(
        block_id: impl Into<BlockId>,
        after_id: Option<&str>,
        new_parent: Option<Option<&str>>,
    ) -> Self {
        Operation::MoveBlock {
            block_id: block_id.into(),
            after_id: after_id.map(str::to_string),
            new_parent: new_parent.map(|p| p.map(str::to_string)),
        }
    }

    /// The existing block this operation targets, if any.
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Operation::UpdateText { block_id, .. }
            | Operation::DeleteBlock { block_id }
            | Operation::MoveBlock { block_id, .. } => Some(block_id.as_str()),
            Operation::InsertBlock { new_block, .. } => new_block.id.as_deref(),
        }
    }

    /// The anchor this operation places a block after, if any.
    pub fn after_id(&self) -> Option<&str> {
        match self {
            Operation::InsertBlock { after_id, .. } | Operation::MoveBlock { after_id, .. } => {
                after_id.as_deref()
            }
            _ => None,
        }
    }

    /// Short name used in logs and summaries.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::UpdateText { .. } => "UPDATE_TEXT",
            Operation::InsertBlock { .. } => "INSERT_BLOCK",
            Operation::DeleteBlock { .. } => "DELETE_BLOCK",
            Operation::MoveBlock { .. } => "MOVE_BLOCK",
        }
    }
}

/// Apply `ops` to a copy of `blocks`, generating missing ids with ULIDs.
pub fn apply_ops(blocks: &[Block], ops: &[Operation]) -> Vec<Block> {
    apply_ops_with(blocks, ops, &mut UlidIds)
}

/// Apply `ops` to a copy of `blocks` using `ids` for blocks inserted without an id.
pub fn apply_ops_with<I: IdSource + ?Sized>(
    blocks: &[Block],
    ops: &[Operation],
    ids: &mut I,
) -> Vec<Block> {
    let mut out = blocks.to_vec();

    for op in ops {
        match op {
            Operation::UpdateText { block_id, new_text } => {
                if let Some(i) = find_index(&out, block_id) {
                    out[i].text = new_text.clone();
                }
            }
            Operation::InsertBlock {
                after_id,
                new_block,
            } => {
                let id = match &new_block.id {
                    Some(id) => id.clone(),
                    None => ids.next_id(new_block.kind.id_prefix()),
                };
                // Ids stay unique: a colliding insert is dropped.
                if find_index(&out, &id).is_some() {
                    continue;
                }
                let at = insertion_point(&out, after_id.as_deref());
                out.insert(
                    at,
                    Block {
                        id,
                        kind: new_block.kind,
                        text: new_block.text.clone(),
                        parent: new_block.parent.clone(),
                    },
                );
            }
            Operation::DeleteBlock { block_id } => {
                if let Some(i) = find_index(&out, block_id) {
                    out.remove(i);
                }
            }
            Operation::MoveBlock {
                block_id,
                after_id,
                new_parent,
            } => {
                if let Some(i) = find_index(&out, block_id) {
                    let mut block = out.remove(i);
                    if let Some(parent) = new_parent {
                        block.parent = parent.clone();
                    }
                    let at = insertion_point(&out, after_id.as_deref());
                    out.insert(at, block);
                }
            }
        }
    }

    out
}

/// Index directly after `after_id`, or 0 when absent or unresolved.
fn insertion_point(blocks: &[Block], after_id: Option<&str>) -> usize {
    after_id
        .and_then(|id| find_index(blocks, id))
        .map_or(0, |i| i + 1)
}

/// Block ids and anchors referenced by an op list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedSets {
    pub blocks: BTreeSet<BlockId>,
    /// `after:<blockId>` strings.
    pub anchors: BTreeSet<String>,
}

impl TargetedSets {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.anchors.is_empty()
    }
}

/// Collect every block id and `after:` anchor an op list references.
pub fn targeted_sets(ops: &[Operation]) -> TargetedSets {
    let mut sets = TargetedSets::default();
    for op in ops {
        if let Some(id) = op.block_id() {
            sets.blocks.insert(id.to_string());
        }
        if let Some(after) = op.after_id() {
            sets.anchors.insert(format!("after:{after}"));
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;

    fn three_sections() -> Vec<Block> {
        vec![
            Block::heading("h_a", "Section A", None),
            Block::paragraph("p_a", "Body A", Some("h_a")),
            Block::heading("h_b", "Section B", None),
            Block::paragraph("p_b", "Body B", Some("h_b")),
            Block::heading("h_c", "Section C", None),
            Block::paragraph("p_c", "Body C", Some("h_c")),
        ]
    }

    fn ids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_update_text() {
        let blocks = three_sections();
        let out = apply_ops(&blocks, &[Operation::update_text("p_b", "New B")]);

        assert_eq!(out[3].text, "New B");
        assert_eq!(blocks[3].text, "Body B");
    }

    #[test]
    fn test_missing_references_are_noops() {
        let blocks = three_sections();
        let ops = vec![
            Operation::update_text("nope", "x"),
            Operation::delete("nope"),
            Operation::move_after("nope", Some("h_a"), None),
        ];
        assert_eq!(apply_ops(&blocks, &ops), blocks);
    }

    #[test]
    fn test_insert_with_unresolved_anchor_goes_first() {
        let blocks = three_sections();
        let op = Operation::insert_after(
            Some("ghost"),
            NewBlock {
                id: Some("h_z".into()),
                kind: BlockKind::Heading,
                text: "Z".into(),
                parent: None,
            },
        );
        let out = apply_ops(&blocks, &[op]);
        assert_eq!(out[0].id, "h_z");
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn test_insert_generates_id() {
        let op = Operation::insert_after(
            None,
            NewBlock {
                id: None,
                kind: BlockKind::Paragraph,
                text: "fresh".into(),
                parent: None,
            },
        );
        let out = apply_ops_with(&[], &[op], &mut SequentialIds::new());
        assert_eq!(out[0].id, "p_1");
    }

    #[test]
    fn test_ops_see_prior_mutations() {
        let blocks = three_sections();
        let ops = vec![
            Operation::insert_after(
                Some("p_a"),
                NewBlock {
                    id: Some("h_new".into()),
                    kind: BlockKind::Heading,
                    text: "New".into(),
                    parent: None,
                },
            ),
            Operation::insert_after(
                Some("h_new"),
                NewBlock {
                    id: Some("p_new".into()),
                    kind: BlockKind::Paragraph,
                    text: "New body".into(),
                    parent: Some("h_new".into()),
                },
            ),
        ];
        let out = apply_ops(&blocks, &ops);
        assert_eq!(
            ids(&out),
            vec!["h_a", "p_a", "h_new", "p_new", "h_b", "p_b", "h_c", "p_c"]
        );
    }

    #[test]
    fn test_reorder_top_level_section() {
        let ops = vec![
            Operation::move_after("h_c", Some("p_a"), Some(None)),
            Operation::move_after("p_c", Some("h_c"), Some(Some("h_c"))),
        ];
        let out = apply_ops(&three_sections(), &ops);

        assert_eq!(ids(&out), vec!["h_a", "p_a", "h_c", "p_c", "h_b", "p_b"]);
        assert_eq!(out[2].parent, None);
        assert_eq!(out[3].parent.as_deref(), Some("h_c"));
    }

    #[test]
    fn test_move_reparent_and_preserve() {
        let blocks = three_sections();
        let reparent = Operation::move_after("h_b", Some("p_a"), Some(Some("h_a")));
        let out = apply_ops(&blocks, &[reparent]);
        assert_eq!(out[2].parent.as_deref(), Some("h_a"));

        let keep = Operation::move_after("p_b", None, None);
        let out = apply_ops(&blocks, &[keep]);
        assert_eq!(out[0].id, "p_b");
        assert_eq!(out[0].parent.as_deref(), Some("h_b"));
    }

    #[test]
    fn test_colliding_insert_is_dropped() {
        let blocks = three_sections();
        let op = Operation::insert_after(
            None,
            NewBlock {
                id: Some("h_a".into()),
                kind: BlockKind::Heading,
                text: "dup".into(),
                parent: None,
            },
        );
        assert_eq!(apply_ops(&blocks, &[op]), blocks);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"[
            {"type":"UPDATE_TEXT","block_id":"p_a","new_text":"x"},
            {"type":"INSERT_BLOCK","after_id":null,"new_block":{"type":"h2","text":"T"}},
            {"type":"DELETE_BLOCK","block_id":"p_b"},
            {"type":"MOVE_BLOCK","block_id":"h_c","after_id":"h_a"},
            {"type":"MOVE_BLOCK","block_id":"h_b","after_id":"h_a","new_parent":null}
        ]"#;
        let ops: Vec<Operation> = serde_json::from_str(json).unwrap();

        assert_eq!(ops[0], Operation::update_text("p_a", "x"));
        assert!(matches!(
            &ops[3],
            Operation::MoveBlock { new_parent: None, .. }
        ));
        assert!(matches!(
            &ops[4],
            Operation::MoveBlock {
                new_parent: Some(None),
                ..
            }
        ));

        let back = serde_json::to_value(&ops[4]).unwrap();
        assert_eq!(back["type"], "MOVE_BLOCK");
        assert!(back["new_parent"].is_null());
    }

    #[test]
    fn test_targeted_sets() {
        let ops = vec![
            Operation::update_text("p_a", "x"),
            Operation::move_after("h_c", Some("p_a"), None),
            Operation::insert_after(
                Some("h_c"),
                NewBlock {
                    id: Some("p_new".into()),
                    kind: BlockKind::Paragraph,
                    text: String::new(),
                    parent: Some("h_c".into()),
                },
            ),
        ];
        let sets = targeted_sets(&ops);

        assert_eq!(
            sets.blocks.into_iter().collect::<Vec<_>>(),
            vec!["h_c", "p_a", "p_new"]
        );
        assert_eq!(
            sets.anchors.into_iter().collect::<Vec<_>>(),
            vec!["after:h_c", "after:p_a"]
        );
    }
}
