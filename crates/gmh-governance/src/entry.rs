//! The canonical document and its merge history.

use crate::change::ChangeId;
use chrono::{DateTime, Utc};
use gmh_compose::{sections_from_blocks, Section};
use gmh_core::Block;
use serde::{Deserialize, Serialize};

/// Outline snapshots around one merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Entry version produced by the merge.
    pub version: u64,
    pub change_id: ChangeId,
    pub outline_before: String,
    pub outline_after: String,
    pub merged_at: DateTime<Utc>,
}

/// The single canonical document of a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub version: u64,
    pub blocks: Vec<Block>,
    pub sections_tree: Vec<Section>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl Entry {
    /// A first-version entry; the section tree is derived from `blocks`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            version: 1,
            sections_tree: sections_from_blocks(&blocks),
            blocks,
            history: Vec::new(),
        }
    }

    /// Replace the blocks and regenerate the section tree.
    pub(crate) fn replace_blocks(&mut self, blocks: Vec<Block>) {
        self.sections_tree = sections_from_blocks(&blocks);
        self.blocks = blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_derives_sections() {
        let entry = Entry::new(
            "e1",
            "Charter",
            vec![
                Block::heading("h_seed", "Seed", None),
                Block::paragraph("p_seed", "Body", Some("h_seed")),
            ],
        );
        assert_eq!(entry.version, 1);
        assert_eq!(entry.sections_tree.len(), 1);
        assert_eq!(entry.sections_tree[0].body, "Body");
    }

    #[test]
    fn test_entry_wire_format_without_history() {
        let json = r#"{
            "id": "e1", "title": "T", "version": 3,
            "blocks": [{"id": "h_a", "type": "h2", "text": "A", "parent": null}],
            "sections_tree": []
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.version, 3);
        assert!(entry.history.is_empty());
    }
}
