//! Block model - the flat, ordered serialization of an entry.
//!
//! Order is positional in the list. `parent` records the nearest enclosing
//! heading and is never used to derive ordering.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable identifier of a block (e.g. `h_intro`, `p_intro`).
pub type BlockId = String;

/// The kind of content a block carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "h2")]
    Heading,
    #[serde(rename = "p")]
    Paragraph,
}

impl BlockKind {
    pub fn is_heading(self) -> bool {
        matches!(self, BlockKind::Heading)
    }

    /// Prefix used for generated ids of this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            BlockKind::Heading => "h",
            BlockKind::Paragraph => "p",
        }
    }

    /// Outline glyph for this kind.
    pub fn outline_glyph(self) -> &'static str {
        match self {
            BlockKind::Heading => "##",
            BlockKind::Paragraph => "‣",
        }
    }
}

/// A single content block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub text: String,
    #[serde(default)]
    pub parent: Option<BlockId>,
}

impl Block {
    pub fn new(
        id: impl Into<BlockId>,
        kind: BlockKind,
        text: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            parent: parent.map(str::to_string),
        }
    }

    /// Create a heading block.
    pub fn heading(id: impl Into<BlockId>, text: impl Into<String>, parent: Option<&str>) -> Self {
        Self::new(id, BlockKind::Heading, text, parent)
    }

    /// Create a paragraph block.
    pub fn paragraph(
        id: impl Into<BlockId>,
        text: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        Self::new(id, BlockKind::Paragraph, text, parent)
    }

    pub fn is_heading(&self) -> bool {
        self.kind.is_heading()
    }
}

/// Position of the block with `id`, if present.
pub fn find_index(blocks: &[Block], id: &str) -> Option<usize> {
    blocks.iter().position(|b| b.id == id)
}

/// Ids of blocks whose `parent` does not name a heading in the same list.
///
/// Empty for a well-formed list.
pub fn dangling_parents(blocks: &[Block]) -> Vec<BlockId> {
    let headings: HashSet<&str> = blocks
        .iter()
        .filter(|b| b.is_heading())
        .map(|b| b.id.as_str())
        .collect();

    blocks
        .iter()
        .filter(|b| {
            b.parent
                .as_deref()
                .is_some_and(|parent| !headings.contains(parent))
        })
        .map(|b| b.id.clone())
        .collect()
}

/// Parse a block list from its JSON wire form.
pub fn blocks_from_json(json: &str) -> Result<Vec<Block>> {
    Ok(serde_json::from_str(json)?)
}
