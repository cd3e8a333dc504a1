//! Outline rendering and before/after outline diffs.
//!
//! An outline is one line per block. Diff outlines prefix each line with a
//! single-character marker:
//!
//! ```text
//! -  removed (before side only)
//! +  added   (after side only)
//! ~  text updated
//! ↔  moved relative to the other blocks
//!    (blank) unchanged
//! ```

use crate::block::{Block, BlockId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Classification of a block in a diff rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffMarker {
    Unchanged,
    Removed,
    Added,
    Updated,
    Moved,
}

impl DiffMarker {
    pub fn symbol(self) -> &'static str {
        match self {
            DiffMarker::Unchanged => " ",
            DiffMarker::Removed => "-",
            DiffMarker::Added => "+",
            DiffMarker::Updated => "~",
            DiffMarker::Moved => "↔",
        }
    }

    fn css_class(self) -> Option<&'static str> {
        match self {
            DiffMarker::Unchanged => None,
            DiffMarker::Removed => Some("del"),
            DiffMarker::Added => Some("add"),
            DiffMarker::Updated => Some("upd"),
            DiffMarker::Moved => Some("mov"),
        }
    }

    const DECORATED: [DiffMarker; 4] = [
        DiffMarker::Removed,
        DiffMarker::Added,
        DiffMarker::Updated,
        DiffMarker::Moved,
    ];
}

/// Marker-prefixed outlines of both sides of a change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineDiff {
    pub before: String,
    pub after: String,
}

fn line(block: &Block) -> String {
    format!("{} {}", block.kind.outline_glyph(), block.text)
}

/// Plain outline: `## heading` / `‣ paragraph`, one line per block.
pub fn outline(blocks: &[Block]) -> String {
    blocks.iter().map(line).collect::<Vec<_>>().join("\n")
}

/// Dotted numbering and depth of a heading block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadingNumber {
    pub numbering: String,
    pub depth: usize,
}

/// Number every heading reachable from the top level through `parent` links.
///
/// Headings are numbered in block order among siblings sharing a parent.
pub fn heading_numbers(blocks: &[Block]) -> HashMap<BlockId, HeadingNumber> {
    let mut children: HashMap<Option<&str>, Vec<&Block>> = HashMap::new();
    for block in blocks.iter().filter(|b| b.is_heading()) {
        children
            .entry(block.parent.as_deref())
            .or_default()
            .push(block);
    }

    let mut numbers = HashMap::new();
    let mut stack: Vec<(Option<&str>, String, usize)> = vec![(None, String::new(), 1)];
    while let Some((parent, prefix, depth)) = stack.pop() {
        let Some(headings) = children.get(&parent) else {
            continue;
        };
        for (idx, heading) in headings.iter().enumerate() {
            if numbers.contains_key(&heading.id) {
                continue;
            }
            let numbering = if prefix.is_empty() {
                (idx + 1).to_string()
            } else {
                format!("{}.{}", prefix, idx + 1)
            };
            numbers.insert(
                heading.id.clone(),
                HeadingNumber {
                    numbering: numbering.clone(),
                    depth,
                },
            );
            stack.push((Some(heading.id.as_str()), numbering, depth + 1));
        }
    }
    numbers
}

/// Indented outline with section numbers, used for merge history snapshots.
pub fn numbered_outline(blocks: &[Block]) -> String {
    let numbers = heading_numbers(blocks);
    blocks
        .iter()
        .map(|block| {
            if block.is_heading() {
                match numbers.get(&block.id) {
                    Some(n) => format!("{}{} {}", "  ".repeat(n.depth - 1), n.numbering, block.text),
                    None => block.text.clone(),
                }
            } else {
                let depth = block
                    .parent
                    .as_ref()
                    .and_then(|p| numbers.get(p))
                    .map_or(0, |n| n.depth);
                format!("{}‣ {}", "  ".repeat(depth), block.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Diff two block lists into marker-prefixed before/after outlines.
pub fn diff(before: &[Block], after: &[Block]) -> OutlineDiff {
    let before_idx: HashMap<&str, usize> = before
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), i))
        .collect();
    let after_idx: HashMap<&str, usize> = after
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), i))
        .collect();

    let updated: HashSet<&str> = before
        .iter()
        .filter(|b| {
            after_idx
                .get(b.id.as_str())
                .is_some_and(|&i| after[i].text != b.text)
        })
        .map(|b| b.id.as_str())
        .collect();
    let moved = moved_ids(before, after, &before_idx, &after_idx);

    let render = |blocks: &[Block], missing: DiffMarker, other: &HashMap<&str, usize>| {
        blocks
            .iter()
            .map(|b| {
                let marker = if !other.contains_key(b.id.as_str()) {
                    missing
                } else if updated.contains(b.id.as_str()) {
                    DiffMarker::Updated
                } else if moved.contains(b.id.as_str()) {
                    DiffMarker::Moved
                } else {
                    DiffMarker::Unchanged
                };
                format!("{} {}", marker.symbol(), line(b))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    OutlineDiff {
        before: render(before, DiffMarker::Removed, &after_idx),
        after: render(after, DiffMarker::Added, &before_idx),
    }
}

/// Blocks present on both sides whose position among the common blocks changed.
///
/// Added and removed blocks are left out of the comparison, so an unrelated
/// insert or delete never marks its neighbours as moved.
fn moved_ids<'a>(
    before: &[Block],
    after: &'a [Block],
    before_idx: &HashMap<&str, usize>,
    after_idx: &HashMap<&str, usize>,
) -> HashSet<&'a str> {
    let common_before: HashMap<&str, usize> = before
        .iter()
        .filter(|b| after_idx.contains_key(b.id.as_str()))
        .enumerate()
        .map(|(k, b)| (b.id.as_str(), k))
        .collect();

    after
        .iter()
        .filter(|b| before_idx.contains_key(b.id.as_str()))
        .enumerate()
        .filter(|(k, b)| common_before.get(b.id.as_str()) != Some(k))
        .map(|(_, b)| b.id.as_str())
        .collect()
}

/// Wrap each marker prefix in a presentation span.
///
/// Unmarked lines and lines that are already decorated pass through.
pub fn decorate_outline(text: &str) -> String {
    text.split('\n')
        .map(|raw| {
            for marker in DiffMarker::DECORATED {
                let prefix = format!("{} ", marker.symbol());
                if let Some(rest) = raw.strip_prefix(&prefix) {
                    let class = marker.css_class().unwrap_or_default();
                    return format!("<span class=\"{class}\">{prefix}</span>{rest}");
                }
            }
            raw.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which half of an [`OutlineDiff`] a text belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffSide {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Del,
    Add,
    Move,
    Neutral,
}

/// A changed line extracted for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

/// Keep only the changed lines relevant to `side`, stripped of their marker.
///
/// Updated lines come back as [`DiffLineKind::Neutral`].
pub fn extract_diff_lines(text: &str, side: DiffSide) -> Vec<DiffLine> {
    let allowed: &[char] = match side {
        DiffSide::Before => &['-', '~', '↔'],
        DiffSide::After => &['+', '~', '↔'],
    };

    text.lines()
        .filter_map(|raw| {
            let trimmed = raw.trim_start();
            let marker = trimmed.chars().next()?;
            if !allowed.contains(&marker) {
                return None;
            }
            let kind = match marker {
                '-' => DiffLineKind::Del,
                '+' => DiffLineKind::Add,
                '↔' => DiffLineKind::Move,
                _ => DiffLineKind::Neutral,
            };
            let content = trimmed[marker.len_utf8()..].trim_start();
            Some(DiffLine {
                kind,
                text: if content.is_empty() {
                    "(empty)".to_string()
                } else {
                    content.to_string()
                },
            })
        })
        .collect()
}
