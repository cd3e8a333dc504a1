//! Lookup structures over a section forest and the projection from blocks.
//!
//! Everything here is recomputed from its input; nothing is cached between calls.

use crate::section::{section_id_for_heading, Section, SectionId};
use gmh_core::{Block, BlockId};
use std::collections::{HashMap, HashSet};

/// Position and lineage of one section in a forest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMeta {
    pub path: Vec<usize>,
    pub numbering: String,
    pub depth: usize,
    pub heading: String,
    pub heading_block_id: BlockId,
    pub parent_section_id: Option<SectionId>,
    /// Heading block of the enclosing section.
    pub parent_heading_id: Option<BlockId>,
    /// Last block of this section's subtree in document order.
    pub last_block_id: BlockId,
    /// Block directly before the section's heading in document order.
    pub preceding_block_id: Option<BlockId>,
}

/// Section lookups keyed by section id and by block id.
#[derive(Clone, Debug, Default)]
pub struct SectionIndex {
    sections: HashMap<SectionId, SectionMeta>,
    block_to_section: HashMap<BlockId, SectionId>,
    top_level: Vec<SectionId>,
}

impl SectionIndex {
    pub fn build(forest: &[Section]) -> Self {
        let mut index = SectionIndex {
            top_level: forest.iter().map(|s| s.id.clone()).collect(),
            ..Default::default()
        };
        index.visit(forest, &[], None, None);

        let order: Vec<BlockId> = forest.iter().flat_map(Section::block_ids).collect();
        for window in order.windows(2) {
            if let Some(section_id) = index.block_to_section.get(&window[1]) {
                if let Some(meta) = index.sections.get_mut(section_id) {
                    if meta.heading_block_id == window[1] {
                        meta.preceding_block_id = Some(window[0].clone());
                    }
                }
            }
        }
        index
    }

    fn visit(
        &mut self,
        nodes: &[Section],
        path_prefix: &[usize],
        parent_section_id: Option<&str>,
        parent_heading_id: Option<&str>,
    ) {
        for (idx, node) in nodes.iter().enumerate() {
            let mut path = path_prefix.to_vec();
            path.push(idx);

            self.block_to_section
                .insert(node.heading_block_id.clone(), node.id.clone());
            if let Some(body_id) = &node.body_block_id {
                self.block_to_section.insert(body_id.clone(), node.id.clone());
            }

            let last_block_id = node
                .block_ids()
                .pop()
                .unwrap_or_else(|| node.heading_block_id.clone());
            self.sections.insert(
                node.id.clone(),
                SectionMeta {
                    path: path.clone(),
                    numbering: node.numbering.clone(),
                    depth: node.depth,
                    heading: node.heading.clone(),
                    heading_block_id: node.heading_block_id.clone(),
                    parent_section_id: parent_section_id.map(str::to_string),
                    parent_heading_id: parent_heading_id.map(str::to_string),
                    last_block_id,
                    preceding_block_id: None,
                },
            );

            self.visit(
                &node.children,
                &path,
                Some(node.id.as_str()),
                Some(node.heading_block_id.as_str()),
            );
        }
    }

    pub fn get(&self, section_id: &str) -> Option<&SectionMeta> {
        self.sections.get(section_id)
    }

    pub fn contains(&self, section_id: &str) -> bool {
        self.sections.contains_key(section_id)
    }

    pub fn path(&self, section_id: &str) -> Option<&[usize]> {
        self.sections.get(section_id).map(|m| m.path.as_slice())
    }

    pub fn section_for_block(&self, block_id: &str) -> Option<&str> {
        self.block_to_section.get(block_id).map(String::as_str)
    }

    /// Top-level section ids in document order.
    pub fn top_level_order(&self) -> &[SectionId] {
        &self.top_level
    }

    /// The top-level ancestor of a section (itself when already top-level).
    pub fn top_level_ancestor<'a>(&'a self, section_id: &'a str) -> Option<&'a str> {
        let mut current = section_id;
        let mut seen = HashSet::new();
        loop {
            let meta = self.sections.get(current)?;
            match meta.parent_section_id.as_deref() {
                Some(parent) if seen.insert(current) => current = parent,
                Some(_) => return None,
                None => return Some(current),
            }
        }
    }

    /// Human-readable label such as `"2.1 Scope"`.
    pub fn label(&self, section_id: &str) -> String {
        match self.sections.get(section_id) {
            Some(meta) => {
                let heading = meta.heading.trim();
                let heading = if heading.is_empty() { "(untitled section)" } else { heading };
                format!("{} {}", meta.numbering, heading).trim().to_string()
            }
            None => "Section".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Look up a section by path.
pub fn section_at<'a>(forest: &'a [Section], path: &[usize]) -> Option<&'a Section> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(forest.get(*first)?, |node, &idx| node.children.get(idx))
}

/// Rebuild the section tree of an entry from its flat block list.
///
/// Each heading becomes a section whose id is the heading id without its
/// `h_` prefix; the section body is the first paragraph parented by the
/// heading. Subsections are the headings parented by it, in block order.
pub fn sections_from_blocks(blocks: &[Block]) -> Vec<Section> {
    let mut headings: HashMap<Option<&str>, Vec<&Block>> = HashMap::new();
    let mut bodies: HashMap<&str, &Block> = HashMap::new();
    for block in blocks {
        if block.is_heading() {
            headings.entry(block.parent.as_deref()).or_default().push(block);
        } else if let Some(parent) = block.parent.as_deref() {
            bodies.entry(parent).or_insert(block);
        }
    }

    let mut visited = HashSet::new();
    build_level(None, "", 1, None, &headings, &bodies, &mut visited)
}

fn build_level<'a>(
    parent: Option<&'a str>,
    prefix: &str,
    depth: usize,
    parent_section_id: Option<&str>,
    headings: &HashMap<Option<&'a str>, Vec<&'a Block>>,
    bodies: &HashMap<&str, &Block>,
    visited: &mut HashSet<&'a str>,
) -> Vec<Section> {
    let Some(level) = headings.get(&parent) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for &heading in level {
        if !visited.insert(heading.id.as_str()) {
            continue;
        }
        let numbering = if prefix.is_empty() {
            (out.len() + 1).to_string()
        } else {
            format!("{prefix}.{}", out.len() + 1)
        };
        let id = section_id_for_heading(&heading.id);
        let body = bodies.get(heading.id.as_str());
        let children = build_level(
            Some(heading.id.as_str()),
            &numbering,
            depth + 1,
            Some(id.as_str()),
            headings,
            bodies,
            visited,
        );
        out.push(Section {
            heading: heading.text.clone(),
            heading_block_id: heading.id.clone(),
            body: body.map(|b| b.text.clone()).unwrap_or_default(),
            body_block_id: body.map(|b| b.id.clone()),
            children,
            parent_section_id: parent_section_id.map(str::to_string),
            numbering,
            depth,
            is_new: false,
            id,
        });
    }
    out
}
