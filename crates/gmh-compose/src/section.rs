//! The nested section model edited in drafts.

use gmh_core::{BlockId, IdSource};
use serde::{Deserialize, Serialize};

pub type SectionId = String;

/// Prefix of section ids minted in drafts.
pub const NEW_SECTION_PREFIX: &str = "ns";

fn default_depth() -> usize {
    1
}

/// A heading with an optional body and nested subsections.
///
/// `numbering`, `depth` and `parent_section_id` are derived from the
/// section's position and are rewritten by every renumbering pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(default)]
    pub heading: String,
    pub heading_block_id: BlockId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub body_block_id: Option<BlockId>,
    #[serde(default)]
    pub children: Vec<Section>,
    #[serde(default)]
    pub parent_section_id: Option<SectionId>,
    #[serde(default)]
    pub numbering: String,
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default, rename = "isNew")]
    pub is_new: bool,
}

impl Section {
    /// A section backed by existing blocks.
    pub fn new(id: impl Into<SectionId>, heading: impl Into<String>, body: impl Into<String>) -> Self {
        let id = id.into();
        let body = body.into();
        Self {
            heading_block_id: heading_block_id(&id),
            body_block_id: (!body.trim().is_empty()).then(|| body_block_id(&id)),
            id,
            heading: heading.into(),
            body,
            children: Vec::new(),
            parent_section_id: None,
            numbering: String::new(),
            depth: 1,
            is_new: false,
        }
    }

    /// A fresh, empty section added while composing.
    pub fn fresh<I: IdSource + ?Sized>(ids: &mut I) -> Self {
        let id = ids.next_id(NEW_SECTION_PREFIX);
        Self {
            heading_block_id: heading_block_id(&id),
            id,
            heading: String::new(),
            body: String::new(),
            body_block_id: None,
            children: Vec::new(),
            parent_section_id: None,
            numbering: String::new(),
            depth: 1,
            is_new: true,
        }
    }

    /// Template for a proposed top-level section; reserves both block ids.
    pub fn top_level_template<I: IdSource + ?Sized>(ids: &mut I, numbering: String) -> Self {
        let mut section = Self::fresh(ids);
        section.body_block_id = Some(body_block_id(&section.id));
        section.numbering = numbering;
        section
    }

    pub fn with_children(mut self, children: Vec<Section>) -> Self {
        self.children = children;
        self
    }

    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Whether the section carries any content worth proposing.
    pub fn has_content(&self) -> bool {
        !self.heading.trim().is_empty() || self.has_body() || !self.children.is_empty()
    }

    /// Block id of the body, derived from the section id when not yet assigned.
    pub fn body_block_id_or_derived(&self) -> BlockId {
        self.body_block_id
            .clone()
            .unwrap_or_else(|| body_block_id(&self.id))
    }

    /// Heading plus body block ids of this section and all its descendants, pre-order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        self.collect_block_ids(&mut out);
        out
    }

    fn collect_block_ids(&self, out: &mut Vec<BlockId>) {
        out.push(self.heading_block_id.clone());
        if self.has_body() {
            out.push(self.body_block_id_or_derived());
        }
        for child in &self.children {
            child.collect_block_ids(out);
        }
    }

    /// Pre-order walk over this section and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Section)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

pub fn heading_block_id(section_id: &str) -> BlockId {
    format!("h_{section_id}")
}

pub fn body_block_id(section_id: &str) -> BlockId {
    format!("p_{section_id}")
}

/// Section id for a heading block id (`h_<id>` → `<id>`).
pub fn section_id_for_heading(heading_block_id: &str) -> SectionId {
    heading_block_id
        .strip_prefix("h_")
        .unwrap_or(heading_block_id)
        .to_string()
}

/// Find a section anywhere in a forest.
pub fn find_section<'a>(forest: &'a [Section], id: &str) -> Option<&'a Section> {
    forest.iter().find_map(|s| {
        if s.id == id {
            Some(s)
        } else {
            find_section(&s.children, id)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmh_core::SequentialIds;

    #[test]
    fn test_block_ids() {
        let section = Section::new("a", "A", "Body").with_children(vec![
            Section::new("a1", "A1", ""),
            Section::new("a2", "A2", "Two"),
        ]);

        assert_eq!(section.block_ids(), vec!["h_a", "p_a", "h_a1", "h_a2", "p_a2"]);
        assert_eq!(section.body_block_id.as_deref(), Some("p_a"));
        assert!(section.children[0].body_block_id.is_none());
    }

    #[test]
    fn test_fresh_and_template() {
        let mut ids = SequentialIds::new();
        let fresh = Section::fresh(&mut ids);
        assert_eq!(fresh.id, "ns_1");
        assert_eq!(fresh.heading_block_id, "h_ns_1");
        assert!(fresh.is_new);
        assert!(!fresh.has_content());

        let template = Section::top_level_template(&mut ids, "3".to_string());
        assert_eq!(template.body_block_id.as_deref(), Some("p_ns_2"));
        assert_eq!(template.numbering, "3");
    }

    #[test]
    fn test_section_wire_format() {
        let json = r#"{"id":"a","heading":"A","heading_block_id":"h_a","isNew":true}"#;
        let section: Section = serde_json::from_str(json).unwrap();
        assert!(section.is_new);
        assert_eq!(section.depth, 1);
        assert!(section.children.is_empty());
    }

    #[test]
    fn test_find_section() {
        let forest = vec![Section::new("a", "A", "").with_children(vec![Section::new("a1", "A1", "")])];
        assert_eq!(find_section(&forest, "a1").map(|s| s.heading.as_str()), Some("A1"));
        assert!(find_section(&forest, "zz").is_none());
        assert_eq!(section_id_for_heading("h_a1"), "a1");
        assert_eq!(section_id_for_heading("x"), "x");
    }
}
