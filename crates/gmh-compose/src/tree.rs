//! Structural edits over a working forest of sections.
//!
//! Nodes are addressed by path: the sequence of child indices from the
//! forest's roots. Every successful edit renumbers the whole forest.

use crate::error::{DraftError, Result};
use crate::section::{Section, SectionId};
use gmh_core::IdSource;
use serde::{Deserialize, Serialize};

/// Where numbering of a working forest starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingSeed {
    /// Numbering of the first root, e.g. `"2.1"`. Empty means `"1"`.
    pub base: String,
    /// Depth of the roots.
    pub depth: usize,
    /// Section the roots hang under, if any.
    pub parent_section_id: Option<SectionId>,
}

impl Default for NumberingSeed {
    fn default() -> Self {
        Self {
            base: "1".to_string(),
            depth: 1,
            parent_section_id: None,
        }
    }
}

impl NumberingSeed {
    /// Numbering of the root at `index`: the last component of `base` is advanced.
    fn root_numbering(&self, index: usize) -> String {
        let base = if self.base.is_empty() { "1" } else { self.base.as_str() };
        match base.rsplit_once('.') {
            Some((prefix, last)) => {
                let start = last.parse::<usize>().unwrap_or(1);
                format!("{prefix}.{}", start + index)
            }
            None => {
                let start = base.parse::<usize>().unwrap_or(1);
                (start + index).to_string()
            }
        }
    }
}

/// Recompute numbering, depth and parent links top-down.
pub fn renumber(forest: &mut [Section], seed: &NumberingSeed) {
    for (idx, root) in forest.iter_mut().enumerate() {
        root.parent_section_id = seed.parent_section_id.clone();
        assign(root, seed.root_numbering(idx), seed.depth.max(1));
    }
}

fn assign(node: &mut Section, numbering: String, depth: usize) {
    for (idx, child) in node.children.iter_mut().enumerate() {
        child.parent_section_id = Some(node.id.clone());
        assign(child, format!("{}.{}", numbering, idx + 1), depth + 1);
    }
    node.numbering = numbering;
    node.depth = depth;
}

/// The forest being edited in a draft together with its numbering seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTree {
    roots: Vec<Section>,
    seed: NumberingSeed,
}

impl WorkingTree {
    pub fn new(roots: Vec<Section>, seed: NumberingSeed) -> Self {
        let mut tree = Self { roots, seed };
        tree.renumber();
        tree
    }

    pub fn roots(&self) -> &[Section] {
        &self.roots
    }

    pub fn seed(&self) -> &NumberingSeed {
        &self.seed
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn set_seed(&mut self, seed: NumberingSeed) {
        self.seed = seed;
        self.renumber();
    }

    pub fn renumber(&mut self) {
        renumber(&mut self.roots, &self.seed);
    }

    pub fn get(&self, path: &[usize]) -> Option<&Section> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for &idx in rest {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Section> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get_mut(*first)?;
        for &idx in rest {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }

    /// Sibling list containing the node at `path`, and the node's index in it.
    fn siblings_mut(&mut self, path: &[usize]) -> Result<(&mut Vec<Section>, usize)> {
        let invalid = || DraftError::InvalidPath(path.to_vec());
        let (&index, parent_path) = path.split_last().ok_or_else(invalid)?;
        let list = if parent_path.is_empty() {
            &mut self.roots
        } else {
            &mut self.get_mut(parent_path).ok_or_else(invalid)?.children
        };
        if index >= list.len() {
            return Err(invalid());
        }
        Ok((list, index))
    }

    /// Replace the heading text of the node at `path`.
    pub fn set_heading(&mut self, path: &[usize], heading: impl Into<String>) -> Result<()> {
        let node = self
            .get_mut(path)
            .ok_or_else(|| DraftError::InvalidPath(path.to_vec()))?;
        node.heading = heading.into();
        Ok(())
    }

    /// Replace the body text of the node at `path`.
    pub fn set_body(&mut self, path: &[usize], body: impl Into<String>) -> Result<()> {
        let node = self
            .get_mut(path)
            .ok_or_else(|| DraftError::InvalidPath(path.to_vec()))?;
        node.body = body.into();
        Ok(())
    }

    /// Append a fresh section as the last child of the node at `path`.
    pub fn add_child<I: IdSource + ?Sized>(&mut self, path: &[usize], ids: &mut I) -> Result<bool> {
        let node = self
            .get_mut(path)
            .ok_or_else(|| DraftError::InvalidPath(path.to_vec()))?;
        node.children.push(Section::fresh(ids));
        self.renumber();
        Ok(true)
    }

    /// Insert a fresh section directly after the node at `path`.
    pub fn add_sibling<I: IdSource + ?Sized>(&mut self, path: &[usize], ids: &mut I) -> Result<bool> {
        let (list, index) = self.siblings_mut(path)?;
        list.insert(index + 1, Section::fresh(ids));
        self.renumber();
        Ok(true)
    }

    /// Remove the node at `path` with its descendants.
    ///
    /// Deleting the sole root empties the forest, which proposes deleting
    /// the edited section entirely.
    pub fn delete(&mut self, path: &[usize]) -> Result<bool> {
        let (list, index) = self.siblings_mut(path)?;
        list.remove(index);
        self.renumber();
        Ok(true)
    }

    /// Swap the node at `path` with its neighbour `delta` places away.
    pub fn move_by(&mut self, path: &[usize], delta: isize) -> Result<bool> {
        let (list, index) = self.siblings_mut(path)?;
        let Some(target) = index.checked_add_signed(delta).filter(|&t| t < list.len()) else {
            return Ok(false);
        };
        list.swap(index, target);
        self.renumber();
        Ok(true)
    }

    /// Make the node at `path` the last child of its preceding sibling.
    pub fn indent(&mut self, path: &[usize]) -> Result<bool> {
        let (list, index) = self.siblings_mut(path)?;
        if index == 0 {
            return Ok(false);
        }
        let node = list.remove(index);
        list[index - 1].children.push(node);
        self.renumber();
        Ok(true)
    }

    /// Promote the node at `path` to a sibling of its parent, right after it.
    ///
    /// Requires a grandparent: paths shorter than three are left alone.
    pub fn outdent(&mut self, path: &[usize]) -> Result<bool> {
        if self.get(path).is_none() {
            return Err(DraftError::InvalidPath(path.to_vec()));
        }
        if path.len() <= 2 {
            return Ok(false);
        }
        let parent_path = &path[..path.len() - 1];
        let node = {
            let parent = self
                .get_mut(parent_path)
                .ok_or_else(|| DraftError::InvalidPath(path.to_vec()))?;
            parent.children.remove(path[path.len() - 1])
        };
        let (grand_list, parent_index) = self.siblings_mut(parent_path)?;
        grand_list.insert(parent_index + 1, node);
        self.renumber();
        Ok(true)
    }

    pub fn into_roots(self) -> Vec<Section> {
        self.roots
    }
}
