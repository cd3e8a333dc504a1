//! Property-based tests for section-tree edits and the compiler.
//!
//!  - Numbering stays contiguous after any sequence of structural edits
//!  - Applying compiled ops to the projected blocks reproduces the edited tree

use gmh_compose::{compile, sections_from_blocks, CompileContext, NumberingSeed, Section, WorkingTree};
use gmh_core::{apply_ops, outline, Block, SequentialIds};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Edit {
    AddChild(Vec<usize>),
    AddSibling(Vec<usize>),
    Delete(Vec<usize>),
    Move(Vec<usize>, bool),
    Indent(Vec<usize>),
    Outdent(Vec<usize>),
    Retitle(Vec<usize>, String),
    Rebody(Vec<usize>, String),
}

fn path_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..3, 1..4)
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        path_strategy().prop_map(Edit::AddChild),
        path_strategy().prop_map(Edit::AddSibling),
        path_strategy().prop_map(Edit::Delete),
        (path_strategy(), any::<bool>()).prop_map(|(p, up)| Edit::Move(p, up)),
        path_strategy().prop_map(Edit::Indent),
        path_strategy().prop_map(Edit::Outdent),
        (path_strategy(), "[a-z]{1,6}").prop_map(|(p, t)| Edit::Retitle(p, t)),
        (path_strategy(), "[a-z ]{0,6}").prop_map(|(p, t)| Edit::Rebody(p, t)),
    ]
}

fn seed_tree() -> Vec<Section> {
    vec![Section::new("root", "Root", "Root body").with_children(vec![
        Section::new("a", "A", "Alpha").with_children(vec![Section::new("a1", "A1", "")]),
        Section::new("b", "B", ""),
    ])]
}

fn seed_blocks() -> Vec<Block> {
    vec![
        Block::heading("h_root", "Root", None),
        Block::paragraph("p_root", "Root body", Some("h_root")),
        Block::heading("h_a", "A", Some("h_root")),
        Block::paragraph("p_a", "Alpha", Some("h_a")),
        Block::heading("h_a1", "A1", Some("h_a")),
        Block::heading("h_b", "B", Some("h_root")),
    ]
}

fn apply(tree: &mut WorkingTree, edit: &Edit, ids: &mut SequentialIds) {
    // Invalid paths are expected from the generator and leave the tree as is.
    let _ = match edit {
        Edit::AddChild(p) => tree.add_child(p, ids),
        Edit::AddSibling(p) => tree.add_sibling(p, ids),
        Edit::Delete(p) => tree.delete(p),
        Edit::Move(p, up) => tree.move_by(p, if *up { -1 } else { 1 }),
        Edit::Indent(p) => tree.indent(p),
        Edit::Outdent(p) => tree.outdent(p),
        Edit::Retitle(p, t) => tree.set_heading(p, t.clone()).map(|_| true),
        Edit::Rebody(p, t) => tree.set_body(p, t.clone()).map(|_| true),
    };
}

fn check_numbering(nodes: &[Section], expected_prefix: Option<&str>, depth: usize, start: usize) {
    for (idx, node) in nodes.iter().enumerate() {
        let expected = match expected_prefix {
            Some(prefix) => format!("{}.{}", prefix, idx + 1),
            None => (start + idx).to_string(),
        };
        assert_eq!(node.numbering, expected);
        assert_eq!(node.depth, depth);
        check_numbering(&node.children, Some(&node.numbering), depth + 1, 1);
    }
}

/// Blocks of the document sorted as rebuilt sections would render them.
fn tree_outline(forest: &[Section]) -> String {
    fn walk(s: &Section, out: &mut Vec<String>) {
        out.push(format!("## {}", s.heading));
        if s.has_body() {
            out.push(format!("‣ {}", s.body));
        }
        for c in &s.children {
            walk(c, out);
        }
    }
    let mut out = Vec::new();
    for s in forest {
        walk(s, &mut out);
    }
    out.join("\n")
}

proptest! {
    #[test]
    fn numbering_is_contiguous(edits in prop::collection::vec(edit_strategy(), 0..20)) {
        let mut tree = WorkingTree::new(seed_tree(), NumberingSeed::default());
        let mut ids = SequentialIds::new();
        for edit in &edits {
            apply(&mut tree, edit, &mut ids);
            check_numbering(tree.roots(), None, 1, 1);
        }
    }

    #[test]
    fn compiled_ops_reproduce_the_tree(edits in prop::collection::vec(edit_strategy(), 0..12)) {
        let original = seed_tree();
        let mut tree = WorkingTree::new(original.clone(), NumberingSeed::default());
        let mut ids = SequentialIds::new();
        for edit in &edits {
            apply(&mut tree, edit, &mut ids);
        }

        let change = compile(&original, tree.roots(), &CompileContext::default());
        let after = apply_ops(&seed_blocks(), &change.ops);

        prop_assert_eq!(outline(&after), tree_outline(tree.roots()));
        let rebuilt = sections_from_blocks(&after);
        prop_assert_eq!(tree_outline(&rebuilt), tree_outline(tree.roots()));

        if change.ops.is_empty() {
            prop_assert_eq!(after, seed_blocks());
        }
    }
}
