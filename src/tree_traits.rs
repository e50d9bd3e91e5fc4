//! Render trees as indented text with `termtree`.

use std::fmt::Display;

use termtree::Tree as TermTree;
use tracing::instrument;

use crate::domain::{NodeRef, Tree};

pub trait TermTreeConvert {
    fn to_tree_string(&self) -> TermTree<String>;
}

fn label<T: Display>(node: &NodeRef<'_, T>) -> String {
    format!("{}: {}", node.id(), node.data())
}

impl<T: Display> TermTreeConvert for NodeRef<'_, T> {
    fn to_tree_string(&self) -> TermTree<String> {
        // Explicit stack so deep trees do not recurse.
        let mut root = TermTree::new(label(self));
        let mut stack: Vec<(NodeRef<'_, T>, Vec<usize>)> = vec![(*self, Vec::new())];

        while let Some((node, path)) = stack.pop() {
            let mut target = &mut root;
            for &i in &path {
                target = &mut target.leaves[i];
            }
            for child in node.children() {
                let mut child_path = path.clone();
                child_path.push(target.leaves.len());
                target.push(TermTree::new(label(&child)));
                stack.push((child, child_path));
            }
        }
        root
    }
}

impl<T: Display> TermTreeConvert for Tree<T> {
    #[instrument(level = "trace", skip(self))]
    fn to_tree_string(&self) -> TermTree<String> {
        match self.root() {
            Some(root) => root.to_tree_string(),
            None => TermTree::new("Empty tree".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_tree_when_rendering_then_nests_children_in_order() {
        let mut tree = Tree::new();
        tree.add(1, 0, "root");
        tree.add(2, 1, "a");
        tree.add(3, 2, "a1");
        tree.add(4, 1, "b");

        let rendered = tree.to_tree_string();
        assert_eq!(rendered.root, "1: root");
        assert_eq!(rendered.leaves.len(), 2);
        assert_eq!(rendered.leaves[0].root, "2: a");
        assert_eq!(rendered.leaves[0].leaves[0].root, "3: a1");
        assert_eq!(rendered.leaves[1].root, "4: b");

        let text = rendered.to_string();
        assert!(text.starts_with("1: root\n"));
        assert!(text.contains("3: a1"));
    }

    #[test]
    fn given_empty_tree_when_rendering_then_shows_placeholder() {
        let tree: Tree<&str> = Tree::new();
        assert_eq!(tree.to_tree_string().root, "Empty tree");
    }
}
