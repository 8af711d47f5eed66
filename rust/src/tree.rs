//! Tag → fragment tree projection.
//!
//! The tree is a disposable view: it is rebuilt from the full fragment
//! collection on every refresh and never patched incrementally.

use crate::fragment::Fragment;
use crate::node::{ContextValue, Node};
use std::collections::HashMap;

/// Insertion-ordered `label → Node` mapping produced by [`project`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedTree {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl ProjectedTree {
    pub fn get(&self, label: &str) -> Option<&Node> {
        self.index.get(label).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level tags and untagged fragments, in creation order.
    pub fn root(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| !n.has_tag()).collect()
    }

    /// Children of `label`, or `None` if a listed child is not in the tree.
    pub fn children(&self, label: &str) -> Option<Vec<&Node>> {
        let node = self.get(label)?;
        node.children.iter().map(|c| self.get(c)).collect()
    }

    /// Insert a node. A node with an existing label replaces the old one in
    /// place.
    fn insert(&mut self, node: Node) {
        match self.index.get(&node.label) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.label.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    fn get_mut(&mut self, label: &str) -> Option<&mut Node> {
        let i = *self.index.get(label)?;
        Some(&mut self.nodes[i])
    }
}

/// Build the node set for `fragments`.
///
/// Tag nodes are created on first use and collect one occurrence node per
/// tagged fragment; untagged fragments become a single root node. Order
/// follows the input sequence and each fragment's tag order.
pub fn project(fragments: &[Fragment]) -> ProjectedTree {
    let mut tree = ProjectedTree::default();

    for fragment in fragments {
        if fragment.tags.is_empty() {
            tree.insert(Node::untagged(&fragment.label));
            continue;
        }
        for tag in fragment.tags.iter() {
            if tree.get(tag).is_none() {
                tree.insert(Node::for_tag(tag));
            }
            let occurrence = Node::occurrence(&fragment.label, tag);
            let occurrence_label = occurrence.label.clone();
            tree.insert(occurrence);
            match tree.get_mut(tag) {
                Some(tag_node) if tag_node.context_value == ContextValue::Tag => {
                    tag_node.add_child(occurrence_label)
                }
                _ => tracing::warn!(
                    tag,
                    fragment = %fragment.label,
                    "Tag label is taken by a fragment node"
                ),
            }
        }
    }

    tracing::debug!(
        fragments = fragments.len(),
        nodes = tree.len(),
        "Projected fragment tree"
    );
    tree
}
