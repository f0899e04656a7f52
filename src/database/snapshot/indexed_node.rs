use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::database::collection::{ImmutableSortedSet, Iter, SetIter};
use crate::util::hard_assert;

use super::child_key::ChildKey;
use super::index::Index;
use super::named_node::NamedNode;
use super::node::Node;

enum IndexState {
    /// Children already iterate in index order through the key-sorted map.
    Fallback,
    Sorted(ImmutableSortedSet<NamedNode, Index>),
}

/// A [`Node`] paired with the [`Index`] its children are read in.
///
/// The sorted view is built lazily on first ordered access and carried
/// across updates when possible.
#[derive(Clone)]
pub struct IndexedNode {
    node: Node,
    index: Index,
    indexed: Arc<OnceCell<IndexState>>,
}

impl IndexedNode {
    pub fn new(node: Node, index: Index) -> Self {
        Self {
            node,
            index,
            indexed: Arc::new(OnceCell::new()),
        }
    }

    /// Wraps a node with the default priority index.
    pub fn from_node(node: Node) -> Self {
        Self::new(node, Index::Priority)
    }

    fn with_state(node: Node, index: Index, state: OnceCell<IndexState>) -> Self {
        Self {
            node,
            index,
            indexed: Arc::new(state),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn has_index(&self, index: &Index) -> bool {
        &self.index == index
    }

    fn state(&self) -> &IndexState {
        self.indexed.get_or_init(|| {
            if self.index == Index::Key {
                return IndexState::Fallback;
            }
            let defined = self
                .node
                .iter()
                .any(|(_, child)| self.index.is_defined_on(child));
            if defined {
                IndexState::Sorted(ImmutableSortedSet::from_entries(
                    self.node.named_children(),
                    self.index.clone(),
                ))
            } else {
                IndexState::Fallback
            }
        })
    }

    pub fn update_child(&self, key: &ChildKey, child: Node) -> IndexedNode {
        if key.is_priority_key() {
            return self.update_priority(child);
        }
        let new_node = self.node.update_immediate_child(key, child.clone());
        match self.indexed.get() {
            Some(IndexState::Fallback) if !self.index.is_defined_on(&child) => {
                Self::with_state(
                    new_node,
                    self.index.clone(),
                    OnceCell::with_value(IndexState::Fallback),
                )
            }
            None | Some(IndexState::Fallback) => Self::new(new_node, self.index.clone()),
            Some(IndexState::Sorted(sorted)) => {
                let old_child = self.node.immediate_child(key);
                let mut sorted = sorted.remove(&NamedNode::new(key.clone(), old_child));
                if !child.is_empty() {
                    sorted = sorted.insert(NamedNode::new(key.clone(), child));
                }
                Self::with_state(
                    new_node,
                    self.index.clone(),
                    OnceCell::with_value(IndexState::Sorted(sorted)),
                )
            }
        }
    }

    pub fn update_priority(&self, priority: Node) -> IndexedNode {
        Self {
            node: self.node.update_priority(priority),
            index: self.index.clone(),
            indexed: Arc::clone(&self.indexed),
        }
    }

    pub fn first_child(&self) -> Option<NamedNode> {
        if !matches!(self.node, Node::Children(_)) {
            return None;
        }
        match self.state() {
            IndexState::Fallback => {
                let key = self.node.first_child_key()?;
                Some(NamedNode::new(key.clone(), self.node.immediate_child(key)))
            }
            IndexState::Sorted(sorted) => sorted.min_entry().cloned(),
        }
    }

    pub fn last_child(&self) -> Option<NamedNode> {
        if !matches!(self.node, Node::Children(_)) {
            return None;
        }
        match self.state() {
            IndexState::Fallback => {
                let key = self.node.last_child_key()?;
                Some(NamedNode::new(key.clone(), self.node.immediate_child(key)))
            }
            IndexState::Sorted(sorted) => sorted.max_entry().cloned(),
        }
    }

    /// Name of the child ordered immediately before `(key, child)`.
    pub fn predecessor_child_name(
        &self,
        key: &ChildKey,
        child: &Node,
        index: &Index,
    ) -> Option<ChildKey> {
        hard_assert(
            self.index == Index::Key || &self.index == index,
            "Index not available in IndexedNode!",
        );
        match self.state() {
            IndexState::Fallback => self.node.predecessor_child_key(key).cloned(),
            IndexState::Sorted(sorted) => sorted
                .predecessor_entry(&NamedNode::new(key.clone(), child.clone()))
                .map(|entry| entry.name.clone()),
        }
    }

    /// Children in index order.
    pub fn iter(&self) -> IndexedIter<'_> {
        self.make_iter(false)
    }

    /// Children in reverse index order.
    pub fn reverse_iter(&self) -> IndexedIter<'_> {
        self.make_iter(true)
    }

    fn make_iter(&self, reverse: bool) -> IndexedIter<'_> {
        let Some(children) = self.node.children_map() else {
            return IndexedIter::Empty;
        };
        match self.state() {
            IndexState::Fallback if reverse => IndexedIter::Keys(children.reverse_iter()),
            IndexState::Fallback => IndexedIter::Keys(children.iter()),
            IndexState::Sorted(sorted) if reverse => IndexedIter::Sorted(sorted.reverse_iter()),
            IndexState::Sorted(sorted) => IndexedIter::Sorted(sorted.iter()),
        }
    }
}

impl PartialEq for IndexedNode {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.node == other.node
    }
}

impl fmt::Debug for IndexedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedNode")
            .field("node", &self.node)
            .field("index", &self.index)
            .finish()
    }
}

/// Iterator over the children of an [`IndexedNode`].
pub enum IndexedIter<'a> {
    Empty,
    Keys(Iter<'a, ChildKey, Node>),
    Sorted(SetIter<'a, NamedNode>),
}

impl Iterator for IndexedIter<'_> {
    type Item = NamedNode;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            IndexedIter::Empty => None,
            IndexedIter::Keys(iter) => iter
                .next()
                .map(|(key, node)| NamedNode::new(key.clone(), node.clone())),
            IndexedIter::Sorted(iter) => iter.next().cloned(),
        }
    }
}
