use crate::database::snapshot::{ChildKey, IndexedNode, Node};

use super::event::EventType;

/// A single difference between two versions of a view, before it becomes an
/// event for a particular registration.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub event_type: EventType,
    pub snapshot: IndexedNode,
    pub child_key: Option<ChildKey>,
    pub prev_name: Option<ChildKey>,
    pub old_snapshot: Option<IndexedNode>,
}

impl Change {
    fn new(
        event_type: EventType,
        snapshot: IndexedNode,
        child_key: Option<ChildKey>,
        old_snapshot: Option<IndexedNode>,
    ) -> Self {
        Self {
            event_type,
            snapshot,
            child_key,
            prev_name: None,
            old_snapshot,
        }
    }

    pub fn value(snapshot: IndexedNode) -> Self {
        Self::new(EventType::Value, snapshot, None, None)
    }

    pub fn child_added(key: ChildKey, node: Node) -> Self {
        Self::child_added_indexed(key, IndexedNode::from_node(node))
    }

    pub fn child_added_indexed(key: ChildKey, snapshot: IndexedNode) -> Self {
        Self::new(EventType::ChildAdded, snapshot, Some(key), None)
    }

    pub fn child_removed(key: ChildKey, node: Node) -> Self {
        Self::child_removed_indexed(key, IndexedNode::from_node(node))
    }

    pub fn child_removed_indexed(key: ChildKey, snapshot: IndexedNode) -> Self {
        Self::new(EventType::ChildRemoved, snapshot, Some(key), None)
    }

    pub fn child_changed(key: ChildKey, new_node: Node, old_node: Node) -> Self {
        Self::child_changed_indexed(
            key,
            IndexedNode::from_node(new_node),
            IndexedNode::from_node(old_node),
        )
    }

    pub fn child_changed_indexed(
        key: ChildKey,
        snapshot: IndexedNode,
        old_snapshot: IndexedNode,
    ) -> Self {
        Self::new(EventType::ChildChanged, snapshot, Some(key), Some(old_snapshot))
    }

    pub fn child_moved(key: ChildKey, snapshot: IndexedNode) -> Self {
        Self::new(EventType::ChildMoved, snapshot, Some(key), None)
    }

    pub fn with_prev_name(mut self, prev_name: Option<ChildKey>) -> Self {
        self.prev_name = prev_name;
        self
    }

    pub fn node(&self) -> &Node {
        self.snapshot.node()
    }
}
