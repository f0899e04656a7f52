use std::collections::HashMap;

use crate::database::snapshot::ChildKey;
use crate::util::{hard_assert, hard_fail};

use super::change::Change;
use super::event::EventType;

/// Folds successive child changes produced while applying one operation into
/// at most one change per child.
#[derive(Debug, Default)]
pub struct ChildChangeAccumulator {
    changes: HashMap<ChildKey, Change>,
}

impl ChildChangeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_child_change(&mut self, change: Change) {
        let event_type = change.event_type;
        hard_assert(
            matches!(
                event_type,
                EventType::ChildAdded | EventType::ChildChanged | EventType::ChildRemoved
            ),
            "Only child changes supported for tracking",
        );
        let Some(key) = change.child_key.clone() else {
            hard_fail("Child changes must carry a child key");
        };
        hard_assert(
            !key.is_priority_key(),
            "Changes to the priority are not tracked as child changes",
        );

        let Some(old) = self.changes.remove(&key) else {
            self.changes.insert(key, change);
            return;
        };
        let merged = match (event_type, old.event_type) {
            (EventType::ChildAdded, EventType::ChildRemoved) => {
                Some(Change::child_changed_indexed(key.clone(), change.snapshot, old.snapshot))
            }
            (EventType::ChildRemoved, EventType::ChildAdded) => None,
            (EventType::ChildRemoved, EventType::ChildChanged) => match old.old_snapshot {
                Some(original) => Some(Change::child_removed_indexed(key.clone(), original)),
                None => hard_fail("Changed change without old snapshot"),
            },
            (EventType::ChildChanged, EventType::ChildAdded) => {
                Some(Change::child_added_indexed(key.clone(), change.snapshot))
            }
            (EventType::ChildChanged, EventType::ChildChanged) => match old.old_snapshot {
                Some(original) => Some(Change::child_changed_indexed(
                    key.clone(),
                    change.snapshot,
                    original,
                )),
                None => hard_fail("Changed change without old snapshot"),
            },
            (new_type, old_type) => hard_fail(format!(
                "Illegal combination of changes: {new_type} occurred after {old_type} for {key}"
            )),
        };
        if let Some(merged) = merged {
            self.changes.insert(key, merged);
        }
    }

    /// Accumulated changes, in no particular order.
    pub fn changes(&self) -> Vec<Change> {
        self.changes.values().cloned().collect()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes.into_values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::snapshot::{IndexedNode, Node};

    fn key() -> ChildKey {
        ChildKey::new("k")
    }

    fn single(acc: &ChildChangeAccumulator) -> Change {
        let changes = acc.changes();
        assert_eq!(changes.len(), 1);
        changes.into_iter().next().unwrap()
    }

    #[test]
    fn first_change_is_stored() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(key(), Node::long(1)));
        assert_eq!(single(&acc), Change::child_added(key(), Node::long(1)));
    }

    #[test]
    fn removed_then_added_becomes_changed() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_removed(key(), Node::long(1)));
        acc.track_child_change(Change::child_added(key(), Node::long(2)));
        let change = single(&acc);
        assert_eq!(change.event_type, EventType::ChildChanged);
        assert_eq!(change.node(), &Node::long(2));
        assert_eq!(change.old_snapshot, Some(IndexedNode::from_node(Node::long(1))));
    }

    #[test]
    fn added_then_removed_cancels_out() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(key(), Node::long(1)));
        acc.track_child_change(Change::child_removed(key(), Node::long(1)));
        assert!(acc.is_empty());
    }

    #[test]
    fn changed_then_removed_keeps_original_value() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed(key(), Node::long(2), Node::long(1)));
        acc.track_child_change(Change::child_removed(key(), Node::long(2)));
        assert_eq!(single(&acc), Change::child_removed(key(), Node::long(1)));
    }

    #[test]
    fn added_then_changed_stays_added() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(key(), Node::long(1)));
        acc.track_child_change(Change::child_changed(key(), Node::long(2), Node::long(1)));
        assert_eq!(single(&acc), Change::child_added(key(), Node::long(2)));
    }

    #[test]
    fn changed_twice_keeps_first_old_value() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed(key(), Node::long(2), Node::long(1)));
        acc.track_child_change(Change::child_changed(key(), Node::long(3), Node::long(2)));
        assert_eq!(
            single(&acc),
            Change::child_changed(key(), Node::long(3), Node::long(1))
        );
    }

    #[test]
    fn independent_keys_do_not_interact() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(ChildKey::new("a"), Node::long(1)));
        acc.track_child_change(Change::child_removed(ChildKey::new("b"), Node::long(1)));
        assert_eq!(acc.into_changes().len(), 2);
    }

    #[test]
    #[should_panic(expected = "Illegal combination of changes")]
    fn removed_then_changed_is_fatal() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_removed(key(), Node::long(1)));
        acc.track_child_change(Change::child_changed(key(), Node::long(2), Node::long(1)));
    }

    #[test]
    #[should_panic(expected = "Illegal combination of changes")]
    fn added_twice_is_fatal() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(key(), Node::long(1)));
        acc.track_child_change(Change::child_added(key(), Node::long(2)));
    }

    #[test]
    #[should_panic(expected = "Only child changes")]
    fn value_changes_are_rejected() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::value(IndexedNode::from_node(Node::long(1))));
    }

    #[test]
    #[should_panic(expected = "priority")]
    fn priority_key_is_rejected() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added(ChildKey::priority(), Node::long(1)));
    }
}
