use crate::database::snapshot::{ChildKey, Index, IndexedNode, Node, Path};
use crate::database::view::change::Change;
use crate::database::view::child_change_accumulator::ChildChangeAccumulator;
use crate::util::hard_assert;

/// Applies every update unconditionally.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedFilter {
    index: Index,
}

impl IndexedFilter {
    pub fn new(index: Index) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn update_child(
        &self,
        snap: &IndexedNode,
        key: &ChildKey,
        new_child: Node,
        affected_path: &Path,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        hard_assert(snap.has_index(&self.index), "The index must match the filter");
        let node = snap.node();
        let old_child = node.immediate_child(key);
        if old_child.child(affected_path) == new_child.child(affected_path)
            && old_child.is_empty() == new_child.is_empty()
        {
            return snap.clone();
        }

        if let Some(accumulator) = accumulator {
            if new_child.is_empty() {
                if node.has_child(key) {
                    accumulator.track_child_change(Change::child_removed(key.clone(), old_child));
                } else {
                    hard_assert(
                        node.is_leaf_node(),
                        "A child remove without an old child only makes sense on a leaf node",
                    );
                }
            } else if old_child.is_empty() {
                accumulator.track_child_change(Change::child_added(key.clone(), new_child.clone()));
            } else {
                accumulator.track_child_change(Change::child_changed(
                    key.clone(),
                    new_child.clone(),
                    old_child,
                ));
            }
        }

        if node.is_leaf_node() && new_child.is_empty() {
            snap.clone()
        } else {
            snap.update_child(key, new_child)
        }
    }

    pub fn update_full_node(
        &self,
        old: &IndexedNode,
        new: IndexedNode,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        hard_assert(
            new.has_index(&self.index),
            "Can't use IndexedNode that doesn't have filter's index",
        );
        if let Some(accumulator) = accumulator {
            let old_node = old.node();
            let new_node = new.node();
            for (key, child) in old_node.iter() {
                if !new_node.has_child(key) {
                    accumulator
                        .track_child_change(Change::child_removed(key.clone(), child.clone()));
                }
            }
            if !new_node.is_leaf_node() {
                for (key, child) in new_node.iter() {
                    let old_child = old_node.immediate_child(key);
                    if old_child.is_empty() {
                        accumulator
                            .track_child_change(Change::child_added(key.clone(), child.clone()));
                    } else if &old_child != child {
                        accumulator.track_child_change(Change::child_changed(
                            key.clone(),
                            child.clone(),
                            old_child,
                        ));
                    }
                }
            }
        }
        new
    }

    pub fn update_priority(&self, old: &IndexedNode, priority: Node) -> IndexedNode {
        if old.node().is_empty() {
            old.clone()
        } else {
            old.update_priority(priority)
        }
    }
}
