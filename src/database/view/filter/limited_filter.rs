use std::cmp::Ordering;

use crate::database::query::QueryParams;
use crate::database::snapshot::{ChildKey, Index, IndexedNode, NamedNode, Node, Path};
use crate::database::view::change::Change;
use crate::database::view::child_change_accumulator::ChildChangeAccumulator;
use crate::util::hard_assert;

use super::ranged_filter::RangedFilter;
use super::CompleteChildSource;

/// Keeps at most `limit` in-range children, anchored at the start of the
/// index order (`limit_to_first`) or at its end (`limit_to_last`).
#[derive(Clone, Debug)]
pub struct LimitedFilter {
    ranged_filter: RangedFilter,
    index: Index,
    limit: usize,
    reverse: bool,
}

impl LimitedFilter {
    pub fn new(params: &QueryParams) -> Self {
        Self {
            ranged_filter: RangedFilter::new(params),
            index: params.index().clone(),
            limit: params.limit().map_or(0, |limit| limit.count() as usize),
            reverse: !params.is_view_from_left(),
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn ranged_filter(&self) -> &RangedFilter {
        &self.ranged_filter
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn update_child(
        &self,
        snap: &IndexedNode,
        key: &ChildKey,
        new_child: Node,
        affected_path: &Path,
        source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        let new_child = if self
            .ranged_filter
            .matches(&NamedNode::new(key.clone(), new_child.clone()))
        {
            new_child
        } else {
            Node::Empty
        };
        if snap.node().immediate_child(key) == new_child {
            snap.clone()
        } else if snap.node().child_count() < self.limit {
            self.ranged_filter.indexed_filter().update_child(
                snap,
                key,
                new_child,
                affected_path,
                accumulator,
            )
        } else {
            self.full_limit_update_child(snap, key, new_child, source, accumulator)
        }
    }

    fn full_limit_update_child(
        &self,
        old: &IndexedNode,
        key: &ChildKey,
        child: Node,
        source: &dyn CompleteChildSource,
        mut accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        hard_assert(old.node().child_count() == self.limit, "Limit should be full");
        let new_named = NamedNode::new(key.clone(), child.clone());
        let boundary = if self.reverse {
            old.first_child()
        } else {
            old.last_child()
        };
        let Some(boundary) = boundary else {
            return old.clone();
        };
        let in_range = self.ranged_filter.matches(&new_named);

        if old.node().has_child(key) {
            let old_child = old.node().immediate_child(key);
            let mut next = source.child_after_child(&self.index, &boundary, self.reverse);
            // Skip children already in the window; they are updated on their own.
            while let Some(candidate) = next.as_ref() {
                if &candidate.name != key && !old.node().has_child(&candidate.name) {
                    break;
                }
                next = source.child_after_child(&self.index, candidate, self.reverse);
            }
            let compare_next = next.as_ref().map_or(Ordering::Greater, |next| {
                self.index.compare_with(next, &new_named, self.reverse)
            });
            let remains_in_window = in_range && !child.is_empty() && compare_next != Ordering::Less;
            if remains_in_window {
                if let Some(accumulator) = accumulator.as_deref_mut() {
                    accumulator.track_child_change(Change::child_changed(
                        key.clone(),
                        child.clone(),
                        old_child,
                    ));
                }
                return old.update_child(key, child);
            }
            if let Some(accumulator) = accumulator.as_deref_mut() {
                accumulator.track_child_change(Change::child_removed(key.clone(), old_child));
            }
            let without = old.update_child(key, Node::Empty);
            match next {
                Some(next) if self.ranged_filter.matches(&next) => {
                    if let Some(accumulator) = accumulator.as_deref_mut() {
                        accumulator.track_child_change(Change::child_added(
                            next.name.clone(),
                            next.node.clone(),
                        ));
                    }
                    without.update_child(&next.name, next.node)
                }
                _ => without,
            }
        } else if child.is_empty() || !in_range {
            old.clone()
        } else if self.index.compare_with(&boundary, &new_named, self.reverse) != Ordering::Less {
            if let Some(accumulator) = accumulator.as_deref_mut() {
                accumulator.track_child_change(Change::child_removed(
                    boundary.name.clone(),
                    boundary.node.clone(),
                ));
                accumulator.track_child_change(Change::child_added(key.clone(), child.clone()));
            }
            old.update_child(key, child)
                .update_child(&boundary.name, Node::Empty)
        } else {
            old.clone()
        }
    }

    pub fn update_full_node(
        &self,
        old: &IndexedNode,
        new: IndexedNode,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        let filtered = if new.node().is_leaf_node() || new.node().is_empty() {
            IndexedNode::new(Node::Empty, self.index.clone())
        } else {
            let mut filtered = new.update_priority(Node::Empty);
            let children: Vec<NamedNode> = if self.reverse {
                new.reverse_iter().collect()
            } else {
                new.iter().collect()
            };
            let mut count = 0;
            for child in children {
                if count < self.limit && self.ranged_filter.matches(&child) {
                    count += 1;
                } else {
                    filtered = filtered.update_child(&child.name, Node::Empty);
                }
            }
            filtered
        };
        self.ranged_filter
            .indexed_filter()
            .update_full_node(old, filtered, accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::snapshot::node_from_json;
    use crate::database::view::event::EventType;
    use crate::database::view::filter::NoCompleteChildSource;
    use serde_json::{json, Value};

    /// Serves children of a fixed complete node.
    struct FixedSource(IndexedNode);

    impl CompleteChildSource for FixedSource {
        fn complete_child(&self, key: &ChildKey) -> Option<Node> {
            Some(self.0.node().immediate_child(key))
        }

        fn child_after_child(
            &self,
            index: &Index,
            child: &NamedNode,
            reverse: bool,
        ) -> Option<NamedNode> {
            self.0
                .node()
                .named_children()
                .filter(|candidate| {
                    index.compare_with(candidate, child, reverse) == Ordering::Greater
                })
                .min_by(|a, b| index.compare_with(a, b, reverse))
        }
    }

    fn limit_first(limit: u32) -> LimitedFilter {
        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .limit_to_first(limit)
            .unwrap();
        LimitedFilter::new(&params)
    }

    fn indexed(value: Value) -> IndexedNode {
        IndexedNode::new(node_from_json(&value), Index::Value)
    }

    fn sorted_changes(acc: ChildChangeAccumulator) -> Vec<(String, EventType)> {
        let mut changes: Vec<_> = acc
            .into_changes()
            .into_iter()
            .map(|change| (change.child_key.unwrap().to_string(), change.event_type))
            .collect();
        changes.sort();
        changes
    }

    #[test]
    fn full_node_keeps_window() {
        let filter = limit_first(2);
        let old = IndexedNode::new(Node::Empty, Index::Value);
        let result = filter.update_full_node(&old, indexed(json!({"a": 3, "b": 1, "c": 2})), None);
        assert_eq!(result.node().value(false), json!({"b": 1, "c": 2}));

        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .limit_to_last(2)
            .unwrap();
        let last = LimitedFilter::new(&params);
        let result = last.update_full_node(&old, indexed(json!({"a": 3, "b": 1, "c": 2})), None);
        assert_eq!(result.node().value(false), json!({"a": 3, "c": 2}));
    }

    #[test]
    fn smaller_child_evicts_boundary() {
        let filter = limit_first(2);
        let snap = indexed(json!({"b": 1, "c": 2}));
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_child(
            &snap,
            &ChildKey::new("a"),
            Node::long(0),
            &Path::root(),
            &NoCompleteChildSource,
            Some(&mut acc),
        );
        assert_eq!(result.node().value(false), json!({"a": 0, "b": 1}));
        assert_eq!(
            sorted_changes(acc),
            vec![
                ("a".to_string(), EventType::ChildAdded),
                ("c".to_string(), EventType::ChildRemoved),
            ]
        );
    }

    #[test]
    fn larger_child_outside_window_is_ignored() {
        let filter = limit_first(2);
        let snap = indexed(json!({"b": 1, "c": 2}));
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_child(
            &snap,
            &ChildKey::new("z"),
            Node::long(10),
            &Path::root(),
            &NoCompleteChildSource,
            Some(&mut acc),
        );
        assert_eq!(result, snap);
        assert!(acc.is_empty());
    }

    #[test]
    fn removal_backfills_from_source() {
        let filter = limit_first(2);
        let complete = indexed(json!({"a": 1, "b": 2, "c": 3}));
        let snap = indexed(json!({"a": 1, "b": 2}));
        let source = FixedSource(complete.update_child(&ChildKey::new("a"), Node::Empty));
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_child(
            &snap,
            &ChildKey::new("a"),
            Node::Empty,
            &Path::root(),
            &source,
            Some(&mut acc),
        );
        assert_eq!(result.node().value(false), json!({"b": 2, "c": 3}));
        assert_eq!(
            sorted_changes(acc),
            vec![
                ("a".to_string(), EventType::ChildRemoved),
                ("c".to_string(), EventType::ChildAdded),
            ]
        );
    }

    #[test]
    fn child_growing_past_next_is_swapped_out() {
        let filter = limit_first(2);
        let snap = indexed(json!({"a": 1, "b": 2}));
        let source = FixedSource(indexed(json!({"a": 10, "b": 2, "c": 3})));
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_child(
            &snap,
            &ChildKey::new("a"),
            Node::long(10),
            &Path::root(),
            &source,
            Some(&mut acc),
        );
        assert_eq!(result.node().value(false), json!({"b": 2, "c": 3}));
        assert_eq!(
            sorted_changes(acc),
            vec![
                ("a".to_string(), EventType::ChildRemoved),
                ("c".to_string(), EventType::ChildAdded),
            ]
        );
    }

    #[test]
    fn child_changing_within_window_stays() {
        let filter = limit_first(2);
        let snap = indexed(json!({"a": 1, "b": 2}));
        let source = FixedSource(indexed(json!({"a": 2, "b": 2, "c": 3})));
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_child(
            &snap,
            &ChildKey::new("a"),
            Node::long(2),
            &Path::root(),
            &source,
            Some(&mut acc),
        );
        assert_eq!(result.node().value(false), json!({"a": 2, "b": 2}));
        assert_eq!(sorted_changes(acc), vec![("a".to_string(), EventType::ChildChanged)]);
    }
}
