use std::cmp::Ordering;

use crate::database::query::{QueryBound, QueryParams};
use crate::database::snapshot::{
    node_from_json, ChildKey, Index, IndexedNode, NamedNode, Node, Path,
};
use crate::database::view::child_change_accumulator::ChildChangeAccumulator;

use super::indexed_filter::IndexedFilter;

/// One end of a filter range, expressed as a post in index order.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeBound {
    pub post: NamedNode,
    pub inclusive: bool,
}

impl RangeBound {
    /// Without an explicit name an inclusive start sits before every key
    /// sharing the value and an exclusive start after all of them; ends mirror
    /// this.
    fn from_query(index: &Index, bound: &QueryBound, is_start: bool) -> Self {
        let name = match &bound.name {
            Some(name) => ChildKey::new(name),
            None if bound.inclusive == is_start => ChildKey::min(),
            None => ChildKey::max(),
        };
        Self {
            post: index.make_post(&node_from_json(&bound.value), name),
            inclusive: bound.inclusive,
        }
    }
}

/// Keeps only the children between a start and an end post.
#[derive(Clone, Debug)]
pub struct RangedFilter {
    indexed_filter: IndexedFilter,
    index: Index,
    start: Option<RangeBound>,
    end: Option<RangeBound>,
}

impl RangedFilter {
    pub fn new(params: &QueryParams) -> Self {
        let index = params.index().clone();
        let start = params
            .start()
            .map(|bound| RangeBound::from_query(&index, bound, true));
        let end = params
            .end()
            .map(|bound| RangeBound::from_query(&index, bound, false));
        Self {
            indexed_filter: IndexedFilter::new(index.clone()),
            index,
            start,
            end,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn indexed_filter(&self) -> &IndexedFilter {
        &self.indexed_filter
    }

    pub fn start(&self) -> Option<&RangeBound> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&RangeBound> {
        self.end.as_ref()
    }

    pub fn matches(&self, node: &NamedNode) -> bool {
        let after_start = self.start.as_ref().map_or(true, |bound| {
            let ordering = self.index.compare(&bound.post, node);
            ordering == Ordering::Less || (bound.inclusive && ordering == Ordering::Equal)
        });
        let before_end = self.end.as_ref().map_or(true, |bound| {
            let ordering = self.index.compare(node, &bound.post);
            ordering == Ordering::Less || (bound.inclusive && ordering == Ordering::Equal)
        });
        after_start && before_end
    }

    pub fn update_child(
        &self,
        snap: &IndexedNode,
        key: &ChildKey,
        new_child: Node,
        affected_path: &Path,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        let new_child = if self.matches(&NamedNode::new(key.clone(), new_child.clone())) {
            new_child
        } else {
            Node::Empty
        };
        self.indexed_filter
            .update_child(snap, key, new_child, affected_path, accumulator)
    }

    pub fn update_full_node(
        &self,
        old: &IndexedNode,
        new: IndexedNode,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        let filtered = if new.node().is_leaf_node() {
            IndexedNode::new(Node::Empty, self.index.clone())
        } else {
            let mut filtered = new.update_priority(Node::Empty);
            for child in new.iter() {
                if !self.matches(&child) {
                    filtered = filtered.update_child(&child.name, Node::Empty);
                }
            }
            filtered
        };
        self.indexed_filter
            .update_full_node(old, filtered, accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(name: &str, value: serde_json::Value) -> NamedNode {
        NamedNode::new(ChildKey::new(name), node_from_json(&value))
    }

    #[test]
    fn inclusive_value_range() {
        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .start_at(json!(2))
            .unwrap()
            .end_at(json!(4))
            .unwrap();
        let filter = RangedFilter::new(&params);
        assert!(!filter.matches(&named("a", json!(1))));
        assert!(filter.matches(&named("b", json!(2))));
        assert!(filter.matches(&named("c", json!(4))));
        assert!(!filter.matches(&named("d", json!(5))));
    }

    #[test]
    fn exclusive_bounds_skip_equal_values() {
        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .start_after(json!(2))
            .unwrap()
            .end_before(json!(4))
            .unwrap();
        let filter = RangedFilter::new(&params);
        assert!(!filter.matches(&named("b", json!(2))));
        assert!(filter.matches(&named("b", json!(3))));
        assert!(!filter.matches(&named("c", json!(4))));
    }

    #[test]
    fn named_bounds_break_ties_by_key() {
        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .start_at_with_key(json!(2), Some("m".into()))
            .unwrap();
        let filter = RangedFilter::new(&params);
        assert!(!filter.matches(&named("a", json!(2))));
        assert!(filter.matches(&named("m", json!(2))));
        assert!(filter.matches(&named("z", json!(2))));
    }

    #[test]
    fn key_range() {
        let params = QueryParams::default()
            .order_by_key()
            .unwrap()
            .start_after(json!("b"))
            .unwrap()
            .end_at(json!("d"))
            .unwrap();
        let filter = RangedFilter::new(&params);
        assert!(!filter.matches(&named("b", json!(1))));
        assert!(filter.matches(&named("c", json!(1))));
        assert!(filter.matches(&named("d", json!(1))));
        assert!(!filter.matches(&named("e", json!(1))));
    }

    #[test]
    fn out_of_range_children_are_dropped() {
        let params = QueryParams::default()
            .order_by_value()
            .unwrap()
            .end_at(json!(2))
            .unwrap();
        let filter = RangedFilter::new(&params);
        let old = IndexedNode::new(Node::Empty, Index::Value);
        let new = IndexedNode::new(
            node_from_json(&json!({"a": 1, "b": 2, "c": 3, ".priority": 1})),
            Index::Value,
        );
        let mut acc = ChildChangeAccumulator::new();
        let result = filter.update_full_node(&old, new, Some(&mut acc));
        assert_eq!(result.node().value(true), json!({"a": 1, "b": 2}));
        assert_eq!(acc.into_changes().len(), 2);

        let updated = filter.update_child(
            &result,
            &ChildKey::new("a"),
            Node::long(9),
            &Path::root(),
            None,
        );
        assert_eq!(updated.node().value(true), json!({"b": 2}));
    }
}
