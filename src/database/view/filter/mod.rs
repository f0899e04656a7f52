//! Filters that keep a view's cache consistent with its query.
//!
//! Every filter applies updates to an [`IndexedNode`] and reports the child
//! changes it made to an optional [`ChildChangeAccumulator`]. Filters never
//! fail.

mod indexed_filter;
mod limited_filter;
mod ranged_filter;

pub use indexed_filter::IndexedFilter;
pub use limited_filter::LimitedFilter;
pub use ranged_filter::{RangeBound, RangedFilter};

use crate::database::query::QueryParams;
use crate::database::snapshot::{ChildKey, Index, IndexedNode, NamedNode, Node, Path};

use super::child_change_accumulator::ChildChangeAccumulator;

/// Supplies complete children that are not in the cache being filtered, used
/// by limited filters to backfill their window.
pub trait CompleteChildSource {
    fn complete_child(&self, key: &ChildKey) -> Option<Node>;

    fn child_after_child(
        &self,
        index: &Index,
        child: &NamedNode,
        reverse: bool,
    ) -> Option<NamedNode>;
}

/// A source that knows nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCompleteChildSource;

impl CompleteChildSource for NoCompleteChildSource {
    fn complete_child(&self, _key: &ChildKey) -> Option<Node> {
        None
    }

    fn child_after_child(
        &self,
        _index: &Index,
        _child: &NamedNode,
        _reverse: bool,
    ) -> Option<NamedNode> {
        None
    }
}

#[derive(Clone, Debug)]
pub enum NodeFilter {
    Indexed(IndexedFilter),
    Ranged(RangedFilter),
    Limited(LimitedFilter),
}

impl NodeFilter {
    pub fn for_query(params: &QueryParams) -> Self {
        if params.loads_all_data() {
            NodeFilter::Indexed(IndexedFilter::new(params.index().clone()))
        } else if params.limit().is_some() {
            NodeFilter::Limited(LimitedFilter::new(params))
        } else {
            NodeFilter::Ranged(RangedFilter::new(params))
        }
    }

    /// Replaces the child `key` of `snap` with `new_child`. `affected_path` is
    /// the part of the child that actually changed.
    pub fn update_child(
        &self,
        snap: &IndexedNode,
        key: &ChildKey,
        new_child: Node,
        affected_path: &Path,
        source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        match self {
            NodeFilter::Indexed(filter) => {
                filter.update_child(snap, key, new_child, affected_path, accumulator)
            }
            NodeFilter::Ranged(filter) => {
                filter.update_child(snap, key, new_child, affected_path, accumulator)
            }
            NodeFilter::Limited(filter) => {
                filter.update_child(snap, key, new_child, affected_path, source, accumulator)
            }
        }
    }

    /// Replaces the whole node, reporting the differences against `old`.
    pub fn update_full_node(
        &self,
        old: &IndexedNode,
        new: IndexedNode,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> IndexedNode {
        match self {
            NodeFilter::Indexed(filter) => filter.update_full_node(old, new, accumulator),
            NodeFilter::Ranged(filter) => filter.update_full_node(old, new, accumulator),
            NodeFilter::Limited(filter) => filter.update_full_node(old, new, accumulator),
        }
    }

    pub fn update_priority(&self, old: &IndexedNode, priority: Node) -> IndexedNode {
        match self {
            NodeFilter::Indexed(filter) => filter.update_priority(old, priority),
            NodeFilter::Ranged(_) | NodeFilter::Limited(_) => old.clone(),
        }
    }

    /// Whether the filter may drop children of the location.
    pub fn filters_nodes(&self) -> bool {
        !matches!(self, NodeFilter::Indexed(_))
    }

    /// The unfiltered counterpart of this filter, sharing its index.
    pub fn indexed_filter(&self) -> NodeFilter {
        match self {
            NodeFilter::Indexed(filter) => NodeFilter::Indexed(filter.clone()),
            NodeFilter::Ranged(filter) => NodeFilter::Indexed(filter.indexed_filter().clone()),
            NodeFilter::Limited(filter) => {
                NodeFilter::Indexed(filter.ranged_filter().indexed_filter().clone())
            }
        }
    }

    pub fn index(&self) -> &Index {
        match self {
            NodeFilter::Indexed(filter) => filter.index(),
            NodeFilter::Ranged(filter) => filter.index(),
            NodeFilter::Limited(filter) => filter.index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_selection_follows_params() {
        let all = QueryParams::default();
        assert!(matches!(all.node_filter(), NodeFilter::Indexed(_)));
        assert!(!all.node_filter().filters_nodes());

        let ranged = QueryParams::default().start_at(json!(1)).unwrap();
        assert!(matches!(ranged.node_filter(), NodeFilter::Ranged(_)));

        let limited = QueryParams::default()
            .order_by_value()
            .unwrap()
            .limit_to_last(2)
            .unwrap();
        let filter = limited.node_filter();
        assert!(matches!(filter, NodeFilter::Limited(_)));
        assert!(filter.filters_nodes());
        assert_eq!(filter.index(), &Index::Value);
        assert!(matches!(filter.indexed_filter(), NodeFilter::Indexed(_)));
        assert_eq!(filter.indexed_filter().index(), &Index::Value);
    }

    #[test]
    fn ranged_and_limited_ignore_priority_updates() {
        let node = IndexedNode::new(
            crate::database::snapshot::node_from_json(&json!({"a": 1})),
            Index::Priority,
        );
        let ranged = QueryParams::default().start_at(json!(1)).unwrap().node_filter();
        assert_eq!(ranged.update_priority(&node, Node::long(4)), node);

        let indexed = QueryParams::default().node_filter();
        let updated = indexed.update_priority(&node, Node::double(4.0));
        assert_eq!(updated.node().priority(), &Node::double(4.0));

        let empty = IndexedNode::from_node(Node::Empty);
        assert_eq!(indexed.update_priority(&empty, Node::double(4.0)), empty);
    }
}
