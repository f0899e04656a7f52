//! Immutable JSON-like node model.
//!
//! A [`Node`] is either empty, a scalar leaf or an ordered collection of
//! children. Nodes are persistent: every update returns a new root that shares
//! the untouched subtrees with the previous one. [`IndexedNode`] pairs a node with
//! the [`Index`] a query orders its children by.

mod child_key;
mod index;
mod indexed_node;
mod json;
mod named_node;
mod node;
mod path;

pub use child_key::ChildKey;
pub use index::Index;
pub use indexed_node::{IndexedIter, IndexedNode};
pub use json::{node_from_json, parse_priority};
pub use named_node::NamedNode;
pub use node::{is_valid_priority, ChildrenMap, LeafValue, Node, EMPTY_NODE};
pub use path::Path;
