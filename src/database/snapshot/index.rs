use std::cmp::Ordering;
use std::fmt;

use crate::database::collection::Comparator;

use super::child_key::ChildKey;
use super::named_node::NamedNode;
use super::node::{LeafValue, Node};
use super::path::Path;

const PRIORITY_POST_VALUE: &str = "[PRIORITY-POST]";

/// Ordering applied to the children of a query location.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Index {
    #[default]
    Priority,
    Key,
    Value,
    /// Orders by the value found at a path under each child.
    Path(Path),
}

impl Index {
    /// Orders two named nodes; ties always break on the child key.
    pub fn compare(&self, left: &NamedNode, right: &NamedNode) -> Ordering {
        let primary = match self {
            Index::Key => Ordering::Equal,
            Index::Value => left.node.compare_value(&right.node),
            Index::Priority => left
                .node
                .priority()
                .compare_value(right.node.priority()),
            Index::Path(path) => left
                .node
                .child(path)
                .compare_value(&right.node.child(path)),
        };
        primary.then_with(|| left.name.cmp(&right.name))
    }

    pub fn compare_with(&self, left: &NamedNode, right: &NamedNode, reverse: bool) -> Ordering {
        if reverse {
            self.compare(right, left)
        } else {
            self.compare(left, right)
        }
    }

    /// Whether the node carries data this index sorts on.
    pub fn is_defined_on(&self, node: &Node) -> bool {
        match self {
            Index::Key | Index::Value => true,
            Index::Priority => !node.priority().is_empty(),
            Index::Path(path) => !node.child(path).is_empty(),
        }
    }

    /// Whether replacing `old` with `new` moves the child under this index.
    pub fn indexed_value_changed(&self, old: &Node, new: &Node) -> bool {
        let old = NamedNode::new(ChildKey::min(), old.clone());
        let new = NamedNode::new(ChildKey::min(), new.clone());
        self.compare(&old, &new) != Ordering::Equal
    }

    /// Builds a post that sorts where a child holding `value` and named `name` would.
    pub fn make_post(&self, value: &Node, name: ChildKey) -> NamedNode {
        match self {
            Index::Key => {
                let key = match value.leaf_value() {
                    Some(LeafValue::String(key)) => ChildKey::new(key),
                    _ => name,
                };
                NamedNode::new(key, Node::Empty)
            }
            Index::Value => NamedNode::new(name, value.clone()),
            Index::Priority => NamedNode::new(
                name,
                Node::leaf_with_priority(
                    LeafValue::String(PRIORITY_POST_VALUE.to_string()),
                    value.clone(),
                ),
            ),
            Index::Path(path) => {
                NamedNode::new(name, Node::Empty.update_child(path, value.clone()))
            }
        }
    }

    /// Identifier sent to the server for this index.
    pub fn query_definition(&self) -> String {
        match self {
            Index::Key => ".key".to_string(),
            Index::Value => ".value".to_string(),
            Index::Priority => ".priority".to_string(),
            Index::Path(path) => path.wire_format(),
        }
    }
}

impl Comparator<NamedNode> for Index {
    fn compare(&self, left: &NamedNode, right: &NamedNode) -> Ordering {
        Index::compare(self, left, right)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_definition())
    }
}
