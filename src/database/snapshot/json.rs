use serde_json::Value;

use crate::database::error::{invalid_argument, DatabaseResult};

use super::child_key::ChildKey;
use super::node::{is_valid_priority, ChildrenMap, LeafValue, Node};

const PRIORITY_KEY: &str = ".priority";
const VALUE_KEY: &str = ".value";
const SERVER_VALUE_KEY: &str = ".sv";

/// Converts a JSON value into a [`Node`].
///
/// `null`, empty objects and empty arrays become [`Node::Empty`]. `.priority`
/// and `.value` entries are honoured; an object holding `.sv` becomes a deferred
/// server value leaf. Integers that fit in `i64` become long leaves and every
/// other number a double. Priorities that are not valid are ignored.
pub fn node_from_json(value: &Value) -> Node {
    match value {
        Value::Object(map) => {
            let priority = map
                .get(PRIORITY_KEY)
                .and_then(|priority| parse_priority(priority).ok())
                .unwrap_or_default();
            if let Some(inner) = map.get(VALUE_KEY) {
                return with_priority(node_from_json(inner), priority);
            }
            if map.contains_key(SERVER_VALUE_KEY) {
                return with_priority(Node::leaf(LeafValue::Deferred(map.clone())), priority);
            }
            let children = map
                .iter()
                .filter(|(key, _)| !key.starts_with('.'))
                .fold(ChildrenMap::new(), |children, (key, child)| {
                    insert_child(children, key, child)
                });
            children_node(children, priority)
        }
        Value::Array(items) => {
            let children = items
                .iter()
                .enumerate()
                .fold(ChildrenMap::new(), |children, (index, child)| {
                    insert_child(children, &index.to_string(), child)
                });
            children_node(children, Node::Empty)
        }
        other => scalar_leaf(other).map_or(Node::Empty, Node::leaf),
    }
}

/// Validates a user-supplied priority and converts it into a node.
///
/// Integral priorities are stored as doubles so that `1` and `1.0` hash alike.
pub fn parse_priority(value: &Value) -> DatabaseResult<Node> {
    let node = match value {
        Value::Null => Node::Empty,
        Value::Number(_) | Value::String(_) => scalar_leaf(value).map_or(Node::Empty, Node::leaf),
        Value::Object(map) if map.contains_key(SERVER_VALUE_KEY) => {
            Node::leaf(LeafValue::Deferred(map.clone()))
        }
        _ => {
            return Err(invalid_argument(
                "Priority must be a string, number, server value or null",
            ))
        }
    };
    let node = match node.leaf_value() {
        Some(LeafValue::Long(value)) => Node::double(*value as f64),
        _ => node,
    };
    if is_valid_priority(&node) {
        Ok(node)
    } else {
        Err(invalid_argument("Invalid priority value"))
    }
}

fn scalar_leaf(value: &Value) -> Option<LeafValue> {
    match value {
        Value::Bool(value) => Some(LeafValue::Boolean(*value)),
        Value::String(value) => Some(LeafValue::String(value.clone())),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Some(LeafValue::Long(value)),
            None => number.as_f64().map(LeafValue::Double),
        },
        _ => None,
    }
}

fn insert_child(children: ChildrenMap, key: &str, value: &Value) -> ChildrenMap {
    let node = node_from_json(value);
    if node.is_empty() {
        children
    } else {
        children.insert(ChildKey::new(key), node)
    }
}

fn children_node(children: ChildrenMap, priority: Node) -> Node {
    if children.is_empty() {
        Node::Empty
    } else {
        Node::from_children(children, priority)
    }
}

fn with_priority(node: Node, priority: Node) -> Node {
    if node.is_empty() {
        node
    } else {
        node.update_priority(priority)
    }
}
