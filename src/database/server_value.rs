use std::sync::LazyLock;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::database::snapshot::{ChildKey, LeafValue, Node};
use crate::logger::Logger;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@firebase/database"));

const SERVER_VALUE_KEY: &str = ".sv";

/// Placeholder resolved by the server to its current time in milliseconds.
pub fn server_timestamp() -> Value {
    serde_json::json!({ ".sv": "timestamp" })
}

/// Placeholder that atomically adds `delta` to the stored value.
///
/// # Arguments
/// * `delta` - Amount to atomically add to the current value.
pub fn increment(delta: f64) -> Value {
    serde_json::json!({
        ".sv": {
            "increment": delta,
        }
    })
}

/// Values substituted for server placeholders when writes are applied locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerValues {
    pub timestamp: i64,
}

impl ServerValues {
    /// Uses `now_millis` (usually the local clock plus the server time offset).
    pub fn generate(now_millis: i64) -> Self {
        Self {
            timestamp: now_millis,
        }
    }

    /// Current wall-clock time in milliseconds since the epoch.
    pub fn now() -> Self {
        Self::generate(Utc::now().timestamp_millis())
    }
}

/// Resolves one placeholder against the current value at its location.
///
/// Unknown placeholders come back unchanged.
pub fn resolve_deferred_value(
    placeholder: &Map<String, Value>,
    existing: &Node,
    server_values: &ServerValues,
) -> LeafValue {
    match placeholder.get(SERVER_VALUE_KEY) {
        Some(Value::String(op)) if op == "timestamp" => LeafValue::Long(server_values.timestamp),
        Some(Value::Object(op)) => match op.get("increment") {
            Some(Value::Number(delta)) => {
                let delta = match delta.as_i64() {
                    Some(value) => LeafValue::Long(value),
                    None => LeafValue::Double(delta.as_f64().unwrap_or_default()),
                };
                apply_increment(existing, delta)
            }
            _ => unresolved(placeholder),
        },
        _ => unresolved(placeholder),
    }
}

fn apply_increment(existing: &Node, delta: LeafValue) -> LeafValue {
    let current = match existing.leaf_value() {
        Some(value @ (LeafValue::Long(_) | LeafValue::Double(_))) => value,
        _ => return delta,
    };
    if let (LeafValue::Long(current), LeafValue::Long(delta)) = (current, &delta) {
        if let Some(sum) = current.checked_add(*delta) {
            return LeafValue::Long(sum);
        }
    }
    match (current.as_f64(), delta.as_f64()) {
        (Some(current), Some(delta)) => LeafValue::Double(current + delta),
        _ => delta,
    }
}

fn unresolved(placeholder: &Map<String, Value>) -> LeafValue {
    LOGGER.warn(format!(
        "Unexpected server value: {}",
        Value::Object(placeholder.clone())
    ));
    LeafValue::Deferred(placeholder.clone())
}

/// Replaces every deferred leaf and priority in `node` with its resolved value.
///
/// `existing` is the node currently stored at the same location; increments are
/// applied to the matching existing leaves.
pub fn resolve_deferred_value_snapshot(
    node: &Node,
    existing: &Node,
    server_values: &ServerValues,
) -> Node {
    let priority = resolve_priority(node.priority(), existing.priority(), server_values);
    match node {
        Node::Empty => Node::Empty,
        Node::Leaf(_) => {
            let value = match node.leaf_value() {
                Some(LeafValue::Deferred(placeholder)) => {
                    resolve_deferred_value(placeholder, existing, server_values)
                }
                Some(other) => other.clone(),
                None => return node.clone(),
            };
            Node::leaf_with_priority(value, priority)
        }
        Node::Children(_) => {
            let mut resolved = node.clone();
            for (key, child) in node.iter() {
                let existing_child = existing.immediate_child(key);
                let new_child =
                    resolve_deferred_value_snapshot(child, &existing_child, server_values);
                if &new_child != child {
                    resolved = resolved.update_immediate_child(key, new_child);
                }
            }
            if &priority != resolved.priority() {
                resolved = resolved.update_immediate_child(&ChildKey::priority(), priority);
            }
            resolved
        }
    }
}

fn resolve_priority(priority: &Node, existing: &Node, server_values: &ServerValues) -> Node {
    match priority.leaf_value() {
        Some(LeafValue::Deferred(placeholder)) => {
            match resolve_deferred_value(placeholder, existing, server_values) {
                LeafValue::Long(value) => Node::double(value as f64),
                other => Node::leaf(other),
            }
        }
        _ => priority.clone(),
    }
}
