use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Number, Value};

use crate::database::collection::ImmutableSortedMap;
use crate::util::{hard_assert, sha1_base64};

use super::child_key::ChildKey;
use super::index::Index;
use super::named_node::NamedNode;
use super::path::Path;

pub type ChildrenMap = ImmutableSortedMap<ChildKey, Node>;

/// The empty node. Equality is by value, so any `Node::Empty` compares equal.
pub const EMPTY_NODE: Node = Node::Empty;

static EMPTY: Node = Node::Empty;

/// Scalar stored in a leaf node.
#[derive(Clone, Debug)]
pub enum LeafValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    /// Server value placeholder such as `{".sv": "timestamp"}`, resolved later.
    Deferred(Map<String, Value>),
}

impl LeafValue {
    fn type_rank(&self) -> u8 {
        match self {
            LeafValue::Deferred(_) => 0,
            LeafValue::Boolean(_) => 1,
            LeafValue::Long(_) | LeafValue::Double(_) => 2,
            LeafValue::String(_) => 3,
        }
    }

    fn compare(&self, other: &LeafValue) -> Ordering {
        match (self, other) {
            (LeafValue::String(a), LeafValue::String(b)) => a.cmp(b),
            (LeafValue::Boolean(a), LeafValue::Boolean(b)) => a.cmp(b),
            (LeafValue::Long(a), LeafValue::Long(b)) => a.cmp(b),
            (LeafValue::Long(a), LeafValue::Double(b)) => (*a as f64).total_cmp(b),
            (LeafValue::Double(a), LeafValue::Long(b)) => a.total_cmp(&(*b as f64)),
            (LeafValue::Double(a), LeafValue::Double(b)) => a.total_cmp(b),
            (LeafValue::Deferred(_), LeafValue::Deferred(_)) => Ordering::Equal,
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LeafValue::Long(value) => Some(*value as f64),
            LeafValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            LeafValue::String(value) => Value::String(value.clone()),
            LeafValue::Long(value) => Value::Number(Number::from(*value)),
            LeafValue::Double(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            LeafValue::Boolean(value) => Value::Bool(*value),
            LeafValue::Deferred(value) => Value::Object(value.clone()),
        }
    }

    fn hash_representation(&self) -> String {
        match self {
            LeafValue::String(value) => format!("string:{value}"),
            LeafValue::Long(value) => format!("number:{}", double_to_hash_string(*value as f64)),
            LeafValue::Double(value) => format!("number:{}", double_to_hash_string(*value)),
            LeafValue::Boolean(value) => format!("boolean:{value}"),
            LeafValue::Deferred(value) => {
                format!("deferredValue:{}", Value::Object(value.clone()))
            }
        }
    }
}

impl PartialEq for LeafValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LeafValue::String(a), LeafValue::String(b)) => a == b,
            (LeafValue::Long(a), LeafValue::Long(b)) => a == b,
            (LeafValue::Double(a), LeafValue::Double(b)) => a.to_bits() == b.to_bits(),
            (LeafValue::Boolean(a), LeafValue::Boolean(b)) => a == b,
            (LeafValue::Deferred(a), LeafValue::Deferred(b)) => a == b,
            _ => false,
        }
    }
}

fn double_to_hash_string(value: f64) -> String {
    format!("{:016x}", value.to_bits())
}

pub struct LeafNode {
    value: LeafValue,
    priority: Node,
    hash: OnceCell<String>,
}

pub struct ChildrenNode {
    children: ChildrenMap,
    priority: Node,
    hash: OnceCell<String>,
}

/// Immutable value in the synchronized tree.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Leaf(Arc<LeafNode>),
    Children(Arc<ChildrenNode>),
}

/// A priority is empty or an unprioritized number, string or server value leaf.
pub fn is_valid_priority(priority: &Node) -> bool {
    match priority {
        Node::Empty => true,
        Node::Leaf(leaf) => {
            leaf.priority.is_empty() && !matches!(leaf.value, LeafValue::Boolean(_))
        }
        Node::Children(_) => false,
    }
}

impl Node {
    pub fn leaf(value: LeafValue) -> Self {
        Self::leaf_with_priority(value, Node::Empty)
    }

    pub fn leaf_with_priority(value: LeafValue, priority: Node) -> Self {
        hard_assert(is_valid_priority(&priority), "Invalid priority for leaf node");
        Node::Leaf(Arc::new(LeafNode {
            value,
            priority,
            hash: OnceCell::new(),
        }))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::leaf(LeafValue::String(value.into()))
    }

    pub fn long(value: i64) -> Self {
        Self::leaf(LeafValue::Long(value))
    }

    pub fn double(value: f64) -> Self {
        Self::leaf(LeafValue::Double(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::leaf(LeafValue::Boolean(value))
    }

    /// Builds a node from a children map.
    ///
    /// An empty map yields [`Node::Empty`]. Pairing an empty map with a priority
    /// is an invariant violation.
    pub fn from_children(children: ChildrenMap, priority: Node) -> Self {
        hard_assert(
            !(children.is_empty() && !priority.is_empty()),
            "Can't create empty ChildrenNode with priority!",
        );
        if children.is_empty() {
            return Node::Empty;
        }
        hard_assert(is_valid_priority(&priority), "Invalid priority for children node");
        Node::Children(Arc::new(ChildrenNode {
            children,
            priority,
            hash: OnceCell::new(),
        }))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub fn is_leaf_node(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn leaf_value(&self) -> Option<&LeafValue> {
        match self {
            Node::Leaf(leaf) => Some(&leaf.value),
            _ => None,
        }
    }

    pub fn children_map(&self) -> Option<&ChildrenMap> {
        match self {
            Node::Children(node) => Some(&node.children),
            _ => None,
        }
    }

    pub fn priority(&self) -> &Node {
        match self {
            Node::Empty => &EMPTY,
            Node::Leaf(leaf) => &leaf.priority,
            Node::Children(node) => &node.priority,
        }
    }

    pub fn update_priority(&self, priority: Node) -> Node {
        match self {
            Node::Empty => Node::Empty,
            Node::Leaf(leaf) => Node::leaf_with_priority(leaf.value.clone(), priority),
            Node::Children(node) => Node::from_children(node.children.clone(), priority),
        }
    }

    pub fn immediate_child(&self, key: &ChildKey) -> Node {
        if key.is_priority_key() {
            return self.priority().clone();
        }
        match self {
            Node::Children(node) => node.children.get(key).cloned().unwrap_or_default(),
            _ => Node::Empty,
        }
    }

    pub fn child(&self, path: &Path) -> Node {
        match path.front() {
            None => self.clone(),
            Some(front) if front.is_priority_key() => self.priority().clone(),
            Some(front) => self.immediate_child(front).child(&path.pop_front()),
        }
    }

    pub fn has_child(&self, key: &ChildKey) -> bool {
        !self.immediate_child(key).is_empty()
    }

    pub fn update_immediate_child(&self, key: &ChildKey, new_child: Node) -> Node {
        if key.is_priority_key() {
            return self.update_priority(new_child);
        }
        match self {
            Node::Empty if new_child.is_empty() => Node::Empty,
            Node::Empty => {
                Node::from_children(ChildrenMap::new().insert(key.clone(), new_child), Node::Empty)
            }
            Node::Leaf(leaf) => {
                if new_child.is_empty() {
                    return self.clone();
                }
                Node::Empty
                    .update_immediate_child(key, new_child)
                    .update_priority(leaf.priority.clone())
            }
            Node::Children(node) => {
                let mut children = node.children.remove(key);
                if !new_child.is_empty() {
                    children = children.insert(key.clone(), new_child);
                }
                if children.is_empty() {
                    Node::Empty
                } else {
                    Node::from_children(children, node.priority.clone())
                }
            }
        }
    }

    /// Replaces the node at `path`, creating intermediate children as needed.
    /// Writing [`Node::Empty`] deletes the location and prunes emptied parents.
    pub fn update_child(&self, path: &Path, new_child: Node) -> Node {
        let Some(front) = path.front() else {
            return new_child;
        };
        let rest = path.pop_front();
        match self {
            Node::Empty => {
                if front.is_priority_key() {
                    return Node::Empty;
                }
                let child = Node::Empty.update_child(&rest, new_child);
                self.update_immediate_child(front, child)
            }
            Node::Leaf(_) => {
                if new_child.is_empty() && !front.is_priority_key() {
                    return self.clone();
                }
                hard_assert(
                    !front.is_priority_key() || path.len() == 1,
                    "Can't have a priority with additional path components",
                );
                let child = Node::Empty.update_child(&rest, new_child);
                self.update_immediate_child(front, child)
            }
            Node::Children(_) => {
                if front.is_priority_key() {
                    hard_assert(is_valid_priority(&new_child), "Invalid priority");
                    return self.update_priority(new_child);
                }
                let child = self.immediate_child(front).update_child(&rest, new_child);
                self.update_immediate_child(front, child)
            }
        }
    }

    pub fn child_count(&self) -> usize {
        self.children_map().map_or(0, ChildrenMap::len)
    }

    pub fn first_child_key(&self) -> Option<&ChildKey> {
        self.children_map().and_then(ChildrenMap::min_key)
    }

    pub fn last_child_key(&self) -> Option<&ChildKey> {
        self.children_map().and_then(ChildrenMap::max_key)
    }

    pub fn predecessor_child_key(&self, key: &ChildKey) -> Option<&ChildKey> {
        self.children_map()
            .and_then(|children| children.predecessor_key(key))
    }

    pub fn successor_child_key(&self, key: &ChildKey) -> Option<&ChildKey> {
        self.children_map()
            .and_then(|children| children.successor_key(key))
    }

    /// Children in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChildKey, &Node)> {
        self.children_map().into_iter().flat_map(ChildrenMap::iter)
    }

    /// Children in reverse key order.
    pub fn reverse_iter(&self) -> impl Iterator<Item = (&ChildKey, &Node)> {
        self.children_map()
            .into_iter()
            .flat_map(ChildrenMap::reverse_iter)
    }

    pub fn named_children(&self) -> impl Iterator<Item = NamedNode> + '_ {
        self.iter()
            .map(|(key, node)| NamedNode::new(key.clone(), node.clone()))
    }

    /// Base64 SHA-1 of the canonical representation; `""` for the empty node.
    pub fn hash(&self) -> &str {
        match self {
            Node::Empty => "",
            Node::Leaf(leaf) => leaf
                .hash
                .get_or_init(|| sha1_base64(&self.hash_representation())),
            Node::Children(node) => node.hash.get_or_init(|| {
                let representation = self.hash_representation();
                if representation.is_empty() {
                    String::new()
                } else {
                    sha1_base64(&representation)
                }
            }),
        }
    }

    fn priority_hash_prefix(&self) -> String {
        let priority = self.priority();
        if priority.is_empty() {
            String::new()
        } else {
            format!("priority:{}:", priority.hash_representation())
        }
    }

    fn hash_representation(&self) -> String {
        match self {
            Node::Empty => String::new(),
            Node::Leaf(leaf) => {
                let mut representation = self.priority_hash_prefix();
                representation.push_str(&leaf.value.hash_representation());
                representation
            }
            Node::Children(node) => {
                let mut representation = self.priority_hash_prefix();
                let mut children: Vec<NamedNode> = self.named_children().collect();
                if node.children.values().any(|child| !child.priority().is_empty()) {
                    let index = Index::Priority;
                    children.sort_by(|a, b| index.compare(a, b));
                }
                for child in &children {
                    let hash = child.node.hash();
                    if !hash.is_empty() {
                        representation.push(':');
                        representation.push_str(child.name.as_str());
                        representation.push(':');
                        representation.push_str(hash);
                    }
                }
                representation
            }
        }
    }

    /// JSON form of the node.
    ///
    /// With `export` set, priorities are included as `.priority` entries (and
    /// prioritized leaves as `{".value": .., ".priority": ..}`). Without it,
    /// children keyed by dense non-negative integers come back as an array.
    pub fn value(&self, export: bool) -> Value {
        match self {
            Node::Empty => Value::Null,
            Node::Leaf(leaf) => {
                if export && !leaf.priority.is_empty() {
                    let mut map = Map::with_capacity(2);
                    map.insert(".value".to_string(), leaf.value.to_json());
                    map.insert(".priority".to_string(), leaf.priority.value(false));
                    Value::Object(map)
                } else {
                    leaf.value.to_json()
                }
            }
            Node::Children(node) => {
                let mut result = Map::new();
                let mut max_key: i32 = 0;
                let mut all_integer_keys = true;
                for (key, child) in node.children.iter() {
                    result.insert(key.as_str().to_string(), child.value(export));
                    if all_integer_keys {
                        let name = key.as_str();
                        let leading_zero = name.len() > 1 && name.starts_with('0');
                        match key.int_value() {
                            Some(value) if value >= 0 && !leading_zero => {
                                max_key = max_key.max(value);
                            }
                            _ => all_integer_keys = false,
                        }
                    }
                }
                let count = node.children.len();
                if !export && all_integer_keys && (max_key as usize) < 2 * count {
                    let mut array = vec![Value::Null; max_key as usize + 1];
                    for (key, child) in node.children.iter() {
                        let slot = key.int_value().and_then(|i| array.get_mut(i as usize));
                        if let Some(slot) = slot {
                            *slot = child.value(export);
                        }
                    }
                    return Value::Array(array);
                }
                if export && !node.priority.is_empty() {
                    result.insert(".priority".to_string(), node.priority.value(false));
                }
                Value::Object(result)
            }
        }
    }

    /// Total order used by the value index: empty < leaves < children. Leaves
    /// order by type (server values, booleans, numbers, strings) then by value.
    /// All children nodes compare equal.
    pub fn compare_value(&self, other: &Node) -> Ordering {
        match (self, other) {
            (Node::Empty, Node::Empty) => Ordering::Equal,
            (Node::Empty, _) => Ordering::Less,
            (_, Node::Empty) => Ordering::Greater,
            (Node::Leaf(a), Node::Leaf(b)) => a.value.compare(&b.value),
            (Node::Leaf(_), Node::Children(_)) => Ordering::Less,
            (Node::Children(_), Node::Leaf(_)) => Ordering::Greater,
            (Node::Children(_), Node::Children(_)) => Ordering::Equal,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Empty, Node::Empty) => true,
            (Node::Leaf(a), Node::Leaf(b)) => {
                Arc::ptr_eq(a, b) || (a.value == b.value && a.priority == b.priority)
            }
            (Node::Children(a), Node::Children(b)) => {
                Arc::ptr_eq(a, b) || (a.priority == b.priority && a.children == b.children)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.value(true))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value(true))
    }
}
