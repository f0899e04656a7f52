use super::child_key::ChildKey;
use super::node::Node;

/// A child node together with its key.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedNode {
    pub name: ChildKey,
    pub node: Node,
}

impl NamedNode {
    pub fn new(name: ChildKey, node: Node) -> Self {
        Self { name, node }
    }

    /// Sorts before every real child under any index.
    pub fn min() -> Self {
        Self::new(ChildKey::min(), Node::Empty)
    }
}
