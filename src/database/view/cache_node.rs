use crate::database::snapshot::{ChildKey, IndexedNode, Node, Path};

/// Cached data for a view together with how much of the location it covers.
///
/// `fully_initialized` means the whole location has been loaded at least once;
/// `filtered` means a query filter may have dropped some children.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheNode {
    indexed_node: IndexedNode,
    fully_initialized: bool,
    filtered: bool,
}

impl CacheNode {
    pub fn new(indexed_node: IndexedNode, fully_initialized: bool, filtered: bool) -> Self {
        Self {
            indexed_node,
            fully_initialized,
            filtered,
        }
    }

    pub fn is_fully_initialized(&self) -> bool {
        self.fully_initialized
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn indexed_node(&self) -> &IndexedNode {
        &self.indexed_node
    }

    pub fn node(&self) -> &Node {
        self.indexed_node.node()
    }

    pub fn is_complete_for_path(&self, path: &Path) -> bool {
        match path.front() {
            None => self.fully_initialized && !self.filtered,
            Some(key) => self.is_complete_for_child(key),
        }
    }

    pub fn is_complete_for_child(&self, key: &ChildKey) -> bool {
        (self.fully_initialized && !self.filtered) || self.node().has_child(key)
    }
}
