use crate::database::snapshot::{IndexedNode, Node};

use super::cache_node::CacheNode;

/// The pair of caches a view keeps: what listeners have seen (`event_cache`,
/// server data with local writes applied) and what the server has confirmed
/// (`server_cache`).
#[derive(Clone, Debug, PartialEq)]
pub struct ViewCache {
    event_cache: CacheNode,
    server_cache: CacheNode,
}

impl ViewCache {
    pub fn new(event_cache: CacheNode, server_cache: CacheNode) -> Self {
        Self {
            event_cache,
            server_cache,
        }
    }

    /// Nothing loaded yet on either side.
    pub fn empty() -> Self {
        let empty = CacheNode::new(IndexedNode::from_node(Node::Empty), false, false);
        Self::new(empty.clone(), empty)
    }

    pub fn update_event_snap(
        &self,
        event_snap: IndexedNode,
        complete: bool,
        filtered: bool,
    ) -> Self {
        Self::new(
            CacheNode::new(event_snap, complete, filtered),
            self.server_cache.clone(),
        )
    }

    pub fn update_server_snap(
        &self,
        server_snap: IndexedNode,
        complete: bool,
        filtered: bool,
    ) -> Self {
        Self::new(
            self.event_cache.clone(),
            CacheNode::new(server_snap, complete, filtered),
        )
    }

    pub fn event_cache(&self) -> &CacheNode {
        &self.event_cache
    }

    pub fn server_cache(&self) -> &CacheNode {
        &self.server_cache
    }

    /// The event node when it is fully initialized; `None` means unknown.
    pub fn complete_event_snap(&self) -> Option<&Node> {
        self.event_cache
            .is_fully_initialized()
            .then(|| self.event_cache.node())
    }

    /// The server node when it is fully initialized; `None` means unknown.
    pub fn complete_server_snap(&self) -> Option<&Node> {
        self.server_cache
            .is_fully_initialized()
            .then(|| self.server_cache.node())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_distinct_from_empty() {
        let cache = ViewCache::empty();
        assert_eq!(cache.complete_event_snap(), None);
        assert_eq!(cache.complete_server_snap(), None);

        let loaded = cache.update_server_snap(IndexedNode::from_node(Node::Empty), true, false);
        assert_eq!(loaded.complete_server_snap(), Some(&Node::Empty));
        assert_eq!(loaded.complete_event_snap(), None);
        assert_eq!(cache, ViewCache::empty());

        let with_event =
            loaded.update_event_snap(IndexedNode::from_node(Node::long(3)), true, false);
        assert_eq!(with_event.complete_event_snap(), Some(&Node::long(3)));
        assert!(with_event.server_cache().is_fully_initialized());
    }
}
