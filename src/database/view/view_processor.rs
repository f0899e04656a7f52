use std::collections::BTreeMap;

use crate::database::core::{apply_merge, AckedWrite, Operation, WriteTreeRef};
use crate::database::snapshot::{ChildKey, Index, IndexedNode, NamedNode, Node, Path};
use crate::util::{hard_assert, hard_fail};

use super::cache_node::CacheNode;
use super::change::Change;
use super::child_change_accumulator::ChildChangeAccumulator;
use super::filter::{CompleteChildSource, NoCompleteChildSource, NodeFilter};
use super::view_cache::ViewCache;

/// The new caches of a view plus the changes listeners should hear about.
#[derive(Clone, Debug)]
pub struct ProcessorResult {
    pub view_cache: ViewCache,
    pub changes: Vec<Change>,
}

/// Resolves complete children from the event cache first, then from server
/// data with local writes applied.
pub struct WriteTreeCompleteChildSource<'a> {
    writes: &'a WriteTreeRef<'a>,
    view_cache: &'a ViewCache,
    complete_server_cache: Option<&'a Node>,
}

impl<'a> WriteTreeCompleteChildSource<'a> {
    pub fn new(
        writes: &'a WriteTreeRef<'a>,
        view_cache: &'a ViewCache,
        complete_server_cache: Option<&'a Node>,
    ) -> Self {
        Self {
            writes,
            view_cache,
            complete_server_cache,
        }
    }
}

impl CompleteChildSource for WriteTreeCompleteChildSource<'_> {
    fn complete_child(&self, key: &ChildKey) -> Option<Node> {
        let event_cache = self.view_cache.event_cache();
        if event_cache.is_complete_for_child(key) {
            return Some(event_cache.node().immediate_child(key));
        }
        match self.complete_server_cache {
            Some(server) => {
                let server_cache = CacheNode::new(
                    IndexedNode::new(server.clone(), Index::Key),
                    true,
                    false,
                );
                self.writes.calc_complete_child(key, &server_cache)
            }
            None => self
                .writes
                .calc_complete_child(key, self.view_cache.server_cache()),
        }
    }

    fn child_after_child(
        &self,
        index: &Index,
        child: &NamedNode,
        reverse: bool,
    ) -> Option<NamedNode> {
        let server = self
            .complete_server_cache
            .or_else(|| self.view_cache.complete_server_snap());
        self.writes
            .calc_next_node_after_post(server, child, reverse, index)
    }
}

/// Applies operations to a [`ViewCache`] through the view's query filter.
#[derive(Clone, Debug)]
pub struct ViewProcessor {
    filter: NodeFilter,
}

impl ViewProcessor {
    pub fn new(filter: NodeFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &NodeFilter {
        &self.filter
    }

    pub fn apply_operation(
        &self,
        old_view_cache: &ViewCache,
        operation: &Operation,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
    ) -> ProcessorResult {
        let mut accumulator = ChildChangeAccumulator::new();
        let new_view_cache = match operation {
            Operation::Overwrite {
                source,
                path,
                snapshot,
            } => {
                if source.is_from_user() {
                    self.apply_user_overwrite(
                        old_view_cache,
                        path,
                        snapshot,
                        writes,
                        complete_server_cache,
                        &mut accumulator,
                    )
                } else {
                    let filter_server_node = source.is_tagged()
                        || (old_view_cache.server_cache().is_filtered() && !path.is_empty());
                    self.apply_server_overwrite(
                        old_view_cache,
                        path,
                        snapshot,
                        writes,
                        complete_server_cache,
                        filter_server_node,
                        &mut accumulator,
                    )
                }
            }
            Operation::Merge {
                source,
                path,
                children,
            } => {
                if source.is_from_user() {
                    self.apply_user_merge(
                        old_view_cache,
                        path,
                        children,
                        writes,
                        complete_server_cache,
                        &mut accumulator,
                    )
                } else {
                    let filter_server_node =
                        source.is_tagged() || old_view_cache.server_cache().is_filtered();
                    self.apply_server_merge(
                        old_view_cache,
                        path,
                        children,
                        writes,
                        complete_server_cache,
                        filter_server_node,
                        &mut accumulator,
                    )
                }
            }
            Operation::AckUserWrite {
                path,
                affected,
                revert,
            } => {
                if *revert {
                    self.revert_user_write(
                        old_view_cache,
                        path,
                        writes,
                        complete_server_cache,
                        &mut accumulator,
                    )
                } else {
                    self.ack_user_write(
                        old_view_cache,
                        path,
                        affected,
                        writes,
                        complete_server_cache,
                        &mut accumulator,
                    )
                }
            }
            Operation::ListenComplete { path, .. } => {
                self.listen_complete(old_view_cache, path, writes, &mut accumulator)
            }
        };
        let mut changes = accumulator.into_changes();
        maybe_add_value_event(old_view_cache, &new_view_cache, &mut changes);
        ProcessorResult {
            view_cache: new_view_cache,
            changes,
        }
    }

    fn generate_event_cache_after_server_event(
        &self,
        view_cache: ViewCache,
        change_path: &Path,
        writes: &WriteTreeRef<'_>,
        source: &dyn CompleteChildSource,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        if writes.shadowing_write(change_path).is_some() {
            return view_cache;
        }
        let old_event_snap = view_cache.event_cache();
        let new_event_cache = match change_path.front() {
            None => {
                hard_assert(
                    view_cache.server_cache().is_fully_initialized(),
                    "If change path is empty, we must have complete server data",
                );
                let server_node = view_cache.server_cache().node();
                let node_with_local_writes = if view_cache.server_cache().is_filtered() {
                    // Deep writes on filtered data may be incomplete, so only
                    // complete children get writes applied.
                    let complete_children = if server_node.is_leaf_node() {
                        Node::Empty
                    } else {
                        server_node.clone()
                    };
                    writes.calc_complete_event_children(&complete_children)
                } else {
                    writes
                        .calc_complete_event_cache(Some(server_node))
                        .unwrap_or_default()
                };
                let indexed = IndexedNode::new(node_with_local_writes, self.filter.index().clone());
                self.filter.update_full_node(
                    old_event_snap.indexed_node(),
                    indexed,
                    Some(accumulator),
                )
            }
            Some(key) if key.is_priority_key() => {
                hard_assert(
                    change_path.len() == 1,
                    "Can't have a priority with additional path components",
                );
                let server_node = view_cache.server_cache().node();
                match writes.calc_event_cache_after_server_overwrite(change_path, server_node) {
                    Some(priority) => self
                        .filter
                        .update_priority(old_event_snap.indexed_node(), priority),
                    None => old_event_snap.indexed_node().clone(),
                }
            }
            Some(key) => {
                let child_change_path = change_path.pop_front();
                let new_event_child = if old_event_snap.is_complete_for_child(key) {
                    let server_node = view_cache.server_cache().node();
                    let old_child = old_event_snap.node().immediate_child(key);
                    match writes.calc_event_cache_after_server_overwrite(change_path, server_node) {
                        Some(update) => Some(old_child.update_child(&child_change_path, update)),
                        None => Some(old_child),
                    }
                } else {
                    writes.calc_complete_child(key, view_cache.server_cache())
                };
                match new_event_child {
                    Some(child) => self.filter.update_child(
                        old_event_snap.indexed_node(),
                        key,
                        child,
                        &child_change_path,
                        source,
                        Some(accumulator),
                    ),
                    None => old_event_snap.indexed_node().clone(),
                }
            }
        };
        let complete = old_event_snap.is_fully_initialized() || change_path.is_empty();
        view_cache.update_event_snap(new_event_cache, complete, self.filter.filters_nodes())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_server_overwrite(
        &self,
        old_view_cache: &ViewCache,
        change_path: &Path,
        changed_snap: &Node,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        filter_server_node: bool,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_server_snap = old_view_cache.server_cache();
        let server_filter = if filter_server_node {
            self.filter.clone()
        } else {
            self.filter.indexed_filter()
        };

        let new_server_cache = match change_path.front() {
            None => server_filter.update_full_node(
                old_server_snap.indexed_node(),
                IndexedNode::new(changed_snap.clone(), server_filter.index().clone()),
                None,
            ),
            Some(key) if server_filter.filters_nodes() && !old_server_snap.is_filtered() => {
                // First filtered update for this cache: filter it as a whole.
                let update_path = change_path.pop_front();
                let new_child = old_server_snap
                    .node()
                    .immediate_child(key)
                    .update_child(&update_path, changed_snap.clone());
                let new_server_node = old_server_snap.indexed_node().update_child(key, new_child);
                server_filter.update_full_node(
                    old_server_snap.indexed_node(),
                    new_server_node,
                    None,
                )
            }
            Some(key) => {
                if !old_server_snap.is_complete_for_path(change_path) && change_path.len() > 1 {
                    // Deep updates to incomplete children belong to other listeners.
                    return old_view_cache.clone();
                }
                let child_change_path = change_path.pop_front();
                let new_child = old_server_snap
                    .node()
                    .immediate_child(key)
                    .update_child(&child_change_path, changed_snap.clone());
                if key.is_priority_key() {
                    server_filter.update_priority(old_server_snap.indexed_node(), new_child)
                } else {
                    server_filter.update_child(
                        old_server_snap.indexed_node(),
                        key,
                        new_child,
                        &child_change_path,
                        &NoCompleteChildSource,
                        None,
                    )
                }
            }
        };

        let new_view_cache = old_view_cache.update_server_snap(
            new_server_cache,
            old_server_snap.is_fully_initialized() || change_path.is_empty(),
            server_filter.filters_nodes(),
        );
        let source =
            WriteTreeCompleteChildSource::new(writes, &new_view_cache, complete_server_cache);
        self.generate_event_cache_after_server_event(
            new_view_cache.clone(),
            change_path,
            writes,
            &source,
            accumulator,
        )
    }

    fn apply_user_overwrite(
        &self,
        old_view_cache: &ViewCache,
        change_path: &Path,
        changed_snap: &Node,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_event_snap = old_view_cache.event_cache();
        let source =
            WriteTreeCompleteChildSource::new(writes, old_view_cache, complete_server_cache);

        let Some(key) = change_path.front() else {
            let indexed = IndexedNode::new(changed_snap.clone(), self.filter.index().clone());
            let new_event_cache =
                self.filter
                    .update_full_node(old_event_snap.indexed_node(), indexed, Some(accumulator));
            return old_view_cache.update_event_snap(
                new_event_cache,
                true,
                self.filter.filters_nodes(),
            );
        };

        if key.is_priority_key() {
            let new_event_cache = self
                .filter
                .update_priority(old_event_snap.indexed_node(), changed_snap.clone());
            return old_view_cache.update_event_snap(
                new_event_cache,
                old_event_snap.is_fully_initialized(),
                old_event_snap.is_filtered(),
            );
        }

        let child_change_path = change_path.pop_front();
        let old_child = old_event_snap.node().immediate_child(key);
        let new_child = if child_change_path.is_empty() {
            changed_snap.clone()
        } else {
            match source.complete_child(key) {
                Some(child) => {
                    let is_priority_on_missing_node = child_change_path
                        .back()
                        .is_some_and(ChildKey::is_priority_key)
                        && child_change_path
                            .parent()
                            .is_some_and(|parent| child.child(&parent).is_empty());
                    if is_priority_on_missing_node {
                        // The server sends the priority along if the node exists.
                        child
                    } else {
                        child.update_child(&child_change_path, changed_snap.clone())
                    }
                }
                None => Node::Empty,
            }
        };

        if old_child == new_child {
            return old_view_cache.clone();
        }
        let new_event_snap = self.filter.update_child(
            old_event_snap.indexed_node(),
            key,
            new_child,
            &child_change_path,
            &source,
            Some(accumulator),
        );
        old_view_cache.update_event_snap(
            new_event_snap,
            old_event_snap.is_fully_initialized(),
            self.filter.filters_nodes(),
        )
    }

    fn apply_user_merge(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        children: &[(Path, Node)],
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        // Children already in view go first: in a limited window they may make
        // room for the others.
        let mut current = view_cache.clone();
        for in_view in [true, false] {
            for (child_path, node) in children {
                let write_path = path.child_path(child_path);
                let Some(front) = write_path.front() else {
                    hard_fail("Can't have a merge that is an overwrite");
                };
                if view_cache.event_cache().is_complete_for_child(front) == in_view {
                    current = self.apply_user_overwrite(
                        &current,
                        &write_path,
                        node,
                        writes,
                        complete_server_cache,
                        accumulator,
                    );
                }
            }
        }
        current
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_server_merge(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        children: &[(Path, Node)],
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        filter_server_node: bool,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        // Without any server data this merge was meant for an earlier listen;
        // complete data for this one follows.
        if view_cache.server_cache().node().is_empty()
            && !view_cache.server_cache().is_fully_initialized()
        {
            return view_cache.clone();
        }

        let mut child_merges: BTreeMap<ChildKey, Vec<(Path, Node)>> = BTreeMap::new();
        for (child_path, node) in children {
            let write_path = path.child_path(child_path);
            let Some(front) = write_path.front() else {
                hard_fail("Can't have a merge that is an overwrite");
            };
            child_merges
                .entry(front.clone())
                .or_default()
                .push((write_path.pop_front(), node.clone()));
        }

        let server_node = view_cache.server_cache().node().clone();
        let mut current = view_cache.clone();
        // Children the server cache already has go first, as for user merges.
        for (key, merge) in &child_merges {
            if server_node.has_child(key) {
                let new_child = apply_merge(server_node.immediate_child(key), merge);
                current = self.apply_server_overwrite(
                    &current,
                    &Path::from(key.clone()),
                    &new_child,
                    writes,
                    complete_server_cache,
                    filter_server_node,
                    accumulator,
                );
            }
        }
        for (key, merge) in &child_merges {
            let has_root_write = merge.iter().any(|(rest, _)| rest.is_empty());
            let is_unknown_deep_merge =
                !view_cache.server_cache().is_complete_for_child(key) && !has_root_write;
            if !server_node.has_child(key) && !is_unknown_deep_merge {
                let new_child = apply_merge(server_node.immediate_child(key), merge);
                current = self.apply_server_overwrite(
                    &current,
                    &Path::from(key.clone()),
                    &new_child,
                    writes,
                    complete_server_cache,
                    filter_server_node,
                    accumulator,
                );
            }
        }
        current
    }

    fn ack_user_write(
        &self,
        view_cache: &ViewCache,
        ack_path: &Path,
        affected: &AckedWrite,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        if writes.shadowing_write(ack_path).is_some() {
            return view_cache.clone();
        }
        // Re-apply the server data the write was hiding, now that it is gone.
        let filter_server_node = view_cache.server_cache().is_filtered();
        let server_cache = view_cache.server_cache();
        match affected {
            AckedWrite::Overwrite => {
                if (ack_path.is_empty() && server_cache.is_fully_initialized())
                    || server_cache.is_complete_for_path(ack_path)
                {
                    self.apply_server_overwrite(
                        view_cache,
                        ack_path,
                        &server_cache.node().child(ack_path),
                        writes,
                        complete_server_cache,
                        filter_server_node,
                        accumulator,
                    )
                } else if ack_path.is_empty() {
                    // Acked at this location without full data: replay what we
                    // have as a merge.
                    let children: Vec<(Path, Node)> = server_cache
                        .node()
                        .iter()
                        .map(|(key, child)| (Path::from(key.clone()), child.clone()))
                        .collect();
                    self.apply_server_merge(
                        view_cache,
                        ack_path,
                        &children,
                        writes,
                        complete_server_cache,
                        filter_server_node,
                        accumulator,
                    )
                } else {
                    view_cache.clone()
                }
            }
            AckedWrite::Merge(paths) => {
                let children: Vec<(Path, Node)> = paths
                    .iter()
                    .filter_map(|merge_path| {
                        let server_cache_path = ack_path.child_path(merge_path);
                        server_cache
                            .is_complete_for_path(&server_cache_path)
                            .then(|| {
                                (
                                    merge_path.clone(),
                                    server_cache.node().child(&server_cache_path),
                                )
                            })
                    })
                    .collect();
                self.apply_server_merge(
                    view_cache,
                    ack_path,
                    &children,
                    writes,
                    complete_server_cache,
                    filter_server_node,
                    accumulator,
                )
            }
        }
    }

    fn revert_user_write(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        if writes.shadowing_write(path).is_some() {
            return view_cache.clone();
        }
        let source = WriteTreeCompleteChildSource::new(writes, view_cache, complete_server_cache);
        let old_event_cache = view_cache.event_cache().indexed_node();
        let server_cache = view_cache.server_cache();

        let new_event_cache = match path.front() {
            Some(key) if !key.is_priority_key() => {
                let child_path = path.pop_front();
                let mut new_child = writes.calc_complete_child(key, server_cache);
                if new_child.is_none() && server_cache.is_complete_for_child(key) {
                    new_child = Some(old_event_cache.node().immediate_child(key));
                }
                let mut new_event_cache = match new_child {
                    Some(child) => self.filter.update_child(
                        old_event_cache,
                        key,
                        child,
                        &child_path,
                        &source,
                        Some(accumulator),
                    ),
                    None if view_cache.event_cache().node().has_child(key) => {
                        // Nothing complete to show; drop the stale child.
                        self.filter.update_child(
                            old_event_cache,
                            key,
                            Node::Empty,
                            &child_path,
                            &source,
                            Some(accumulator),
                        )
                    }
                    None => old_event_cache.clone(),
                };
                if new_event_cache.node().is_empty() && server_cache.is_fully_initialized() {
                    // With every child write reverted the location may be a leaf again.
                    let complete = writes
                        .calc_complete_event_cache(view_cache.complete_server_snap())
                        .unwrap_or_default();
                    if complete.is_leaf_node() {
                        let indexed = IndexedNode::new(complete, self.filter.index().clone());
                        new_event_cache =
                            self.filter
                                .update_full_node(&new_event_cache, indexed, Some(accumulator));
                    }
                }
                new_event_cache
            }
            _ => {
                let new_node = if server_cache.is_fully_initialized() {
                    writes
                        .calc_complete_event_cache(view_cache.complete_server_snap())
                        .unwrap_or_default()
                } else {
                    writes.calc_complete_event_children(server_cache.node())
                };
                let indexed = IndexedNode::new(new_node, self.filter.index().clone());
                self.filter
                    .update_full_node(old_event_cache, indexed, Some(accumulator))
            }
        };
        let complete = server_cache.is_fully_initialized()
            || writes.shadowing_write(&Path::root()).is_some();
        view_cache.update_event_snap(new_event_cache, complete, self.filter.filters_nodes())
    }

    fn listen_complete(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        writes: &WriteTreeRef<'_>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_server_node = view_cache.server_cache();
        let new_view_cache = view_cache.update_server_snap(
            old_server_node.indexed_node().clone(),
            old_server_node.is_fully_initialized() || path.is_empty(),
            old_server_node.is_filtered(),
        );
        self.generate_event_cache_after_server_event(
            new_view_cache,
            path,
            writes,
            &NoCompleteChildSource,
            accumulator,
        )
    }
}

/// Adds a value change when the event cache is complete and anything a value
/// listener could observe changed.
fn maybe_add_value_event(
    old_view_cache: &ViewCache,
    new_view_cache: &ViewCache,
    changes: &mut Vec<Change>,
) {
    let event_snap = new_view_cache.event_cache();
    if !event_snap.is_fully_initialized() {
        return;
    }
    let node = event_snap.node();
    let is_leaf_or_empty = node.is_leaf_node() || node.is_empty();
    let needs_value = match old_view_cache.complete_event_snap() {
        None => true,
        Some(old_node) => {
            !changes.is_empty()
                || (is_leaf_or_empty && node != old_node)
                || node.priority() != old_node.priority()
        }
    };
    if needs_value {
        changes.push(Change::value(event_snap.indexed_node().clone()));
    }
}
