use std::cmp::Ordering;

use crate::database::snapshot::{ChildKey, Index, NamedNode, Node, Path};
use crate::database::view::CacheNode;
use crate::util::{hard_assert, hard_fail};

use super::operation::{merge_order, AckedWrite};

#[derive(Clone, Debug, PartialEq)]
pub enum WriteData {
    Overwrite(Node),
    /// Children relative to the write path.
    Merge(Vec<(Path, Node)>),
}

/// A local write that the server has not acknowledged yet.
#[derive(Clone, Debug, PartialEq)]
pub struct UserWrite {
    pub write_id: i64,
    pub path: Path,
    pub data: WriteData,
    /// Hidden writes are tracked for acks but never shown to listeners.
    pub visible: bool,
}

impl UserWrite {
    /// Whether the write covers `path` entirely.
    pub fn contains_path(&self, path: &Path) -> bool {
        match &self.data {
            WriteData::Overwrite(_) => self.path.contains(path),
            WriteData::Merge(children) => children
                .iter()
                .any(|(child, _)| self.path.child_path(child).contains(path)),
        }
    }

    /// The paths an ack of this write touches.
    pub fn affected(&self) -> AckedWrite {
        match &self.data {
            WriteData::Overwrite(_) => AckedWrite::Overwrite,
            WriteData::Merge(children) => {
                AckedWrite::Merge(children.iter().map(|(path, _)| path.clone()).collect())
            }
        }
    }

    /// Absolute `(path, node)` pairs in the order they apply.
    fn entries(&self) -> Vec<(Path, &Node)> {
        match &self.data {
            WriteData::Overwrite(node) => vec![(self.path.clone(), node)],
            WriteData::Merge(children) => merge_order(children)
                .into_iter()
                .map(|(path, node)| (self.path.child_path(path), node))
                .collect(),
        }
    }
}

/// Pending local writes, oldest first.
///
/// Reads layer the visible writes over whatever server data the caller has,
/// in write order, so a later write to a location shadows earlier ones.
#[derive(Clone, Debug, Default)]
pub struct WriteTree {
    writes: Vec<UserWrite>,
    last_write_id: Option<i64>,
}

impl WriteTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, write: UserWrite) {
        hard_assert(
            self.last_write_id.map_or(true, |last| write.write_id > last),
            "Stacking an older write on top of newer ones",
        );
        self.last_write_id = Some(write.write_id);
        self.writes.push(write);
    }

    pub fn add_overwrite(&mut self, path: Path, snapshot: Node, write_id: i64, visible: bool) {
        self.record(UserWrite {
            write_id,
            path,
            data: WriteData::Overwrite(snapshot),
            visible,
        });
    }

    pub fn add_merge(&mut self, path: Path, children: Vec<(Path, Node)>, write_id: i64) {
        self.record(UserWrite {
            write_id,
            path,
            data: WriteData::Merge(children),
            visible: true,
        });
    }

    pub fn write(&self, write_id: i64) -> Option<&UserWrite> {
        self.writes.iter().find(|write| write.write_id == write_id)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Drops the write `write_id`. Returns `true` when views need to be
    /// recalculated, which is not the case for hidden writes or writes fully
    /// shadowed by a later visible write.
    pub fn remove_write(&mut self, write_id: i64) -> bool {
        let Some(position) = self
            .writes
            .iter()
            .position(|write| write.write_id == write_id)
        else {
            hard_fail("remove_write called with nonexistent write id");
        };
        let removed = self.writes.remove(position);
        if !removed.visible {
            return false;
        }
        !self.writes[position..]
            .iter()
            .any(|later| later.visible && later.contains_path(&removed.path))
    }

    /// Removes every pending write, returning them oldest first.
    pub fn purge_all_writes(&mut self) -> Vec<UserWrite> {
        std::mem::take(&mut self.writes)
    }

    /// A view of the writes as seen from `path`.
    pub fn child_writes(&self, path: &Path) -> WriteTreeRef<'_> {
        WriteTreeRef {
            tree_path: path.clone(),
            writes: self,
        }
    }

    /// `base` at `path` with the visible writes applied. Yields `None` when
    /// `base` is unknown and no write covers `path` entirely.
    fn layer(&self, path: &Path, base: Option<Node>) -> Option<Node> {
        self.writes
            .iter()
            .filter(|write| write.visible)
            .flat_map(UserWrite::entries)
            .fold(base, |acc, (write_path, snapshot)| {
                if let Some(relative) = Path::relative(&write_path, path) {
                    Some(snapshot.child(&relative))
                } else if let Some(relative) = Path::relative(path, &write_path) {
                    acc.map(|node| node.update_child(&relative, snapshot.clone()))
                } else {
                    acc
                }
            })
    }

    fn written_children(&self, path: &Path) -> Vec<ChildKey> {
        let mut keys: Vec<ChildKey> = self
            .writes
            .iter()
            .filter(|write| write.visible)
            .flat_map(UserWrite::entries)
            .filter_map(|(write_path, _)| {
                let relative = Path::relative(path, &write_path)?;
                if relative.len() == 1 {
                    relative.front().cloned()
                } else {
                    None
                }
            })
            .filter(|key| !key.is_priority_key())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// The writes of a [`WriteTree`] seen from one location.
///
/// Every calculation takes the server data the caller knows about and returns
/// what listeners at that location should see once local writes are applied.
#[derive(Clone, Debug)]
pub struct WriteTreeRef<'a> {
    tree_path: Path,
    writes: &'a WriteTree,
}

impl<'a> WriteTreeRef<'a> {
    pub fn path(&self) -> &Path {
        &self.tree_path
    }

    /// The write data covering `path` completely, if any.
    pub fn shadowing_write(&self, path: &Path) -> Option<Node> {
        self.writes.layer(&self.tree_path.child_path(path), None)
    }

    /// The complete event cache, or `None` when neither the server data nor
    /// the writes cover the location.
    pub fn calc_complete_event_cache(&self, complete_server_cache: Option<&Node>) -> Option<Node> {
        self.writes
            .layer(&self.tree_path, complete_server_cache.cloned())
    }

    /// Every child that is complete once writes are applied to the complete
    /// server children.
    pub fn calc_complete_event_children(&self, complete_server_children: &Node) -> Node {
        if let Some(top_level) = self.writes.layer(&self.tree_path, None) {
            let mut children = Node::Empty;
            if !top_level.is_leaf_node() {
                for (key, child) in top_level.iter() {
                    children = children.update_immediate_child(key, child.clone());
                }
            }
            return children;
        }

        let mut children = Node::Empty;
        for (key, child) in complete_server_children.iter() {
            let layered = self
                .writes
                .layer(&self.tree_path.child(key), Some(child.clone()))
                .unwrap_or_else(|| child.clone());
            children = children.update_immediate_child(key, layered);
        }
        for key in self.writes.written_children(&self.tree_path) {
            if let Some(node) = self.writes.layer(&self.tree_path.child(&key), None) {
                children = children.update_immediate_child(&key, node);
            }
        }
        children
    }

    /// The new event data at `child_path` after the server overwrote it, or
    /// `None` when a local write hides the change.
    pub fn calc_event_cache_after_server_overwrite(
        &self,
        child_path: &Path,
        server_node: &Node,
    ) -> Option<Node> {
        let path = self.tree_path.child_path(child_path);
        if self.writes.layer(&path, None).is_some() {
            return None;
        }
        self.writes.layer(&path, Some(server_node.child(child_path)))
    }

    /// The complete event child `key`, if the writes or the server cache
    /// cover it.
    pub fn calc_complete_child(&self, key: &ChildKey, server_cache: &CacheNode) -> Option<Node> {
        let base = server_cache
            .is_complete_for_child(key)
            .then(|| server_cache.node().immediate_child(key));
        self.writes.layer(&self.tree_path.child(key), base)
    }

    /// The first child after `post` in index order, with writes applied.
    pub fn calc_next_node_after_post(
        &self,
        complete_server_data: Option<&Node>,
        post: &NamedNode,
        reverse: bool,
        index: &Index,
    ) -> Option<NamedNode> {
        let node = self
            .writes
            .layer(&self.tree_path, complete_server_data.cloned())?;
        node.named_children()
            .filter(|child| index.compare_with(child, post, reverse) == Ordering::Greater)
            .min_by(|left, right| index.compare_with(left, right, reverse))
    }

    /// The writes seen from the child `key`.
    pub fn child(&self, key: &ChildKey) -> WriteTreeRef<'a> {
        WriteTreeRef {
            tree_path: self.tree_path.child(key),
            writes: self.writes,
        }
    }
}
