use crate::database::snapshot::{ChildKey, Node, Path};

/// Where an operation originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationSource {
    /// A local write made by this client.
    User,
    /// Data sent by the server. `tagged` marks data filtered for one query.
    Server { tagged: bool },
}

impl OperationSource {
    pub fn user() -> Self {
        OperationSource::User
    }

    pub fn server() -> Self {
        OperationSource::Server { tagged: false }
    }

    pub fn tagged_server() -> Self {
        OperationSource::Server { tagged: true }
    }

    pub fn is_from_user(&self) -> bool {
        matches!(self, OperationSource::User)
    }

    pub fn is_from_server(&self) -> bool {
        matches!(self, OperationSource::Server { .. })
    }

    pub fn is_tagged(&self) -> bool {
        matches!(self, OperationSource::Server { tagged: true })
    }
}

/// The locations an acknowledged or reverted write touched.
#[derive(Clone, Debug, PartialEq)]
pub enum AckedWrite {
    /// The whole location at the operation path.
    Overwrite,
    /// Only these paths, relative to the operation path.
    Merge(Vec<Path>),
}

/// A change to apply to a view. Paths are relative to the view's location.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Overwrite {
        source: OperationSource,
        path: Path,
        snapshot: Node,
    },
    Merge {
        source: OperationSource,
        path: Path,
        children: Vec<(Path, Node)>,
    },
    AckUserWrite {
        path: Path,
        affected: AckedWrite,
        revert: bool,
    },
    ListenComplete {
        source: OperationSource,
        path: Path,
    },
}

impl Operation {
    pub fn overwrite(source: OperationSource, path: Path, snapshot: Node) -> Self {
        Operation::Overwrite {
            source,
            path,
            snapshot,
        }
    }

    pub fn merge(source: OperationSource, path: Path, children: Vec<(Path, Node)>) -> Self {
        Operation::Merge {
            source,
            path,
            children,
        }
    }

    pub fn ack_user_write(path: Path, affected: AckedWrite, revert: bool) -> Self {
        Operation::AckUserWrite {
            path,
            affected,
            revert,
        }
    }

    pub fn listen_complete(source: OperationSource, path: Path) -> Self {
        Operation::ListenComplete { source, path }
    }

    pub fn path(&self) -> &Path {
        match self {
            Operation::Overwrite { path, .. }
            | Operation::Merge { path, .. }
            | Operation::AckUserWrite { path, .. }
            | Operation::ListenComplete { path, .. } => path,
        }
    }

    /// Short name of the operation type, as it appears in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Overwrite { .. } => "overwrite",
            Operation::Merge { .. } => "merge",
            Operation::AckUserWrite { revert: true, .. } => "revert_user_write",
            Operation::AckUserWrite { .. } => "ack_user_write",
            Operation::ListenComplete { .. } => "listen_complete",
        }
    }

    /// Acks and reverts always concern local writes.
    pub fn source(&self) -> OperationSource {
        match self {
            Operation::Overwrite { source, .. }
            | Operation::Merge { source, .. }
            | Operation::ListenComplete { source, .. } => *source,
            Operation::AckUserWrite { .. } => OperationSource::User,
        }
    }

    /// The same operation seen from the child `key`, or `None` when the
    /// operation does not reach that child.
    pub fn for_child(&self, key: &ChildKey) -> Option<Operation> {
        let path = self.path();
        if let Some(front) = path.front() {
            if front != key {
                return None;
            }
            let rest = path.pop_front();
            return Some(match self {
                Operation::Overwrite {
                    source, snapshot, ..
                } => Operation::overwrite(*source, rest, snapshot.clone()),
                Operation::Merge {
                    source, children, ..
                } => Operation::merge(*source, rest, children.clone()),
                Operation::AckUserWrite {
                    affected, revert, ..
                } => Operation::ack_user_write(rest, affected.clone(), *revert),
                Operation::ListenComplete { source, .. } => {
                    Operation::listen_complete(*source, rest)
                }
            });
        }

        match self {
            Operation::Overwrite {
                source, snapshot, ..
            } => Some(Operation::overwrite(
                *source,
                Path::root(),
                snapshot.immediate_child(key),
            )),
            Operation::Merge {
                source, children, ..
            } => {
                let mut root_write = None;
                let mut deeper = Vec::new();
                for (child_path, node) in children {
                    if child_path.front() != Some(key) {
                        continue;
                    }
                    let rest = child_path.pop_front();
                    if rest.is_empty() {
                        root_write = Some(node.clone());
                    } else {
                        deeper.push((rest, node.clone()));
                    }
                }
                match root_write {
                    Some(node) => Some(Operation::overwrite(
                        *source,
                        Path::root(),
                        apply_merge(node, &deeper),
                    )),
                    None if deeper.is_empty() => None,
                    None => Some(Operation::merge(*source, Path::root(), deeper)),
                }
            }
            Operation::AckUserWrite {
                affected: AckedWrite::Overwrite,
                ..
            } => Some(self.clone()),
            Operation::AckUserWrite {
                affected: AckedWrite::Merge(paths),
                revert,
                ..
            } => {
                let mut rests = Vec::new();
                for affected_path in paths.iter().filter(|p| p.front() == Some(key)) {
                    let rest = affected_path.pop_front();
                    if rest.is_empty() {
                        return Some(Operation::ack_user_write(
                            Path::root(),
                            AckedWrite::Overwrite,
                            *revert,
                        ));
                    }
                    rests.push(rest);
                }
                Some(Operation::ack_user_write(
                    Path::root(),
                    AckedWrite::Merge(rests),
                    *revert,
                ))
            }
            Operation::ListenComplete { source, .. } => {
                Some(Operation::listen_complete(*source, Path::root()))
            }
        }
    }
}

/// Orders merge children so shallow writes land before deeper ones and
/// priority writes land last, once their parent exists.
pub(crate) fn merge_order(children: &[(Path, Node)]) -> Vec<&(Path, Node)> {
    let mut ordered: Vec<&(Path, Node)> = children.iter().collect();
    ordered.sort_by_key(|(path, _)| {
        let priority = path.back().is_some_and(ChildKey::is_priority_key);
        (priority, path.len())
    });
    ordered
}

/// Applies every child of a merge to `base`.
pub fn apply_merge(base: Node, children: &[(Path, Node)]) -> Node {
    merge_order(children)
        .into_iter()
        .fold(base, |node, (path, child)| node.update_child(path, child.clone()))
}
