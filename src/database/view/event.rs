use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::query::QuerySpec;
use crate::database::snapshot::{IndexedNode, Node, Path};
use crate::util::hard_assert;

use super::change::Change;

/// Kinds of events raised to listeners, in the order they are raised for a
/// single operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChildRemoved,
    ChildAdded,
    ChildMoved,
    ChildChanged,
    Value,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ChildRemoved => "child_removed",
            EventType::ChildAdded => "child_added",
            EventType::ChildMoved => "child_moved",
            EventType::ChildChanged => "child_changed",
            EventType::Value => "value",
        }
    }

    pub fn is_child_event(&self) -> bool {
        !matches!(self, EventType::Value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the data at a location, handed to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSnapshot {
    path: Path,
    node: IndexedNode,
}

impl DataSnapshot {
    pub fn new(path: Path, node: IndexedNode) -> Self {
        Self { path, node }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn node(&self) -> &Node {
        self.node.node()
    }

    /// Last segment of the location; `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.path.back().map(|key| key.as_str())
    }

    pub fn value(&self) -> Value {
        self.node.node().value(false)
    }

    /// JSON value including `.priority` metadata.
    pub fn export_value(&self) -> Value {
        self.node.node().value(true)
    }

    pub fn exists(&self) -> bool {
        !self.node.node().is_empty()
    }

    /// Returns a snapshot for the provided relative path.
    pub fn child(&self, relative_path: &str) -> DatabaseResult<DataSnapshot> {
        let relative = Path::parse(relative_path)?;
        let child = self.node.node().child(&relative);
        Ok(DataSnapshot {
            path: self.path.child_path(&relative),
            node: IndexedNode::new(child, self.node.index().clone()),
        })
    }

    pub fn has_child(&self, relative_path: &str) -> DatabaseResult<bool> {
        let relative = Path::parse(relative_path)?;
        Ok(!self.node.node().child(&relative).is_empty())
    }

    pub fn has_children(&self) -> bool {
        self.node.node().child_count() > 0
    }

    /// Number of direct children.
    pub fn size(&self) -> usize {
        self.node.node().child_count()
    }

    pub fn priority(&self) -> Value {
        self.node.node().priority().value(false)
    }

    /// Direct children in the order of the query index.
    pub fn children(&self) -> Vec<DataSnapshot> {
        self.node
            .iter()
            .map(|child| DataSnapshot {
                path: self.path.child(&child.name),
                node: IndexedNode::new(child.node, self.node.index().clone()),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataEvent {
    pub event_type: EventType,
    pub path: Path,
    pub snapshot: DataSnapshot,
    pub previous_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CancelEvent {
    pub path: Path,
    pub error: DatabaseError,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    Data(DataEvent),
    Cancel(CancelEvent),
}

/// An event bound to the registration that will receive it.
#[derive(Clone)]
pub struct Event {
    pub registration: Arc<dyn EventRegistration>,
    pub kind: EventKind,
}

impl Event {
    pub fn data(registration: Arc<dyn EventRegistration>, event: DataEvent) -> Self {
        Self {
            registration,
            kind: EventKind::Data(event),
        }
    }

    pub fn cancel(registration: Arc<dyn EventRegistration>, event: CancelEvent) -> Self {
        Self {
            registration,
            kind: EventKind::Cancel(event),
        }
    }

    pub fn path(&self) -> &Path {
        match &self.kind {
            EventKind::Data(event) => &event.path,
            EventKind::Cancel(event) => &event.path,
        }
    }

    pub fn fire(&self) {
        match &self.kind {
            EventKind::Data(event) => self.registration.fire_event(event),
            EventKind::Cancel(event) => self.registration.fire_cancel_event(&event.error),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Data(event) => write!(
                f,
                "{}: {} {}",
                event.path,
                event.event_type,
                event.snapshot.export_value()
            ),
            EventKind::Cancel(event) => write!(f, "{}: cancel {}", event.path, event.error),
        }
    }
}

/// A listener attached to a query.
pub trait EventRegistration: Send + Sync {
    fn responds_to(&self, event_type: EventType) -> bool;

    /// Builds the event for `change`. Value events are reported at the query
    /// location, child events at the child location.
    fn create_event(&self, change: &Change, query: &QuerySpec) -> DataEvent {
        let path = match (&change.event_type, &change.child_key) {
            (EventType::Value, _) | (_, None) => query.path.clone(),
            (_, Some(key)) => query.path.child(key),
        };
        DataEvent {
            event_type: change.event_type,
            path: path.clone(),
            snapshot: DataSnapshot::new(path, change.snapshot.clone()),
            previous_name: change
                .prev_name
                .as_ref()
                .map(|name| name.as_str().to_string()),
        }
    }

    fn fire_event(&self, event: &DataEvent);

    fn fire_cancel_event(&self, error: &DatabaseError);

    fn query_spec(&self) -> &QuerySpec;
}

/// Whether two handles point at the same registration.
pub fn same_registration(
    left: &Arc<dyn EventRegistration>,
    right: &Arc<dyn EventRegistration>,
) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left) as *const (),
        Arc::as_ptr(right) as *const (),
    )
}

type ValueListenerCallback = Arc<dyn Fn(DataSnapshot) + Send + Sync>;
type ChildListenerCallback = Arc<dyn Fn(DataSnapshot, Option<String>) + Send + Sync>;
type CancelCallback = Arc<dyn Fn(DatabaseError) + Send + Sync>;

/// Delivers `value` events.
pub struct ValueEventRegistration {
    query: QuerySpec,
    callback: ValueListenerCallback,
    cancel: Option<CancelCallback>,
}

impl ValueEventRegistration {
    pub fn new<F>(query: QuerySpec, callback: F) -> Self
    where
        F: Fn(DataSnapshot) + Send + Sync + 'static,
    {
        Self {
            query,
            callback: Arc::new(callback),
            cancel: None,
        }
    }

    pub fn with_cancel_callback<F>(mut self, cancel: F) -> Self
    where
        F: Fn(DatabaseError) + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }
}

impl EventRegistration for ValueEventRegistration {
    fn responds_to(&self, event_type: EventType) -> bool {
        event_type == EventType::Value
    }

    fn fire_event(&self, event: &DataEvent) {
        (self.callback)(event.snapshot.clone());
    }

    fn fire_cancel_event(&self, error: &DatabaseError) {
        if let Some(cancel) = &self.cancel {
            cancel(error.clone());
        }
    }

    fn query_spec(&self) -> &QuerySpec {
        &self.query
    }
}

/// Delivers one kind of child event together with the previous sibling's key.
pub struct ChildEventRegistration {
    query: QuerySpec,
    event_type: EventType,
    callback: ChildListenerCallback,
    cancel: Option<CancelCallback>,
}

impl ChildEventRegistration {
    pub fn new<F>(query: QuerySpec, event_type: EventType, callback: F) -> Self
    where
        F: Fn(DataSnapshot, Option<String>) + Send + Sync + 'static,
    {
        hard_assert(
            event_type.is_child_event(),
            "Child event registrations only accept child event types",
        );
        Self {
            query,
            event_type,
            callback: Arc::new(callback),
            cancel: None,
        }
    }

    pub fn with_cancel_callback<F>(mut self, cancel: F) -> Self
    where
        F: Fn(DatabaseError) + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }
}

impl EventRegistration for ChildEventRegistration {
    fn responds_to(&self, event_type: EventType) -> bool {
        event_type == self.event_type
    }

    fn fire_event(&self, event: &DataEvent) {
        (self.callback)(event.snapshot.clone(), event.previous_name.clone());
    }

    fn fire_cancel_event(&self, error: &DatabaseError) {
        if let Some(cancel) = &self.cancel {
            cancel(error.clone());
        }
    }

    fn query_spec(&self) -> &QuerySpec {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::cancelled;
    use crate::database::snapshot::{node_from_json, ChildKey, Index};
    use serde_json::json;
    use std::sync::Mutex;

    fn snapshot(value: Value) -> DataSnapshot {
        DataSnapshot::new(
            Path::parse("rooms/r1").unwrap(),
            IndexedNode::new(node_from_json(&value), Index::Value),
        )
    }

    #[test]
    fn event_type_order_and_names() {
        assert!(EventType::ChildRemoved < EventType::ChildAdded);
        assert!(EventType::ChildMoved < EventType::ChildChanged);
        assert!(EventType::ChildChanged < EventType::Value);
        assert_eq!(
            serde_json::to_value(EventType::ChildMoved).unwrap(),
            json!("child_moved")
        );
        assert_eq!(EventType::Value.to_string(), "value");
    }

    #[test]
    fn snapshot_accessors() {
        let snap = snapshot(json!({"b": 2, "a": 3, "c": {".value": 1, ".priority": "p"}}));
        assert_eq!(snap.key(), Some("r1"));
        assert!(snap.exists());
        assert!(snap.has_children());
        assert_eq!(snap.size(), 3);
        assert!(snap.has_child("c").unwrap());
        assert!(!snap.has_child("z").unwrap());
        assert!(snap.child("a..b").is_err());

        let child = snap.child("c").unwrap();
        assert_eq!(child.path(), &Path::parse("rooms/r1/c").unwrap());
        assert_eq!(child.priority(), json!("p"));
        assert_eq!(child.export_value(), json!({".value": 1, ".priority": "p"}));

        let keys: Vec<String> = snap
            .children()
            .iter()
            .map(|child| child.key().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn registrations_fire_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let query = QuerySpec::default_at(Path::parse("rooms").unwrap());

        let sink = Arc::clone(&seen);
        let child: Arc<dyn EventRegistration> = Arc::new(
            ChildEventRegistration::new(query.clone(), EventType::ChildAdded, move |snap, prev| {
                sink.lock().unwrap().push(format!("{}:{:?}", snap.key().unwrap(), prev));
            })
            .with_cancel_callback({
                let sink = Arc::clone(&seen);
                move |err| sink.lock().unwrap().push(err.to_string())
            }),
        );
        assert!(child.responds_to(EventType::ChildAdded));
        assert!(!child.responds_to(EventType::Value));

        let change = Change::child_added(ChildKey::new("r1"), Node::long(1))
            .with_prev_name(Some(ChildKey::new("r0")));
        let event = child.create_event(&change, &query);
        assert_eq!(event.path, Path::parse("rooms/r1").unwrap());
        Event::data(Arc::clone(&child), event).fire();
        Event::cancel(
            Arc::clone(&child),
            CancelEvent {
                path: query.path.clone(),
                error: cancelled("revoked"),
            },
        )
        .fire();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "r1:Some(\"r0\")".to_string(),
                "revoked (database/cancelled)".to_string()
            ]
        );
        let other: Arc<dyn EventRegistration> =
            Arc::new(ValueEventRegistration::new(query, |_| {}));
        assert!(same_registration(&child, &child.clone()));
        assert!(!same_registration(&child, &other));
    }
}
