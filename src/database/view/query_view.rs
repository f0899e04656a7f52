use std::sync::{Arc, LazyLock};

use crate::database::core::{Operation, WriteTreeRef};
use crate::database::error::DatabaseError;
use crate::database::query::QuerySpec;
use crate::database::snapshot::{IndexedNode, Node, Path};
use crate::logger::Logger;
use crate::util::hard_assert;

use super::cache_node::CacheNode;
use super::change::Change;
use super::event::{same_registration, CancelEvent, Event, EventRegistration};
use super::event_generator::EventGenerator;
use super::filter::IndexedFilter;
use super::view_cache::ViewCache;
use super::view_processor::ViewProcessor;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@firebase/database"));

/// Events raised by one operation plus the raw changes behind them.
#[derive(Debug)]
pub struct OperationResult {
    pub events: Vec<Event>,
    pub changes: Vec<Change>,
}

/// The cached data and registrations of one query at one location.
pub struct View {
    query: QuerySpec,
    processor: ViewProcessor,
    view_cache: ViewCache,
    event_registrations: Vec<Arc<dyn EventRegistration>>,
    event_generator: EventGenerator,
}

impl View {
    /// Builds a view from caches known so far, re-indexed for the query. The
    /// server cache is never filtered here; filtering waits for a tagged listen.
    pub fn new(query: QuerySpec, initial_view_cache: ViewCache) -> Self {
        let index = query.index().clone();
        let index_filter = IndexedFilter::new(index.clone());
        let filter = query.params.node_filter();
        let empty = IndexedNode::new(Node::Empty, index.clone());

        let initial_server = initial_view_cache.server_cache();
        let initial_event = initial_view_cache.event_cache();
        let server_snap = index_filter.update_full_node(
            &empty,
            IndexedNode::new(initial_server.node().clone(), index.clone()),
            None,
        );
        let event_snap = filter.update_full_node(
            &empty,
            IndexedNode::new(initial_event.node().clone(), index),
            None,
        );
        let view_cache = ViewCache::new(
            CacheNode::new(
                event_snap,
                initial_event.is_fully_initialized(),
                filter.filters_nodes(),
            ),
            CacheNode::new(server_snap, initial_server.is_fully_initialized(), false),
        );

        Self {
            event_generator: EventGenerator::new(query.clone()),
            processor: ViewProcessor::new(filter),
            query,
            view_cache,
            event_registrations: Vec::new(),
        }
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn view_cache(&self) -> &ViewCache {
        &self.view_cache
    }

    pub fn server_cache(&self) -> &Node {
        self.view_cache.server_cache().node()
    }

    pub fn event_cache(&self) -> &Node {
        self.view_cache.event_cache().node()
    }

    /// The complete server data at `path` (relative to the view), if known.
    pub fn complete_server_cache(&self, path: &Path) -> Option<Node> {
        let cache = self.view_cache.complete_server_snap()?;
        // A filtered view only knows about complete children it holds.
        if self.query.loads_all_data()
            || path.front().is_some_and(|front| !cache.immediate_child(front).is_empty())
        {
            Some(cache.child(path))
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_registrations.is_empty()
    }

    pub fn event_registrations(&self) -> &[Arc<dyn EventRegistration>] {
        &self.event_registrations
    }

    pub fn add_event_registration(&mut self, registration: Arc<dyn EventRegistration>) {
        self.event_registrations.push(registration);
    }

    /// Removes `registration`, or every registration when `None`. With an
    /// error, every registration is cancelled instead and the cancel events
    /// are returned.
    pub fn remove_event_registration(
        &mut self,
        registration: Option<&Arc<dyn EventRegistration>>,
        cancel_error: Option<DatabaseError>,
    ) -> Vec<Event> {
        let mut cancel_events = Vec::new();
        if let Some(error) = cancel_error {
            hard_assert(
                registration.is_none(),
                "A cancel should cancel all event registrations.",
            );
            let path = self.query.path.clone();
            for existing in &self.event_registrations {
                cancel_events.push(Event::cancel(
                    Arc::clone(existing),
                    CancelEvent {
                        path: path.clone(),
                        error: error.clone(),
                    },
                ));
            }
        }

        match registration {
            Some(target) => self
                .event_registrations
                .retain(|existing| !same_registration(existing, target)),
            None => self.event_registrations.clear(),
        }
        cancel_events
    }

    pub fn apply_operation(
        &mut self,
        operation: &Operation,
        writes: &WriteTreeRef<'_>,
        complete_server_cache: Option<&Node>,
    ) -> OperationResult {
        if LOGGER.logs_debug() {
            LOGGER.debug(format!(
                "View {}: applying {} at {}",
                self.query.path,
                operation.kind(),
                operation.path()
            ));
        }
        if let Operation::Merge { source, .. } = operation {
            if source.is_tagged() {
                hard_assert(
                    self.view_cache.complete_server_snap().is_some(),
                    "We should always have a full cache before handling merges",
                );
                hard_assert(
                    self.view_cache.complete_event_snap().is_some(),
                    "Missing event cache, even though we have a server cache",
                );
            }
        }

        let old_view_cache = &self.view_cache;
        let result = self.processor.apply_operation(
            old_view_cache,
            operation,
            writes,
            complete_server_cache,
        );
        hard_assert(
            result.view_cache.server_cache().is_fully_initialized()
                || !old_view_cache.server_cache().is_fully_initialized(),
            "Once a server snap is complete, it should never go back",
        );
        self.view_cache = result.view_cache;
        let events = self.generate_events_for_changes(&result.changes, None);
        OperationResult {
            events,
            changes: result.changes,
        }
    }

    /// Events that bring a newly added `registration` up to date.
    pub fn initial_events(&self, registration: &Arc<dyn EventRegistration>) -> Vec<Event> {
        let event_snap = self.view_cache.event_cache();
        let mut changes: Vec<Change> = event_snap
            .indexed_node()
            .iter()
            .map(|child| Change::child_added(child.name, child.node))
            .collect();
        if event_snap.is_fully_initialized() {
            changes.push(Change::value(event_snap.indexed_node().clone()));
        }
        self.generate_events_for_changes(&changes, Some(registration))
    }

    fn generate_events_for_changes(
        &self,
        changes: &[Change],
        registration: Option<&Arc<dyn EventRegistration>>,
    ) -> Vec<Event> {
        let event_cache = self.view_cache.event_cache().indexed_node();
        match registration {
            Some(registration) => self.event_generator.generate_events_for_changes(
                changes,
                event_cache,
                std::slice::from_ref(registration),
            ),
            None => self.event_generator.generate_events_for_changes(
                changes,
                event_cache,
                &self.event_registrations,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{OperationSource, WriteTree};
    use crate::database::error::cancelled;
    use crate::database::snapshot::node_from_json;
    use crate::database::view::event::{
        ChildEventRegistration, EventKind, EventType, ValueEventRegistration,
    };
    use serde_json::json;

    fn loaded_view(value: serde_json::Value) -> View {
        let query = QuerySpec::default_at(Path::parse("items").unwrap());
        let mut view = View::new(query, ViewCache::empty());
        let writes = WriteTree::new();
        view.apply_operation(
            &Operation::overwrite(OperationSource::server(), Path::root(), node_from_json(&value)),
            &writes.child_writes(&Path::root()),
            None,
        );
        view
    }

    #[test]
    fn initial_events_replay_cache() {
        let view = loaded_view(json!({"a": 1, "b": 2}));
        let child: Arc<dyn EventRegistration> = Arc::new(ChildEventRegistration::new(
            view.query().clone(),
            EventType::ChildAdded,
            |_, _| {},
        ));
        let events = view.initial_events(&child);
        let names: Vec<_> = events
            .iter()
            .map(|event| match &event.kind {
                EventKind::Data(data) => (data.path.to_string(), data.previous_name.clone()),
                EventKind::Cancel(_) => unreachable!(),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("/items/a".to_string(), None),
                ("/items/b".to_string(), Some("a".to_string())),
            ]
        );

        let value: Arc<dyn EventRegistration> =
            Arc::new(ValueEventRegistration::new(view.query().clone(), |_| {}));
        assert_eq!(view.initial_events(&value).len(), 1);
    }

    #[test]
    fn operations_raise_events_for_registrations() {
        let mut view = loaded_view(json!({"a": 1}));
        let value: Arc<dyn EventRegistration> =
            Arc::new(ValueEventRegistration::new(view.query().clone(), |_| {}));
        view.add_event_registration(Arc::clone(&value));
        let writes = WriteTree::new();
        let result = view.apply_operation(
            &Operation::overwrite(
                OperationSource::server(),
                Path::parse("b").unwrap(),
                Node::long(2),
            ),
            &writes.child_writes(&Path::root()),
            None,
        );
        assert_eq!(result.changes.len(), 2);
        assert_eq!(result.events.len(), 1);
        assert_eq!(view.event_cache(), &node_from_json(&json!({"a": 1, "b": 2})));
        assert_eq!(
            view.complete_server_cache(&Path::parse("b").unwrap()),
            Some(Node::long(2))
        );
    }

    #[test]
    fn applied_operations_are_logged_at_debug_level() {
        use crate::logger::{LogLevel, TEST_GUARD};
        use std::sync::Mutex;

        let _guard = TEST_GUARD.lock().unwrap_or_else(|err| err.into_inner());
        let previous = LOGGER.log_level();
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        LOGGER.set_log_handler(move |_, level, message| {
            if level == LogLevel::Debug {
                sink.lock().unwrap().push(message.to_string());
            }
        });
        LOGGER.set_log_level(LogLevel::Debug);

        let mut view = loaded_view(json!({"a": 1}));
        let writes = WriteTree::new();
        view.apply_operation(
            &Operation::listen_complete(OperationSource::server(), Path::root()),
            &writes.child_writes(&Path::root()),
            None,
        );

        LOGGER.set_log_level(previous);
        LOGGER.reset_log_handler();
        let records = records.lock().unwrap();
        assert!(records.iter().any(|m| m == "View /items: applying overwrite at /"));
        assert!(records.iter().any(|m| m == "View /items: applying listen_complete at /"));
    }

    #[test]
    fn cancel_removes_every_registration() {
        let mut view = loaded_view(json!({"a": 1}));
        let first: Arc<dyn EventRegistration> =
            Arc::new(ValueEventRegistration::new(view.query().clone(), |_| {}));
        let second: Arc<dyn EventRegistration> =
            Arc::new(ValueEventRegistration::new(view.query().clone(), |_| {}));
        view.add_event_registration(Arc::clone(&first));
        view.add_event_registration(Arc::clone(&second));

        assert!(view.remove_event_registration(Some(&first), None).is_empty());
        assert_eq!(view.event_registrations().len(), 1);

        view.add_event_registration(first);
        let events = view.remove_event_registration(None, Some(cancelled("revoked")));
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|event| matches!(event.kind, EventKind::Cancel(_))));
        assert!(view.is_empty());
    }

    #[test]
    fn limited_view_keeps_event_cache_filtered() {
        let params = crate::database::query::QueryParams::default()
            .limit_to_first(1)
            .unwrap();
        let query = QuerySpec::new(Path::parse("items").unwrap(), params).unwrap();
        let loaded = IndexedNode::from_node(node_from_json(&json!({"a": 1, "b": 2})));
        let initial = ViewCache::new(
            CacheNode::new(loaded.clone(), true, false),
            CacheNode::new(loaded, true, false),
        );
        let view = View::new(query, initial);
        assert_eq!(view.event_cache(), &node_from_json(&json!({"a": 1})));
        assert_eq!(view.server_cache(), &node_from_json(&json!({"a": 1, "b": 2})));
        assert!(view.view_cache().event_cache().is_filtered());
        assert_eq!(view.complete_server_cache(&Path::root()), None);
        assert_eq!(
            view.complete_server_cache(&Path::parse("a").unwrap()),
            Some(Node::long(1))
        );
    }
}
