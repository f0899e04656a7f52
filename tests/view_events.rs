#![cfg(not(target_arch = "wasm32"))]

use std::sync::{Arc, Mutex};

use firebase_database_core::database::core::{
    EventRaiser, InlineEventTarget, Operation, OperationSource, WriteTree,
};
use firebase_database_core::database::error::cancelled;
use firebase_database_core::database::query::{QueryParams, QuerySpec};
use firebase_database_core::database::server_value::{
    increment, resolve_deferred_value_snapshot, server_timestamp, ServerValues,
};
use firebase_database_core::database::snapshot::{node_from_json, Node, Path};
use firebase_database_core::database::view::{
    ChildEventRegistration, EventRegistration, EventType, ValueEventRegistration, View, ViewCache,
};
use serde_json::{json, Value};

type Log = Arc<Mutex<Vec<String>>>;

fn path(value: &str) -> Path {
    Path::parse(value).unwrap()
}

fn record_value(query: &QuerySpec, log: &Log) -> Arc<dyn EventRegistration> {
    let sink = Arc::clone(log);
    let cancel_sink = Arc::clone(log);
    Arc::new(
        ValueEventRegistration::new(query.clone(), move |snapshot| {
            sink.lock().unwrap().push(format!("value {}", snapshot.value()));
        })
        .with_cancel_callback(move |error| {
            cancel_sink
                .lock()
                .unwrap()
                .push(format!("cancel {}", error.code_str()));
        }),
    )
}

fn record_child(query: &QuerySpec, event_type: EventType, log: &Log) -> Arc<dyn EventRegistration> {
    let sink = Arc::clone(log);
    Arc::new(ChildEventRegistration::new(
        query.clone(),
        event_type,
        move |snapshot, previous| {
            sink.lock().unwrap().push(format!(
                "{event_type} {} {} {}",
                snapshot.key().unwrap_or("/"),
                snapshot.value(),
                previous.unwrap_or_else(|| "-".to_string())
            ));
        },
    ))
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

struct Harness {
    view: View,
    writes: WriteTree,
    raiser: EventRaiser,
}

impl Harness {
    fn new(query: QuerySpec) -> Self {
        Self {
            view: View::new(query, ViewCache::empty()),
            writes: WriteTree::new(),
            raiser: EventRaiser::new(Arc::new(InlineEventTarget)),
        }
    }

    fn apply(&mut self, operation: Operation) {
        let writes = self.writes.child_writes(&Path::root());
        let result = self.view.apply_operation(&operation, &writes, None);
        self.raiser.raise_events(&result.events).unwrap();
    }

    fn server_set(&mut self, at: &str, value: Value) {
        self.apply(Operation::overwrite(
            OperationSource::server(),
            path(at),
            node_from_json(&value),
        ));
    }

    fn local_set(&mut self, at: &str, value: Value, write_id: i64) {
        let node = node_from_json(&value);
        self.writes.add_overwrite(path(at), node.clone(), write_id, true);
        self.apply(Operation::overwrite(OperationSource::user(), path(at), node));
    }

    fn finish_write(&mut self, write_id: i64, revert: bool) {
        let write = self.writes.write(write_id).cloned().unwrap();
        if self.writes.remove_write(write_id) {
            let affected = write.affected();
            self.apply(Operation::ack_user_write(write.path, affected, revert));
        }
    }
}

#[test]
fn value_and_child_listeners_follow_local_and_server_changes() {
    let query = QuerySpec::default_at(path("rooms"));
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    harness.view.add_event_registration(record_value(&query, &log));
    harness
        .view
        .add_event_registration(record_child(&query, EventType::ChildAdded, &log));
    harness
        .view
        .add_event_registration(record_child(&query, EventType::ChildChanged, &log));

    harness.server_set("", json!({"a": 1}));
    assert_eq!(drain(&log), vec!["child_added a 1 -", "value {\"a\":1}"]);

    harness.local_set("b", json!(2), 1);
    assert_eq!(drain(&log), vec!["child_added b 2 a", "value {\"a\":1,\"b\":2}"]);

    // The server echoes the write; nothing visible changes.
    harness.server_set("b", json!(2));
    assert!(drain(&log).is_empty());
    harness.finish_write(1, false);
    assert!(drain(&log).is_empty());

    harness.server_set("a", json!(5));
    assert_eq!(drain(&log), vec!["child_changed a 5 -", "value {\"a\":5,\"b\":2}"]);
}

#[test]
fn rejected_write_is_rolled_back() {
    let query = QuerySpec::default_at(path("profile"));
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    harness.view.add_event_registration(record_value(&query, &log));

    harness.server_set("", json!({"name": "ada"}));
    harness.local_set("name", json!("grace"), 7);
    assert_eq!(
        drain(&log),
        vec!["value {\"name\":\"ada\"}", "value {\"name\":\"grace\"}"]
    );

    harness.finish_write(7, true);
    assert_eq!(drain(&log), vec!["value {\"name\":\"ada\"}"]);
}

#[test]
fn limit_to_last_window_slides() {
    let params = QueryParams::default()
        .order_by_value()
        .unwrap()
        .limit_to_last(2)
        .unwrap();
    let query = QuerySpec::new(path("scores"), params).unwrap();
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    for event_type in [EventType::ChildAdded, EventType::ChildRemoved] {
        harness
            .view
            .add_event_registration(record_child(&query, event_type, &log));
    }

    harness.server_set("", json!({"a": 1, "b": 2, "c": 3}));
    assert_eq!(drain(&log), vec!["child_added b 2 -", "child_added c 3 b"]);

    harness.server_set("d", json!(4));
    assert_eq!(drain(&log), vec!["child_removed b 2 -", "child_added d 4 c"]);

    harness.server_set("c", Value::Null);
    assert_eq!(drain(&log), vec!["child_removed c 3 -", "child_added b 2 -"]);
    assert_eq!(
        harness.view.event_cache(),
        &node_from_json(&json!({"b": 2, "d": 4}))
    );
}

#[test]
fn merges_apply_child_by_child() {
    let query = QuerySpec::default_at(path("users/ada"));
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    harness.view.add_event_registration(record_value(&query, &log));
    harness.server_set("", json!({"age": 36, "langs": {"rust": true}}));
    drain(&log);

    harness.apply(Operation::merge(
        OperationSource::server(),
        Path::root(),
        vec![
            (path("age"), node_from_json(&json!(37))),
            (path("langs/ocaml"), node_from_json(&json!(true))),
        ],
    ));
    assert_eq!(
        drain(&log),
        vec!["value {\"age\":37,\"langs\":{\"ocaml\":true,\"rust\":true}}"]
    );

    harness.writes.add_merge(
        Path::root(),
        vec![(path("age"), Node::long(38)), (path("city"), node_from_json(&json!("london")))],
        1,
    );
    harness.apply(Operation::merge(
        OperationSource::user(),
        Path::root(),
        vec![(path("age"), Node::long(38)), (path("city"), node_from_json(&json!("london")))],
    ));
    assert_eq!(
        drain(&log),
        vec!["value {\"age\":38,\"city\":\"london\",\"langs\":{\"ocaml\":true,\"rust\":true}}"]
    );

    harness.finish_write(1, true);
    assert_eq!(
        drain(&log),
        vec!["value {\"age\":37,\"langs\":{\"ocaml\":true,\"rust\":true}}"]
    );
}

#[test]
fn server_values_resolve_before_local_apply() {
    let query = QuerySpec::default_at(path("stats"));
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    harness.view.add_event_registration(record_value(&query, &log));
    harness.server_set("", json!({"count": 41}));
    drain(&log);

    let pending = node_from_json(&json!({"count": increment(1.0), "at": server_timestamp()}));
    let resolved = resolve_deferred_value_snapshot(
        &pending,
        harness.view.event_cache(),
        &ServerValues::generate(1_000),
    );
    harness.writes.add_overwrite(Path::root(), resolved.clone(), 1, true);
    harness.apply(Operation::overwrite(OperationSource::user(), Path::root(), resolved));
    assert_eq!(drain(&log), vec!["value {\"at\":1000,\"count\":42.0}"]);
}

#[test]
fn cancelling_a_view_notifies_listeners() {
    let query = QuerySpec::default_at(path("secret"));
    let log: Log = Arc::default();
    let mut harness = Harness::new(query.clone());
    harness.view.add_event_registration(record_value(&query, &log));
    harness.view.add_event_registration(record_value(&query, &log));

    let events = harness
        .view
        .remove_event_registration(None, Some(cancelled("permission revoked")));
    harness.raiser.raise_events(&events).unwrap();
    assert_eq!(
        drain(&log),
        vec!["cancel database/cancelled", "cancel database/cancelled"]
    );
    assert!(harness.view.is_empty());
}
