use std::sync::{Arc, LazyLock};

use crate::database::error::DatabaseResult;
use crate::database::view::Event;
use crate::logger::Logger;

use super::event_target::EventTarget;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@firebase/database"));

/// Hands generated events to an [`EventTarget`], preserving their order.
#[derive(Clone)]
pub struct EventRaiser {
    target: Arc<dyn EventTarget>,
}

impl EventRaiser {
    pub fn new(target: Arc<dyn EventTarget>) -> Self {
        Self { target }
    }

    /// Posts all `events` as one task so no other batch can interleave.
    pub fn raise_events(&self, events: &[Event]) -> DatabaseResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        if LOGGER.logs_debug() {
            LOGGER.debug(format!("Raising {} event(s)", events.len()));
        }
        let batch = events.to_vec();
        self.target.post_event(Box::new(move || {
            for event in &batch {
                if LOGGER.logs_debug() {
                    LOGGER.debug(format!("event: {event:?}"));
                }
                event.fire();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{InlineEventTarget, QueuedEventTarget};
    use crate::database::query::QuerySpec;
    use crate::database::snapshot::{node_from_json, Index, IndexedNode, Path};
    use crate::database::view::{
        DataEvent, DataSnapshot, EventRegistration, EventType, ValueEventRegistration,
    };
    use serde_json::json;
    use std::sync::Mutex;

    fn value_event(registration: Arc<dyn EventRegistration>, value: i64) -> Event {
        let path = Path::parse("a").unwrap();
        Event::data(
            registration,
            DataEvent {
                event_type: EventType::Value,
                path: path.clone(),
                snapshot: DataSnapshot::new(
                    path,
                    IndexedNode::new(node_from_json(&json!(value)), Index::Priority),
                ),
                previous_name: None,
            },
        )
    }

    fn recording_registration(seen: &Arc<Mutex<Vec<i64>>>) -> Arc<dyn EventRegistration> {
        let sink = Arc::clone(seen);
        Arc::new(ValueEventRegistration::new(
            QuerySpec::default_at(Path::parse("a").unwrap()),
            move |snap| sink.lock().unwrap().push(snap.value().as_i64().unwrap()),
        ))
    }

    #[test]
    fn inline_raising_fires_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registration = recording_registration(&seen);
        let raiser = EventRaiser::new(Arc::new(InlineEventTarget));
        raiser
            .raise_events(&[value_event(registration.clone(), 1), value_event(registration, 2)])
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn queued_batches_stay_ordered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registration = recording_registration(&seen);
        let (target, event_loop) = QueuedEventTarget::new();
        let raiser = EventRaiser::new(Arc::new(target));
        raiser.raise_events(&[value_event(registration.clone(), 1)]).unwrap();
        raiser.raise_events(&[]).unwrap();
        raiser
            .raise_events(&[value_event(registration.clone(), 2), value_event(registration, 3)])
            .unwrap();
        assert_eq!(event_loop.run_pending(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
