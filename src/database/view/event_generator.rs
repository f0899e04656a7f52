use std::cmp::Ordering;
use std::sync::Arc;

use crate::database::query::QuerySpec;
use crate::database::snapshot::{Index, IndexedNode, NamedNode};

use super::change::Change;
use super::event::{Event, EventRegistration, EventType};

/// Turns the changes of one operation into events for each registration.
///
/// Events come out grouped by type (removals, additions, moves, changes, then
/// the value event), and within a type in the order of the query index.
#[derive(Clone, Debug)]
pub struct EventGenerator {
    query: QuerySpec,
    index: Index,
}

impl EventGenerator {
    pub fn new(query: QuerySpec) -> Self {
        let index = query.index().clone();
        Self { query, index }
    }

    pub fn generate_events_for_changes(
        &self,
        changes: &[Change],
        event_cache: &IndexedNode,
        registrations: &[Arc<dyn EventRegistration>],
    ) -> Vec<Event> {
        let moves: Vec<Change> = changes
            .iter()
            .filter(|change| change.event_type == EventType::ChildChanged)
            .filter_map(|change| {
                let old = change.old_snapshot.as_ref()?;
                let key = change.child_key.clone()?;
                self.index
                    .indexed_value_changed(old.node(), change.node())
                    .then(|| Change::child_moved(key, change.snapshot.clone()))
            })
            .collect();

        let mut events = Vec::new();
        for event_type in [
            EventType::ChildRemoved,
            EventType::ChildAdded,
            EventType::ChildMoved,
            EventType::ChildChanged,
            EventType::Value,
        ] {
            let source = if event_type == EventType::ChildMoved {
                &moves
            } else {
                changes
            };
            self.generate_events_for_type(
                &mut events,
                event_type,
                source,
                registrations,
                event_cache,
            );
        }
        events
    }

    fn generate_events_for_type(
        &self,
        events: &mut Vec<Event>,
        event_type: EventType,
        changes: &[Change],
        registrations: &[Arc<dyn EventRegistration>],
        event_cache: &IndexedNode,
    ) {
        let mut filtered: Vec<&Change> = changes
            .iter()
            .filter(|change| change.event_type == event_type)
            .collect();
        filtered.sort_by(|left, right| self.compare_changes(left, right));
        for change in filtered {
            for registration in registrations {
                if registration.responds_to(event_type) {
                    let change = self.materialize(change, event_cache);
                    events.push(Event::data(
                        Arc::clone(registration),
                        registration.create_event(&change, &self.query),
                    ));
                }
            }
        }
    }

    fn materialize(&self, change: &Change, event_cache: &IndexedNode) -> Change {
        match (&change.event_type, &change.child_key) {
            (EventType::Value | EventType::ChildRemoved, _) | (_, None) => change.clone(),
            (_, Some(key)) => change.clone().with_prev_name(event_cache.predecessor_child_name(
                key,
                change.node(),
                &self.index,
            )),
        }
    }

    fn compare_changes(&self, left: &Change, right: &Change) -> Ordering {
        match (&left.child_key, &right.child_key) {
            (Some(left_key), Some(right_key)) => self.index.compare(
                &NamedNode::new(left_key.clone(), left.node().clone()),
                &NamedNode::new(right_key.clone(), right.node().clone()),
            ),
            _ => Ordering::Equal,
        }
    }
}
