//! Query views: caches, filters, change tracking and event generation.
//!
//! A [`View`] holds the data one query has seen at one location. Operations go
//! through its [`ViewProcessor`], which updates the [`ViewCache`] and collects
//! [`Change`]s; the [`EventGenerator`] turns those into [`Event`]s for every
//! registered listener.

mod cache_node;
mod change;
mod child_change_accumulator;
mod event;
mod event_generator;
pub mod filter;
mod query_view;
mod view_cache;
mod view_processor;

pub use cache_node::CacheNode;
pub use change::Change;
pub use child_change_accumulator::ChildChangeAccumulator;
pub use event::{
    same_registration, CancelEvent, ChildEventRegistration, DataEvent, DataSnapshot, Event,
    EventKind, EventRegistration, EventType, ValueEventRegistration,
};
pub use event_generator::EventGenerator;
pub use filter::NodeFilter;
pub use query_view::{OperationResult, View};
pub use view_cache::ViewCache;
pub use view_processor::{ProcessorResult, ViewProcessor, WriteTreeCompleteChildSource};
