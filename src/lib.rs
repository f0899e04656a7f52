//! Client-side synchronization core of the Firebase Realtime Database.
//!
//! The crate keeps a locally consistent view of a remote JSON tree: an immutable
//! persistent node model ([`database::snapshot`]), query-aware node filters and
//! view caches ([`database::view`]), and the event pipeline that turns tree
//! differences into ordered listener callbacks ([`database::core`]).
//!
//! ```
//! use firebase_database_core::database::snapshot::node_from_json;
//! use serde_json::json;
//!
//! let node = node_from_json(&json!({"a": 1, "b": {"c": true}}));
//! assert_eq!(node.child_count(), 2);
//! assert_eq!(node.value(false), json!({"a": 1, "b": {"c": true}}));
//! ```

pub mod database;
pub mod logger;
pub mod platform;
pub mod util;
