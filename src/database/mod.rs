//! # Realtime Database synchronization core
//!
//! Client-side machinery that keeps a local, query-aware view of a remote JSON
//! tree and turns every change into ordered listener events.
//!
//! ## Features
//!
//! - Persistent ordered map and set backed by a left-leaning red-black tree
//! - Immutable node model with priorities, SHA-1 hashing and JSON conversion
//! - Key, value, priority and child-path indexes with lazily sorted children
//! - Indexed, ranged and limited node filters maintaining query windows
//! - View processor applying server and user overwrites, merges, acks and reverts
//! - Event generation (`child_removed`, `child_added`, `child_moved`,
//!   `child_changed`, `value`) and FIFO dispatch through pluggable event targets
//!
//! ## Example
//!
//! ```
//! use firebase_database_core::database::core::{Operation, OperationSource, WriteTree};
//! use firebase_database_core::database::query::QuerySpec;
//! use firebase_database_core::database::snapshot::{node_from_json, Path};
//! use firebase_database_core::database::view::{View, ViewCache};
//! use serde_json::json;
//!
//! let query = QuerySpec::default_at(Path::root());
//! let mut view = View::new(query, ViewCache::empty());
//! let writes = WriteTree::new();
//! let result = view.apply_operation(
//!     &Operation::overwrite(
//!         OperationSource::server(),
//!         Path::root(),
//!         node_from_json(&json!({"a": 1})),
//!     ),
//!     &writes.child_writes(&Path::root()),
//!     None,
//! );
//! assert_eq!(result.changes.len(), 2);
//! ```

pub mod collection;
pub mod core;
pub mod error;
pub mod query;
pub mod server_value;
pub mod snapshot;
pub mod view;

#[doc(inline)]
pub use error::{DatabaseError, DatabaseErrorCode, DatabaseResult};

#[doc(inline)]
pub use query::{QueryParams, QuerySpec};

#[doc(inline)]
pub use server_value::{increment, server_timestamp, ServerValues};
