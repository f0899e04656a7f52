//! Operations, pending writes and event delivery.
//!
//! An [`Operation`] describes one change to apply to a view; a [`WriteTree`]
//! tracks local writes the server has not acknowledged yet; an
//! [`EventRaiser`] delivers the events a view produces through an
//! [`EventTarget`].

mod event_raiser;
mod event_target;
mod operation;
mod write_tree;

pub use event_raiser::EventRaiser;
pub use event_target::{EventLoop, EventTarget, EventTask, InlineEventTarget, QueuedEventTarget};
pub use operation::{apply_merge, AckedWrite, Operation, OperationSource};
pub use write_tree::{UserWrite, WriteData, WriteTree, WriteTreeRef};
