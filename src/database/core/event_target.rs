use async_channel::{Receiver, Sender, TryRecvError};

use crate::database::error::{internal_error, DatabaseResult};
use crate::platform::runtime::spawn_detached;

/// A unit of listener work: firing a batch of events.
pub type EventTask = Box<dyn FnOnce() + Send + 'static>;

/// Decides where and when listener callbacks run.
pub trait EventTarget: Send + Sync {
    fn post_event(&self, task: EventTask) -> DatabaseResult<()>;
}

/// Runs callbacks immediately on the posting thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineEventTarget;

impl EventTarget for InlineEventTarget {
    fn post_event(&self, task: EventTask) -> DatabaseResult<()> {
        task();
        Ok(())
    }
}

/// Queues callbacks for an [`EventLoop`], which runs them one at a time in
/// posting order.
#[derive(Clone, Debug)]
pub struct QueuedEventTarget {
    sender: Sender<EventTask>,
}

impl QueuedEventTarget {
    pub fn new() -> (Self, EventLoop) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, EventLoop { receiver })
    }

    /// Stops accepting events; the loop drains what is queued and exits.
    pub fn close(&self) {
        self.sender.close();
    }
}

impl EventTarget for QueuedEventTarget {
    fn post_event(&self, task: EventTask) -> DatabaseResult<()> {
        self.sender
            .try_send(task)
            .map_err(|_| internal_error("Event queue is closed"))
    }
}

/// Consumer side of a [`QueuedEventTarget`].
#[derive(Debug)]
pub struct EventLoop {
    receiver: Receiver<EventTask>,
}

impl EventLoop {
    /// Runs queued callbacks until every target is dropped or closed.
    pub async fn run(self) {
        while let Ok(task) = self.receiver.recv().await {
            task();
        }
        log::debug!("event loop stopped: queue closed");
    }

    /// Runs the callbacks queued so far without waiting; returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return ran,
            }
        }
    }

    /// Runs the loop in the background.
    pub fn spawn(self) {
        spawn_detached(self.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn inline_target_runs_immediately() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        InlineEventTarget
            .post_event(Box::new(move || sink.lock().unwrap().push(1)))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn queued_target_preserves_order() {
        let (target, event_loop) = QueuedEventTarget::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let sink = Arc::clone(&seen);
            target
                .post_event(Box::new(move || sink.lock().unwrap().push(i)))
                .unwrap();
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(event_loop.run_pending(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(event_loop.run_pending(), 0);
    }

    #[test]
    fn closed_queue_rejects_events() {
        let (target, event_loop) = QueuedEventTarget::new();
        target.close();
        let err = target.post_event(Box::new(|| {})).unwrap_err();
        assert_eq!(err.code, crate::database::error::DatabaseErrorCode::Internal);
        assert_eq!(event_loop.run_pending(), 0);
    }
}
