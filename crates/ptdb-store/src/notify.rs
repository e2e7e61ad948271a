//! Delivery of lifecycle events and watch callbacks.
//!
//! Nothing here runs inline with the operation that caused it. Lifecycle
//! events go out over a broadcast channel that subscribers poll, and watch
//! callbacks run on a dedicated dispatcher task, so a handler never executes
//! while the engine holds its state lock.

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::digest::Digest;
use crate::watch::Dispatch;

/// Capacity of the lifecycle broadcast channel. Slow receivers that fall
/// further behind than this observe `RecvError::Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle notifications emitted by a [`Database`](crate::Database).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbEvent {
    /// `load` finished and the document is in memory.
    Loaded,
    /// A save wrote the document to disk. Skipped saves emit nothing.
    Saved { digest: Digest },
    /// `close` finished.
    Closed,
}

/// A receiver of lifecycle events.
pub type EventStream = broadcast::Receiver<DbEvent>;

/// Fan-out of lifecycle events to any number of subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DbEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// A new receiver that sees every event emitted from now on.
    pub fn subscribe(&self) -> EventStream {
        self.sender.subscribe()
    }

    /// Publish `event`. Having no subscribers is not an error.
    pub fn emit(&self, event: DbEvent) {
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!(?event, receivers = delivered, "lifecycle event");
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs watch handlers on a background task, in the order dispatches arrive.
#[derive(Debug)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Dispatch>,
    handle: JoinHandle<()>,
}

impl Notifier {
    /// Spawn the dispatcher on the current tokio runtime.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Dispatch>();
        let handle = tokio::spawn(async move {
            while let Some(dispatch) = receiver.recv().await {
                deliver(&dispatch);
            }
            debug!("watch dispatcher drained");
        });
        Self { sender, handle }
    }

    /// Queue dispatches for delivery.
    pub fn send(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            if self.sender.send(dispatch).is_err() {
                warn!("watch dispatcher has stopped; dropping notification");
                return;
            }
        }
    }

    /// Stop accepting dispatches. Already queued ones are still delivered;
    /// the returned handle completes once they have been.
    pub fn finish(self) -> JoinHandle<()> {
        drop(self.sender);
        self.handle
    }
}

fn deliver(dispatch: &Dispatch) {
    for handler in &dispatch.handlers {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&dispatch.event)));
        if outcome.is_err() {
            warn!(path = %dispatch.event.path, "watch handler panicked");
        }
    }
}
