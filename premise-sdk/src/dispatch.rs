//! Notifier that defers pushes to a thread of the application's choosing
//!
//! GUI toolkits only allow widget state to change on their own thread.
//! [`QueuedNotifier`] queues every push from the read loop; the UI thread
//! calls [`QueuedNotifier::drain`] (typically from the wake callback) to
//! apply them.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use premise_stream::{Notifier, SubscriptionTarget};

struct Pending {
    target: Arc<dyn SubscriptionTarget>,
    property: String,
    value: String,
}

/// Queues pushed values until drained
#[derive(Default)]
pub struct QueuedNotifier {
    queue: Mutex<VecDeque<Pending>>,
    wake: Option<Box<dyn Fn() + Send + Sync>>,
}

impl QueuedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `wake` after each queued push, e.g. to post a UI event
    pub fn with_wake(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            wake: Some(Box::new(wake)),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Apply every queued push on the calling thread, returning how many
    pub fn drain(&self) -> usize {
        let pending: Vec<Pending> = self.queue.lock().drain(..).collect();
        for push in &pending {
            push.target.apply_server_value(&push.property, &push.value);
        }
        pending.len()
    }
}

impl Notifier for QueuedNotifier {
    fn dispatch_set_member(&self, target: Arc<dyn SubscriptionTarget>, property: &str, value: &str) {
        self.queue.lock().push_back(Pending {
            target,
            property: property.to_string(),
            value: value.to_string(),
        });
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}

impl std::fmt::Debug for QueuedNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedNotifier")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
