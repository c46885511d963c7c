//! Delivery seam between the read loop and subscribed objects
//!
//! The engine knows nothing about threads. When a push arrives it hands the
//! target, property name and raw text to a [`Notifier`]. The default
//! [`DirectNotifier`] applies the value right away on the read-loop task;
//! GUI layers install their own to hop onto a UI thread first.

use std::sync::Arc;

/// Something that owns subscribed properties
///
/// Implemented by the SDK's object cache. The engine holds targets weakly,
/// so a dropped object simply stops receiving pushes.
pub trait SubscriptionTarget: Send + Sync {
    /// Remote location of the object, e.g. `sys://Home/Kitchen/Overhead`
    fn location(&self) -> &str;

    /// Apply a value pushed by the server.
    ///
    /// Must not write the value back to the server.
    fn apply_server_value(&self, property: &str, value: &str);
}

/// Dispatches pushed values to their targets
pub trait Notifier: Send + Sync {
    fn dispatch_set_member(&self, target: Arc<dyn SubscriptionTarget>, property: &str, value: &str);
}

/// Applies values on the calling task
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectNotifier;

impl Notifier for DirectNotifier {
    fn dispatch_set_member(&self, target: Arc<dyn SubscriptionTarget>, property: &str, value: &str) {
        target.apply_server_value(property, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        applied: Mutex<Vec<(String, String)>>,
    }

    impl SubscriptionTarget for Recorder {
        fn location(&self) -> &str {
            "sys://Home/Test"
        }

        fn apply_server_value(&self, property: &str, value: &str) {
            self.applied
                .lock()
                .push((property.to_string(), value.to_string()));
        }
    }

    #[test]
    fn test_direct_notifier_applies_immediately() {
        let recorder = Arc::new(Recorder {
            applied: Mutex::new(Vec::new()),
        });

        DirectNotifier.dispatch_set_member(recorder.clone(), "Brightness", "50%");

        assert_eq!(
            *recorder.applied.lock(),
            vec![("Brightness".to_string(), "50%".to_string())]
        );
    }
}
