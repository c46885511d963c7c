//! Synchronous consumption of change events
//!
//! Change events travel over a `std::sync::mpsc` queue owned by the
//! [`PropertyStore`](crate::PropertyStore). GUI threads read it without an
//! async runtime: block for the next event, poll, or drain in batches.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::event::ChangeEvent;

/// Reader over one store's change events
///
/// Every handle on the same store reads from the same queue, so each event
/// is seen by exactly one reader.
///
/// ```rust,ignore
/// // Block on each event
/// for event in object.changes() {
///     refresh(&event.property_key);
/// }
///
/// // Once per frame: collapse bursts to one refresh per key
/// for key in object.changes().drain_keys() {
///     refresh(&key);
/// }
/// ```
pub struct ChangeIterator {
    rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>,
}

impl ChangeIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>) -> Self {
        Self { rx }
    }

    /// Wait for the next event; `None` once every sender is gone
    pub fn recv(&self) -> Option<ChangeEvent> {
        let rx = self.rx.lock().ok()?;
        rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        let rx = self.rx.lock().ok()?;
        rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<ChangeEvent> {
        let rx = self.rx.lock().ok()?;
        rx.try_recv().ok()
    }

    /// Events already queued, without waiting
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { events: self }
    }

    /// Events as they arrive, ending after `timeout` of silence
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            events: self,
            timeout,
        }
    }

    /// Queued notification keys, first occurrence order, duplicates dropped
    pub fn drain_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for event in self.try_iter() {
            if !keys.contains(&event.property_key) {
                keys.push(event.property_key);
            }
        }
        keys
    }
}

impl Iterator for ChangeIterator {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

pub struct TryIter<'a> {
    events: &'a ChangeIterator,
}

impl Iterator for TryIter<'_> {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.try_recv()
    }
}

pub struct TimeoutIter<'a> {
    events: &'a ChangeIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIter<'_> {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn channel() -> (mpsc::Sender<ChangeEvent>, ChangeIterator) {
        let (tx, rx) = mpsc::channel();
        (tx, ChangeIterator::new(Arc::new(Mutex::new(rx))))
    }

    fn changed(name: &str) -> ChangeEvent {
        ChangeEvent::for_property("sys://Home/Kitchen", name)
    }

    #[test]
    fn test_poll_empty_and_filled() {
        let (tx, events) = channel();
        assert!(events.try_recv().is_none());

        tx.send(changed("Brightness")).unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.property_name(), Some("Brightness"));
        assert!(events.try_recv().is_none());
    }

    #[test]
    fn test_recv_from_other_thread() {
        let (tx, events) = channel();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(changed("PowerState")).unwrap();
        });

        assert_eq!(events.recv(), Some(changed("PowerState")));
        sender.join().unwrap();

        // Sender dropped with the thread
        assert!(events.recv().is_none());
    }

    #[test]
    fn test_timeout_iter_stops_on_silence() {
        let (tx, events) = channel();
        tx.send(changed("A")).unwrap();
        tx.send(changed("B")).unwrap();

        let names: Vec<String> = events
            .timeout_iter(Duration::from_millis(20))
            .filter_map(|e| e.property_name().map(str::to_string))
            .collect();

        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_drain_keys_collapses_bursts() {
        let (tx, events) = channel();
        for name in ["Brightness", "PowerState", "Brightness", "Brightness"] {
            tx.send(changed(name)).unwrap();
        }
        tx.send(ChangeEvent::new("sys://Home/Kitchen", crate::HAS_SERVER_DATA))
            .unwrap();

        assert_eq!(
            events.drain_keys(),
            vec!["Item[Brightness]", "Item[PowerState]", "HasServerData"]
        );
        assert!(events.drain_keys().is_empty());
    }
}
