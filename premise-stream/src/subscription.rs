//! Subscription table
//!
//! Every subscription is keyed by a correlation id that the server echoes
//! back in `Target-Element:`. Ids are derived from `(location, property)`,
//! so subscribing the same pair twice finds the existing entry instead of
//! creating a second one.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::codec;
use crate::notify::SubscriptionTarget;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Preferred correlation id for a `(location, property)` pair
///
/// 32-bit FNV-1a over both strings, masked to 31 bits so it prints as a
/// positive integer. Never 0, which the protocol reserves for "no target".
pub fn subscription_id(location: &str, property: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    let bytes = location.bytes().chain(std::iter::once(0)).chain(property.bytes());
    for byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    match hash & 0x7fff_ffff {
        0 => 1,
        id => id,
    }
}

/// One registered interest in push updates
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: u32,
    pub location: String,
    pub property: String,
    /// False while the server has the connection paused or the engine is stopped
    pub active: bool,
    target: Weak<dyn SubscriptionTarget>,
}

impl Subscription {
    /// The owning object, if it is still alive
    pub fn target(&self) -> Option<Arc<dyn SubscriptionTarget>> {
        self.target.upgrade()
    }

    /// Wire command that (re)registers this subscription
    pub fn command(&self) -> String {
        codec::subscribe_command(&self.location, &self.property, self.id)
    }
}

/// Public snapshot of a table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: u32,
    pub location: String,
    pub property: String,
    pub active: bool,
}

impl From<&Subscription> for SubscriptionInfo {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id,
            location: sub.location.clone(),
            property: sub.property.clone(),
            active: sub.active,
        }
    }
}

/// Subscriptions keyed by correlation id
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: HashMap<u32, Subscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the entry for this pair, if any
    pub fn find(&self, location: &str, property: &str) -> Option<u32> {
        self.entries
            .values()
            .find(|sub| sub.location == location && sub.property == property)
            .map(|sub| sub.id)
    }

    /// Register a subscription.
    ///
    /// Returns the new id, or `None` if the pair is already registered.
    pub fn insert(&mut self, target: &Arc<dyn SubscriptionTarget>, property: &str) -> Option<u32> {
        let location = target.location();
        if self.find(location, property).is_some() {
            return None;
        }

        let mut id = subscription_id(location, property);
        while self.entries.contains_key(&id) {
            id = match id.wrapping_add(1) & 0x7fff_ffff {
                0 => 1,
                next => next,
            };
        }

        self.entries.insert(
            id,
            Subscription {
                id,
                location: location.to_string(),
                property: property.to_string(),
                active: false,
                target: Arc::downgrade(target),
            },
        );
        Some(id)
    }

    pub fn remove(&mut self, location: &str, property: &str) -> Option<Subscription> {
        let id = self.find(location, property)?;
        self.entries.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Subscription> {
        self.entries.get(&id)
    }

    pub fn set_active(&mut self, id: u32, active: bool) {
        if let Some(sub) = self.entries.get_mut(&id) {
            sub.active = active;
        }
    }

    /// Mark every entry inactive without removing any
    pub fn deactivate_all(&mut self) {
        for sub in self.entries.values_mut() {
            sub.active = false;
        }
    }

    /// Ids and subscribe commands for every entry with a location, ordered by id
    pub fn commands(&self) -> Vec<(u32, String)> {
        let mut commands: Vec<(u32, String)> = self
            .entries
            .values()
            .filter(|sub| !sub.location.is_empty())
            .map(|sub| (sub.id, sub.command()))
            .collect();
        commands.sort_by_key(|(id, _)| *id);
        commands
    }

    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self.entries.values().map(SubscriptionInfo::from).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Target(String);

    impl SubscriptionTarget for Target {
        fn location(&self) -> &str {
            &self.0
        }

        fn apply_server_value(&self, _property: &str, _value: &str) {}
    }

    fn target(location: &str) -> Arc<dyn SubscriptionTarget> {
        Arc::new(Target(location.to_string()))
    }

    #[test]
    fn test_id_is_deterministic_and_positive() {
        let a = subscription_id("sys://Home/Kitchen", "Brightness");
        let b = subscription_id("sys://Home/Kitchen", "Brightness");
        let c = subscription_id("sys://Home/Kitchen", "PowerState");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a > 0 && a <= 0x7fff_ffff);
    }

    #[test]
    fn test_id_separates_location_and_property() {
        assert_ne!(
            subscription_id("sys://Home/AB", "C"),
            subscription_id("sys://Home/A", "BC")
        );
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut table = SubscriptionTable::new();
        let kitchen = target("sys://Home/Kitchen");

        let id = table.insert(&kitchen, "Brightness");
        assert!(id.is_some());
        assert_eq!(table.insert(&kitchen, "Brightness"), None);

        // A different object at the same location is the same pair
        let other = target("sys://Home/Kitchen");
        assert_eq!(table.insert(&other, "Brightness"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find("sys://Home/Kitchen", "Brightness"), id);
    }

    #[test]
    fn test_remove() {
        let mut table = SubscriptionTable::new();
        let kitchen = target("sys://Home/Kitchen");
        let id = table.insert(&kitchen, "Brightness").unwrap();

        let removed = table.remove("sys://Home/Kitchen", "Brightness").unwrap();
        assert_eq!(removed.id, id);
        assert!(table.is_empty());
        assert!(table.remove("sys://Home/Kitchen", "Brightness").is_none());
    }

    #[test]
    fn test_deactivate_keeps_entries() {
        let mut table = SubscriptionTable::new();
        let kitchen = target("sys://Home/Kitchen");
        let a = table.insert(&kitchen, "Brightness").unwrap();
        let b = table.insert(&kitchen, "PowerState").unwrap();
        table.set_active(a, true);
        table.set_active(b, true);

        table.deactivate_all();

        assert_eq!(table.len(), 2);
        assert!(table.snapshot().iter().all(|info| !info.active));
        assert_eq!(table.commands().len(), 2);
    }

    #[test]
    fn test_weak_target() {
        let mut table = SubscriptionTable::new();
        let kitchen = target("sys://Home/Kitchen");
        let id = table.insert(&kitchen, "Brightness").unwrap();

        assert!(table.get(id).and_then(Subscription::target).is_some());
        drop(kitchen);
        assert!(table.get(id).and_then(Subscription::target).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_command_format() {
        let mut table = SubscriptionTable::new();
        let kitchen = target("sys://Home/Kitchen");
        let id = table.insert(&kitchen, "Brightness").unwrap();

        assert_eq!(
            table.get(id).unwrap().command(),
            format!("sys://Home/Kitchen?a?{}??Brightness?{}?", id, id)
        );
    }

    #[test]
    fn test_empty_location_not_sent() {
        let mut table = SubscriptionTable::new();
        let nowhere = target("");
        table.insert(&nowhere, "Name").unwrap();
        assert!(table.commands().is_empty());
    }
}
