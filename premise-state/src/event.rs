//! Change events for property updates
//!
//! When a cached value changes, a `ChangeEvent` is emitted carrying the
//! object's location and the notification key. Property keys use the
//! indexer form `Item[Name]` so generic binding layers can route them; the
//! [`HAS_SERVER_DATA`] sentinel is sent bare.

use std::time::Instant;

/// Notification key raised the first time an object receives server data
pub const HAS_SERVER_DATA: &str = "HasServerData";

/// Wrap a property name in the indexer notification form
pub fn item_from_name(name: &str) -> String {
    format!("Item[{}]", name)
}

/// Extract the property name from an indexer notification key
pub fn name_from_item(item: &str) -> Option<&str> {
    item.strip_prefix("Item[")?.strip_suffix(']')
}

/// A change event emitted when a property value changes
///
/// Events carry only the key, not the value. Read the new value from the
/// owning object after receiving one.
///
/// # Example
///
/// ```rust,ignore
/// for event in object.changes() {
///     if let Some(name) = event.property_name() {
///         println!("{} = {:?}", name, object.value(name));
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Location of the object whose property changed
    pub location: String,

    /// Notification key (`Item[Name]` or a bare sentinel)
    pub property_key: String,

    /// When the change was detected
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn new(location: impl Into<String>, property_key: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            property_key: property_key.into(),
            timestamp: Instant::now(),
        }
    }

    /// Event for a named property, using the indexer key form
    pub fn for_property(location: impl Into<String>, name: &str) -> Self {
        Self::new(location, item_from_name(name))
    }

    /// Property name for indexer keys, `None` for sentinels
    pub fn property_name(&self) -> Option<&str> {
        name_from_item(&self.property_key)
    }
}

impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.location == other.location && self.property_key == other.property_key
    }
}
