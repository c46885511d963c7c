//! Property storage and change detection for one remote object
//!
//! This module provides the core storage primitives:
//! - `PropertyBag`: name-keyed properties for a single object
//! - `PropertyStore`: a shareable bag plus the change event channel

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};

use parking_lot::RwLock;

use crate::event::ChangeEvent;
use crate::iter::ChangeIterator;
use crate::property::{Property, PropertyType};
use crate::value::PropertyValue;

// ============================================================================
// PropertyBag - name-keyed property storage for a single object
// ============================================================================

/// Name-keyed storage for an object's properties
///
/// # Example
///
/// ```rust
/// use premise_state::{Property, PropertyBag, PropertyType};
///
/// let mut bag = PropertyBag::new();
/// assert!(bag.insert(Property::new("Name", PropertyType::Text)));
///
/// // Names are unique; a second insert keeps the first
/// assert!(!bag.insert(Property::new("Name", PropertyType::Integer)));
///
/// // First assignment changes the value, the same one again does not
/// assert!(bag.set("Name", Some("Home".into())));
/// assert!(!bag.set("Name", Some("Home".into())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    properties: HashMap<String, Property>,
}

impl PropertyBag {
    /// Create a new empty property bag
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Add a property unless one with the same name exists.
    ///
    /// Returns `true` if the property was added.
    pub fn insert(&mut self, property: Property) -> bool {
        if self.properties.contains_key(property.name()) {
            return false;
        }
        self.properties
            .insert(property.name().to_string(), property);
        true
    }

    /// Assign a value, returning whether it changed
    ///
    /// Unknown names are created with an unspecified type, so the first
    /// value decides the type.
    pub fn set(&mut self, name: &str, value: Option<PropertyValue>) -> bool {
        self.properties
            .entry(name.to_string())
            .or_insert_with(|| Property::new(name, PropertyType::None))
            .set_value(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Property names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

// ============================================================================
// PropertyStore - shared bag with change events
// ============================================================================

/// Property cache for one remote location with change notification
///
/// Cloning a store yields another handle onto the same properties and the
/// same event queue.
///
/// # Example
///
/// ```rust
/// use premise_state::{Property, PropertyStore, PropertyType, PropertyValue};
///
/// let store = PropertyStore::new("sys://Home/Kitchen/Light");
/// store.register(Property::new("Brightness", PropertyType::Percent));
///
/// assert!(store.set("Brightness", Some("50%".into())));
/// assert_eq!(store.value("Brightness"), Some(PropertyValue::Float(0.5)));
///
/// let event = store.iter().try_recv().unwrap();
/// assert_eq!(event.property_key, "Item[Brightness]");
/// ```
#[derive(Clone)]
pub struct PropertyStore {
    location: String,

    properties: Arc<RwLock<PropertyBag>>,

    /// Channel sender for change events
    event_tx: mpsc::Sender<ChangeEvent>,

    /// Channel receiver for change events (wrapped for cloning)
    event_rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>,
}

impl PropertyStore {
    pub fn new(location: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            location: location.into(),
            properties: Arc::new(RwLock::new(PropertyBag::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Register a property, keeping any existing one with the same name.
    ///
    /// Returns `true` if the property is new.
    pub fn register(&self, property: Property) -> bool {
        self.properties.write().insert(property)
    }

    /// Assign a value and emit a change event if it changed
    pub fn set(&self, name: &str, value: Option<PropertyValue>) -> bool {
        let changed = self.properties.write().set(name, value);
        if changed {
            tracing::trace!("{} changed on {}", name, self.location);
            self.emit(ChangeEvent::for_property(self.location.clone(), name));
        }
        changed
    }

    /// Snapshot of a property
    pub fn get(&self, name: &str) -> Option<Property> {
        self.properties.read().get(name).cloned()
    }

    pub fn value(&self, name: &str) -> Option<PropertyValue> {
        self.properties
            .read()
            .get(name)
            .and_then(|p| p.value().cloned())
    }

    /// Current value rendered for an outbound write
    pub fn wire_value(&self, name: &str) -> Option<String> {
        self.properties.read().get(name).and_then(Property::wire_value)
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.properties.read().get(name).map(Property::property_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.read().contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.properties.read().names()
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }

    /// Emit an event with a raw key, used for sentinels like `HasServerData`
    pub fn notify(&self, property_key: &str) {
        self.emit(ChangeEvent::new(self.location.clone(), property_key));
    }

    /// Iterator over change events for this store
    pub fn iter(&self) -> ChangeIterator {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }

    fn emit(&self, event: ChangeEvent) {
        // The store owns the receiver, so the channel cannot be closed here.
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("location", &self.location)
            .field("property_count", &self.len())
            .finish()
    }
}
