//! Typed property state for Premise objects
//!
//! The server speaks text. This crate turns that text into typed values
//! according to the Premise type system, caches them per object, and emits
//! change events only when a value really changes.
//!
//! # Features
//!
//! - **Coercion**: wire strings become booleans, percents, numbers and dates
//! - **Type inference**: untyped properties take the type of their first value
//! - **Change Detection**: equal values after coercion are silent no-ops
//! - **Blocking Iteration**: consume change events via blocking iterators
//!
//! # Quick Start
//!
//! ```rust
//! use premise_state::{Property, PropertyStore, PropertyType, PropertyValue};
//!
//! let store = PropertyStore::new("sys://Home/Kitchen/Overhead");
//! store.register(Property::new("PowerState", PropertyType::Boolean));
//!
//! store.set("PowerState", Some("On".into()));
//! assert_eq!(store.value("PowerState"), Some(PropertyValue::Bool(true)));
//! assert_eq!(store.wire_value("PowerState").as_deref(), Some("True"));
//! ```
//!
//! # Architecture
//!
//! ```text
//! PropertyStore (one per remote location)
//!     │
//!     ├── properties: PropertyBag
//!     │       │
//!     │       └── HashMap<name, Property { type, value, flags }>
//!     │
//!     └── event_channel: mpsc::channel<ChangeEvent>
//!             │
//!             └── ChangeIterator
//! ```

// Modules
pub mod coerce;
pub mod event;
pub mod iter;
pub mod property;
pub mod store;
pub mod value;

// Re-exports - Public API
pub use coerce::{coerce, infer_type};
pub use event::{item_from_name, name_from_item, ChangeEvent, HAS_SERVER_DATA};
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use property::{Property, PropertyType};
pub use store::{PropertyBag, PropertyStore};
pub use value::PropertyValue;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::ChangeEvent;
    pub use crate::iter::ChangeIterator;
    pub use crate::property::{Property, PropertyType};
    pub use crate::store::PropertyStore;
    pub use crate::value::PropertyValue;
}
