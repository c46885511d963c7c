//! A single named property and the Premise type system
//!
//! `Property` holds the cached value for one remote property. Every
//! assignment goes through [`Property::set_value`], which coerces to the
//! declared type and reports whether anything actually changed. Callers
//! rely on that boolean to decide whether to notify or write back.
//!
//! # Example
//!
//! ```rust
//! use premise_state::{Property, PropertyType, PropertyValue};
//!
//! let mut brightness = Property::new("Brightness", PropertyType::Percent);
//! assert!(brightness.set_value(Some("99%".into())));
//! assert_eq!(brightness.value(), Some(&PropertyValue::Float(0.99)));
//!
//! // Same value after coercion: nothing to do
//! assert!(!brightness.set_value(Some(0.99.into())));
//! assert_eq!(brightness.wire_value().as_deref(), Some("99%"));
//! ```

use serde::{Deserialize, Serialize};

use crate::coerce::{coerce, infer_type, percent_to_wire};
use crate::value::PropertyValue;

/// Remote types known to the server
///
/// Only the first handful carry coercion rules. The rest are opaque and
/// pass values through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyType {
    /// Unspecified; inferred from the first assigned value
    #[default]
    None,
    ObjectRef,
    Text,
    Boolean,
    Integer,
    Float,
    Color,
    StaticText,
    DateTime,
    Date,
    Time,
    FileFolder,
    Currency,
    Percent,
    MultiValue,
    ComponentRef,
    ObjectArray,
    DataSource,
    Font,
    Stream,
    ObjectFlag,
    ControlCode,
    StatusCode,
    TimeSpan,
    Unit,
    Image,
    HtmlColor,
    ByteArray,
    ClassRef,
    File,
    DynamicType,
    Picture,
}

impl PropertyType {
    /// True for types whose values are coerced rather than passed through
    pub fn has_coercion(&self) -> bool {
        matches!(
            self,
            PropertyType::Text
                | PropertyType::Boolean
                | PropertyType::Integer
                | PropertyType::Float
                | PropertyType::Percent
                | PropertyType::DateTime
                | PropertyType::Date
                | PropertyType::Time
        )
    }
}

/// Cached state for one named property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    ty: PropertyType,
    value: Option<PropertyValue>,
    persistent: bool,
    ignore_server: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            value: None,
            persistent: false,
            ignore_server: false,
        }
    }

    /// Keep the cached value across re-adds instead of fetching again
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Never fetch from the server and ignore pushed values
    pub fn ignore_server(mut self, ignore_server: bool) -> Self {
        self.ignore_server = ignore_server;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type, or the inferred one once a value has been assigned
    pub fn property_type(&self) -> PropertyType {
        self.ty
    }

    pub fn value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_ignore_server(&self) -> bool {
        self.ignore_server
    }

    /// Assign a new value, returning whether the cached value changed
    ///
    /// `None` clears the value unconditionally. A value that fails to
    /// coerce leaves the previous one in place and reports no change.
    pub fn set_value(&mut self, value: Option<PropertyValue>) -> bool {
        let Some(value) = value else {
            return self.value.take().is_some();
        };

        if self.ty == PropertyType::None {
            self.ty = infer_type(&value);
            tracing::trace!("Inferred type {:?} for property '{}'", self.ty, self.name);
        }

        let Some(coerced) = coerce(self.ty, value) else {
            tracing::debug!(
                "Ignoring value for '{}': cannot coerce to {:?}",
                self.name,
                self.ty
            );
            return false;
        };

        if self.value.as_ref() == Some(&coerced) {
            return false;
        }
        self.value = Some(coerced);
        true
    }

    /// Text form of the current value as the server expects it on writes
    pub fn wire_value(&self) -> Option<String> {
        self.value.as_ref().map(|value| match (self.ty, value) {
            (PropertyType::Percent, PropertyValue::Float(f)) => percent_to_wire(*f),
            (_, value) => value.to_wire(),
        })
    }
}
