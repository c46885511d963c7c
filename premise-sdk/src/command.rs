//! Properties exposed as invokable actions
//!
//! Momentary buttons and toggles on the server are plain properties. A
//! [`PremiseCommand`] binds one of them so UI code can trigger it and grey
//! it out while the connection is down.

use std::sync::Arc;

use premise_state::PropertyValue;

use crate::error::{Result, SdkError};
use crate::object::PremiseObject;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// An action that writes a property of a remote object
#[derive(Clone, Default)]
pub struct PremiseCommand {
    object: Option<Arc<PremiseObject>>,
    property_name: Option<String>,
    listeners: Vec<Listener>,
}

impl PremiseCommand {
    pub fn new(object: Option<Arc<PremiseObject>>, property_name: Option<String>) -> Self {
        Self {
            object,
            property_name,
            listeners: Vec::new(),
        }
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    pub fn set_property_name(&mut self, name: Option<String>) {
        if self.property_name != name {
            self.property_name = name;
            self.can_execute_changed();
        }
    }

    pub fn holding_object(&self) -> Option<&Arc<PremiseObject>> {
        self.object.as_ref()
    }

    pub fn set_holding_object(&mut self, object: Option<Arc<PremiseObject>>) {
        let same = match (&self.object, &object) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.object = object;
            self.can_execute_changed();
        }
    }

    /// Bound to an object and a property, and the server is connected
    pub fn can_execute(&self) -> bool {
        match (&self.object, &self.property_name) {
            (Some(object), Some(name)) => !name.is_empty() && object.server().is_connected(),
            _ => false,
        }
    }

    /// Write `parameter`, or `true` when none is given, to the bound property
    pub async fn execute(&self, parameter: Option<PropertyValue>) -> Result<bool> {
        let (Some(object), Some(name)) = (&self.object, &self.property_name) else {
            return Err(SdkError::UnboundCommand);
        };
        if name.is_empty() {
            return Err(SdkError::UnboundCommand);
        }

        let value = parameter.unwrap_or(PropertyValue::Bool(true));
        tracing::debug!("Executing {} on {} with {}", name, object.location(), value);
        object.set_member(name, Some(value), true).await
    }

    /// Call `listener` whenever the binding changes
    pub fn on_can_execute_changed(&mut self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    fn can_execute_changed(&self) {
        for listener in &self.listeners {
            listener();
        }
    }
}

impl std::fmt::Debug for PremiseCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiseCommand")
            .field("object", &self.object.as_ref().map(|o| o.location().to_string()))
            .field("property_name", &self.property_name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
