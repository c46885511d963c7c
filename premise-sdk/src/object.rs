//! Local cache of one remote object's properties
//!
//! A [`PremiseObject`] mirrors the properties an application asked for on
//! one remote location. Adding a property fetches its current value and can
//! subscribe it for pushes. Local writes go to the server; server pushes are
//! applied without writing back, and a write that does not change the
//! coerced value goes nowhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use premise_state::{ChangeIterator, Property, PropertyStore, PropertyType, PropertyValue, HAS_SERVER_DATA};
use premise_stream::{PremiseServer, SubscriptionTarget};

use crate::command::PremiseCommand;
use crate::error::{Result, SdkError};

/// Suffix that turns a member lookup into a command lookup
pub const COMMAND_SUFFIX: &str = "Command";

/// Declaration of a property to add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,
    pub persistent: bool,
    pub ignore_server: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            persistent: false,
            ignore_server: false,
        }
    }

    /// Keep a fetched value when the property is added again
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Never fetch the property and ignore server pushes for it
    pub fn ignore_server(mut self, ignore_server: bool) -> Self {
        self.ignore_server = ignore_server;
        self
    }

    fn into_property(self) -> Property {
        Property::new(self.name, self.ty)
            .persistent(self.persistent)
            .ignore_server(self.ignore_server)
    }
}

/// Result of a member lookup by name
#[derive(Debug, Clone)]
pub enum Member {
    /// A registered property and its cached value, `None` until populated
    Value(Option<PropertyValue>),
    /// A command bound to the base property name
    Command(PremiseCommand),
}

/// A remote object and its cached properties
///
/// Always held in an `Arc`. The engine keeps only a weak reference for
/// subscriptions, so dropping the last `Arc` stops pushes to this object.
///
/// # Example
///
/// ```rust,ignore
/// use premise_sdk::{PremiseObject, PremiseServer, PropertyType, ServerConfig};
///
/// let server = PremiseServer::new(ServerConfig::for_host("premise", 86));
/// server.connect().await?;
///
/// let light = PremiseObject::new(&server, "sys://Home/Kitchen/Overhead");
/// light.add_property("Brightness", PropertyType::Percent, true).await?;
/// light.set("Brightness", 0.75).await?;
///
/// for event in light.changes() {
///     println!("{:?} = {:?}", event.property_name(), light.value("Brightness"));
/// }
/// ```
pub struct PremiseObject {
    store: PropertyStore,
    server: PremiseServer,
    me: Weak<PremiseObject>,
    has_server_data: AtomicBool,
}

impl PremiseObject {
    pub fn new(server: &PremiseServer, location: impl Into<String>) -> Arc<Self> {
        let location = location.into();
        Arc::new_cyclic(|me| Self {
            store: PropertyStore::new(location),
            server: server.clone(),
            me: me.clone(),
            has_server_data: AtomicBool::new(false),
        })
    }

    pub fn location(&self) -> &str {
        self.store.location()
    }

    pub fn server(&self) -> &PremiseServer {
        &self.server
    }

    // ========================================================================
    // Adding properties
    // ========================================================================

    /// Register a property, optionally subscribe to it, then fetch its value.
    ///
    /// If the fetch fails the property stays registered (and subscribed)
    /// with no value and [`SdkError::Communication`] is returned.
    pub async fn add_property(&self, name: &str, ty: PropertyType, subscribe: bool) -> Result<()> {
        self.add_property_def(PropertyDef::new(name, ty), None, subscribe)
            .await
    }

    /// Register a property with an initial value.
    ///
    /// With an initial value and `subscribe == false` nothing is sent to the
    /// server. Otherwise this behaves like [`add_property`](Self::add_property).
    pub async fn add_property_with_value(
        &self,
        name: &str,
        initial: Option<PropertyValue>,
        ty: PropertyType,
        subscribe: bool,
    ) -> Result<()> {
        self.add_property_def(PropertyDef::new(name, ty), initial, subscribe)
            .await
    }

    /// Add several properties in order, stopping at the first failure
    pub async fn add_properties(
        &self,
        subscribe: bool,
        defs: impl IntoIterator<Item = PropertyDef>,
    ) -> Result<()> {
        for def in defs {
            self.add_property_def(def, None, subscribe).await?;
        }
        Ok(())
    }

    /// Register a property from a full declaration
    pub async fn add_property_def(
        &self,
        def: PropertyDef,
        initial: Option<PropertyValue>,
        subscribe: bool,
    ) -> Result<()> {
        let name = def.name.clone();
        let ignore_server = def.ignore_server;
        let persistent = def.persistent;

        if !self.store.register(def.into_property()) {
            tracing::trace!("{} already registered on {}", name, self.location());
        }

        let has_initial = initial.is_some();
        if has_initial {
            self.store.set(&name, initial);
        }

        if ignore_server {
            tracing::debug!("{} on {} ignores the server", name, self.location());
            return Ok(());
        }
        if has_initial && !subscribe {
            return Ok(());
        }

        // Subscription precedes the fetch
        if subscribe {
            self.subscribe(&name).await?;
        }

        if persistent && self.store.value(&name).is_some() {
            tracing::trace!("Keeping persistent value of {} on {}", name, self.location());
            return Ok(());
        }
        match self.server.get_value(self.location(), &name).await {
            Ok(value) => {
                self.apply_from_server(&name, &value);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} on {}: {}", name, self.location(), e);
                Err(SdkError::Communication(e))
            }
        }
    }

    /// Subscribe an already registered property for pushes
    pub async fn subscribe(&self, name: &str) -> Result<()> {
        let Some(me) = self.me.upgrade() else {
            return Ok(());
        };
        self.server.subscribe(me, name).await?;
        Ok(())
    }

    /// Stop pushes for `name`; the cached value is kept
    pub async fn unsubscribe(&self, name: &str) -> Result<()> {
        self.server.unsubscribe(self, name).await?;
        Ok(())
    }

    // ========================================================================
    // Member access
    // ========================================================================

    /// Look up a member by name.
    ///
    /// Names ending in `Command` yield a [`PremiseCommand`] bound to the base
    /// name, whether or not that property is registered.
    pub fn get(&self, name: &str) -> Result<Member> {
        if let Some(base) = command_base(name) {
            return Ok(Member::Command(PremiseCommand::new(
                self.me.upgrade(),
                Some(base.to_string()),
            )));
        }

        self.store
            .get(name)
            .map(|p| Member::Value(p.value().cloned()))
            .ok_or_else(|| SdkError::PropertyNotFound(name.to_string()))
    }

    /// Cached value of a property
    pub fn value(&self, name: &str) -> Option<PropertyValue> {
        self.store.value(name)
    }

    /// Set a property locally and write it to the server if it changed
    pub async fn set(&self, name: &str, value: impl Into<PropertyValue>) -> Result<bool> {
        self.set_member(name, Some(value.into()), true).await
    }

    /// Assign a value, writing it to the server only for local changes.
    ///
    /// `None` clears the value so the next server push is always applied.
    /// Returns whether the cached value changed.
    pub async fn set_member(&self, name: &str, value: Option<PropertyValue>, local: bool) -> Result<bool> {
        if !self.store.set(name, value) {
            return Ok(false);
        }
        if !local {
            self.mark_server_data();
            return Ok(true);
        }

        let Some(property) = self.store.get(name) else {
            return Ok(true);
        };
        if property.is_ignore_server() {
            return Ok(true);
        }
        let Some(wire) = property.wire_value() else {
            return Ok(true);
        };

        self.server.set_value(self.location(), name, &wire).await?;
        Ok(true)
    }

    /// Invoke a method on the remote object
    pub async fn invoke(&self, method: &str) -> Result<String> {
        Ok(self.server.invoke_method(self.location(), method).await?)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.store.property_type(name)
    }

    /// True once any property has been populated from the server
    pub fn has_server_data(&self) -> bool {
        self.has_server_data.load(Ordering::SeqCst)
    }

    /// Blocking iterator over this object's change events
    pub fn changes(&self) -> ChangeIterator {
        self.store.iter()
    }

    fn apply_from_server(&self, name: &str, value: &str) {
        if self.store.set(name, Some(PropertyValue::from(value))) {
            tracing::debug!("{} on {} = {:?} (server)", name, self.location(), value);
        }
        self.mark_server_data();
    }

    fn mark_server_data(&self) {
        if !self.has_server_data.swap(true, Ordering::SeqCst) {
            self.store.notify(HAS_SERVER_DATA);
        }
    }
}

impl SubscriptionTarget for PremiseObject {
    fn location(&self) -> &str {
        self.store.location()
    }

    fn apply_server_value(&self, property: &str, value: &str) {
        if self.store.get(property).is_some_and(|p| p.is_ignore_server()) {
            tracing::trace!("Ignoring push for {} on {}", property, self.location());
            return;
        }
        self.apply_from_server(property, value);
    }
}

impl std::fmt::Debug for PremiseObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiseObject")
            .field("location", &self.location())
            .field("properties", &self.store.names())
            .field("has_server_data", &self.has_server_data())
            .finish()
    }
}

fn command_base(name: &str) -> Option<&str> {
    name.strip_suffix(COMMAND_SUFFIX).filter(|base| !base.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use premise_state::ChangeEvent;
    use premise_stream::ServerConfig;

    fn object() -> Arc<PremiseObject> {
        let server = PremiseServer::new(ServerConfig::for_host("premise", 86));
        PremiseObject::new(&server, "sys://Home/Kitchen/Overhead")
    }

    #[test]
    fn test_command_base() {
        assert_eq!(command_base("PowerCommand"), Some("Power"));
        assert_eq!(command_base("Command"), None);
        assert_eq!(command_base("Power"), None);
    }

    #[test]
    fn test_get_unknown_property() {
        let object = object();
        assert!(matches!(
            object.get("Brightness"),
            Err(SdkError::PropertyNotFound(name)) if name == "Brightness"
        ));
    }

    #[test]
    fn test_get_command_for_unregistered_property() {
        let object = object();
        let Ok(Member::Command(command)) = object.get("TriggerCommand") else {
            panic!("expected a command");
        };
        assert_eq!(command.property_name(), Some("Trigger"));
        assert!(command.holding_object().is_some());
    }

    #[test]
    fn test_server_push_is_applied_without_write() {
        let object = object();
        let changes = object.changes();

        object.apply_server_value("Brightness", "50%");

        assert_eq!(object.value("Brightness"), Some(PropertyValue::Float(0.5)));
        assert_eq!(object.property_type("Brightness"), Some(PropertyType::Percent));
        assert!(object.has_server_data());

        let events: Vec<ChangeEvent> = changes.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ChangeEvent::new(object.location(), "Item[Brightness]"),
                ChangeEvent::new(object.location(), HAS_SERVER_DATA),
            ]
        );
    }

    #[test]
    fn test_repeated_push_is_silent() {
        let object = object();
        object.apply_server_value("PowerState", "True");
        let changes = object.changes();
        let _ = changes.try_iter().count();

        object.apply_server_value("PowerState", "True");

        assert_eq!(changes.try_iter().count(), 0);
    }

    #[tokio::test]
    async fn test_ignore_server_property() {
        let object = object();
        object
            .add_property_def(
                PropertyDef::new("Label", PropertyType::Text).ignore_server(true),
                Some("Mine".into()),
                true,
            )
            .await
            .unwrap();

        object.apply_server_value("Label", "Theirs");

        assert_eq!(object.value("Label"), Some(PropertyValue::from("Mine")));
        assert!(!object.has_server_data());
        assert_eq!(object.server().subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_initial_value_without_subscribe_stays_local() {
        let object = object();
        object
            .add_property_with_value("Volume", Some(PropertyValue::Int(7)), PropertyType::Integer, false)
            .await
            .unwrap();

        assert_eq!(object.value("Volume"), Some(PropertyValue::Int(7)));
        assert_eq!(object.property_names(), vec!["Volume".to_string()]);
        assert!(!object.has_server_data());
    }

    #[tokio::test]
    async fn test_server_origin_set_member_does_not_write() {
        let object = object();
        object.store.register(Property::new("Level", PropertyType::Integer));

        let changed = object
            .set_member("Level", Some(PropertyValue::Int(3)), false)
            .await
            .unwrap();

        assert!(changed);
        assert_eq!(object.value("Level"), Some(PropertyValue::Int(3)));
    }

    #[tokio::test]
    async fn test_clearing_value() {
        let object = object();
        object.apply_server_value("Name", "Overhead");

        assert!(object.set_member("Name", None, true).await.unwrap());
        assert!(matches!(object.get("Name"), Ok(Member::Value(None))));

        // The same push is accepted again after clearing
        object.apply_server_value("Name", "Overhead");
        assert_eq!(object.value("Name"), Some(PropertyValue::from("Overhead")));
    }
}
