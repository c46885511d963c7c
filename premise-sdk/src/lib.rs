//! # Premise SDK - object-style access to a Premise home automation server
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use premise_sdk::{PremiseObject, PremiseServer, PropertyType, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), premise_sdk::SdkError> {
//!     let server = PremiseServer::new(ServerConfig::from_env()?);
//!     server.connect().await?;
//!     server.wait_for_connection(Duration::from_secs(5)).await?;
//!
//!     let light = PremiseObject::new(&server, "sys://Home/Kitchen/Overhead");
//!     light.add_property("Brightness", PropertyType::Percent, true).await?;
//!     light.add_property("PowerState", PropertyType::Boolean, true).await?;
//!
//!     light.set("PowerState", true).await?;
//!     println!("Brightness: {:?}", light.value("Brightness"));
//!
//!     // Blocks; pushes from the server arrive as change events
//!     for event in light.changes() {
//!         if let Some(name) = event.property_name() {
//!             println!("{} = {:?}", name, light.value(name));
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! premise-sdk (PremiseObject, PremiseCommand)
//!     ↓
//! premise-stream (PremiseServer: subscriptions, read loop, one-shot HTTP)
//!     ↓                         ↓
//! premise-socket (transport)    premise-state (typed values, coercion)
//! ```

// Main exports
pub use command::PremiseCommand;
pub use dispatch::QueuedNotifier;
pub use error::{Result, SdkError};
pub use object::{Member, PremiseObject, PropertyDef, COMMAND_SUFFIX};

// Re-export the layers below
pub use premise_state::{
    item_from_name, name_from_item, ChangeEvent, ChangeIterator, Property, PropertyType, PropertyValue,
    HAS_SERVER_DATA,
};
pub use premise_stream::{
    ConnectionState, DirectNotifier, Notifier, PremiseServer, PremiseSocket, ServerConfig, ServerError,
    ServerStatus, SubscriptionTarget, TcpPremiseSocket,
};

pub mod logging;

mod command;
mod dispatch;
mod error;
mod object;
