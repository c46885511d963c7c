//! # premise-stream
//!
//! Subscription engine for the Premise SYSConnector WebClient protocol.
//!
//! A [`PremiseServer`] keeps one long-lived socket to the server, proves it
//! usable with a canary request, and then keeps a table of property
//! subscriptions alive on it. Values the server pushes back are routed to
//! the subscribed object through a [`Notifier`]. One-shot get, set and invoke
//! calls go over plain HTTP.
//!
//! The socket itself is pluggable through [`PremiseSocket`]; the default is
//! [`TcpPremiseSocket`] with optional TLS.

pub mod codec;
mod config;
mod error;
mod http;
mod notify;
mod reader;
mod server;
mod status;
mod subscription;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use http::{url_from_sys_uri, HttpClient};
pub use notify::{DirectNotifier, Notifier, SubscriptionTarget};
pub use server::PremiseServer;
pub use status::{ConnectionState, ServerStatus};
pub use subscription::{subscription_id, SubscriptionInfo};

pub use premise_socket::{PremiseSocket, SocketError, TcpPremiseSocket};
