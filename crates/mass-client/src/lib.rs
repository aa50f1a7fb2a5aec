//! # mass-client
//!
//! Client-side runtime for the mass remote-control protocol.
//!
//! - [`connection`]: the transport seam ([`Connection`]) and its WebSocket implementation
//! - [`schema`]: connect-time and per-command schema compatibility checks
//! - [`correlator`]: pending-command table keyed by correlation id
//! - [`router`]: event subscriptions with type/object-id filters
//! - [`state`]: locally mirrored provider instances and manifests
//! - [`command`]: the [`CommandSender`] seam the caches fetch through
//! - [`client`]: [`MassClient`], which ties the pieces into one lifecycle
//! - [`players`] / [`queues`]: thin command wrappers plus mirrored state
//! - [`images`]: image URL resolution (direct, resize proxy, server proxy)

#![deny(unsafe_code)]

pub mod client;
pub mod command;
pub mod connection;
pub mod correlator;
pub mod images;
pub mod players;
pub mod queues;
pub mod router;
pub mod schema;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{LifecyclePhase, MassClient};
pub use command::CommandSender;
pub use connection::{Connection, WebsocketConnection};
pub use router::{EventCallback, EventFilter, EventRouter, SubscriptionHandle};
pub use schema::SchemaVersionGuard;
