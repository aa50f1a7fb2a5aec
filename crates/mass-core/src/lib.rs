//! # mass-core
//!
//! Shared vocabulary for the mass remote-control client.
//!
//! - **Branded IDs**: [`ids::CorrelationId`] for outgoing commands
//! - **Codec**: [`api::parse_message`] classifies raw envelopes into [`api::ApiMessage`]
//! - **Errors**: [`errors::ClientError`] and the server error-code taxonomy
//! - **Models**: server info, events, providers, players, queues, images
//! - **Logging**: [`logging::init_subscriber`] for binaries

#![deny(unsafe_code)]

pub mod api;
pub mod constants;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod media;
pub mod player;
pub mod provider;

pub use api::{ApiMessage, ServerInfo, parse_message};
pub use errors::{ClientError, Result, ServerError, ServerErrorKind};
pub use events::{EventType, MassEvent};
pub use ids::CorrelationId;
