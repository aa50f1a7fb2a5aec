//! Wire codec: typed envelopes exchanged over the API socket.
//!
//! Every frame is a JSON object. [`parse_message`] classifies a raw frame by
//! the keys it carries; outgoing commands are serialised with
//! [`CommandMessage::to_value`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ClientError, Result, ServerError};
use crate::events::MassEvent;
use crate::ids::CorrelationId;

/// Command sent from client to server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Correlation id echoed in the matching result.
    #[serde(deserialize_with = "deserialize_message_id")]
    pub message_id: String,
    /// Command name, e.g. `players/cmd/play`.
    pub command: String,
    /// Keyword arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl CommandMessage {
    /// Build a command envelope.
    ///
    /// `args` must be a JSON object or `null` (treated as no arguments).
    pub fn new(id: &CorrelationId, command: impl Into<String>, args: Value) -> Result<Self> {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::InvalidMessage(format!(
                    "command args must be an object, got {other}"
                )));
            }
        };
        Ok(Self {
            message_id: id.to_string(),
            command: command.into(),
            args,
        })
    }

    /// Serialise for the transport.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::with_capacity(3);
        let _ = obj.insert("message_id".into(), Value::String(self.message_id.clone()));
        let _ = obj.insert("command".into(), Value::String(self.command.clone()));
        let _ = obj.insert("args".into(), Value::Object(self.args.clone()));
        Value::Object(obj)
    }
}

/// Successful command result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessResultMessage {
    /// Correlation id of the command.
    #[serde(deserialize_with = "deserialize_message_id")]
    pub message_id: String,
    /// Result payload.
    #[serde(default)]
    pub result: Value,
    /// Whether more chunks follow for the same id.
    #[serde(default)]
    pub partial: bool,
}

/// Failed command result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResultMessage {
    /// Correlation id of the command.
    #[serde(deserialize_with = "deserialize_message_id")]
    pub message_id: String,
    /// Server error code.
    pub error_code: i64,
    /// Server-supplied details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResultMessage {
    /// Translate into the typed server error.
    pub fn to_error(&self) -> ServerError {
        ServerError::from_code(self.error_code, self.details.clone())
    }
}

/// Server identity and protocol versions, sent once on connect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Unique server id.
    pub server_id: String,
    /// Server software version.
    pub server_version: String,
    /// API schema version the server speaks.
    pub schema_version: u32,
    /// Oldest client schema version the server accepts.
    pub min_supported_schema_version: u32,
    /// Base URL for HTTP resources (image proxy, streams).
    pub base_url: String,
    /// Whether the server runs as a Home Assistant add-on.
    #[serde(default)]
    pub homeassistant_addon: bool,
    /// Whether onboarding has completed.
    #[serde(default)]
    pub onboard_done: bool,
}

/// A classified incoming frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiMessage {
    /// A command (only seen when the peer echoes one back).
    Command(CommandMessage),
    /// Successful result for a pending command.
    Success(SuccessResultMessage),
    /// Failed result for a pending command.
    Error(ErrorResultMessage),
    /// Unsolicited event.
    Event(MassEvent),
    /// Server info.
    ServerInfo(ServerInfo),
}

impl ApiMessage {
    /// Correlation id for result envelopes.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Command(m) => Some(&m.message_id),
            Self::Success(m) => Some(&m.message_id),
            Self::Error(m) => Some(&m.message_id),
            Self::Event(_) | Self::ServerInfo(_) => None,
        }
    }
}

/// Classify a raw frame.
///
/// Order of precedence: `event`, `error_code`, `result`, `server_id`, `command`.
pub fn parse_message(raw: Value) -> Result<ApiMessage> {
    let key = match &raw {
        Value::Object(obj) => ENVELOPE_KEYS.iter().copied().find(|k| obj.contains_key(*k)),
        _ => {
            return Err(ClientError::InvalidMessage(format!(
                "expected JSON object, got {raw}"
            )));
        }
    };
    let msg = match key {
        Some("event") => ApiMessage::Event(serde_json::from_value(raw)?),
        Some("error_code") => ApiMessage::Error(serde_json::from_value(raw)?),
        Some("result") => ApiMessage::Success(serde_json::from_value(raw)?),
        Some("server_id") => ApiMessage::ServerInfo(serde_json::from_value(raw)?),
        Some("command") => ApiMessage::Command(serde_json::from_value(raw)?),
        _ => {
            return Err(ClientError::InvalidMessage(format!(
                "unrecognised envelope: {raw}"
            )));
        }
    };
    Ok(msg)
}

/// Discriminating keys, in precedence order.
const ENVELOPE_KEYS: [&str; 5] = ["event", "error_code", "result", "server_id", "command"];

/// Decode the server-info payload returned by the transport on connect.
pub fn parse_server_info(raw: Value) -> Result<ServerInfo> {
    Ok(serde_json::from_value(raw)?)
}

/// Accept both string and integer message ids.
fn deserialize_message_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Int(i64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
