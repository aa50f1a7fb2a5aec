//! Error hierarchy for the mass client.
//!
//! - [`ClientError`]: everything a caller of the client can observe
//! - [`ServerErrorKind`]: fixed taxonomy keyed by the server's integer error code
//! - [`ServerError`]: a rejected command, carrying the server's detail payload verbatim

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ClientError
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the mass client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A command was attempted without an established connection.
    #[error("not connected")]
    NotConnected,

    /// Client and server API schema versions are incompatible.
    #[error("incompatible server version: {0}")]
    IncompatibleVersion(String),

    /// The transport dropped, or the client was torn down, while an
    /// operation was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// Opening the transport failed.
    #[error("cannot connect to {url}: {reason}")]
    CannotConnect {
        /// URL that was dialled.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// A frame could not be decoded into a known envelope.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The client is in a state that does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The server rejected a command.
    #[error("{0}")]
    Server(#[from] ServerError),
}

impl ClientError {
    /// Whether the failure is transient.
    ///
    /// Informational only: nothing in the client retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionClosed | Self::CannotConnect { .. } => true,
            Self::Server(e) => e.kind == ServerErrorKind::ResourceTemporarilyUnavailable,
            _ => false,
        }
    }

    /// Server error kind, if this is a server-side rejection.
    #[must_use]
    pub fn server_kind(&self) -> Option<ServerErrorKind> {
        match self {
            Self::Server(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMessage(err.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ─────────────────────────────────────────────────────────────────────────────
// Server error taxonomy
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! server_error_kinds {
    ($( $(#[$meta:meta])* $variant:ident = $code:literal ),+ $(,)?) => {
        /// Server-defined error family, keyed by integer error code.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum ServerErrorKind {
            $( $(#[$meta])* $variant, )+
            /// Code not present in the taxonomy.
            Unknown,
        }

        impl ServerErrorKind {
            /// Look up the kind registered for `code`.
            #[must_use]
            pub fn from_code(code: i64) -> Self {
                match code {
                    $( $code => Self::$variant, )+
                    _ => Self::Unknown,
                }
            }

            /// Wire code registered for this kind (`None` for [`Self::Unknown`]).
            #[must_use]
            pub fn code(self) -> Option<i64> {
                match self {
                    $( Self::$variant => Some($code), )+
                    Self::Unknown => None,
                }
            }
        }
    };
}

server_error_kinds! {
    /// Generic server failure.
    Generic = 0,
    /// The provider is not available.
    ProviderUnavailable = 1,
    /// The requested media could not be found.
    MediaNotFound = 2,
    /// Invalid data was supplied or returned.
    InvalidData = 3,
    /// The item is already registered.
    AlreadyRegistered = 4,
    /// Provider or player setup failed.
    SetupFailed = 5,
    /// Provider login failed.
    LoginFailed = 6,
    /// Audio pipeline failure.
    AudioError = 7,
    /// The queue is empty.
    QueueEmpty = 8,
    /// The feature is not supported.
    UnsupportedFeature = 9,
    /// The player is not available.
    PlayerUnavailable = 10,
    /// The player command failed.
    PlayerCommandFailed = 11,
    /// Unknown or malformed command.
    InvalidCommand = 12,
    /// The media cannot be played.
    UnplayableMedia = 13,
    /// Invalid provider URI.
    InvalidProviderUri = 14,
    /// Invalid provider id.
    InvalidProviderId = 15,
    /// Retries exhausted server-side.
    RetriesExhausted = 16,
    /// Resource temporarily unavailable.
    ResourceTemporarilyUnavailable = 17,
    /// The provider denied permission.
    ProviderPermissionDenied = 18,
    /// The action is not available.
    ActionUnavailable = 19,
    /// The user lacks permission.
    InsufficientPermissions = 20,
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "unknown".to_owned());
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// A command rejected by the server.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("server error {kind} (code {code}){}", details_suffix(.details.as_ref()))]
pub struct ServerError {
    /// Typed kind resolved from `code`.
    pub kind: ServerErrorKind,
    /// Raw error code as sent by the server.
    pub code: i64,
    /// Server-supplied detail payload, unchanged.
    pub details: Option<Value>,
}

impl ServerError {
    /// Translate a raw error code and detail payload.
    #[must_use]
    pub fn from_code(code: i64, details: Option<Value>) -> Self {
        Self {
            kind: ServerErrorKind::from_code(code),
            code,
            details,
        }
    }
}

fn details_suffix(details: Option<&Value>) -> String {
    match details {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => format!(": {s}"),
        Some(other) => format!(": {other}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn every_registered_code_round_trips() {
        for code in 0..=20 {
            let kind = ServerErrorKind::from_code(code);
            assert_ne!(kind, ServerErrorKind::Unknown, "code {code}");
            assert_eq!(kind.code(), Some(code));
        }
    }

    #[test]
    fn unregistered_code_is_unknown_but_keeps_raw_code() {
        let err = ServerError::from_code(999, None);
        assert_eq!(err.kind, ServerErrorKind::Unknown);
        assert_eq!(err.code, 999);
        assert_eq!(ServerErrorKind::Unknown.code(), None);
    }

    #[test]
    fn details_are_preserved_verbatim() {
        let details = json!({"player_id": "p1", "reason": ["a", "b"]});
        let err = ServerError::from_code(10, Some(details.clone()));
        assert_eq!(err.kind, ServerErrorKind::PlayerUnavailable);
        assert_eq!(err.details, Some(details));
    }

    #[test]
    fn display_includes_kind_code_and_string_details() {
        let err = ServerError::from_code(2, Some(json!("track 42 not found")));
        assert_eq!(
            err.to_string(),
            "server error media_not_found (code 2): track 42 not found"
        );
    }

    #[test]
    fn display_without_details() {
        let err = ServerError::from_code(8, None);
        assert_eq!(err.to_string(), "server error queue_empty (code 8)");
    }

    #[test]
    fn server_error_converts_into_client_error() {
        let err: ClientError = ServerError::from_code(11, None).into();
        assert_matches!(err, ClientError::Server(ServerError { kind: ServerErrorKind::PlayerCommandFailed, .. }));
        assert_eq!(err.server_kind(), Some(ServerErrorKind::PlayerCommandFailed));
    }

    #[test]
    fn json_error_becomes_invalid_message() {
        let json_err = serde_json::from_str::<Value>("{bad").unwrap_err();
        let err: ClientError = json_err.into();
        assert_matches!(err, ClientError::InvalidMessage(_));
    }

    #[test]
    fn retryable_classification() {
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(
            ClientError::CannotConnect {
                url: "ws://x".into(),
                reason: "refused".into()
            }
            .is_retryable()
        );
        assert!(ClientError::Server(ServerError::from_code(17, None)).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::IncompatibleVersion("x".into()).is_retryable());
        assert!(!ClientError::Server(ServerError::from_code(12, None)).is_retryable());
    }

    #[test]
    fn client_error_display() {
        assert_eq!(ClientError::NotConnected.to_string(), "not connected");
        assert_eq!(ClientError::ConnectionClosed.to_string(), "connection closed");
        assert_eq!(
            ClientError::CannotConnect {
                url: "ws://host/ws".into(),
                reason: "refused".into()
            }
            .to_string(),
            "cannot connect to ws://host/ws: refused"
        );
    }
}
