//! Settings types.

use std::time::Duration;

use mass_core::constants::{DEFAULT_SERVER_URL, DEFAULT_WS_PATH};
use mass_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Top-level client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Base URL of the server, e.g. `http://192.168.1.2:8095`.
    pub server_url: String,
    /// Default log level for binaries (`RUST_LOG` still wins).
    pub log_level: String,
    /// Log output format for binaries.
    pub log_format: LogFormat,
    /// Transport settings.
    pub connection: ConnectionSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            log_level: "info".into(),
            log_format: LogFormat::Compact,
            connection: ConnectionSettings::default(),
        }
    }
}

/// WebSocket transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Time allowed for the handshake plus the server-info frame.
    pub connect_timeout_ms: u64,
    /// Largest accepted frame, in bytes.
    pub max_message_size: usize,
    /// API path appended to the server URL.
    pub ws_path: String,
}

impl ConnectionSettings {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            ws_path: DEFAULT_WS_PATH.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ClientSettings::default();
        assert_eq!(s.server_url, "http://localhost:8095");
        assert_eq!(s.log_level, "info");
        assert_eq!(s.log_format, LogFormat::Compact);
        assert_eq!(s.connection.connect_timeout(), Duration::from_secs(10));
        assert_eq!(s.connection.max_message_size, 16 * 1024 * 1024);
        assert_eq!(s.connection.ws_path, "/ws");
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_value(ClientSettings::default()).unwrap();
        assert!(json.get("serverUrl").is_some());
        assert!(json["connection"].get("connectTimeoutMs").is_some());
        assert_eq!(json["logFormat"], "compact");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ClientSettings =
            serde_json::from_str(r#"{"connection": {"wsPath": "/api"}}"#).unwrap();
        assert_eq!(s.connection.ws_path, "/api");
        assert_eq!(s.connection.connect_timeout_ms, 10_000);
        assert_eq!(s.server_url, "http://localhost:8095");
    }
}
