//! Protocol constants shared by the client crates.

/// API schema version implemented by this client.
///
/// Servers whose `min_supported_schema_version` exceeds this value refuse
/// to talk to us; see `SchemaVersionGuard`.
pub const API_SCHEMA_VERSION: u32 = 25;

/// Path of the WebSocket API endpoint relative to the server base URL.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default server URL used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8095";

/// Public resize proxy used for remotely accessible images with a size hint.
pub const IMAGE_RESIZE_PROXY: &str = "https://images.weserv.nl/";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_path_is_absolute() {
        assert!(DEFAULT_WS_PATH.starts_with('/'));
    }

    #[test]
    fn default_server_url_is_http() {
        assert!(DEFAULT_SERVER_URL.starts_with("http://"));
    }
}
