//! Schema version compatibility checks.

use mass_core::constants::API_SCHEMA_VERSION;
use mass_core::{ClientError, Result, ServerInfo};

/// Validates client/server API schema compatibility.
///
/// Stateless apart from the client's own schema version; checks never mutate
/// anything on success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaVersionGuard {
    client_schema: u32,
}

impl SchemaVersionGuard {
    /// Guard for a client speaking `client_schema`.
    pub const fn new(client_schema: u32) -> Self {
        Self { client_schema }
    }

    /// Schema version this client implements.
    pub const fn client_schema(&self) -> u32 {
        self.client_schema
    }

    /// Fails when the server no longer supports our schema.
    ///
    /// On failure the caller must close the connection before surfacing the error.
    pub fn check_connect(&self, info: &ServerInfo) -> Result<()> {
        if info.min_supported_schema_version > self.client_schema {
            return Err(ClientError::IncompatibleVersion(format!(
                "schema version is incompatible: server speaks {}, requires at least {}, \
                 client speaks {}; update the client or downgrade the server",
                info.schema_version, info.min_supported_schema_version, self.client_schema
            )));
        }
        Ok(())
    }

    /// Fails when a command needs a newer schema than the server speaks.
    ///
    /// Runs before the command is serialised, so a rejected command never
    /// reaches the wire.
    pub fn check_command(&self, require_schema: Option<u32>, info: &ServerInfo) -> Result<()> {
        match require_schema {
            Some(required) if required > info.schema_version => {
                Err(ClientError::IncompatibleVersion(format!(
                    "command not available: requires api schema {required}, \
                     server speaks {}; update the server",
                    info.schema_version
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for SchemaVersionGuard {
    fn default() -> Self {
        Self::new(API_SCHEMA_VERSION)
    }
}
