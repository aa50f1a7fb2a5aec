//! The command-sending seam used by state caches and domain wrappers.

use async_trait::async_trait;
use mass_core::Result;
use serde_json::Value;

/// Anything that can send a command and await its result.
///
/// [`MassClient`](crate::MassClient) is the production implementation;
/// caches take `&dyn CommandSender` so they can be exercised without a socket.
#[async_trait]
pub trait CommandSender: Send + Sync {
    /// Send `command` with keyword `args` and wait for the correlated result.
    async fn send_command(
        &self,
        command: &str,
        args: Value,
        require_schema: Option<u32>,
    ) -> Result<Value>;
}
