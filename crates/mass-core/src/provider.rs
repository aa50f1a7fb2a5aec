//! Provider instances and manifests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Music source.
    Music,
    /// Player backend.
    Player,
    /// Metadata source.
    Metadata,
    /// Plugin.
    Plugin,
    /// Built-in core provider.
    Core,
    /// Anything newer than this client.
    #[serde(other)]
    Unknown,
}

/// A loaded (running) provider instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderInstance {
    /// Provider category.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Provider domain (shared by all instances of the same provider).
    pub domain: String,
    /// Display name.
    pub name: String,
    /// Unique instance id.
    pub instance_id: String,
    /// Whether the instance is currently usable.
    #[serde(default)]
    pub available: bool,
    /// Streaming providers serve interchangeable catalogues; non-streaming
    /// ones (e.g. filesystems) hold unique data per instance.
    #[serde(default)]
    pub is_streaming_provider: Option<bool>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderInstance {
    /// Whether other instances of the same domain can stand in for this one.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming_provider.unwrap_or(false)
    }
}

/// Static description of a provider (one per domain).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderManifest {
    /// Provider category.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Provider domain.
    pub domain: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Whether more than one instance may be configured.
    #[serde(default)]
    pub multi_instance: bool,
    /// Whether the provider ships with the server.
    #[serde(default)]
    pub builtin: bool,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_decodes_and_keeps_extra_fields() {
        let prov: ProviderInstance = serde_json::from_value(json!({
            "type": "music",
            "domain": "spotify",
            "name": "Spotify",
            "instance_id": "spotify--abc",
            "available": true,
            "is_streaming_provider": true,
            "supported_features": ["search"]
        }))
        .unwrap();
        assert_eq!(prov.provider_type, ProviderType::Music);
        assert!(prov.is_streaming());
        assert_eq!(prov.extra["supported_features"], json!(["search"]));
    }

    #[test]
    fn streaming_flag_defaults_to_false() {
        let prov: ProviderInstance = serde_json::from_value(json!({
            "type": "music",
            "domain": "filesystem_local",
            "name": "Local",
            "instance_id": "fs1"
        }))
        .unwrap();
        assert!(!prov.available);
        assert!(!prov.is_streaming());
    }

    #[test]
    fn unknown_provider_type() {
        let man: ProviderManifest = serde_json::from_value(json!({
            "type": "something_new",
            "domain": "x",
            "name": "X"
        }))
        .unwrap();
        assert_eq!(man.provider_type, ProviderType::Unknown);
        assert!(!man.multi_instance);
    }
}
