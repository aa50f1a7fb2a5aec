//! Locally mirrored provider state.
//!
//! Both maps are snapshots. Every update replaces a map wholesale; nothing is
//! merged with earlier contents.

use indexmap::IndexMap;
use mass_core::provider::{ProviderInstance, ProviderManifest};
use mass_core::{MassEvent, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::command::CommandSender;

/// Provider instances keyed by instance id, manifests keyed by domain.
///
/// Insertion order follows the server's enumeration order.
#[derive(Default)]
pub struct ProviderCache {
    providers: RwLock<IndexMap<String, ProviderInstance>>,
    manifests: RwLock<IndexMap<String, ProviderManifest>>,
}

impl ProviderCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch instances and manifests from the server and replace both maps.
    pub async fn bulk_fetch(&self, sender: &dyn CommandSender) -> Result<()> {
        let instances = sender.send_command("providers", Value::Null, None).await?;
        self.replace_providers(serde_json::from_value(instances)?);

        let manifests = sender
            .send_command("providers/manifests", Value::Null, None)
            .await?;
        self.replace_manifests(serde_json::from_value(manifests)?);
        Ok(())
    }

    /// Replace the instance map with `instances`.
    pub fn replace_providers(&self, instances: Vec<ProviderInstance>) {
        let map: IndexMap<String, ProviderInstance> = instances
            .into_iter()
            .map(|p| (p.instance_id.clone(), p))
            .collect();
        debug!(count = map.len(), "provider instances replaced");
        *self.providers.write() = map;
    }

    /// Replace the manifest map with `manifests`.
    pub fn replace_manifests(&self, manifests: Vec<ProviderManifest>) {
        let map: IndexMap<String, ProviderManifest> = manifests
            .into_iter()
            .map(|m| (m.domain.clone(), m))
            .collect();
        debug!(count = map.len(), "provider manifests replaced");
        *self.manifests.write() = map;
    }

    /// Apply a providers-updated event whose payload is the complete new
    /// instance list. Returns the new instance count.
    ///
    /// A payload that fails to decode leaves the cache untouched.
    pub fn apply_providers_updated(&self, event: &MassEvent) -> Result<usize> {
        let instances: Vec<ProviderInstance> = serde_json::from_value(event.data.clone())?;
        let count = instances.len();
        self.replace_providers(instances);
        Ok(count)
    }

    /// All provider instances.
    pub fn providers(&self) -> Vec<ProviderInstance> {
        self.providers.read().values().cloned().collect()
    }

    /// All provider manifests.
    pub fn provider_manifests(&self) -> Vec<ProviderManifest> {
        self.manifests.read().values().cloned().collect()
    }

    /// Manifest for `domain`.
    pub fn get_provider_manifest(&self, domain: &str) -> Option<ProviderManifest> {
        self.manifests.read().get(domain).cloned()
    }

    /// Look up a provider by instance id, falling back to domain.
    ///
    /// An exact instance match that is unavailable ends the lookup unless the
    /// provider is a streaming provider: non-streaming providers hold their own
    /// library and another instance of the same domain cannot stand in for it.
    /// A streaming one falls back to the other instances of its own domain.
    /// With several domain matches the first in enumeration order wins.
    pub fn get_provider(
        &self,
        instance_id_or_domain: &str,
        include_unavailable: bool,
    ) -> Option<ProviderInstance> {
        let providers = self.providers.read();
        let usable = |p: &ProviderInstance| include_unavailable || p.available;

        let mut domain = instance_id_or_domain;
        if let Some(exact) = providers.get(instance_id_or_domain) {
            if usable(exact) {
                return Some(exact.clone());
            }
            if !exact.is_streaming() {
                return None;
            }
            domain = &exact.domain;
        }

        let found = providers
            .values()
            .find(|p| p.domain == domain && usable(p))
            .cloned();
        if found.is_none() {
            debug!(provider = instance_id_or_domain, "provider not available");
        }
        found
    }
}
