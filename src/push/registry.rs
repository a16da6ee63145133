use std::sync::Arc;

use dashmap::DashMap;

use super::PushProvider;

/// Push providers keyed by `(device_type, bundle_id)`.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<(String, String), Arc<dyn PushProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; replaces any provider already bound to the pair.
    pub fn register(&self, device_type: &str, bundle_id: &str, provider: Arc<dyn PushProvider>) {
        tracing::info!(
            device_type = %device_type,
            bundle_id = %bundle_id,
            provider = %provider.name(),
            "Push provider registered"
        );
        self.providers
            .insert((device_type.to_string(), bundle_id.to_string()), provider);
    }

    pub fn unregister(&self, device_type: &str, bundle_id: &str) -> bool {
        self.providers
            .remove(&(device_type.to_string(), bundle_id.to_string()))
            .is_some()
    }

    pub fn resolve(&self, device_type: &str, bundle_id: &str) -> Option<Arc<dyn PushProvider>> {
        self.providers
            .get(&(device_type.to_string(), bundle_id.to_string()))
            .map(|p| Arc::clone(p.value()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
