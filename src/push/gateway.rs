//! HTTP push gateway provider.
//!
//! Posts `{device_token, payload}` to a vendor bridge endpoint. One instance is
//! registered per configured `(device_type, bundle_id)` pair.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::{ProviderConfig, PushConfig};

use super::{ProviderContext, ProviderRegistry, PushError, PushNotification, PushPayload, PushProvider};

#[derive(Serialize)]
struct GatewayRequest<'a> {
    device_token: &'a str,
    payload: &'a PushPayload,
}

pub struct HttpGatewayProvider {
    name: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGatewayProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Send(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            name: format!("gateway:{}", config.device_type),
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PushProvider for HttpGatewayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(
        &self,
        notification: &PushNotification,
        ctx: &ProviderContext,
        _target_uid: &str,
    ) -> Result<PushPayload, PushError> {
        Ok(PushPayload::render(notification, ctx))
    }

    async fn send(&self, device_token: &str, payload: &PushPayload) -> Result<(), PushError> {
        let mut request = self.client.post(&self.endpoint).json(&GatewayRequest {
            device_token,
            payload,
        });
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PushError::Timeout("gateway request")
            } else {
                PushError::Send(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Send(format!("gateway returned {}: {}", status, body)));
        }
        Ok(())
    }
}

/// Register one gateway provider per configured entry; returns how many were registered.
pub fn register_configured_providers(registry: &ProviderRegistry, config: &PushConfig) -> usize {
    let timeout = Duration::from_millis(config.send_timeout_ms);
    let mut registered = 0;

    for provider_config in &config.providers {
        match HttpGatewayProvider::new(provider_config, timeout) {
            Ok(provider) => {
                registry.register(
                    &provider_config.device_type,
                    &provider_config.bundle_id,
                    Arc::new(provider),
                );
                registered += 1;
            }
            Err(e) => {
                tracing::error!(
                    device_type = %provider_config.device_type,
                    bundle_id = %provider_config.bundle_id,
                    error = %e,
                    "Failed to create push gateway provider"
                );
            }
        }
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(device_type: &str) -> ProviderConfig {
        ProviderConfig {
            device_type: device_type.to_string(),
            bundle_id: "com.example.chat".to_string(),
            endpoint: "http://127.0.0.1:9/push".to_string(),
            api_key: Some("k".to_string()),
        }
    }

    #[test]
    fn test_registers_each_configured_provider() {
        let registry = ProviderRegistry::new();
        let config = PushConfig {
            providers: vec![provider_config("IOS"), provider_config("FCM")],
            ..Default::default()
        };

        assert_eq!(register_configured_providers(&registry, &config), 2);
        let provider = registry.resolve("FCM", "com.example.chat").unwrap();
        assert_eq!(provider.name(), "gateway:FCM");
    }
}
