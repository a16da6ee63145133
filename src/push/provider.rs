use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::content::preview_text;
use super::PushNotification;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("No device registered for uid {0}")]
    DeviceNotFound(String),

    #[error("No push provider for device_type={device_type} bundle_id={bundle_id}")]
    UnsupportedDevice {
        device_type: String,
        bundle_id: String,
    },

    #[error("Device lookup failed: {0}")]
    Lookup(String),

    #[error("Failed to build payload: {0}")]
    Payload(String),

    #[error("Push send failed: {0}")]
    Send(String),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl PushError {
    /// Metrics label for this failure
    pub fn outcome(&self) -> &'static str {
        match self {
            PushError::DeviceNotFound(_) => "no_device",
            PushError::UnsupportedDevice { .. } => "unsupported_device",
            PushError::Lookup(_) => "lookup_error",
            PushError::Payload(_) => "payload_error",
            PushError::Send(_) => "send_error",
            PushError::Timeout(_) => "timeout",
        }
    }
}

/// Process-wide values providers may need when rendering.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub app_name: String,
}

/// Vendor-neutral rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Routing data for the client app
    pub data: serde_json::Value,
}

impl PushPayload {
    /// Default rendering: app name as title, content preview as body.
    pub fn render(notification: &PushNotification, ctx: &ProviderContext) -> Self {
        let message = &notification.message;
        Self {
            title: ctx.app_name.clone(),
            body: preview_text(notification),
            data: json!({
                "message_id": message.message_id.to_string(),
                "message_seq": message.message_seq,
                "from_uid": message.from_uid,
                "channel_id": message.channel_id,
                "channel_type": message.channel_type.as_u8(),
                "red_dot": message.header.red_dot,
            }),
        }
    }
}

/// One push vendor.
///
/// Providers are selected by `(device_type, bundle_id)` and treated
/// identically by the worker pool.
#[async_trait]
pub trait PushProvider: Send + Sync {
    fn name(&self) -> &str;

    fn build_payload(
        &self,
        notification: &PushNotification,
        ctx: &ProviderContext,
        target_uid: &str,
    ) -> Result<PushPayload, PushError>;

    async fn send(&self, device_token: &str, payload: &PushPayload) -> Result<(), PushError>;
}
