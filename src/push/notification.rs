use serde_json::{Map, Value};
use thiserror::Error;

use crate::webhook::{NotifyMessage, OfflinePushNotify};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Message payload is not a JSON object: {0}")]
    InvalidPayload(String),

    #[error("Message payload has no integer `type`")]
    MissingContentType,
}

/// A message prepared for push rendering.
///
/// Unencrypted payloads are parsed once here; encrypted payloads are carried
/// as opaque bytes and `content_type` stays `None`.
#[derive(Debug, Clone)]
pub struct PushNotification {
    pub message: NotifyMessage,
    pub content_type: Option<i64>,
    pub payload_json: Option<Map<String, Value>>,
    pub source_id: Option<i64>,
}

impl PushNotification {
    pub fn from_message(
        message: NotifyMessage,
        source_id: Option<i64>,
    ) -> Result<Self, NotificationError> {
        if message.setting.is_encrypted() {
            return Ok(Self {
                message,
                content_type: None,
                payload_json: None,
                source_id,
            });
        }

        let payload: Map<String, Value> = serde_json::from_slice(&message.payload)
            .map_err(|e| NotificationError::InvalidPayload(e.to_string()))?;
        let content_type = payload
            .get("type")
            .and_then(Value::as_i64)
            .ok_or(NotificationError::MissingContentType)?;

        Ok(Self {
            message,
            content_type: Some(content_type),
            payload_json: Some(payload),
            source_id,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.message.setting.is_encrypted()
    }

    /// String field of the parsed payload, if any.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload_json
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
    }
}

impl TryFrom<OfflinePushNotify> for PushNotification {
    type Error = NotificationError;

    fn try_from(notify: OfflinePushNotify) -> Result<Self, Self::Error> {
        Self::from_message(notify.message, notify.source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::MessageSetting;

    fn message(payload: &str, setting: u8) -> NotifyMessage {
        NotifyMessage {
            message_id: 1,
            setting: MessageSetting(setting),
            payload: payload.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_payload_yields_content_type() {
        let n = PushNotification::from_message(message(r#"{"type":1,"content":"hi"}"#, 0), Some(3))
            .unwrap();
        assert_eq!(n.content_type, Some(1));
        assert_eq!(n.payload_str("content"), Some("hi"));
        assert_eq!(n.source_id, Some(3));
    }

    #[test]
    fn test_encrypted_payload_is_not_parsed() {
        let n = PushNotification::from_message(message("\u{1}opaque", 1 << 5), None).unwrap();
        assert!(n.is_encrypted());
        assert!(n.content_type.is_none());
        assert!(n.payload_json.is_none());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = PushNotification::from_message(message("not json", 0), None).unwrap_err();
        assert!(matches!(err, NotificationError::InvalidPayload(_)));
    }

    #[test]
    fn test_missing_type_rejected() {
        let err = PushNotification::from_message(message(r#"{"content":"hi"}"#, 0), None).unwrap_err();
        assert!(matches!(err, NotificationError::MissingContentType));

        let err = PushNotification::from_message(message(r#"{"type":"1"}"#, 0), None).unwrap_err();
        assert!(matches!(err, NotificationError::MissingContentType));
    }
}
