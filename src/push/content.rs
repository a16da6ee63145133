//! Preview text for push notifications.

use super::PushNotification;

/// Shown for encrypted or unsupported content.
pub const GENERIC_PREVIEW: &str = "You have a new message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Image,
    Gif,
    Voice,
    Video,
    Location,
    Card,
    File,
    RedPacket,
    MultipleForward,
    VectorSticker,
    EmojiSticker,
}

impl ContentType {
    /// Map a payload `type` code; `None` for types that are not pushed with a preview.
    pub fn from_code(code: i64) -> Option<Self> {
        let content_type = match code {
            1 => ContentType::Text,
            2 => ContentType::Image,
            3 => ContentType::Gif,
            4 => ContentType::Voice,
            5 => ContentType::Video,
            6 => ContentType::Location,
            7 => ContentType::Card,
            8 => ContentType::File,
            9 => ContentType::RedPacket,
            11 => ContentType::MultipleForward,
            12 => ContentType::VectorSticker,
            13 => ContentType::EmojiSticker,
            _ => return None,
        };
        Some(content_type)
    }

    fn label(self) -> &'static str {
        match self {
            ContentType::Text => "[Text]",
            ContentType::Image => "[Image]",
            ContentType::Gif => "[GIF]",
            ContentType::Voice => "[Voice]",
            ContentType::Video => "[Video]",
            ContentType::Location => "[Location]",
            ContentType::Card => "[Contact Card]",
            ContentType::File => "[File]",
            ContentType::RedPacket => "[Red Packet]",
            ContentType::MultipleForward => "[Chat History]",
            ContentType::VectorSticker | ContentType::EmojiSticker => "[Sticker]",
        }
    }
}

/// One-line preview of the notification body.
pub fn preview_text(notification: &PushNotification) -> String {
    if notification.is_encrypted() {
        return GENERIC_PREVIEW.to_string();
    }

    match notification.content_type.and_then(ContentType::from_code) {
        Some(ContentType::Text) => match notification.payload_str("content") {
            Some(content) if !content.is_empty() => content.to_string(),
            _ => GENERIC_PREVIEW.to_string(),
        },
        Some(other) => other.label().to_string(),
        None => GENERIC_PREVIEW.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::{MessageSetting, NotifyMessage};

    fn notification(payload: &str, setting: u8) -> PushNotification {
        let message = NotifyMessage {
            message_id: 7,
            setting: MessageSetting(setting),
            payload: payload.as_bytes().to_vec(),
            ..Default::default()
        };
        PushNotification::from_message(message, None).unwrap()
    }

    #[test]
    fn test_text_preview_uses_content() {
        let n = notification(r#"{"type":1,"content":"see you at 8"}"#, 0);
        assert_eq!(preview_text(&n), "see you at 8");
    }

    #[test]
    fn test_media_preview_uses_label() {
        assert_eq!(preview_text(&notification(r#"{"type":2}"#, 0)), "[Image]");
        assert_eq!(preview_text(&notification(r#"{"type":13}"#, 0)), "[Sticker]");
    }

    #[test]
    fn test_unsupported_and_encrypted_fall_back() {
        assert_eq!(preview_text(&notification(r#"{"type":10}"#, 0)), GENERIC_PREVIEW);
        assert_eq!(preview_text(&notification("ciphertext", 1 << 5)), GENERIC_PREVIEW);
    }
}
