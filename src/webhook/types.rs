//! Wire types delivered by the messaging core.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header flags; sent as `0`/`1` integers upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default, with = "int_flag")]
    pub no_persist: bool,
    #[serde(default, with = "int_flag")]
    pub red_dot: bool,
    #[serde(default, with = "int_flag")]
    pub sync_once: bool,
}

impl MessageHeader {
    /// Whether the message must not be written to message storage
    pub fn skips_persistence(&self) -> bool {
        self.sync_once || self.no_persist
    }
}

/// Message setting bit field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSetting(pub u8);

impl MessageSetting {
    const RECEIPT: u8 = 1 << 7;
    const SIGNAL: u8 = 1 << 5;

    pub fn receipt_enabled(self) -> bool {
        self.0 & Self::RECEIPT != 0
    }

    /// End-to-end encrypted payload; never content-inspected.
    pub fn is_encrypted(self) -> bool {
        self.0 & Self::SIGNAL != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Person,
    Group,
    Other(u8),
}

impl ChannelType {
    pub fn as_u8(self) -> u8 {
        match self {
            ChannelType::Person => 1,
            ChannelType::Group => 2,
            ChannelType::Other(v) => v,
        }
    }

    pub fn is_person(self) -> bool {
        matches!(self, ChannelType::Person)
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            1 => ChannelType::Person,
            2 => ChannelType::Group,
            v => ChannelType::Other(v),
        }
    }
}

impl Default for ChannelType {
    fn default() -> Self {
        ChannelType::Other(0)
    }
}

impl Serialize for ChannelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(ChannelType::from)
    }
}

/// One message of a notify batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifyMessage {
    #[serde(default)]
    pub header: MessageHeader,
    #[serde(default)]
    pub setting: MessageSetting,
    #[serde(default)]
    pub client_msg_no: String,
    pub message_id: i64,
    #[serde(default)]
    pub message_seq: u32,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub to_uid: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub timestamp: i32,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// A message plus the recipients that should get an offline push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflinePushNotify {
    #[serde(flatten)]
    pub message: NotifyMessage,
    #[serde(default, deserialize_with = "null_as_default")]
    pub to_uids: Vec<String>,
    /// "gzip" selects `compress_to_uids`; any other value means `to_uids` is used
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub compress: Option<String>,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub compress_to_uids: Vec<u8>,
    /// Originating node of the messaging core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
}

/// Presence change for one device class of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnlineStatusUpdate {
    pub uid: String,
    pub device_flag: u8,
    pub online: bool,
    pub socket_id: i64,
    /// Devices online under this device flag
    pub online_count: u32,
    /// Devices online across all flags
    pub total_online_count: u32,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer (`0`/`1`) or boolean flag.
mod int_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Option::<Flag>::deserialize(deserializer)? {
            Some(Flag::Bool(b)) => b,
            Some(Flag::Int(i)) => i == 1,
            None => false,
        })
    }
}

/// Byte fields travel as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) if !s.is_empty() => STANDARD.decode(s.as_bytes()).map_err(D::Error::custom),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_notify_message() {
        let raw = json!({
            "header": {"no_persist": 0, "red_dot": 1, "sync_once": 0},
            "setting": 32,
            "client_msg_no": "c-1",
            "message_id": 1001,
            "message_seq": 7,
            "from_uid": "alice",
            "channel_id": "bob",
            "channel_type": 1,
            "timestamp": 1700000000,
            "payload": "eyJ0eXBlIjoxfQ=="
        });

        let msg: NotifyMessage = serde_json::from_value(raw).unwrap();
        assert!(msg.header.red_dot);
        assert!(!msg.header.skips_persistence());
        assert!(msg.setting.is_encrypted());
        assert!(!msg.setting.receipt_enabled());
        assert_eq!(msg.channel_type, ChannelType::Person);
        assert_eq!(msg.payload, br#"{"type":1}"#.to_vec());
        assert_eq!(msg.to_uid, None);
    }

    #[test]
    fn test_header_accepts_booleans() {
        let header: MessageHeader =
            serde_json::from_value(json!({"no_persist": true, "sync_once": false})).unwrap();
        assert!(header.no_persist);
        assert!(!header.red_dot);
        assert!(header.skips_persistence());
    }

    #[test]
    fn test_parse_offline_notify() {
        let raw = json!({
            "message_id": 5,
            "channel_id": "g1",
            "channel_type": 2,
            "payload": "",
            "to_uids": ["u1", "u2"],
            "compress": "",
            "source_id": 3
        });

        let notify: OfflinePushNotify = serde_json::from_value(raw).unwrap();
        assert_eq!(notify.message.message_id, 5);
        assert_eq!(notify.message.channel_type, ChannelType::Group);
        assert_eq!(notify.to_uids, vec!["u1", "u2"]);
        assert_eq!(notify.compress, None);
        assert_eq!(notify.source_id, Some(3));
        assert!(notify.message.payload.is_empty());
    }

    #[test]
    fn test_unknown_channel_type_is_other() {
        assert_eq!(ChannelType::from(9), ChannelType::Other(9));
        assert_eq!(ChannelType::Other(9).as_u8(), 9);
    }
}
