/// Canonical storage channel for a person-to-person chat.
///
/// Order independent: `fake_channel_id(a, b) == fake_channel_id(b, a)`.
pub fn fake_channel_id(uid: &str, peer_uid: &str) -> String {
    if uid >= peer_uid {
        format!("{}@{}", uid, peer_uid)
    } else {
        format!("{}@{}", peer_uid, uid)
    }
}
