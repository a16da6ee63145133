//! Push eligibility from notice and mute settings.
//!
//! Precedence per recipient: global notice off, then peer mute (person
//! channels), then group-member mute. Any of them suppresses the push.

use std::collections::HashMap;
use std::sync::Arc;

use crate::directory::{DirectoryError, NotifySettingsDirectory};

use super::PushNotification;

/// Lets a content category skip settings checks entirely.
pub trait BypassPolicy: Send + Sync {
    fn bypasses_settings(&self, notification: &PushNotification) -> bool;
}

/// Default policy: nothing bypasses settings.
// Reserved for call invitations; no content category is bound yet.
pub struct NoBypass;

impl BypassPolicy for NoBypass {
    fn bypasses_settings(&self, _notification: &PushNotification) -> bool {
        false
    }
}

/// Settings fetched for one offline-push event.
#[derive(Debug, Default)]
pub struct RecipientSettings {
    /// uid -> new message notice; absent means enabled
    pub notices: HashMap<String, bool>,
    /// uid -> muted the sender
    pub peer_mutes: HashMap<String, bool>,
    /// uid -> muted the group
    pub group_mutes: HashMap<String, bool>,
}

/// Decide whether `uid` may receive a push.
pub fn allow_push(uid: &str, settings: &RecipientSettings) -> bool {
    if settings.notices.get(uid) == Some(&false) {
        return false;
    }
    if settings.peer_mutes.get(uid) == Some(&true) {
        return false;
    }
    if settings.group_mutes.get(uid) == Some(&true) {
        return false;
    }
    true
}

pub struct EligibilityResolver {
    directory: Arc<dyn NotifySettingsDirectory>,
    bypass: Arc<dyn BypassPolicy>,
}

impl EligibilityResolver {
    pub fn new(directory: Arc<dyn NotifySettingsDirectory>) -> Self {
        Self::with_bypass(directory, Arc::new(NoBypass))
    }

    pub fn with_bypass(
        directory: Arc<dyn NotifySettingsDirectory>,
        bypass: Arc<dyn BypassPolicy>,
    ) -> Self {
        Self { directory, bypass }
    }

    /// Candidates allowed to receive a push, in input order.
    ///
    /// Any settings lookup failure fails the whole batch.
    pub async fn resolve(
        &self,
        notification: &PushNotification,
        candidates: &[String],
    ) -> Result<Vec<String>, DirectoryError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if self.bypass.bypasses_settings(notification) {
            tracing::info!(
                message_id = notification.message.message_id,
                "Push bypasses notification settings"
            );
            return Ok(candidates.to_vec());
        }

        let settings = self.fetch_settings(notification, candidates).await?;

        Ok(candidates
            .iter()
            .filter(|uid| allow_push(uid, &settings))
            .cloned()
            .collect())
    }

    async fn fetch_settings(
        &self,
        notification: &PushNotification,
        candidates: &[String],
    ) -> Result<RecipientSettings, DirectoryError> {
        let message = &notification.message;
        let mut settings = RecipientSettings::default();

        for notice in self.directory.user_notices(candidates).await? {
            settings.notices.insert(notice.uid, notice.new_msg_notice);
        }

        if message.channel_type.is_person() {
            // Person channels carry a single recipient per event
            if !message.from_uid.is_empty() {
                let recipient = &candidates[0];
                if let Some(mute) = self.directory.peer_mute(recipient, &message.from_uid).await? {
                    settings.peer_mutes.insert(recipient.clone(), mute);
                }
            }
        } else {
            for member in self
                .directory
                .group_mutes(&message.channel_id, candidates)
                .await?
            {
                settings.group_mutes.insert(member.uid, member.mute);
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemorySettingsDirectory;
    use crate::webhook::{ChannelType, NotifyMessage};

    fn uids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn notification(channel_type: ChannelType, channel_id: &str) -> PushNotification {
        let message = NotifyMessage {
            message_id: 1,
            from_uid: "sender".into(),
            channel_id: channel_id.into(),
            channel_type,
            payload: br#"{"type":1,"content":"x"}"#.to_vec(),
            ..Default::default()
        };
        PushNotification::from_message(message, None).unwrap()
    }

    #[test]
    fn test_allow_push_precedence() {
        let mut settings = RecipientSettings::default();
        assert!(allow_push("a", &settings));

        settings.notices.insert("a".into(), true);
        settings.group_mutes.insert("a".into(), true);
        assert!(!allow_push("a", &settings));

        settings.notices.insert("b".into(), false);
        settings.group_mutes.insert("b".into(), false);
        assert!(!allow_push("b", &settings));

        settings.peer_mutes.insert("c".into(), true);
        assert!(!allow_push("c", &settings));
    }

    #[tokio::test]
    async fn test_group_mute_suppresses_member() {
        let directory = Arc::new(MemorySettingsDirectory::new());
        directory.set_group_mute("g1", "bob", true);
        directory.set_new_msg_notice("carol", false);
        let resolver = EligibilityResolver::new(directory);

        let eligible = resolver
            .resolve(&notification(ChannelType::Group, "g1"), &uids(&["alice", "bob", "carol"]))
            .await
            .unwrap();
        assert_eq!(eligible, uids(&["alice"]));
    }

    #[tokio::test]
    async fn test_peer_mute_uses_first_candidate() {
        let directory = Arc::new(MemorySettingsDirectory::new());
        directory.set_peer_mute("bob", "sender", true);
        let resolver = EligibilityResolver::new(directory);

        let eligible = resolver
            .resolve(&notification(ChannelType::Person, "bob"), &uids(&["bob"]))
            .await
            .unwrap();
        assert!(eligible.is_empty());
    }

    #[tokio::test]
    async fn test_bypass_skips_settings() {
        struct Always;
        impl BypassPolicy for Always {
            fn bypasses_settings(&self, _n: &PushNotification) -> bool {
                true
            }
        }

        let directory = Arc::new(MemorySettingsDirectory::new());
        directory.set_new_msg_notice("bob", false);
        let resolver = EligibilityResolver::with_bypass(directory, Arc::new(Always));

        let eligible = resolver
            .resolve(&notification(ChannelType::Person, "bob"), &uids(&["bob"]))
            .await
            .unwrap();
        assert_eq!(eligible, uids(&["bob"]));
    }
}
