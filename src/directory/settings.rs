use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

use super::DirectoryError;

/// Global "new message notice" switch of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub uid: String,
    pub new_msg_notice: bool,
}

/// Mute flag of one group member for a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMute {
    pub uid: String,
    pub mute: bool,
}

/// Notification settings owned by the user/group services.
#[async_trait]
pub trait NotifySettingsDirectory: Send + Sync {
    /// Profiles for `uids`; users without a stored profile are omitted.
    async fn user_notices(&self, uids: &[String]) -> Result<Vec<UserNotice>, DirectoryError>;

    /// Whether `owner_uid` muted `peer_uid`; `None` when no setting exists.
    async fn peer_mute(
        &self,
        owner_uid: &str,
        peer_uid: &str,
    ) -> Result<Option<bool>, DirectoryError>;

    /// Mute rows of `uids` in group `group_no`; members without a row are omitted.
    async fn group_mutes(
        &self,
        group_no: &str,
        uids: &[String],
    ) -> Result<Vec<MemberMute>, DirectoryError>;
}

#[derive(Default)]
pub struct MemorySettingsDirectory {
    notices: DashMap<String, bool>,
    peer_mutes: DashMap<(String, String), bool>,
    group_mutes: DashMap<(String, String), bool>,
}

impl MemorySettingsDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_new_msg_notice(&self, uid: &str, enabled: bool) {
        self.notices.insert(uid.to_string(), enabled);
    }

    pub fn set_peer_mute(&self, owner_uid: &str, peer_uid: &str, mute: bool) {
        self.peer_mutes
            .insert((owner_uid.to_string(), peer_uid.to_string()), mute);
    }

    pub fn set_group_mute(&self, group_no: &str, uid: &str, mute: bool) {
        self.group_mutes
            .insert((group_no.to_string(), uid.to_string()), mute);
    }
}

#[async_trait]
impl NotifySettingsDirectory for MemorySettingsDirectory {
    async fn user_notices(&self, uids: &[String]) -> Result<Vec<UserNotice>, DirectoryError> {
        Ok(uids
            .iter()
            .filter_map(|uid| {
                self.notices.get(uid).map(|n| UserNotice {
                    uid: uid.clone(),
                    new_msg_notice: *n,
                })
            })
            .collect())
    }

    async fn peer_mute(
        &self,
        owner_uid: &str,
        peer_uid: &str,
    ) -> Result<Option<bool>, DirectoryError> {
        Ok(self
            .peer_mutes
            .get(&(owner_uid.to_string(), peer_uid.to_string()))
            .map(|m| *m))
    }

    async fn group_mutes(
        &self,
        group_no: &str,
        uids: &[String],
    ) -> Result<Vec<MemberMute>, DirectoryError> {
        Ok(uids
            .iter()
            .filter_map(|uid| {
                self.group_mutes
                    .get(&(group_no.to_string(), uid.clone()))
                    .map(|m| MemberMute {
                        uid: uid.clone(),
                        mute: *m,
                    })
            })
            .collect())
    }
}

/// Reads the `user`, `user_setting` and `group_setting` tables.
pub struct PostgresSettingsDirectory {
    pool: PgPool,
}

impl PostgresSettingsDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotifySettingsDirectory for PostgresSettingsDirectory {
    async fn user_notices(&self, uids: &[String]) -> Result<Vec<UserNotice>, DirectoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, i16)> = sqlx::query_as(
            r#"SELECT uid, new_msg_notice FROM "user" WHERE uid = ANY($1)"#,
        )
        .bind(uids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(uid, notice)| UserNotice {
                uid,
                new_msg_notice: notice != 0,
            })
            .collect())
    }

    async fn peer_mute(
        &self,
        owner_uid: &str,
        peer_uid: &str,
    ) -> Result<Option<bool>, DirectoryError> {
        let row: Option<(i16,)> =
            sqlx::query_as("SELECT mute FROM user_setting WHERE uid = $1 AND to_uid = $2")
                .bind(owner_uid)
                .bind(peer_uid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(mute,)| mute == 1))
    }

    async fn group_mutes(
        &self,
        group_no: &str,
        uids: &[String],
    ) -> Result<Vec<MemberMute>, DirectoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, i16)> = sqlx::query_as(
            "SELECT uid, mute FROM group_setting WHERE group_no = $1 AND uid = ANY($2)",
        )
        .bind(group_no)
        .bind(uids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(uid, mute)| MemberMute {
                uid,
                mute: mute == 1,
            })
            .collect())
    }
}
