//! Pipeline integration tests
//!
//! Exercise persistence, eligibility and push fan-out together using the
//! in-memory backends. No Redis or PostgreSQL needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use pushhook::config::PushConfig;
use pushhook::directory::{
    DeviceRecord, DirectoryError, MemberMute, MemoryDeviceDirectory, MemorySettingsDirectory,
    NotifySettingsDirectory, UserNotice,
};
use pushhook::listener::ListenerRegistry;
use pushhook::message::{
    fake_channel_id, MemoryMessageStore, MessagePersistence, MessageRecord, MessageStore,
    MessageTransaction, StoreError,
};
use pushhook::push::{
    EligibilityResolver, OfflinePushPipeline, ProviderContext, ProviderRegistry, PushError,
    PushExecutor, PushNotification, PushPayload, PushProvider, PushWorkerPool,
};
use pushhook::webhook::{
    encode_recipients, ChannelType, MessageHeader, NotifyMessage, OfflinePushNotify,
};

const BUNDLE: &str = "com.example.chat";

fn uids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn message(id: i64, channel_type: ChannelType, channel_id: &str) -> NotifyMessage {
    NotifyMessage {
        message_id: id,
        message_seq: id as u32,
        client_msg_no: format!("client-{}", id),
        from_uid: "sender".to_string(),
        channel_id: channel_id.to_string(),
        channel_type,
        timestamp: 1_700_000_000,
        payload: br#"{"type":1,"content":"hello"}"#.to_vec(),
        ..Default::default()
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Wraps the memory store and fails the upsert of one message id.
struct FailingStore {
    inner: MemoryMessageStore,
    fail_on: String,
}

struct FailingTransaction {
    inner: Box<dyn MessageTransaction>,
    fail_on: String,
}

#[async_trait]
impl MessageTransaction for FailingTransaction {
    async fn upsert(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        if record.message_id == self.fail_on {
            return Err(StoreError::Rejected {
                message_id: record.message_id.clone(),
                reason: "constraint violation".to_string(),
            });
        }
        self.inner.upsert(record).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl MessageStore for FailingStore {
    async fn begin(&self) -> Result<Box<dyn MessageTransaction>, StoreError> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            fail_on: self.fail_on.clone(),
        }))
    }

    async fn get(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError> {
        self.inner.get(channel_id, message_id).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_batch_returns_every_id_in_order() {
    let store = Arc::new(MemoryMessageStore::new());
    let persistence = MessagePersistence::new(store.clone(), Arc::new(ListenerRegistry::new()));

    let mut batch: Vec<NotifyMessage> = (1..=6).map(|i| message(i, ChannelType::Group, "g1")).collect();
    batch[1].header = MessageHeader { sync_once: true, ..Default::default() };
    batch[4].header = MessageHeader { no_persist: true, ..Default::default() };

    let ids = persistence.store_batch(&batch).await.unwrap();

    assert_eq!(ids, uids(&["1", "2", "3", "4", "5", "6"]));
    assert_eq!(store.len(), 4);
    assert!(store.get("g1", "2").await.unwrap().is_none());
    assert!(store.get("g1", "5").await.unwrap().is_none());
    assert!(store.get("g1", "6").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_upsert_rolls_back_whole_batch() {
    let store = Arc::new(FailingStore {
        inner: MemoryMessageStore::new(),
        fail_on: "3".to_string(),
    });
    let listeners = Arc::new(ListenerRegistry::new());
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    listeners
        .register_message_listener(Arc::new(move |_: &[NotifyMessage]| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .await;
    let persistence = MessagePersistence::new(store.clone(), listeners);

    let batch: Vec<NotifyMessage> = (1..=4).map(|i| message(i, ChannelType::Group, "g1")).collect();
    let err = persistence.store_batch(&batch).await.unwrap_err();

    assert!(matches!(err, StoreError::Rejected { .. }));
    for id in ["1", "2", "3", "4"] {
        assert!(store.get("g1", id).await.unwrap().is_none());
    }
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_listeners_receive_only_stored_messages() {
    let store = Arc::new(MemoryMessageStore::new());
    let listeners = Arc::new(ListenerRegistry::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    listeners
        .register_message_listener(Arc::new(move |messages: &[NotifyMessage]| -> anyhow::Result<()> {
            let ids: Vec<i64> = messages.iter().map(|m| m.message_id).collect();
            let _ = tx.send(ids);
            Ok(())
        }))
        .await;
    let persistence = MessagePersistence::new(store, listeners);

    let mut batch = vec![message(10, ChannelType::Person, "bob"), message(11, ChannelType::Person, "bob")];
    batch[0].header.no_persist = true;
    persistence.store_batch(&batch).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), vec![11]);
}

#[tokio::test]
async fn test_person_messages_share_one_channel_both_ways() {
    let store = Arc::new(MemoryMessageStore::new());
    let persistence = MessagePersistence::new(store.clone(), Arc::new(ListenerRegistry::new()));

    let mut from_alice = message(20, ChannelType::Person, "bob");
    from_alice.from_uid = "alice".to_string();
    let mut from_bob = message(21, ChannelType::Person, "alice");
    from_bob.from_uid = "bob".to_string();

    persistence.store_batch(&[from_alice, from_bob]).await.unwrap();

    let channel = fake_channel_id("alice", "bob");
    assert_eq!(channel, fake_channel_id("bob", "alice"));
    assert!(store.get(&channel, "20").await.unwrap().is_some());
    assert!(store.get(&channel, "21").await.unwrap().is_some());
}

// ============================================================================
// Offline push
// ============================================================================

struct RecordingProvider {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl PushProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn build_payload(
        &self,
        notification: &PushNotification,
        ctx: &ProviderContext,
        _target_uid: &str,
    ) -> Result<PushPayload, PushError> {
        Ok(PushPayload::render(notification, ctx))
    }

    async fn send(&self, device_token: &str, _payload: &PushPayload) -> Result<(), PushError> {
        let _ = self.tx.send(device_token.to_string());
        Ok(())
    }
}

struct PushHarness {
    settings: Arc<MemorySettingsDirectory>,
    devices: Arc<MemoryDeviceDirectory>,
    pipeline: OfflinePushPipeline,
    pool: Arc<PushWorkerPool>,
    delivered: mpsc::UnboundedReceiver<String>,
}

impl PushHarness {
    fn new() -> Self {
        let settings = Arc::new(MemorySettingsDirectory::new());
        let devices = Arc::new(MemoryDeviceDirectory::new());
        let registry = Arc::new(ProviderRegistry::new());
        let (tx, delivered) = mpsc::unbounded_channel();
        registry.register("IOS", BUNDLE, Arc::new(RecordingProvider { tx }));

        let config = PushConfig {
            workers: 3,
            queue_capacity: 8,
            ..Default::default()
        };
        let executor = Arc::new(PushExecutor::new(devices.clone(), registry, &config));
        let pool = Arc::new(PushWorkerPool::from_config(executor, &config));
        let pipeline = OfflinePushPipeline::new(
            EligibilityResolver::new(settings.clone()),
            pool.clone(),
        );

        Self {
            settings,
            devices,
            pipeline,
            pool,
            delivered,
        }
    }

    fn add_device(&self, uid: &str) {
        self.devices.insert(
            uid,
            DeviceRecord {
                device_token: format!("token-{}", uid),
                device_type: "IOS".to_string(),
                bundle_id: BUNDLE.to_string(),
            },
        );
    }

    /// Wait until `n` jobs finished, successfully or not.
    async fn wait_for_completed(&self, n: u64) {
        let wait = async {
            loop {
                let stats = self.pool.stats();
                if stats.sent + stats.failed >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("jobs did not complete in time");
    }

    /// Collect `n` delivered tokens, sorted.
    async fn delivered(&mut self, n: usize) -> Vec<String> {
        let mut tokens = Vec::with_capacity(n);
        for _ in 0..n {
            let token = tokio::time::timeout(Duration::from_secs(5), self.delivered.recv())
                .await
                .expect("push not delivered in time")
                .expect("provider dropped");
            tokens.push(token);
        }
        tokens.sort();
        tokens
    }
}

fn offline_notify(channel_type: ChannelType, channel_id: &str, to_uids: &[&str]) -> OfflinePushNotify {
    OfflinePushNotify {
        message: message(100, channel_type, channel_id),
        to_uids: uids(to_uids),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_device_miss_does_not_block_other_recipients() {
    let mut harness = PushHarness::new();
    for uid in ["u1", "u2", "u4", "u5"] {
        harness.add_device(uid);
    }

    let enqueued = harness
        .pipeline
        .handle(offline_notify(ChannelType::Group, "g1", &["u1", "u2", "u3", "u4", "u5"]))
        .await
        .unwrap();
    assert_eq!(enqueued, 5);

    let tokens = harness.delivered(4).await;
    assert_eq!(tokens, uids(&["token-u1", "token-u2", "token-u4", "token-u5"]));

    harness.wait_for_completed(5).await;
    let stats = harness.pool.stats();
    assert_eq!(stats.sent, 4);
    assert_eq!(stats.failed, 1);

    harness.pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_notice_disabled_recipient_gets_no_job() {
    let mut harness = PushHarness::new();
    harness.add_device("u1");
    harness.add_device("u2");
    harness.settings.set_new_msg_notice("u2", false);

    let enqueued = harness
        .pipeline
        .handle(offline_notify(ChannelType::Group, "g1", &["u1", "u2"]))
        .await
        .unwrap();

    assert_eq!(enqueued, 1);
    assert_eq!(harness.delivered(1).await, uids(&["token-u1"]));
}

#[tokio::test]
async fn test_peer_mute_suppresses_person_push() {
    let harness = PushHarness::new();
    harness.add_device("bob");
    harness.settings.set_new_msg_notice("bob", true);
    harness.settings.set_peer_mute("bob", "sender", true);

    let enqueued = harness
        .pipeline
        .handle(offline_notify(ChannelType::Person, "bob", &["bob"]))
        .await
        .unwrap();

    assert_eq!(enqueued, 0);
}

#[tokio::test]
async fn test_group_mute_suppresses_member_push() {
    let mut harness = PushHarness::new();
    harness.add_device("u1");
    harness.add_device("u2");
    harness.settings.set_group_mute("g1", "u1", true);
    harness.settings.set_group_mute("g2", "u2", true);

    let enqueued = harness
        .pipeline
        .handle(offline_notify(ChannelType::Group, "g1", &["u1", "u2"]))
        .await
        .unwrap();

    assert_eq!(enqueued, 1);
    assert_eq!(harness.delivered(1).await, uids(&["token-u2"]));
}

#[tokio::test]
async fn test_gzip_recipients_match_plain_list() {
    let mut harness = PushHarness::new();
    for uid in ["u1", "u2", "u3"] {
        harness.add_device(uid);
    }

    let mut notify = offline_notify(ChannelType::Group, "g1", &[]);
    notify.compress = Some("gzip".to_string());
    notify.compress_to_uids = encode_recipients(&uids(&["u1", "u2", "u3"])).unwrap();

    let enqueued = harness.pipeline.handle(notify).await.unwrap();
    assert_eq!(enqueued, 3);
    assert_eq!(
        harness.delivered(3).await,
        uids(&["token-u1", "token-u2", "token-u3"])
    );
}

#[tokio::test]
async fn test_corrupt_gzip_aborts_event() {
    let harness = PushHarness::new();
    let mut notify = offline_notify(ChannelType::Group, "g1", &[]);
    notify.compress = Some("gzip".to_string());
    notify.compress_to_uids = b"not gzip at all".to_vec();

    let err = harness.pipeline.handle(notify).await.unwrap_err();
    assert_eq!(err.code(), "DECODE_ERROR");
    assert_eq!(harness.pool.stats().enqueued, 0);
}

#[tokio::test]
async fn test_payload_without_type_is_rejected() {
    let harness = PushHarness::new();
    let mut notify = offline_notify(ChannelType::Group, "g1", &["u1"]);
    notify.message.payload = br#"{"content":"no type"}"#.to_vec();

    let err = harness.pipeline.handle(notify).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_encrypted_payload_is_pushed_without_parsing() {
    let mut harness = PushHarness::new();
    harness.add_device("u1");
    let mut notify = offline_notify(ChannelType::Group, "g1", &["u1"]);
    notify.message.setting.0 = 1 << 5;
    notify.message.payload = vec![0xde, 0xad, 0xbe, 0xef];

    let enqueued = harness.pipeline.handle(notify).await.unwrap();
    assert_eq!(enqueued, 1);
    assert_eq!(harness.delivered(1).await, uids(&["token-u1"]));
}

#[tokio::test]
async fn test_empty_recipient_list_does_nothing() {
    let harness = PushHarness::new();
    let mut notify = offline_notify(ChannelType::Group, "g1", &[]);
    // Payload is never inspected when nobody is targeted
    notify.message.payload = b"garbage".to_vec();

    assert_eq!(harness.pipeline.handle(notify).await.unwrap(), 0);
}

// ============================================================================
// Settings lookup failures
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum BrokenLookup {
    Notices,
    PeerMute,
    GroupMutes,
}

/// Settings directory with one lookup that always fails.
struct BrokenSettings {
    broken: BrokenLookup,
}

impl BrokenSettings {
    fn check(&self, lookup: BrokenLookup) -> Result<(), DirectoryError> {
        if self.broken == lookup {
            return Err(DirectoryError::Unavailable("settings store down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotifySettingsDirectory for BrokenSettings {
    async fn user_notices(&self, _uids: &[String]) -> Result<Vec<UserNotice>, DirectoryError> {
        self.check(BrokenLookup::Notices)?;
        Ok(Vec::new())
    }

    async fn peer_mute(
        &self,
        _owner_uid: &str,
        _peer_uid: &str,
    ) -> Result<Option<bool>, DirectoryError> {
        self.check(BrokenLookup::PeerMute)?;
        Ok(None)
    }

    async fn group_mutes(
        &self,
        _group_no: &str,
        _uids: &[String],
    ) -> Result<Vec<MemberMute>, DirectoryError> {
        self.check(BrokenLookup::GroupMutes)?;
        Ok(Vec::new())
    }
}

async fn run_with_broken_settings(
    broken: BrokenLookup,
    notify: OfflinePushNotify,
) -> (usize, Arc<PushWorkerPool>) {
    let devices = Arc::new(MemoryDeviceDirectory::new());
    let config = PushConfig::default();
    let executor = Arc::new(PushExecutor::new(
        devices,
        Arc::new(ProviderRegistry::new()),
        &config,
    ));
    let pool = Arc::new(PushWorkerPool::from_config(executor, &config));
    let pipeline = OfflinePushPipeline::new(
        EligibilityResolver::new(Arc::new(BrokenSettings { broken })),
        pool.clone(),
    );

    let enqueued = pipeline
        .handle(notify)
        .await
        .expect("settings failures are not reported to the caller");
    (enqueued, pool)
}

#[tokio::test]
async fn test_notice_lookup_failure_enqueues_nothing() {
    let (enqueued, pool) = run_with_broken_settings(
        BrokenLookup::Notices,
        offline_notify(ChannelType::Group, "g1", &["u1", "u2"]),
    )
    .await;

    assert_eq!(enqueued, 0);
    assert_eq!(pool.stats().enqueued, 0);
    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_group_mute_lookup_failure_enqueues_nothing() {
    let (enqueued, pool) = run_with_broken_settings(
        BrokenLookup::GroupMutes,
        offline_notify(ChannelType::Group, "g1", &["u1", "u2", "u3"]),
    )
    .await;

    assert_eq!(enqueued, 0);
    assert_eq!(pool.stats().enqueued, 0);
    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_peer_mute_lookup_failure_enqueues_nothing() {
    let (enqueued, pool) = run_with_broken_settings(
        BrokenLookup::PeerMute,
        offline_notify(ChannelType::Person, "u1", &["u1"]),
    )
    .await;

    assert_eq!(enqueued, 0);
    assert_eq!(pool.stats().enqueued, 0);
    pool.shutdown(Duration::from_secs(1)).await;
}
