//! Registry of in-process listeners for committed messages and presence updates.
//!
//! The registry is owned by the application state and handed to the pipelines
//! that emit events. Listener failures are logged and never reach the emitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::webhook::{NotifyMessage, OnlineStatusUpdate};

/// Handle returned by `register_*`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives messages that were committed to storage.
pub trait MessageListener: Send + Sync {
    fn on_messages(&self, messages: &[NotifyMessage]) -> anyhow::Result<()>;
}

/// Receives parsed online-status updates.
pub trait OnlineStatusListener: Send + Sync {
    fn on_status(&self, updates: &[OnlineStatusUpdate]) -> anyhow::Result<()>;
}

impl<F> MessageListener for F
where
    F: Fn(&[NotifyMessage]) -> anyhow::Result<()> + Send + Sync,
{
    fn on_messages(&self, messages: &[NotifyMessage]) -> anyhow::Result<()> {
        self(messages)
    }
}

impl<F> OnlineStatusListener for F
where
    F: Fn(&[OnlineStatusUpdate]) -> anyhow::Result<()> + Send + Sync,
{
    fn on_status(&self, updates: &[OnlineStatusUpdate]) -> anyhow::Result<()> {
        self(updates)
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    message_listeners: RwLock<Vec<(ListenerId, Arc<dyn MessageListener>)>>,
    status_listeners: RwLock<Vec<(ListenerId, Arc<dyn OnlineStatusListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn register_message_listener(&self, listener: Arc<dyn MessageListener>) -> ListenerId {
        let id = self.allocate_id();
        self.message_listeners.write().await.push((id, listener));
        id
    }

    /// Returns false if the id was not registered.
    pub async fn unregister_message_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.message_listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub async fn register_status_listener(
        &self,
        listener: Arc<dyn OnlineStatusListener>,
    ) -> ListenerId {
        let id = self.allocate_id();
        self.status_listeners.write().await.push((id, listener));
        id
    }

    pub async fn unregister_status_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.status_listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub async fn message_listener_count(&self) -> usize {
        self.message_listeners.read().await.len()
    }

    pub async fn status_listener_count(&self) -> usize {
        self.status_listeners.read().await.len()
    }

    /// Call every message listener in registration order.
    pub async fn notify_messages(&self, messages: &[NotifyMessage]) {
        // Snapshot so listeners may (un)register without deadlocking
        let listeners: Vec<_> = self.message_listeners.read().await.clone();
        for (id, listener) in listeners {
            if let Err(e) = listener.on_messages(messages) {
                tracing::warn!(
                    listener_id = id.0,
                    message_count = messages.len(),
                    error = %e,
                    "Message listener failed"
                );
            }
        }
    }

    pub async fn notify_online_status(&self, updates: &[OnlineStatusUpdate]) {
        let listeners: Vec<_> = self.status_listeners.read().await.clone();
        for (id, listener) in listeners {
            if let Err(e) = listener.on_status(updates) {
                tracing::warn!(
                    listener_id = id.0,
                    update_count = updates.len(),
                    error = %e,
                    "Online status listener failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(0usize));

        let counter = seen.clone();
        let id = registry
            .register_message_listener(Arc::new(move |msgs: &[NotifyMessage]| -> anyhow::Result<()> {
                *counter.lock().unwrap() += msgs.len();
                Ok(())
            }))
            .await;

        let batch = vec![NotifyMessage::default(), NotifyMessage::default()];
        registry.notify_messages(&batch).await;
        assert_eq!(*seen.lock().unwrap(), 2);

        assert!(registry.unregister_message_listener(id).await);
        assert!(!registry.unregister_message_listener(id).await);

        registry.notify_messages(&batch).await;
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        registry
            .register_status_listener(Arc::new(|_: &[OnlineStatusUpdate]| -> anyhow::Result<()> {
                anyhow::bail!("listener down")
            }))
            .await;
        let sink = calls.clone();
        registry
            .register_status_listener(Arc::new(move |updates: &[OnlineStatusUpdate]| -> anyhow::Result<()> {
                sink.lock().unwrap().extend(updates.iter().map(|u| u.uid.clone()));
                Ok(())
            }))
            .await;

        let updates = vec![OnlineStatusUpdate {
            uid: "u1".into(),
            ..Default::default()
        }];
        registry.notify_online_status(&updates).await;

        assert_eq!(*calls.lock().unwrap(), vec!["u1".to_string()]);
        assert_eq!(registry.status_listener_count().await, 2);
    }
}
