use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::metrics::PushMetrics;
use crate::webhook::{decode_recipients, OfflinePushNotify};

use super::{EligibilityResolver, PushJob, PushNotification, PushWorkerPool};

/// Offline-notify handling: recipients, eligibility, then job fan-out.
pub struct OfflinePushPipeline {
    resolver: EligibilityResolver,
    pool: Arc<PushWorkerPool>,
}

impl OfflinePushPipeline {
    pub fn new(resolver: EligibilityResolver, pool: Arc<PushWorkerPool>) -> Self {
        Self { resolver, pool }
    }

    pub fn pool(&self) -> &Arc<PushWorkerPool> {
        &self.pool
    }

    /// Enqueue pushes for eligible recipients and return the number of jobs.
    ///
    /// Returns once jobs are queued; delivery happens on the worker pool.
    #[tracing::instrument(
        name = "offline_push.handle",
        skip_all,
        fields(message_id = notify.message.message_id, channel_id = %notify.message.channel_id)
    )]
    pub async fn handle(&self, notify: OfflinePushNotify) -> Result<usize> {
        let recipients = decode_recipients(&notify)?;
        if recipients.is_empty() {
            return Ok(0);
        }

        let notification = PushNotification::try_from(notify)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let eligible = match self.resolver.resolve(&notification, &recipients).await {
            Ok(eligible) => eligible,
            Err(e) => {
                tracing::error!(
                    recipients = recipients.len(),
                    error = %e,
                    "Failed to load notification settings, skipping push"
                );
                return Ok(0);
            }
        };

        let suppressed = recipients.len() - eligible.len();
        if suppressed > 0 {
            PushMetrics::record_suppressed(suppressed as u64);
        }

        let notification = Arc::new(notification);
        let mut enqueued = 0;
        for uid in eligible {
            if let Err(e) = self
                .pool
                .enqueue(PushJob::new(uid, Arc::clone(&notification)))
                .await
            {
                tracing::warn!(error = %e, "Push worker pool unavailable, dropping remaining jobs");
                break;
            }
            enqueued += 1;
        }

        tracing::debug!(
            recipients = recipients.len(),
            suppressed,
            enqueued,
            "Offline push jobs queued"
        );
        Ok(enqueued)
    }
}
