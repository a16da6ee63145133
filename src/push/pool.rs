//! Bounded push worker pool.
//!
//! Producers enqueue jobs into a bounded channel; a fixed set of workers drain
//! it. A full queue blocks the producer until a worker frees a slot. Failed
//! jobs are logged and dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::PushConfig;
use crate::directory::{DeviceDirectory, DeviceRecord};
use crate::metrics::PushMetrics;

use super::{ProviderContext, ProviderRegistry, PushError, PushNotification};

#[derive(Debug, Error)]
pub enum PushPoolError {
    #[error("Push worker pool is closed")]
    Closed,
}

/// One push for one recipient.
#[derive(Debug, Clone)]
pub struct PushJob {
    pub id: Uuid,
    pub target_uid: String,
    pub notification: Arc<PushNotification>,
}

impl PushJob {
    pub fn new(target_uid: impl Into<String>, notification: Arc<PushNotification>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_uid: target_uid.into(),
            notification,
        }
    }
}

/// Result of executing a job; `device` is set once the lookup succeeded.
#[derive(Debug)]
pub struct PushOutcome {
    pub device: Option<DeviceRecord>,
    pub result: Result<(), PushError>,
}

/// Performs device lookup, provider resolution, rendering and delivery.
pub struct PushExecutor {
    devices: Arc<dyn DeviceDirectory>,
    registry: Arc<ProviderRegistry>,
    ctx: ProviderContext,
    lookup_timeout: Duration,
    send_timeout: Duration,
}

impl PushExecutor {
    pub fn new(
        devices: Arc<dyn DeviceDirectory>,
        registry: Arc<ProviderRegistry>,
        config: &PushConfig,
    ) -> Self {
        Self {
            devices,
            registry,
            ctx: ProviderContext {
                app_name: config.app_name.clone(),
            },
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        }
    }

    pub async fn execute(&self, job: &PushJob) -> PushOutcome {
        let device = match self.lookup(&job.target_uid).await {
            Ok(device) => device,
            Err(e) => {
                return PushOutcome {
                    device: None,
                    result: Err(e),
                }
            }
        };

        let result = self.deliver(job, &device).await;
        PushOutcome {
            device: Some(device),
            result,
        }
    }

    async fn lookup(&self, uid: &str) -> Result<DeviceRecord, PushError> {
        match timeout(self.lookup_timeout, self.devices.lookup(uid)).await {
            Ok(Ok(Some(device))) => Ok(device),
            Ok(Ok(None)) => Err(PushError::DeviceNotFound(uid.to_string())),
            Ok(Err(e)) => Err(PushError::Lookup(e.to_string())),
            Err(_) => Err(PushError::Timeout("device lookup")),
        }
    }

    async fn deliver(&self, job: &PushJob, device: &DeviceRecord) -> Result<(), PushError> {
        let provider = self
            .registry
            .resolve(&device.device_type, &device.bundle_id)
            .ok_or_else(|| PushError::UnsupportedDevice {
                device_type: device.device_type.clone(),
                bundle_id: device.bundle_id.clone(),
            })?;

        let payload = provider.build_payload(&job.notification, &self.ctx, &job.target_uid)?;

        let start = Instant::now();
        let sent = timeout(self.send_timeout, provider.send(&device.device_token, &payload)).await;
        PushMetrics::record_send_latency(start.elapsed().as_secs_f64());

        match sent {
            Ok(result) => result,
            Err(_) => Err(PushError::Timeout("push send")),
        }
    }
}

/// Counters of the worker pool
#[derive(Debug, Default)]
pub struct PushStats {
    pub enqueued: AtomicU64,
    pub sent: AtomicU64,
    pub failed: AtomicU64,
}

impl PushStats {
    pub fn snapshot(&self) -> PushStatsSnapshot {
        PushStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PushStatsSnapshot {
    pub enqueued: u64,
    pub sent: u64,
    pub failed: u64,
}

pub struct PushWorkerPool {
    sender: mpsc::Sender<PushJob>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    stats: Arc<PushStats>,
    worker_count: usize,
    capacity: usize,
}

impl PushWorkerPool {
    /// Spawn `workers` workers over a queue of `capacity` jobs.
    pub fn start(executor: Arc<PushExecutor>, workers: usize, capacity: usize) -> Self {
        let worker_count = workers.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown_tx, _) = broadcast::channel(1);
        let stats = Arc::new(PushStats::default());

        let handles = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&executor),
                    Arc::clone(&stats),
                    shutdown_tx.subscribe(),
                ))
            })
            .collect();

        tracing::info!(workers = worker_count, capacity, "Push worker pool started");

        Self {
            sender,
            shutdown_tx,
            workers: Mutex::new(handles),
            closed: AtomicBool::new(false),
            stats,
            worker_count,
            capacity,
        }
    }

    pub fn from_config(executor: Arc<PushExecutor>, config: &PushConfig) -> Self {
        Self::start(executor, config.workers, config.effective_queue_capacity())
    }

    /// Queue a job, waiting for a free slot when the queue is full.
    pub async fn enqueue(&self, job: PushJob) -> Result<(), PushPoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PushPoolError::Closed);
        }
        self.sender
            .send(job)
            .await
            .map_err(|_| PushPoolError::Closed)?;

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        PushMetrics::record_enqueued();
        PushMetrics::record_queue_depth(self.queued());
        Ok(())
    }

    pub fn stats(&self) -> PushStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting jobs and wait up to `grace` for running jobs.
    ///
    /// Queued jobs that no worker has picked up are dropped.
    pub async fn shutdown(&self, grace: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.queued();
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        if timeout(grace, join_all(handles)).await.is_err() {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "Push workers did not stop in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        PushMetrics::record_queue_depth(0);
        tracing::info!(dropped_jobs = dropped, "Push worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<PushJob>>>,
    executor: Arc<PushExecutor>,
    stats: Arc<PushStats>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            job = async {
                let mut rx = receiver.lock().await;
                let job = rx.recv().await;
                (job, rx.len())
            } => match job {
                (Some(job), depth) => {
                    PushMetrics::record_queue_depth(depth);
                    job
                }
                (None, _) => break,
            },
        };

        let outcome = executor.execute(&job).await;
        let (device_type, device_token) = outcome
            .device
            .as_ref()
            .map(|d| (d.device_type.as_str(), d.device_token.as_str()))
            .unwrap_or(("", ""));

        match outcome.result {
            Ok(()) => {
                stats.sent.fetch_add(1, Ordering::Relaxed);
                PushMetrics::record_result("sent");
                tracing::debug!(
                    job_id = %job.id,
                    uid = %job.target_uid,
                    device_type = %device_type,
                    device_token = %device_token,
                    "Push sent"
                );
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                PushMetrics::record_result(e.outcome());
                tracing::warn!(
                    job_id = %job.id,
                    uid = %job.target_uid,
                    device_type = %device_type,
                    device_token = %device_token,
                    error = %e,
                    "Push failed"
                );
            }
        }
    }

    tracing::debug!(worker_id, "Push worker stopped");
}
