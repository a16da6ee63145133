//! Offline push fan-out.
//!
//! Eligibility filtering and job creation happen on the request path; device
//! lookup and vendor delivery run on the bounded worker pool.

pub mod content;
mod eligibility;
mod gateway;
mod notification;
mod offline;
mod pool;
mod provider;
mod registry;

pub use eligibility::{allow_push, BypassPolicy, EligibilityResolver, NoBypass, RecipientSettings};
pub use gateway::{register_configured_providers, HttpGatewayProvider};
pub use notification::{NotificationError, PushNotification};
pub use offline::OfflinePushPipeline;
pub use pool::{
    PushExecutor, PushJob, PushOutcome, PushPoolError, PushStats, PushStatsSnapshot,
    PushWorkerPool,
};
pub use provider::{ProviderContext, PushError, PushPayload, PushProvider};
pub use registry::ProviderRegistry;
