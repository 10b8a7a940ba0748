//! Rentora Billing Core - subscription lifecycle and usage gating
//!
//! The engine decides whether a user may use a gated feature, commits usage
//! against per-subscription quotas, and moves subscriptions through their
//! lifecycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use rentora_billing_core::{BillingConfig, BillingService, BillingStores, RecordUsage};
//! use rentora_db::Repositories;
//! use rentora_types::Feature;
//!
//! let billing = BillingService::new(BillingStores::from(Repositories::new(pool)), BillingConfig::default());
//!
//! // Ask before acting
//! let decision = billing.check_usage_limit(user_id, Feature::VisitSchedule, 1).await?;
//!
//! // Commit once the visit is scheduled
//! billing.record_usage(RecordUsage::new(user_id, Feature::VisitSchedule)).await?;
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod recorder;
pub mod service;
pub mod stores;

pub use catalog::PlanCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BillingConfig;
pub use error::BillingError;
pub use events::{EventSink, LifecycleEvent, StoreEventSink, TracingEventSink};
pub use gate::{ResolvedPlanContext, UsageGate};
pub use lifecycle::{CreateSubscriptionOptions, SubscriptionManager, SubscriptionPatch};
pub use recorder::{RecordUsage, UsageReceipt, UsageRecorder};
pub use service::BillingService;
pub use stores::BillingStores;
