//! Subscription lifecycle events
//!
//! Events feed notification and analytics consumers. Emission is best-effort:
//! the manager logs a failing sink and carries on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentora_db::{CreateSubscriptionEvent, SubscriptionEventRepository};
use rentora_types::{Subscription, SubscriptionEventKind, SubscriptionId, SubscriptionStatus, UserId};
use serde::Serialize;
use uuid::Uuid;

use crate::BillingError;

/// A lifecycle transition of one subscription
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub kind: SubscriptionEventKind,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    /// Status after the transition
    pub status: SubscriptionStatus,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Build an event for `subscription` as it stands after the transition
    pub fn new(kind: SubscriptionEventKind, subscription: &Subscription, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subscription_id: subscription.id,
            user_id: subscription.user_id,
            status: subscription.status,
            occurred_at: at,
        }
    }

    /// Event name, e.g. `SUBSCRIPTION_RENEWED`
    pub fn name(&self) -> String {
        self.kind.name()
    }
}

/// Destination for lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &LifecycleEvent) -> Result<(), BillingError>;
}

/// Writes events to the tracing log only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> Result<(), BillingError> {
        tracing::info!(
            event = %event.name(),
            subscription_id = %event.subscription_id,
            user_id = %event.user_id,
            status = %event.status,
            "subscription lifecycle event"
        );
        Ok(())
    }
}

/// Persists events to the `subscription_events` table
#[derive(Clone)]
pub struct StoreEventSink {
    repo: Arc<dyn SubscriptionEventRepository>,
}

impl StoreEventSink {
    pub fn new(repo: Arc<dyn SubscriptionEventRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl EventSink for StoreEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> Result<(), BillingError> {
        self.repo
            .append(CreateSubscriptionEvent {
                id: event.id,
                subscription_id: event.subscription_id.0,
                user_id: event.user_id.0,
                event_type: event.name(),
                payload: Some(serde_json::json!({ "status": event.status.as_str() })),
                created_at: event.occurred_at,
            })
            .await?;

        tracing::debug!(event = %event.name(), subscription_id = %event.subscription_id, "event stored");
        Ok(())
    }
}

impl std::fmt::Debug for StoreEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventSink").finish()
    }
}
