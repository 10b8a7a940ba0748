//! Event sinks and repositories that record or fail on purpose

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentora_billing_core::{BillingError, EventSink, LifecycleEvent};
use rentora_db::{
    CreateSubscription, CreateUsageLog, DbError, DbResult, MemoryStore, SubscriptionRepository,
    SubscriptionRow, UpdateSubscription, UsageLogRepository, UsageLogRow,
};
use rentora_types::UsageCounter;
use uuid::Uuid;

/// Pause long enough for concurrent tasks to interleave
const STALL: Duration = Duration::from_millis(20);

/// Keeps every emitted event name in order
#[derive(Default)]
pub struct RecordingEventSink {
    names: Mutex<Vec<String>>,
}

impl RecordingEventSink {
    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> Result<(), BillingError> {
        self.names.lock().unwrap().push(event.name());
        Ok(())
    }
}

/// Fails every emission
#[derive(Default)]
pub struct FailingEventSink;

#[async_trait]
impl EventSink for FailingEventSink {
    async fn emit(&self, _: &LifecycleEvent) -> Result<(), BillingError> {
        Err(BillingError::Database(DbError::Sqlx(sqlx::Error::PoolTimedOut)))
    }
}

/// Usage log store that is down
#[derive(Default)]
pub struct FailingUsageLogs;

#[async_trait]
impl UsageLogRepository for FailingUsageLogs {
    async fn append(&self, _: CreateUsageLog) -> DbResult<UsageLogRow> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn delete(&self, _: Uuid) -> DbResult<()> {
        Ok(())
    }

    async fn find_by_idempotency_key(&self, _: Uuid, _: &str) -> DbResult<Option<UsageLogRow>> {
        Ok(None)
    }

    async fn find_by_user_in_range(
        &self,
        _: Uuid,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> DbResult<Vec<UsageLogRow>> {
        Ok(Vec::new())
    }
}

/// `MemoryStore` whose reads stall before the store is hit, so every task in
/// a concurrent batch sees the same state before any of them writes
#[derive(Clone)]
pub struct StallingStore(pub MemoryStore);

#[async_trait]
impl UsageLogRepository for StallingStore {
    async fn append(&self, entry: CreateUsageLog) -> DbResult<UsageLogRow> {
        UsageLogRepository::append(&self.0, entry).await
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        UsageLogRepository::delete(&self.0, id).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<UsageLogRow>> {
        let found = self.0.find_by_idempotency_key(user_id, key).await;
        tokio::time::sleep(STALL).await;
        found
    }

    async fn find_by_user_in_range(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<UsageLogRow>> {
        self.0.find_by_user_in_range(user_id, from, to).await
    }
}

#[async_trait]
impl SubscriptionRepository for StallingStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        SubscriptionRepository::find_by_id(&self.0, id).await
    }

    async fn find_live_by_user_id(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let live = self.0.find_live_by_user_id(user_id, now).await;
        tokio::time::sleep(STALL).await;
        live
    }

    async fn create_if_no_live(
        &self,
        sub: CreateSubscription,
        now: DateTime<Utc>,
    ) -> DbResult<SubscriptionRow> {
        self.0.create_if_no_live(sub, now).await
    }

    async fn update(&self, id: Uuid, update: UpdateSubscription) -> DbResult<SubscriptionRow> {
        self.0.update(id, update).await
    }

    async fn increment_usage(
        &self,
        id: Uuid,
        counter: UsageCounter,
        count: i64,
        ceiling: Option<i64>,
    ) -> DbResult<Option<i64>> {
        self.0.increment_usage(id, counter, count, ceiling).await
    }

    async fn reset_usage_window(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> DbResult<bool> {
        self.0.reset_usage_window(id, now, next_reset).await
    }
}
