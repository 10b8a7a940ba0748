//! PostgreSQL subscription event repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::SubscriptionEventRow;
use crate::repo::{CreateSubscriptionEvent, SubscriptionEventRepository};

/// PostgreSQL subscription event repository
#[derive(Clone)]
pub struct PgSubscriptionEventRepository {
    pool: PgPool,
}

impl PgSubscriptionEventRepository {
    /// Create a new event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionEventRepository for PgSubscriptionEventRepository {
    async fn append(&self, event: CreateSubscriptionEvent) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscription_events (id, subscription_id, user_id, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.subscription_id)
        .bind(event.user_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> DbResult<Vec<SubscriptionEventRow>> {
        let events = sqlx::query_as::<_, SubscriptionEventRow>(
            r#"
            SELECT id, subscription_id, user_id, event_type, payload, created_at
            FROM subscription_events
            WHERE subscription_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
