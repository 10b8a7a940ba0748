//! PostgreSQL usage log repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::UsageLogRow;
use crate::repo::{CreateUsageLog, UsageLogRepository};

macro_rules! usage_log_columns {
    () => {
        "id, subscription_id, user_id, feature, resource_id, action, quantity, was_gated,
         gate_type, override_reason, ip_address, user_agent, metadata, idempotency_key,
         created_at"
    };
}

/// PostgreSQL usage log repository
#[derive(Clone)]
pub struct PgUsageLogRepository {
    pool: PgPool,
}

impl PgUsageLogRepository {
    /// Create a new usage log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLogRepository for PgUsageLogRepository {
    async fn append(&self, entry: CreateUsageLog) -> DbResult<UsageLogRow> {
        let result = sqlx::query_as::<_, UsageLogRow>(concat!(
            "INSERT INTO subscription_usage_logs (id, subscription_id, user_id, feature,
                 resource_id, action, quantity, was_gated, gate_type, override_reason,
                 ip_address, user_agent, metadata, idempotency_key, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING ",
            usage_log_columns!()
        ))
        .bind(entry.id)
        .bind(entry.subscription_id)
        .bind(entry.user_id)
        .bind(&entry.feature)
        .bind(entry.resource_id)
        .bind(&entry.action)
        .bind(entry.quantity)
        .bind(entry.was_gated)
        .bind(&entry.gate_type)
        .bind(&entry.override_reason)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.metadata)
        .bind(&entry.idempotency_key)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
                "usage already recorded for this idempotency key".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM subscription_usage_logs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<UsageLogRow>> {
        let row = sqlx::query_as::<_, UsageLogRow>(concat!(
            "SELECT ",
            usage_log_columns!(),
            " FROM subscription_usage_logs WHERE user_id = $1 AND idempotency_key = $2"
        ))
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_user_in_range(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<UsageLogRow>> {
        let rows = sqlx::query_as::<_, UsageLogRow>(concat!(
            "SELECT ",
            usage_log_columns!(),
            " FROM subscription_usage_logs
              WHERE user_id = $1 AND created_at >= $2 AND created_at <= $3
              ORDER BY created_at"
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
