//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentora_types::{SubscriptionStatus, UsageCounter};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::SubscriptionRow;
use crate::repo::{CreateSubscription, SubscriptionRepository, UpdateSubscription};

macro_rules! subscription_columns {
    () => {
        "id, user_id, plan_id, payment_id, price_cents, currency, billing_cycle,
         start_date, end_date, trial_end_date, cancelled_date, status,
         cancel_at_period_end, auto_renew, renewal_attempts, last_renewal_attempt,
         properties_used, visits_used_this_month, media_used_this_month,
         amenities_used_this_month, boosts_used_this_month,
         last_usage_reset, next_usage_reset, created_at, updated_at"
    };
}

/// Column backing a usage counter
fn counter_column(counter: UsageCounter) -> &'static str {
    match counter {
        UsageCounter::Properties => "properties_used",
        UsageCounter::Visits => "visits_used_this_month",
        UsageCounter::Media => "media_used_this_month",
        UsageCounter::Amenities => "amenities_used_this_month",
        UsageCounter::Boosts => "boosts_used_this_month",
    }
}

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(concat!(
            "SELECT ",
            subscription_columns!(),
            " FROM user_subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_live_by_user_id(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(concat!(
            "SELECT ",
            subscription_columns!(),
            " FROM user_subscriptions
              WHERE user_id = $1 AND status IN ($2, $3) AND end_date > $4
              ORDER BY end_date DESC, created_at DESC"
        ))
        .bind(user_id)
        .bind(SubscriptionStatus::Trial.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn create_if_no_live(
        &self,
        sub: CreateSubscription,
        now: DateTime<Utc>,
    ) -> DbResult<SubscriptionRow> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent creates for the same user until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(sub.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        let live: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_subscriptions
            WHERE user_id = $1 AND status IN ($2, $3) AND end_date > $4
            "#,
        )
        .bind(sub.user_id)
        .bind(SubscriptionStatus::Trial.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if live > 0 {
            return Err(DbError::Conflict(format!(
                "user {} already has a live subscription",
                sub.user_id
            )));
        }

        let row = sqlx::query_as::<_, SubscriptionRow>(concat!(
            "INSERT INTO user_subscriptions (id, user_id, plan_id, payment_id, price_cents,
                 currency, billing_cycle, start_date, end_date, trial_end_date, status,
                 auto_renew, last_usage_reset, next_usage_reset)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING ",
            subscription_columns!()
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.plan_id)
        .bind(sub.payment_id)
        .bind(sub.price_cents)
        .bind(&sub.currency)
        .bind(&sub.billing_cycle)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.trial_end_date)
        .bind(&sub.status)
        .bind(sub.auto_renew)
        .bind(sub.last_usage_reset)
        .bind(sub.next_usage_reset)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row)
    }

    async fn update(&self, id: Uuid, update: UpdateSubscription) -> DbResult<SubscriptionRow> {
        sqlx::query_as::<_, SubscriptionRow>(concat!(
            "UPDATE user_subscriptions
             SET status = $2, payment_id = $3, start_date = $4, end_date = $5,
                 cancelled_date = $6, cancel_at_period_end = $7, auto_renew = $8,
                 renewal_attempts = $9, last_renewal_attempt = $10, updated_at = NOW()
             WHERE id = $1
             RETURNING ",
            subscription_columns!()
        ))
        .bind(id)
        .bind(&update.status)
        .bind(update.payment_id)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(update.cancelled_date)
        .bind(update.cancel_at_period_end)
        .bind(update.auto_renew)
        .bind(update.renewal_attempts)
        .bind(update.last_renewal_attempt)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)
    }

    async fn increment_usage(
        &self,
        id: Uuid,
        counter: UsageCounter,
        count: i64,
        ceiling: Option<i64>,
    ) -> DbResult<Option<i64>> {
        let column = counter_column(counter);
        // Single statement: concurrent increments never overwrite each other
        let sql = format!(
            "UPDATE user_subscriptions
             SET {column} = {column} + $2, updated_at = NOW()
             WHERE id = $1 AND ($3::BIGINT IS NULL OR {column} + $2 <= $3)
             RETURNING {column}"
        );

        let value: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(count)
            .bind(ceiling)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn reset_usage_window(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET visits_used_this_month = 0,
                media_used_this_month = 0,
                amenities_used_this_month = 0,
                boosts_used_this_month = 0,
                last_usage_reset = $2,
                next_usage_reset = $3,
                updated_at = NOW()
            WHERE id = $1 AND next_usage_reset <= $2
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(next_reset)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
