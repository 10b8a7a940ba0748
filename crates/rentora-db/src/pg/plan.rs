//! PostgreSQL plan repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::PlanRow;
use crate::repo::PlanRepository;

macro_rules! plan_columns {
    () => {
        "id, name, display_name, is_active, is_free, price_cents, currency, billing_cycle,
         trial_days, max_properties, max_visits_per_month, max_media_per_property,
         max_amenities_per_property, max_boosts_per_month, allow_boost,
         allow_premium_support, allow_advanced_analytics, allow_bulk_operations,
         created_at, updated_at"
    };
}

/// PostgreSQL plan repository
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM subscription_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn find_free(&self) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM subscription_plans
              WHERE is_free AND is_active
              ORDER BY created_at
              LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn list_active(&self) -> DbResult<Vec<PlanRow>> {
        let plans = sqlx::query_as::<_, PlanRow>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM subscription_plans WHERE is_active ORDER BY price_cents, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }
}
