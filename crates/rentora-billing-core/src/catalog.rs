//! Plan catalog
//!
//! Plans are read-mostly policy, so lookups go through a TTL cache. Plan
//! administration lives elsewhere; changes become visible here once the
//! cached entry expires or is invalidated.

use std::sync::Arc;

use moka::future::Cache;
use rentora_db::PlanRepository;
use rentora_types::{Plan, PlanId};
use tracing::instrument;

use crate::{BillingConfig, BillingError};

/// Cached view over the plan repository
#[derive(Clone)]
pub struct PlanCatalog {
    repo: Arc<dyn PlanRepository>,
    plans: Cache<PlanId, Plan>,
    /// Resolved free plan; `None` is cached too so a missing free plan does
    /// not hit the database on every check
    free_plan: Cache<(), Option<Plan>>,
}

impl PlanCatalog {
    /// Create a catalog with the default cache settings
    pub fn new(repo: Arc<dyn PlanRepository>) -> Self {
        Self::with_config(repo, &BillingConfig::default())
    }

    /// Create a catalog using the cache settings from `config`
    pub fn with_config(repo: Arc<dyn PlanRepository>, config: &BillingConfig) -> Self {
        Self {
            repo,
            plans: Cache::builder()
                .time_to_live(config.plan_cache_ttl)
                .max_capacity(config.plan_cache_capacity)
                .build(),
            free_plan: Cache::builder()
                .time_to_live(config.plan_cache_ttl)
                .max_capacity(1)
                .build(),
        }
    }

    /// Get a plan by ID
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn get_plan(&self, plan_id: PlanId) -> Result<Plan, BillingError> {
        if let Some(plan) = self.plans.get(&plan_id).await {
            return Ok(plan);
        }

        let plan: Plan = self
            .repo
            .find_by_id(plan_id.0)
            .await?
            .ok_or(BillingError::PlanNotFound)?
            .try_into()?;

        self.plans.insert(plan_id, plan.clone()).await;
        Ok(plan)
    }

    /// Get the plan designated as the free fallback, if one is configured
    #[instrument(skip(self))]
    pub async fn get_free_plan(&self) -> Result<Option<Plan>, BillingError> {
        if let Some(plan) = self.free_plan.get(&()).await {
            return Ok(plan);
        }

        let plan = self.repo.find_free().await?.map(Plan::try_from).transpose()?;
        if plan.is_none() {
            tracing::warn!("no free plan configured, using built-in free tier limits");
        }

        self.free_plan.insert((), plan.clone()).await;
        Ok(plan)
    }

    /// List plans currently offered, cheapest first
    #[instrument(skip(self))]
    pub async fn list_active_plans(&self) -> Result<Vec<Plan>, BillingError> {
        let rows = self.repo.list_active().await?;
        rows.into_iter()
            .map(|row| Plan::try_from(row).map_err(BillingError::from))
            .collect()
    }

    /// Drop every cached plan
    pub fn invalidate_all(&self) {
        self.plans.invalidate_all();
        self.free_plan.invalidate_all();
    }
}

impl std::fmt::Debug for PlanCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCatalog").finish()
    }
}
