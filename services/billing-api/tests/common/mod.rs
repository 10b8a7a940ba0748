//! Router over an in-memory billing service, plus request helpers

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use billing_api::config::Config;
use billing_api::extractors::USER_ID_HEADER;
use billing_api::state::AppState;
use rentora_billing_core::{
    BillingConfig, BillingService, BillingStores, ManualClock, TracingEventSink,
};
use rentora_db::{MemoryStore, PlanRow, UserRow};
use rentora_types::{PlanId, PlanLimits, UserId};

/// Fixed instant every test runs at
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn limits(max_properties: i64, max_visits: i64) -> PlanLimits {
    PlanLimits {
        max_properties,
        max_visits_per_month: max_visits,
        max_media_per_property: 10,
        max_amenities_per_property: 10,
        max_boosts_per_month: 2,
        allow_boost: true,
        allow_premium_support: false,
        allow_advanced_analytics: false,
        allow_bulk_operations: false,
    }
}

pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(now()));
        let billing = BillingService::with_parts(
            BillingStores::from(store.clone()),
            BillingConfig::default(),
            clock,
            Arc::new(TracingEventSink),
        );
        let state = AppState::new(
            billing,
            None,
            Config::with_defaults("postgres://localhost/unused"),
        );
        Self {
            store,
            router: billing_api::build_router(state, None),
        }
    }

    pub fn user(&self) -> UserId {
        let id = Uuid::new_v4();
        self.store.insert_user(UserRow {
            id,
            email: format!("user-{id}@example.com"),
            is_active: true,
            created_at: now(),
        });
        UserId(id)
    }

    pub fn plan(&self, name: &str, limits: PlanLimits, is_free: bool) -> PlanId {
        let id = Uuid::new_v4();
        self.store.insert_plan(PlanRow {
            id,
            name: name.to_string(),
            display_name: name.to_uppercase(),
            is_active: true,
            is_free,
            price_cents: if is_free { 0 } else { 1_900 },
            currency: "USD".to_string(),
            billing_cycle: "MONTHLY".to_string(),
            trial_days: 0,
            max_properties: limits.max_properties,
            max_visits_per_month: limits.max_visits_per_month,
            max_media_per_property: limits.max_media_per_property,
            max_amenities_per_property: limits.max_amenities_per_property,
            max_boosts_per_month: limits.max_boosts_per_month,
            allow_boost: limits.allow_boost,
            allow_premium_support: limits.allow_premium_support,
            allow_advanced_analytics: limits.allow_advanced_analytics,
            allow_bulk_operations: limits.allow_bulk_operations,
            created_at: now(),
            updated_at: now(),
        });
        PlanId(id)
    }

    /// Send a request and return the status with the parsed JSON body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, user: UserId, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(uri)
                .header(USER_ID_HEADER, user.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, user: UserId, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, user, body)).await
    }

    pub async fn patch(&self, user: UserId, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("PATCH", uri, user, body)).await
    }

    /// Subscribe `user` to `plan` and return the subscription id
    pub async fn subscribe(&self, user: UserId, plan: PlanId) -> String {
        let (status, body) = self
            .post(
                user,
                "/api/v1/subscriptions",
                serde_json::json!({ "planId": plan.to_string() }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: &str, uri: &str, user: UserId, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, user.to_string())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
