//! Rentora Billing API
//!
//! REST surface over the subscription lifecycle and usage-gating engine.
//!
//! ## REST Endpoints
//!
//! - `GET /api/v1/plans` - List offered plans
//! - `POST /api/v1/subscriptions` - Subscribe the caller to a plan
//! - `GET /api/v1/subscriptions/active` - The caller's live subscription
//! - `GET /api/v1/subscriptions/{id}` - Get a subscription
//! - `PATCH /api/v1/subscriptions/{id}` - Update a subscription
//! - `POST /api/v1/subscriptions/{id}/cancel` - Cancel now or at period end
//! - `POST /api/v1/subscriptions/{id}/renew` - Renew for one billing cycle
//! - `GET /api/v1/subscriptions/usage/check` - Check a feature quota
//! - `POST /api/v1/subscriptions/usage/record` - Record feature usage
//! - `GET /api/v1/subscriptions/usage/stats` - Aggregate usage history
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! Callers are identified by the `x-user-id` header set by the upstream gateway.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{health, ready};
use crate::state::AppState;

/// Build the HTTP router with middleware
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    let api_v1 = Router::new()
        // Plan routes
        .route("/plans", get(handlers::list_plans))
        // Usage routes
        .route("/subscriptions/usage/check", get(handlers::check_usage))
        .route("/subscriptions/usage/record", post(handlers::record_usage))
        .route("/subscriptions/usage/stats", get(handlers::usage_stats))
        // Subscription routes
        .route("/subscriptions", post(handlers::create_subscription))
        .route(
            "/subscriptions/active",
            get(handlers::get_active_subscription),
        )
        .route(
            "/subscriptions/{id}",
            get(handlers::get_subscription).patch(handlers::update_subscription),
        )
        .route(
            "/subscriptions/{id}/cancel",
            post(handlers::cancel_subscription),
        )
        .route(
            "/subscriptions/{id}/renew",
            post(handlers::renew_subscription),
        );

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
