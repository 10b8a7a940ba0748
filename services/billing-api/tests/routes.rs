//! HTTP route tests
//!
//! Drive the full router (middleware included) against the in-memory store.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{json_request, limits, now, TestApp};

// ============================================================================
// Health & authentication
// ============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Request::get("/api/v1/subscriptions/usage/check?feature=PROPERTY_CREATE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::get("/api/v1/plans")
            .header("x-user-id", app.user().to_string())
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

// ============================================================================
// Plans
// ============================================================================

#[tokio::test]
async fn test_list_plans() {
    let app = TestApp::new();
    app.plan("free", limits(1, 2), true);
    app.plan("pro", limits(10, 20), false);
    let user = app.user();

    let (status, body) = app.get(user, "/api/v1/plans").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["free", "pro"]);
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_create_subscription() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();

    let (status, body) = app
        .post(
            user,
            "/api/v1/subscriptions",
            json!({ "planId": plan.to_string(), "autoRenew": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["userId"], user.to_string());
    assert_eq!(body["priceCents"], 1_900);
    assert_eq!(body["autoRenew"], false);
    assert!(body["endDate"].as_str().unwrap().starts_with("2024-07-15"));
}

#[tokio::test]
async fn test_create_duplicate_subscription_rejected() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    let (status, body) = app
        .post(
            user,
            "/api/v1/subscriptions",
            json!({ "planId": plan.to_string() }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_SUBSCRIPTION");
}

#[tokio::test]
async fn test_create_subscription_invalid_input() {
    let app = TestApp::new();
    let user = app.user();

    let (status, body) = app
        .post(user, "/api/v1/subscriptions", json!({ "planId": "pro" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = app
        .post(
            user,
            "/api/v1/subscriptions",
            json!({ "planId": uuid::Uuid::new_v4().to_string() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PLAN_NOT_FOUND");
}

#[tokio::test]
async fn test_create_subscription_unknown_user() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let stranger = rentora_types::UserId::new();

    let (status, body) = app
        .post(
            stranger,
            "/api/v1/subscriptions",
            json!({ "planId": plan.to_string() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_get_active_subscription() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();

    let (status, body) = app.get(user, "/api/v1/subscriptions/active").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let id = app.subscribe(user, plan).await;
    let (status, body) = app.get(user, "/api/v1/subscriptions/active").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
}

#[tokio::test]
async fn test_subscription_owned_by_another_user_is_forbidden() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let owner = app.user();
    let other = app.user();
    let id = app.subscribe(owner, plan).await;

    let (status, body) = app.get(other, &format!("/api/v1/subscriptions/{id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .post(other, &format!("/api/v1/subscriptions/{id}/cancel"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(owner, &format!("/api/v1/subscriptions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
}

#[tokio::test]
async fn test_get_subscription_bad_and_unknown_id() {
    let app = TestApp::new();
    let user = app.user();

    let (status, _) = app.get(user, "/api/v1/subscriptions/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get(
            user,
            &format!("/api/v1/subscriptions/{}", uuid::Uuid::new_v4()),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_NOT_FOUND");
}

#[tokio::test]
async fn test_update_subscription() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    let id = app.subscribe(user, plan).await;
    let uri = format!("/api/v1/subscriptions/{id}");

    let (status, body) = app.patch(user, &uri, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "NO_CHANGES");

    let (status, body) = app.patch(user, &uri, json!({ "status": "PAUSED" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = app
        .patch(user, &uri, json!({ "status": "PAST_DUE", "autoRenew": false }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "PAST_DUE");
    assert_eq!(body["autoRenew"], false);
}

#[tokio::test]
async fn test_cancel_at_period_end_then_immediately() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    let id = app.subscribe(user, plan).await;
    let uri = format!("/api/v1/subscriptions/{id}/cancel");

    let (status, body) = app
        .post(user, &uri, json!({ "cancelAtPeriodEnd": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["cancelAtPeriodEnd"], true);
    assert_eq!(body["autoRenew"], false);

    let (status, body) = app.post(user, &uri, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "CANCELLED");
    assert!(body["cancelledDate"].is_string());

    let (status, body) = app.post(user, &uri, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ALREADY_CANCELLED");
}

#[tokio::test]
async fn test_renew_extends_from_current_end() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    let id = app.subscribe(user, plan).await;

    let (status, body) = app
        .post(user, &format!("/api/v1/subscriptions/{id}/renew"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["startDate"].as_str().unwrap().starts_with("2024-07-15"));
    assert!(body["endDate"].as_str().unwrap().starts_with("2024-08-15"));
    assert_eq!(body["renewalAttempts"], 1);
}

#[tokio::test]
async fn test_renew_cancelled_subscription_rejected() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    let id = app.subscribe(user, plan).await;

    app.post(user, &format!("/api/v1/subscriptions/{id}/cancel"), json!({}))
        .await;
    let (status, body) = app
        .post(user, &format!("/api/v1/subscriptions/{id}/renew"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
}

// ============================================================================
// Usage gating
// ============================================================================

#[tokio::test]
async fn test_check_usage_unknown_feature() {
    let app = TestApp::new();
    let user = app.user();

    let (status, body) = app
        .get(user, "/api/v1/subscriptions/usage/check?feature=TELEPORT")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_check_usage_free_tier_counts_owned_properties() {
    let app = TestApp::new();
    app.plan("free", limits(1, 2), true);
    let user = app.user();
    app.store.add_property(user.0, false, now());

    let (status, body) = app
        .get(user, "/api/v1/subscriptions/usage/check?feature=PROPERTY_CREATE")
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["hasAccess"], false);
    assert_eq!(body["isGated"], true);
    assert_eq!(body["gateType"], "HARD");
    assert_eq!(body["currentUsage"], 1);
    assert_eq!(body["maxLimit"], 1);
    assert_eq!(body["remaining"], 0);
    assert!(body.get("subscriptionId").is_none());
}

#[tokio::test]
async fn test_check_usage_flag_feature_off() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 20), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    let (status, body) = app
        .get(user, "/api/v1/subscriptions/usage/check?feature=BULK_OPERATION")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasAccess"], false);
    assert_eq!(body["gateType"], "HARD");
    assert_eq!(body["maxLimit"], 0);
}

#[tokio::test]
async fn test_record_usage_until_hard_gate() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 2), false);
    let user = app.user();
    let sub_id = app.subscribe(user, plan).await;
    let record = json!({ "feature": "VISIT_SCHEDULE", "action": "schedule" });

    for expected in 1..=2 {
        let (status, body) = app
            .post(user, "/api/v1/subscriptions/usage/record", record.clone())
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["usageAfter"], expected);
        assert_eq!(body["replayed"], false);
    }

    let (status, body) = app
        .post(user, "/api/v1/subscriptions/usage/record", record)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "USAGE_LIMIT_EXCEEDED");
    assert_eq!(body["error"]["details"]["remaining"], 0);
    assert_eq!(body["error"]["details"]["current"], 2);
    assert_eq!(body["error"]["details"]["limit"], 2);

    let (_, body) = app
        .get(user, "/api/v1/subscriptions/usage/check?feature=VISIT_SCHEDULE")
        .await;
    assert_eq!(body["currentUsage"], 2);
    assert_eq!(body["subscriptionId"], sub_id);
}

#[tokio::test]
async fn test_record_usage_override_passes_gate() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 1), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    app.post(
        user,
        "/api/v1/subscriptions/usage/record",
        json!({ "feature": "VISIT_SCHEDULE" }),
    )
    .await;

    let (status, body) = app
        .post(
            user,
            "/api/v1/subscriptions/usage/record",
            json!({
                "feature": "VISIT_SCHEDULE",
                "override": true,
                "overrideReason": "support goodwill"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["usageAfter"], 2);

    let logs = app.store.usage_logs_for(user.0);
    assert_eq!(logs.len(), 2);
    assert!(logs
        .iter()
        .any(|log| log.override_reason.as_deref() == Some("support goodwill")));
}

#[tokio::test]
async fn test_record_usage_rejects_non_positive_count() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 5), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    let (status, body) = app
        .post(
            user,
            "/api/v1/subscriptions/usage/record",
            json!({ "feature": "VISIT_SCHEDULE", "count": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_record_usage_idempotency_key_header() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 5), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    let request = || {
        let mut request = json_request(
            "POST",
            "/api/v1/subscriptions/usage/record",
            user,
            json!({ "feature": "VISIT_SCHEDULE" }),
        );
        request
            .headers_mut()
            .insert("idempotency-key", "visit-42".parse().unwrap());
        request
    };

    let (status, first) = app.send(request()).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["replayed"], false);

    let (status, second) = app.send(request()).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(second["replayed"], true);
    assert_eq!(second["logId"], first["logId"]);

    let (_, check) = app
        .get(user, "/api/v1/subscriptions/usage/check?feature=VISIT_SCHEDULE")
        .await;
    assert_eq!(check["currentUsage"], 1);
}

#[tokio::test]
async fn test_record_usage_captures_request_meta() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 5), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    let mut request = json_request(
        "POST",
        "/api/v1/subscriptions/usage/record",
        user,
        json!({ "feature": "VISIT_SCHEDULE" }),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.4".parse().unwrap());
    request
        .headers_mut()
        .insert("user-agent", "rentora-mobile/2.3".parse().unwrap());
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let logs = app.store.usage_logs_for(user.0);
    assert_eq!(logs[0].ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(logs[0].user_agent.as_deref(), Some("rentora-mobile/2.3"));
}

// ============================================================================
// Usage statistics
// ============================================================================

#[tokio::test]
async fn test_usage_stats() {
    let app = TestApp::new();
    let plan = app.plan("pro", limits(10, 5), false);
    let user = app.user();
    app.subscribe(user, plan).await;

    app.post(
        user,
        "/api/v1/subscriptions/usage/record",
        json!({ "feature": "VISIT_SCHEDULE", "count": 2 }),
    )
    .await;
    app.post(
        user,
        "/api/v1/subscriptions/usage/record",
        json!({ "feature": "PROPERTY_CREATE" }),
    )
    .await;

    let (status, body) = app
        .get(
            user,
            "/api/v1/subscriptions/usage/stats?startDate=2024-06-01&endDate=2024-06-30",
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["totalUsage"], 3);
    assert_eq!(body["byFeature"]["VISIT_SCHEDULE"], 2);
    assert_eq!(body["byFeature"]["PROPERTY_CREATE"], 1);
    assert_eq!(body["byDay"]["2024-06-15"], 3);
    assert_eq!(body["gatedActions"], 0);

    // Default window ends now and still covers today's usage
    let (status, body) = app.get(user, "/api/v1/subscriptions/usage/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalUsage"], 3);
}

#[tokio::test]
async fn test_usage_stats_inverted_range() {
    let app = TestApp::new();
    let user = app.user();

    let (status, body) = app
        .get(
            user,
            "/api/v1/subscriptions/usage/stats?startDate=2024-06-30&endDate=2024-06-01",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .get(user, "/api/v1/subscriptions/usage/stats?startDate=yesterday")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
