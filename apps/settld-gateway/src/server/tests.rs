use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::build_router;
use crate::config::Config;
use crate::state::AppState;

const TENANT: &str = "tenant-1";

fn test_config() -> Config {
    let mut seed = [0u8; 32];
    seed[0] = 7;
    Config {
        tenant_signing_key_b64: base64::engine::general_purpose::STANDARD.encode(seed),
        webhook_hmac_key: "test-webhook-hmac-key".to_string(),
        ..Config::default()
    }
}

async fn test_router() -> axum::Router {
    build_router(AppState::build(test_config()).await.expect("build app state"))
}

fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header("authorization", "Bearer test-api-key")
        .header("x-proxy-tenant-id", TENANT)
        .header("x-settld-protocol", "1.0")
        .header("content-type", "application/json")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json body")
}

#[tokio::test]
async fn health_is_reachable_without_auth() {
    let router = test_router().await;
    let response = router
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("test"))
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_auth() {
    let router = test_router().await;
    let response = router
        .oneshot(Request::builder().uri("/x402/gate/gate-x").method("GET").body(Body::empty()).expect("test"))
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

async fn create_gate(router: &axum::Router, amount_cents: i64) -> Value {
    let body = json!({
        "tenant_id": TENANT,
        "payer_agent_id": "agent-payer",
        "payee_agent_id": "agent-payee",
        "amount_cents": amount_cents,
        "currency": "USD",
        "holdback_bps": 0,
        "dispute_window_ms": 0,
    });
    let response = router
        .clone()
        .oneshot(
            authed(Request::builder().uri("/x402/gate/create").method("POST"))
                .body(Body::from(body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn happy_path_create_authorize_verify_releases_funds() {
    let router = test_router().await;
    let created = create_gate(&router, 500).await;
    let gate_id = created["gate"]["gate_id"].as_str().expect("test").to_string();

    let auth_body = json!({
        "gate_id": gate_id,
        "idempotency_key": "authz-1",
    });
    let auth_response = router
        .clone()
        .oneshot(
            authed(Request::builder().uri("/x402/gate/authorize-payment").method("POST"))
                .body(Body::from(auth_body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(auth_response.status(), StatusCode::OK);
    let authorized = body_json(auth_response).await;
    assert!(authorized["token"].as_str().expect("test").contains('.'));

    let verify_body = json!({
        "gate_id": gate_id,
        "verification_status": "green",
    });
    let verify_response = router
        .clone()
        .oneshot(
            authed(Request::builder().uri("/x402/gate/verify").method("POST"))
                .body(Body::from(verify_body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(verify_response.status(), StatusCode::OK);
    let verified = body_json(verify_response).await;
    assert_eq!(verified["settlement"]["released_amount_cents"], json!(500));
    assert_eq!(verified["settlement"]["refunded_amount_cents"], json!(0));
}

#[tokio::test]
async fn red_verification_refunds_in_full() {
    let router = test_router().await;
    let created = create_gate(&router, 300).await;
    let gate_id = created["gate"]["gate_id"].as_str().expect("test").to_string();

    let auth_body = json!({"gate_id": gate_id, "idempotency_key": "authz-red"});
    router
        .clone()
        .oneshot(
            authed(Request::builder().uri("/x402/gate/authorize-payment").method("POST"))
                .body(Body::from(auth_body.to_string()))
                .expect("test"),
        )
        .await
        .expect("request");

    let verify_body = json!({"gate_id": gate_id, "verification_status": "red", "verification_codes": ["UPSTREAM_500"]});
    let verify_response = router
        .oneshot(
            authed(Request::builder().uri("/x402/gate/verify").method("POST"))
                .body(Body::from(verify_body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    let verified = body_json(verify_response).await;
    assert_eq!(verified["settlement"]["refunded_amount_cents"], json!(300));
    assert_eq!(verified["settlement"]["released_amount_cents"], json!(0));
}

#[tokio::test]
async fn create_gate_is_idempotent_on_same_key() {
    let router = test_router().await;
    let body = json!({
        "tenant_id": TENANT,
        "payer_agent_id": "agent-payer",
        "payee_agent_id": "agent-payee",
        "amount_cents": 750,
        "currency": "USD",
    });

    let first = router
        .clone()
        .oneshot(
            authed(Request::builder().uri("/x402/gate/create").method("POST"))
                .header("x-idempotency-key", "create-once")
                .body(Body::from(body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    let first_json = body_json(first).await;

    let second = router
        .oneshot(
            authed(Request::builder().uri("/x402/gate/create").method("POST"))
                .header("x-idempotency-key", "create-once")
                .body(Body::from(body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    let second_json = body_json(second).await;

    assert_eq!(first_json, second_json);
}

#[tokio::test]
async fn get_gate_returns_current_status() {
    let router = test_router().await;
    let created = create_gate(&router, 200).await;
    let gate_id = created["gate"]["gate_id"].as_str().expect("test").to_string();

    let response = router
        .oneshot(authed(Request::builder().uri(format!("/x402/gate/{gate_id}")).method("GET")).body(Body::empty()).expect("test"))
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["gate"]["status"], json!("created"));
}

#[tokio::test]
async fn maintenance_tick_runs() {
    let router = test_router().await;
    let response = router
        .oneshot(authed(Request::builder().uri("/ops/maintenance/holdback/run").method("POST")).body(Body::empty()).expect("test"))
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["holds_released"], json!(0));
}

#[tokio::test]
async fn well_known_keyset_exposes_tenant_public_key() {
    let router = test_router().await;
    let response = router
        .oneshot(Request::builder().uri("/.well-known/settldpay-keyset").body(Body::empty()).expect("test"))
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
    let jwks = body_json(response).await;
    assert_eq!(jwks["keys"][0]["kty"], json!("OKP"));
}
