//! HTTP API surface (C11): gate/quote/authorize/verify routes, the
//! maintenance and webhook-receiver endpoints, and the well-known keyset.
//! Scoped auth mirrors the teacher's `server.rs` header-based auth checks.

mod route_domains;
#[cfg(test)]
mod tests;

use axum::extract::{Path, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{http::HeaderMap, Json, Router};
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use settld_gate::gate::{self, AuthorizeRequest, CreateGateRequest, QuoteRequest, VerifyRequest};
use settld_gate::idempotency;
use settld_gate::settlement::{self, SettlementPolicy};
use settld_gate::types::VerificationStatus;
use settld_protocol::token::RequestBindingMode;

use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    route_domains::build_internal_router()
        .layer(middleware::from_fn(require_protocol_auth))
        .with_state(state)
}

const PROTOCOL_VERSION: &str = "1.0";

/// Enforces `authorization: Bearer <key>`, `x-proxy-tenant-id`, and
/// `x-settld-protocol: 1.0` on every route except health, the well-known
/// keyset, the webhook receiver (authenticates itself via HMAC), and the
/// reverse proxy (authenticates the upstream call, not the gateway itself).
async fn require_protocol_auth(request: axum::extract::Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/healthz"
        || path == "/.well-known/settldpay-keyset"
        || path == "/deliveries/nooterra"
        || path.starts_with("/proxy/")
    {
        return next.run(request).await;
    }

    let headers = request.headers();
    let protocol_ok = headers.get("x-settld-protocol").and_then(|v| v.to_str().ok()) == Some(PROTOCOL_VERSION);
    let has_bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    let has_tenant = headers.get("x-proxy-tenant-id").is_some();

    if !protocol_ok || !has_bearer || !has_tenant {
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

fn tenant_id(headers: &HeaderMap) -> String {
    headers
        .get("x-proxy-tenant-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("default")
        .to_string()
}

async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn create_gate(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<CreateGateRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = format!("{}.gate.create", tenant_id(&headers));
    let idempotency_key = headers.get("x-idempotency-key").and_then(|v| v.to_str().ok()).map(str::to_string);

    if let Some(key) = idempotency_key {
        let (outcome, request_hash) = idempotency::begin::<_, serde_json::Value>(&state.store, &scope, &key, &req).await?;
        if let idempotency::Outcome::Replayed(response) = outcome {
            return Ok(Json(response));
        }

        let gate_id = new_gate_id(&req);
        let gate = gate::create(&state.gate, req, gate_id, Utc::now()).await?;
        let response = json!({"gate": gate});
        idempotency::complete(&state.store, &scope, &key, &request_hash, &response).await?;
        return Ok(Json(response));
    }

    let gate_id = new_gate_id(&req);
    let gate = gate::create(&state.gate, req, gate_id, Utc::now()).await?;
    Ok(Json(json!({"gate": gate})))
}

fn new_gate_id(req: &CreateGateRequest) -> String {
    let nonce = uuid::Uuid::new_v4();
    format!(
        "gate_{}",
        &settld_protocol::hash::sha256_hex(format!("{}:{}:{nonce}", req.tenant_id, req.payer_agent_id).as_bytes())[..24]
    )
}

#[derive(Debug, Deserialize)]
struct QuoteRequestBody {
    gate_id: String,
    #[serde(default)]
    request_binding_mode: RequestBindingMode,
    request_binding_sha256: Option<String>,
    quote_id: Option<String>,
    #[serde(default = "default_quote_ttl_seconds")]
    ttl_seconds: i64,
}

fn default_quote_ttl_seconds() -> i64 {
    300
}

async fn quote_gate(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<QuoteRequestBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let quote = gate::quote(
        &state.gate,
        &tenant_id(&headers),
        &req.gate_id,
        QuoteRequest {
            request_binding_mode: req.request_binding_mode,
            request_binding_sha256: req.request_binding_sha256,
            quote_id: req.quote_id,
            ttl_seconds: req.ttl_seconds,
        },
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({"quote": quote})))
}

#[derive(Debug, Deserialize)]
struct AuthorizeRequestBody {
    gate_id: String,
    idempotency_key: String,
    request_binding_mode: Option<RequestBindingMode>,
    request_binding_sha256: Option<String>,
    quote_id: Option<String>,
    /// Demo-only override; a standalone wallet-balance service is out of
    /// scope, so an omitted value is treated as sufficient funds.
    wallet_available_cents: Option<i64>,
}

async fn authorize_payment(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<AuthorizeRequestBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = gate::authorize_payment(
        &state.gate,
        &tenant_id(&headers),
        &req.gate_id,
        AuthorizeRequest {
            idempotency_key: req.idempotency_key,
            request_binding_mode: req.request_binding_mode,
            request_binding_sha256: req.request_binding_sha256,
            quote_id: req.quote_id,
        },
        req.wallet_available_cents.unwrap_or(i64::MAX),
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "token": outcome.token,
        "authorization_ref": outcome.authorization_ref,
        "quote_id": outcome.quote_id,
    })))
}

#[derive(Debug, Deserialize)]
struct VerifyRequestBody {
    gate_id: String,
    verification_status: VerificationStatus,
    policy: Option<SettlementPolicy>,
    verification_method_hash: Option<String>,
    #[serde(default)]
    verification_codes: Vec<String>,
    #[serde(default)]
    evidence_refs: Vec<String>,
    response_sha256_hex: Option<String>,
    quote_hash_hex: Option<String>,
}

async fn verify_gate(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<VerifyRequestBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = gate::verify(
        &state.gate,
        &tenant_id(&headers),
        &req.gate_id,
        VerifyRequest {
            verification_status: req.verification_status,
            policy: req.policy.unwrap_or_else(settlement::default_policy),
            verification_method_hash: req.verification_method_hash,
            verification_codes: req.verification_codes,
            evidence_refs: req.evidence_refs,
            provider_signature: None,
            provider_quote_signature: None,
            response_sha256_hex: req.response_sha256_hex,
            quote_hash_hex: req.quote_hash_hex,
        },
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({"gate": outcome.gate, "settlement": outcome.decision})))
}

async fn get_gate(State(state): State<AppState>, headers: HeaderMap, Path(gate_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let gate = state
        .store
        .get_gate(&tenant_id(&headers), &gate_id)
        .await?
        .ok_or(settld_gate::GateError::GateNotFound)?;
    let settlement = state.store.get_decision(&gate_id).await?;
    Ok(Json(json!({"gate": gate, "settlement": settlement})))
}

async fn run_maintenance(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state.maintenance.tick(&tenant_id(&headers)).await?;
    Ok(Json(json!({
        "holds_released": report.holds_released,
        "outbox_rows_retried": report.outbox_rows_retried,
        "drift_detected": report.drift_detected,
    })))
}

async fn well_known_keyset(State(state): State<AppState>) -> Result<Response, ApiError> {
    let verifying_key = state.gate.tenant_verifying_key();
    let key_id = settld_protocol::crypto::key_id_from_verifying_key(&verifying_key);
    let jwks = json!({
        "keys": [{
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": key_id,
            "x": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifying_key.as_bytes()),
        }]
    });

    let mut response = Json(jwks).into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(&format!("max-age={}", state.config.jwks_cache_max_age_seconds)) {
        response.headers_mut().insert(axum::http::header::CACHE_CONTROL, value);
    }
    Ok(response)
}
