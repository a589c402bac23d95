//! Signed outbound delivery and dedupe-bound receiver (C10).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use settld_gate::types::ReceiverDedupeRow;
use settld_protocol::crypto::verify_hmac_sha256;
use settld_protocol::hash::{canonical_json, sha256_hex};

use crate::error::ApiError;
use crate::state::AppState;

const TIMESTAMP_SKEW_SECONDS: i64 = 300;

#[derive(Debug, Serialize)]
struct SignedPayload<'a> {
    timestamp: i64,
    #[serde(rename = "bodyJson")]
    body_json: &'a Value,
}

/// Signs and posts one outbox artifact, per spec §4.10's header contract.
/// Returns the HTTP status the destination responded with, so the caller
/// can decide whether to `ack_outbox` or `bump_outbox_attempt`.
pub async fn deliver(
    state: &AppState,
    destination_url: &str,
    destination_id: &str,
    tenant_id: &str,
    delivery_id: &str,
    dedupe_key: &str,
    artifact_type: &str,
    body: &Value,
) -> Result<u16, ApiError> {
    let timestamp = Utc::now().timestamp();
    let signature_input = SignedPayload { timestamp, body_json: body };
    let canonical = canonical_json(&signature_input).map_err(|_| ApiError::GatewayUpstreamError)?;
    let signature = hex::encode(settld_protocol::crypto::hmac_sha256(state.config.webhook_hmac_key.as_bytes(), canonical.as_bytes()));

    let response = state
        .http_client
        .post(destination_url)
        .header("x-proxy-timestamp", timestamp.to_string())
        .header("x-proxy-signature", signature)
        .header("x-proxy-dedupe-key", dedupe_key)
        .header("x-proxy-delivery-id", delivery_id)
        .header("x-proxy-artifact-type", artifact_type)
        .header("x-proxy-tenant-id", tenant_id)
        .header("x-proxy-destination-id", destination_id)
        .header("x-settld-protocol", "1.0")
        .json(body)
        .timeout(std::time::Duration::from_millis(state.config.webhook_ack_timeout_ms))
        .send()
        .await
        .map_err(|_| ApiError::GatewayUpstreamError)?;

    Ok(response.status().as_u16())
}

#[derive(Debug, Deserialize)]
pub struct ReceiverRequest {
    #[serde(rename = "dedupeKey")]
    pub dedupe_key: String,
    pub artifact: Value,
}

/// `POST /deliveries/nooterra` — verifies the HMAC signature, timestamp
/// skew, and artifact dedupe key; stores the artifact content-addressed by
/// its canonical hash; queues an ack.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ReceiverRequest>) -> Result<Json<Value>, ApiError> {
    verify_signature(&state, &headers, &req.artifact)?;

    let artifact_hash = sha256_hex(canonical_json(&req.artifact).map_err(|_| ApiError::WebhookSignatureInvalid)?.as_bytes());

    if let Some(existing) = state.store.receiver_dedupe_lookup(&req.dedupe_key).await? {
        if existing.artifact_hash != artifact_hash {
            return Err(ApiError::Gate(settld_gate::GateError::DedupeMismatch));
        }
        return Ok(Json(serde_json::json!({"ok": true, "dedupeKey": req.dedupe_key, "replayed": true})));
    }

    state
        .store
        .receiver_dedupe_insert(ReceiverDedupeRow {
            dedupe_key: req.dedupe_key.clone(),
            artifact_hash: artifact_hash.clone(),
            delivery_id: header_string(&headers, "x-proxy-delivery-id").unwrap_or_default(),
            stored_at: Some(Utc::now()),
            acked_at: Some(Utc::now()),
        })
        .await?;

    Ok(Json(serde_json::json!({"ok": true, "dedupeKey": req.dedupe_key, "artifactHash": artifact_hash})))
}

fn verify_signature(state: &AppState, headers: &HeaderMap, artifact: &Value) -> Result<(), ApiError> {
    let timestamp: i64 = header_string(headers, "x-proxy-timestamp")
        .and_then(|value| value.parse().ok())
        .ok_or(ApiError::WebhookSignatureInvalid)?;
    let now = Utc::now().timestamp();
    if (now - timestamp).abs() > TIMESTAMP_SKEW_SECONDS {
        return Err(ApiError::WebhookSignatureInvalid);
    }

    let signature_hex = header_string(headers, "x-proxy-signature").ok_or(ApiError::WebhookSignatureInvalid)?;
    let signature = hex::decode(signature_hex).map_err(|_| ApiError::WebhookSignatureInvalid)?;

    let signature_input = SignedPayload { timestamp, body_json: artifact };
    let canonical = canonical_json(&signature_input).map_err(|_| ApiError::WebhookSignatureInvalid)?;

    verify_hmac_sha256(state.config.webhook_hmac_key.as_bytes(), canonical.as_bytes(), &signature)
        .map_err(|_| ApiError::WebhookSignatureInvalid)
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}
