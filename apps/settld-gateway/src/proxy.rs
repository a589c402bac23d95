//! Transparent HTTP reverse proxy implementing the client-side x402 dance
//! (C9): translate an upstream `402` into a gate, mint an authorization
//! token, retry the upstream with the token, hash the response, and post a
//! verification decision.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use chrono::Utc;
use settld_gate::gate::{self, AuthorizeRequest, CreateGateRequest, QuoteRequest, VerifyRequest};
use settld_gate::types::VerificationStatus;
use settld_protocol::hash::{canonical_json_value, sha256_hex};
use settld_protocol::token::{ProviderSignatureV1, RequestBindingMode};
use settld_x402::X402OfferParser;

use crate::error::ApiError;
use crate::state::AppState;

const GATE_HEADER: &str = "x-settld-gate-id";
const UPSTREAM_HEADER: &str = "x-proxy-upstream-url";
const TENANT_HEADER: &str = "x-proxy-tenant-id";
const PAYER_HEADER: &str = "x-proxy-payer-agent-id";
const PAYEE_HEADER: &str = "x-proxy-payee-agent-id";
const PASSPORT_HEADER: &str = "x-settld-agent-passport";
const PROVIDER_SIGNATURE_HEADER: &str = "x-settld-provider-signature";
const PROVIDER_QUOTE_SIGNATURE_HEADER: &str = "x-settld-provider-quote-signature";
const PROVIDER_PUBLIC_KEY_HEADER: &str = "x-settld-provider-public-key-pem";

/// Handles one proxied request end to end. `req` is the inbound client
/// request with its body already consumed into `body_bytes` by the caller
/// (axum requires exclusive access to the body up front).
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let body_bytes = to_bytes(body, state.config.max_response_buffer_bytes)
        .await
        .map_err(|_| ApiError::GatewayResponseTooLarge)?;

    let upstream_url = header_str(&headers, UPSTREAM_HEADER).ok_or(ApiError::OfferHeaderInvalid)?;
    let tenant_id = header_str(&headers, TENANT_HEADER).unwrap_or("default").to_string();
    let gate_id_header = header_str(&headers, GATE_HEADER).map(str::to_string);

    let mut forward_headers = headers.clone();
    forward_headers.remove(axum::http::header::HOST);
    forward_headers.remove(PASSPORT_HEADER);
    forward_headers.remove(UPSTREAM_HEADER);

    let outcome = run_proxy_attempt(&state, &method, upstream_url, &forward_headers, &body_bytes, &tenant_id, gate_id_header.clone()).await;

    match outcome {
        Ok(response) => Ok(response),
        Err(error) => {
            if let Some(gate_id) = gate_id_header {
                let _ = gate::force_red(&state.gate, &tenant_id, &gate_id, "X402_GATEWAY_ERROR", Utc::now()).await;
            }
            tracing::error!(error = %error, "gateway proxy attempt failed");
            Err(ApiError::GatewayUpstreamError)
        }
    }
}

async fn run_proxy_attempt(
    state: &AppState,
    method: &Method,
    upstream_url: &str,
    headers: &HeaderMap,
    body_bytes: &[u8],
    tenant_id: &str,
    gate_id_header: Option<String>,
) -> Result<Response, ApiError> {
    let upstream_response = fetch_upstream(state, method, upstream_url, headers, body_bytes).await?;

    if upstream_response.status() != StatusCode::PAYMENT_REQUIRED {
        return finish_non_gate_response(state, tenant_id, gate_id_header, upstream_response).await;
    }

    match gate_id_header {
        None => {
            // Step 3: first 402 — mint a gate from the offer header, hand the
            // client back a 402 carrying the new gate id. No retry yet.
            let offer_header = header_str(headers, "x-payment-required");
            let offer = X402OfferParser
                .parse(offer_header)
                .map_err(|_| ApiError::OfferHeaderInvalid)?;

            let gate_id = format!("gate_{}", &sha256_hex(format!("{tenant_id}:{upstream_url}:{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()).as_bytes())[..24]);
            let request = CreateGateRequest {
                tenant_id: tenant_id.to_string(),
                payer_agent_id: header_str(headers, PAYER_HEADER).unwrap_or("unknown-payer").to_string(),
                payee_agent_id: header_str(headers, PAYEE_HEADER).unwrap_or("unknown-payee").to_string(),
                amount_cents: offer.amount_cents.unwrap_or_default(),
                currency: offer.currency.unwrap_or_else(|| "USD".to_string()),
                holdback_bps: 0,
                dispute_window_ms: 0,
                tool_id: offer.tool_id,
                provider_id: offer.provider_id,
                payment_required_header: offer_header.map(str::to_string),
                provider_public_key_pem: header_str(headers, PROVIDER_PUBLIC_KEY_HEADER).map(str::to_string),
                agent_passport: None,
                auto_fund_payer_cents: None,
            };
            let gate = gate::create(&state.gate, request, gate_id.clone(), Utc::now()).await?;

            let mut response = Response::builder()
                .status(StatusCode::PAYMENT_REQUIRED)
                .body(Body::empty())
                .unwrap_or_else(|_| Response::new(Body::empty()));
            insert_header(response.headers_mut(), GATE_HEADER, &gate.gate_id);
            Ok(response)
        }
        Some(gate_id) => {
            // Step 4: retried 402 with a gate header already present.
            if !body_bytes.is_empty() {
                return Err(ApiError::GatewayRetryRequiresBufferedBody);
            }

            let offer = X402OfferParser.parse(header_str(headers, "x-payment-required")).ok();
            let request_binding_mode = offer.as_ref().and_then(|o| o.request_binding_mode);
            let quote_required = offer.as_ref().map(|o| o.quote_required).unwrap_or(false);

            let mut quote_id = offer.as_ref().and_then(|o| o.quote_id.clone());
            if quote_required || request_binding_mode == Some(RequestBindingMode::Strict) {
                let quote = gate::quote(
                    &state.gate,
                    tenant_id,
                    &gate_id,
                    QuoteRequest {
                        request_binding_mode: request_binding_mode.unwrap_or(RequestBindingMode::None),
                        request_binding_sha256: None,
                        quote_id: quote_id.clone(),
                        ttl_seconds: 300,
                    },
                    Utc::now(),
                )
                .await?;
                quote_id = Some(quote.quote_id);
            }

            let authorize_outcome = gate::authorize_payment(
                &state.gate,
                tenant_id,
                &gate_id,
                AuthorizeRequest {
                    idempotency_key: gate_id.clone(),
                    request_binding_mode,
                    request_binding_sha256: None,
                    quote_id,
                },
                i64::MAX,
                Utc::now(),
            )
            .await?;

            let mut retry_headers = headers.clone();
            insert_header(&mut retry_headers, "authorization", &format!("SettldPay {}", authorize_outcome.token));
            insert_header(&mut retry_headers, "x-payment", &authorize_outcome.token);

            let retried = fetch_upstream(state, method, upstream_url, &retry_headers, body_bytes).await?;
            finish_non_gate_response(state, tenant_id, Some(gate_id), retried).await
        }
    }
}

async fn finish_non_gate_response(
    state: &AppState,
    tenant_id: &str,
    gate_id_header: Option<String>,
    upstream_response: reqwest::Response,
) -> Result<Response, ApiError> {
    let Some(gate_id) = gate_id_header else {
        // No gate involved at all: pass the upstream response straight through.
        return reqwest_response_to_axum(upstream_response).await;
    };

    let status = upstream_response.status();
    let content_type = upstream_response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let provider_signature = header_from_reqwest(&upstream_response, PROVIDER_SIGNATURE_HEADER);
    let provider_quote_signature = header_from_reqwest(&upstream_response, PROVIDER_QUOTE_SIGNATURE_HEADER);

    let max_bytes = state.config.max_response_buffer_bytes;
    let body_bytes = upstream_response.bytes().await.map_err(|_| ApiError::GatewayUpstreamError)?;
    if body_bytes.len() > max_bytes {
        let outcome = gate::force_red(&state.gate, tenant_id, &gate_id, "X402_GATEWAY_RESPONSE_TOO_LARGE", Utc::now()).await?;
        return build_settled_response(StatusCode::BAD_GATEWAY, Body::empty(), &gate_id, &outcome.decision);
    }

    let response_hash = if content_type.contains("application/json") {
        match serde_json::from_slice::<serde_json::Value>(&body_bytes) {
            Ok(value) => canonical_json_value(&value).map(|json| sha256_hex(json.as_bytes())).unwrap_or_else(|_| sha256_hex(&body_bytes)),
            Err(_) => sha256_hex(&body_bytes),
        }
    } else {
        sha256_hex(&body_bytes)
    };

    let provider_sig: Option<ProviderSignatureV1> = provider_signature.and_then(|raw| serde_json::from_str(&raw).ok());
    let provider_quote_sig: Option<ProviderSignatureV1> = provider_quote_signature.and_then(|raw| serde_json::from_str(&raw).ok());

    let verification_status = if status.is_success() { VerificationStatus::Green } else { VerificationStatus::Red };
    let mut codes = Vec::new();
    if !status.is_success() {
        codes.push(format!("X402_GATEWAY_UPSTREAM_STATUS_{}", status.as_u16()));
    }

    let verify_outcome = gate::verify(
        &state.gate,
        tenant_id,
        &gate_id,
        VerifyRequest {
            verification_status,
            policy: settld_gate::settlement::default_policy(),
            verification_method_hash: None,
            verification_codes: codes,
            evidence_refs: vec![],
            provider_signature: provider_sig,
            provider_quote_signature: provider_quote_sig,
            response_sha256_hex: Some(response_hash.clone()),
            quote_hash_hex: None,
        },
        Utc::now(),
    )
    .await?;

    let mut response = build_settled_response(status, Body::from(body_bytes), &gate_id, &verify_outcome.decision)?;
    insert_header(response.headers_mut(), "x-settld-response-sha256", &response_hash);
    Ok(response)
}

fn build_settled_response(
    status: StatusCode,
    body: Body,
    gate_id: &str,
    decision: &settld_gate::types::SettlementDecisionRecord,
) -> Result<Response, ApiError> {
    let mut response = Response::builder()
        .status(status)
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()));
    let headers = response.headers_mut();
    insert_header(headers, GATE_HEADER, gate_id);
    insert_header(headers, "x-settld-settlement-status", decision_verb(decision));
    insert_header(headers, "x-settld-verification-status", status_str(decision));
    insert_header(headers, "x-settld-released-amount-cents", &decision.released_amount_cents.to_string());
    insert_header(headers, "x-settld-refunded-amount-cents", &decision.refunded_amount_cents.to_string());
    insert_header(headers, "x-settld-holdback-amount-cents", &decision.heldback_amount_cents.to_string());
    insert_header(headers, "x-settld-holdback-status", if decision.heldback_amount_cents > 0 { "held" } else { "none" });
    let mut codes = decision.reason_codes.clone();
    codes.sort();
    insert_header(headers, "x-settld-verification-codes", &codes.join(","));
    Ok(response)
}

fn decision_verb(decision: &settld_gate::types::SettlementDecisionRecord) -> &'static str {
    if decision.released_amount_cents > 0 && decision.refunded_amount_cents == 0 {
        "released"
    } else if decision.refunded_amount_cents > 0 && decision.released_amount_cents == 0 {
        "refunded"
    } else {
        "split"
    }
}

fn status_str(decision: &settld_gate::types::SettlementDecisionRecord) -> &'static str {
    match decision.verification_status {
        VerificationStatus::Green => "green",
        VerificationStatus::Amber => "amber",
        VerificationStatus::Red => "red",
    }
}

async fn fetch_upstream(
    state: &AppState,
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<reqwest::Response, ApiError> {
    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(|_| ApiError::GatewayUpstreamError)?;
    let mut builder = state.http_client.request(reqwest_method, url).body(body.to_vec());
    for (name, value) in headers.iter() {
        if let Ok(value_str) = value.to_str() {
            builder = builder.header(name.as_str(), value_str);
        }
    }
    builder
        .timeout(Duration::from_millis(state.config.upstream_timeout_ms))
        .send()
        .await
        .map_err(|_| ApiError::GatewayUpstreamError)
}

async fn reqwest_response_to_axum(upstream: reqwest::Response) -> Result<Response, ApiError> {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let bytes = upstream.bytes().await.map_err(|_| ApiError::GatewayUpstreamError)?;
    let mut response = Response::builder()
        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY))
        .body(Body::from(bytes))
        .unwrap_or_else(|_| Response::new(Body::empty()));
    for (name, value) in headers.iter() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_str().as_bytes()), HeaderValue::from_bytes(value.as_bytes())) {
            response.headers_mut().insert(name, value);
        }
    }
    Ok(response)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn header_from_reqwest(response: &reqwest::Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
