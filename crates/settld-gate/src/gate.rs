//! Gate lifecycle: create → quote → authorize-payment → verify (C5).
//! Every mutating operation is idempotent by `(tenantId, scope, idempotencyKey)`
//! and serializes per-gate through the store's optimistic CAS.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use settld_protocol::hash::canonical_hash;
use settld_protocol::token::{
    request_binding_hash, sign_provider_payload, verify_provider_quote_signature,
    verify_provider_response_signature, AgentPassport, ProviderSignatureV1, RequestBindingMode,
    SettldPayPayload, DEFAULT_TOKEN_TTL_SECONDS,
};
use settld_protocol::ProtocolError;

use crate::error::GateError;
use crate::escrow::{self, build_hold};
use crate::idempotency;
use crate::settlement::{self, DecisionInput, SettlementPolicy};
use crate::store::Store;
use crate::types::{Gate, GateStatus, Quote, VerificationStatus};

const CAS_MAX_RETRIES: u32 = 3;

pub struct GateService {
    store: Arc<dyn Store>,
    tenant_signing_key: SigningKey,
    tenant_signer_key_id: String,
}

impl GateService {
    pub fn new(store: Arc<dyn Store>, tenant_signing_key: SigningKey, tenant_signer_key_id: String) -> Self {
        Self { store, tenant_signing_key, tenant_signer_key_id }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn tenant_verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.tenant_signing_key.verifying_key()
    }

    pub fn tenant_signer_key_id(&self) -> &str {
        &self.tenant_signer_key_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGateRequest {
    pub tenant_id: String,
    pub payer_agent_id: String,
    pub payee_agent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(default)]
    pub holdback_bps: u32,
    #[serde(default)]
    pub dispute_window_ms: i64,
    pub tool_id: Option<String>,
    pub provider_id: Option<String>,
    pub payment_required_header: Option<String>,
    pub provider_public_key_pem: Option<String>,
    pub agent_passport: Option<AgentPassport>,
    /// Demo-only convenience: credits the payer's escrow balance at creation
    /// time instead of requiring a pre-funded wallet.
    pub auto_fund_payer_cents: Option<i64>,
}

pub async fn create(service: &GateService, req: CreateGateRequest, gate_id: String, now: DateTime<Utc>) -> Result<Gate, GateError> {
    if req.amount_cents <= 0 {
        return Err(GateError::GateInvalidState);
    }

    let gate = Gate {
        gate_id: gate_id.clone(),
        tenant_id: req.tenant_id,
        payer_agent_id: req.payer_agent_id,
        payee_agent_id: req.payee_agent_id,
        amount_cents: req.amount_cents,
        currency: req.currency,
        holdback_bps: req.holdback_bps,
        dispute_window_ms: req.dispute_window_ms,
        tool_id: req.tool_id,
        provider_id: req.provider_id,
        status: GateStatus::Created,
        created_at: now,
        updated_at: now,
        revision: 0,
        payment_required_header_raw: req.payment_required_header,
        provider_public_key_pem: req.provider_public_key_pem,
        agent_passport: req.agent_passport,
    };

    service.store.put_gate_if_revision(gate.clone(), 0).await?;

    if let Some(auto_fund_cents) = req.auto_fund_payer_cents {
        let entry = escrow::reserve_entry(&gate_id, auto_fund_cents, now);
        let mut funded = gate.clone();
        funded.revision = 1;
        funded.updated_at = now;
        service.store.append_ledger_entry(entry, funded, 0).await?;
    }

    append_gate_event(service, &gate_id, "GATE_CREATED", serde_json::json!({"amountCents": gate.amount_cents})).await?;

    Ok(gate)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub request_binding_mode: RequestBindingMode,
    pub request_binding_sha256: Option<String>,
    pub quote_id: Option<String>,
    pub ttl_seconds: i64,
}

pub async fn quote(service: &GateService, tenant_id: &str, gate_id: &str, req: QuoteRequest, now: DateTime<Utc>) -> Result<Quote, GateError> {
    let gate = load_gate(service, tenant_id, gate_id).await?;
    if !matches!(gate.status, GateStatus::Created | GateStatus::Quoted) {
        return Err(GateError::GateInvalidState);
    }
    if req.request_binding_mode == RequestBindingMode::Strict && req.request_binding_sha256.is_none() {
        return Err(GateError::QuoteRequestBindingMissing);
    }

    let quote_id = req.quote_id.unwrap_or_else(|| format!("quote_{}", &settld_protocol::hash::sha256_hex(format!("{gate_id}:{now}").as_bytes())[..24]));

    #[derive(Serialize)]
    struct QuoteHashInput<'a> {
        quote_id: &'a str,
        gate_id: &'a str,
        request_binding_mode: RequestBindingMode,
        request_binding_sha256: &'a Option<String>,
        provider_id: &'a Option<String>,
        tool_id: &'a Option<String>,
        expires_at: DateTime<Utc>,
        quote_hash: Option<()>,
    }
    let expires_at = now + chrono::Duration::seconds(req.ttl_seconds.max(1));
    let quote_hash = canonical_hash(&QuoteHashInput {
        quote_id: &quote_id,
        gate_id,
        request_binding_mode: req.request_binding_mode,
        request_binding_sha256: &req.request_binding_sha256,
        provider_id: &gate.provider_id,
        tool_id: &gate.tool_id,
        expires_at,
        quote_hash: None,
    })
    .map_err(ProtocolError::from)?;

    let quote = Quote {
        quote_id,
        gate_id: gate_id.to_string(),
        request_binding_mode: req.request_binding_mode,
        request_binding_sha256: req.request_binding_sha256,
        provider_id: gate.provider_id.clone(),
        tool_id: gate.tool_id.clone(),
        expires_at,
        quote_hash,
    };

    service.store.put_quote(quote.clone()).await?;
    transition(service, gate, GateStatus::Quoted, now).await?;
    append_gate_event(service, gate_id, "GATE_QUOTED", serde_json::json!({"quoteId": quote.quote_id})).await?;

    Ok(quote)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub idempotency_key: String,
    pub request_binding_mode: Option<RequestBindingMode>,
    pub request_binding_sha256: Option<String>,
    pub quote_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeOutcome {
    pub token: String,
    pub authorization_ref: String,
    pub quote_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Fingerprint of the caller-controlled parts of an authorize request, used
/// to detect a conflicting retry under the same idempotency key (spec §4.5,
/// §8: same key + same request → byte-identical replay; same key +
/// different request → `IDEMPOTENCY_CONFLICT`).
#[derive(Serialize)]
struct AuthorizeFingerprint<'a> {
    gate_id: &'a str,
    request_binding_mode: Option<RequestBindingMode>,
    request_binding_sha256: &'a Option<String>,
    quote_id: &'a Option<String>,
}

pub async fn authorize_payment(
    service: &GateService,
    tenant_id: &str,
    gate_id: &str,
    req: AuthorizeRequest,
    wallet_available_cents: i64,
    now: DateTime<Utc>,
) -> Result<AuthorizeOutcome, GateError> {
    let scope = format!("{tenant_id}.gate.authorize");
    let fingerprint = AuthorizeFingerprint {
        gate_id,
        request_binding_mode: req.request_binding_mode,
        request_binding_sha256: &req.request_binding_sha256,
        quote_id: &req.quote_id,
    };
    let (outcome, request_hash) = idempotency::begin::<_, AuthorizeOutcome>(&service.store, &scope, &req.idempotency_key, &fingerprint).await?;
    if let idempotency::Outcome::Replayed(cached) = outcome {
        // A retry on an already-authorized gate must replay the same token
        // while it's still valid, or fail closed once it has expired (spec
        // §4.5), rather than re-running the create-reserve logic below and
        // tripping `GATE_INVALID_STATE` on the now-`Authorized` gate.
        if cached.expires_at < now {
            return Err(GateError::AuthTokenExpiredReplay);
        }
        return Ok(cached);
    }

    let gate = load_gate(service, tenant_id, gate_id).await?;
    if !matches!(gate.status, GateStatus::Created | GateStatus::Quoted) {
        return Err(GateError::GateInvalidState);
    }

    if let Some(quote_id) = &req.quote_id {
        let quote = service.store.get_quote(quote_id).await?.ok_or(GateError::QuoteNotFound)?;
        if quote.request_binding_mode == RequestBindingMode::Strict
            && quote.request_binding_sha256 != req.request_binding_sha256
        {
            return Err(GateError::AuthQuoteBindingMismatch);
        }
    }

    if wallet_available_cents < gate.amount_cents {
        return Err(GateError::InsufficientFunds);
    }

    let reserve_at = now;
    let reserve_entry = escrow::reserve_entry(gate_id, gate.amount_cents, reserve_at);

    let payload = SettldPayPayload::new(
        tenant_id,
        gate_id,
        &gate.payer_agent_id,
        &gate.payee_agent_id,
        gate.amount_cents,
        &gate.currency,
        now,
        DEFAULT_TOKEN_TTL_SECONDS,
        uuid::Uuid::new_v4().to_string(),
        req.request_binding_mode.unwrap_or(RequestBindingMode::None),
        req.request_binding_sha256,
        req.quote_id.clone(),
    );
    let token = settld_protocol::token::build_token(&payload, &service.tenant_signing_key).map_err(ProtocolError::from)?;

    let mut authorized = gate.clone();
    authorized.status = GateStatus::Authorized;
    authorized.revision = gate.revision + 1;
    authorized.updated_at = now;

    service.store.append_ledger_entry(reserve_entry.clone(), authorized, gate.revision).await?;
    append_gate_event(service, gate_id, "GATE_AUTHORIZED", serde_json::json!({"amountCents": gate.amount_cents})).await?;

    let outcome = AuthorizeOutcome {
        token,
        authorization_ref: reserve_entry.entry_id,
        quote_id: req.quote_id,
        expires_at: payload.expires_at,
    };
    idempotency::complete(&service.store, &scope, &req.idempotency_key, &request_hash, &outcome).await?;

    Ok(outcome)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub verification_status: VerificationStatus,
    pub policy: SettlementPolicy,
    pub verification_method_hash: Option<String>,
    pub verification_codes: Vec<String>,
    pub evidence_refs: Vec<String>,
    pub provider_signature: Option<ProviderSignatureV1>,
    pub provider_quote_signature: Option<ProviderSignatureV1>,
    pub response_sha256_hex: Option<String>,
    pub quote_hash_hex: Option<String>,
}

pub struct VerifyOutcome {
    pub gate: Gate,
    pub decision: crate::types::SettlementDecisionRecord,
}

pub async fn verify(
    service: &GateService,
    tenant_id: &str,
    gate_id: &str,
    req: VerifyRequest,
    now: DateTime<Utc>,
) -> Result<VerifyOutcome, GateError> {
    let gate = load_gate(service, tenant_id, gate_id).await?;
    if !matches!(gate.status, GateStatus::Authorized | GateStatus::Verified) {
        return Err(GateError::GateInvalidState);
    }

    if let Some(existing) = service.store.get_decision(gate_id).await? {
        // Already decided: idempotent replay of the prior verification.
        return Ok(VerifyOutcome { gate, decision: existing });
    }

    let provider_key = gate
        .provider_public_key_pem
        .as_deref()
        .and_then(|pem| settld_protocol::crypto::der_from_pem(pem).ok())
        .and_then(|der| settld_protocol::crypto::verifying_key_from_spki_der(&der).ok());

    let mut reason_codes = req.verification_codes;
    let mut verification_status = req.verification_status;
    let mut provider_signature_failed = false;

    if let Some(response_hash) = &req.response_sha256_hex {
        if let Err(error) = verify_provider_response_signature(req.provider_signature.as_ref(), provider_key.as_ref(), response_hash) {
            reason_codes.push(error.code().to_string());
            provider_signature_failed = true;
        }
    }
    if let Some(quote_hash) = &req.quote_hash_hex {
        if let Err(error) = verify_provider_quote_signature(req.provider_quote_signature.as_ref(), provider_key.as_ref(), quote_hash) {
            reason_codes.push(error.code().to_string());
            provider_signature_failed = true;
        }
    }

    // A pinned provider key is a hard requirement: a missing or invalid
    // signature fails closed to `red` regardless of the caller-reported
    // verification status (spec §4.9 open question, §9).
    if provider_signature_failed && provider_key.is_some() {
        verification_status = VerificationStatus::Red;
    }

    let ledger_entries = service.store.list_ledger_entries(gate_id).await?;
    let reserve_entry = ledger_entries
        .iter()
        .find(|entry| matches!(entry.phase, crate::types::LedgerPhase::Reserve))
        .ok_or(GateError::GateInvalidState)?;

    let decision_input = DecisionInput {
        gate_id: gate_id.to_string(),
        reserved_cents: gate.amount_cents,
        reserve_entry_id: reserve_entry.entry_id.clone(),
        holdback_bps: gate.holdback_bps,
        verification_status,
        verification_method_hash: req.verification_method_hash,
        reason_codes,
        evidence_refs: req.evidence_refs,
        at: now,
    };

    let decision = settlement::decide(&req.policy, decision_input)?;

    for entry in &decision.ledger_entries {
        service.store.append_ledger_entry(entry.clone(), gate.clone(), gate.revision).await?;
    }

    if decision.record.heldback_amount_cents > 0 {
        let hold = build_hold(gate_id, decision.record.heldback_amount_cents, gate.dispute_window_ms, &decision.record.policy_hash_used, now)?;
        service.store.put_hold(hold).await?;
    }

    service.store.put_decision(decision.record.clone()).await?;

    let mut verified = gate.clone();
    verified.status = GateStatus::Verified;
    verified.revision = gate.revision + 1;
    verified.updated_at = now;
    service.store.put_gate_if_revision(verified.clone(), gate.revision).await?;

    append_gate_event(
        service,
        gate_id,
        "GATE_VERIFIED",
        serde_json::json!({"verificationStatus": decision.record.verification_status}),
    )
    .await?;
    append_gate_event(
        service,
        gate_id,
        "SETTLEMENT_DECIDED",
        serde_json::json!({"decisionId": decision.record.decision_id, "decisionHash": decision.record.decision_hash}),
    )
    .await?;

    Ok(VerifyOutcome { gate: verified, decision: decision.record })
}

/// Best-effort forced-red settlement invoked by the gateway proxy after any
/// post-authorization failure, so escrow never goes stranded (spec §7).
pub async fn force_red(service: &GateService, tenant_id: &str, gate_id: &str, reason_code: &str, now: DateTime<Utc>) -> Result<VerifyOutcome, GateError> {
    verify(
        service,
        tenant_id,
        gate_id,
        VerifyRequest {
            verification_status: VerificationStatus::Red,
            policy: settlement::default_policy(),
            verification_method_hash: None,
            verification_codes: vec![reason_code.to_string()],
            evidence_refs: vec![],
            provider_signature: None,
            provider_quote_signature: None,
            response_sha256_hex: None,
            quote_hash_hex: None,
        },
        now,
    )
    .await
}

async fn load_gate(service: &GateService, tenant_id: &str, gate_id: &str) -> Result<Gate, GateError> {
    service.store.get_gate(tenant_id, gate_id).await?.ok_or(GateError::GateNotFound)
}

async fn transition(service: &GateService, gate: Gate, status: GateStatus, now: DateTime<Utc>) -> Result<(), GateError> {
    let mut retries = 0;
    let mut current = gate;
    loop {
        let mut next = current.clone();
        next.status = status;
        next.revision = current.revision + 1;
        next.updated_at = now;
        match service.store.put_gate_if_revision(next, current.revision).await {
            Ok(()) => return Ok(()),
            Err(GateError::ConcurrentModification) if retries < CAS_MAX_RETRIES => {
                retries += 1;
                current = load_gate(service, &current.tenant_id, &current.gate_id).await?;
            }
            Err(other) => return Err(other),
        }
    }
}

async fn append_gate_event(service: &GateService, gate_id: &str, kind: &str, detail: serde_json::Value) -> Result<(), GateError> {
    let head = service.store.stream_head(gate_id).await?;
    let expected_prev = head.map(|head| head.head_chain_hash).unwrap_or_else(|| crate::types::GENESIS_CHAIN_HASH.to_string());
    let payload = serde_json::json!({"kind": kind, "detail": detail});

    match service.store.append_event(gate_id, payload.clone(), &expected_prev, Some(service.tenant_signer_key_id.clone()), None).await {
        Ok(_) => Ok(()),
        Err(GateError::SessionEventAppendConflict { got_prev_chain_hash, .. }) => {
            // One retry against the freshly observed head is enough: a
            // second writer cannot also win the CAS in the same tick.
            service
                .store
                .append_event(gate_id, payload, &got_prev_chain_hash, Some(service.tenant_signer_key_id.clone()), None)
                .await
                .map(|_| ())
        }
        Err(other) => Err(other),
    }
}

/// Sign a provider-facing artifact hash with the tenant's release key,
/// exposed so the gateway proxy can attach provider-quote acknowledgements.
pub fn sign_with_tenant_key(service: &GateService, sha256_hex: &str) -> Result<ProviderSignatureV1, ProtocolError> {
    sign_provider_payload(&service.tenant_signer_key_id, &service.tenant_signing_key, sha256_hex)
}

pub fn compute_request_binding_hash(method: &str, host: &str, path_with_query: &str, body_sha256: &str) -> Result<String, ProtocolError> {
    request_binding_hash(method, host, path_with_query, body_sha256)
}
