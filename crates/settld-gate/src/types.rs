//! Entity types shared across the gate state machine, escrow ledger,
//! settlement engine, and store (spec §3 DATA MODEL).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settld_protocol::token::{AgentPassport, ProviderSignatureV1, RequestBindingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Created,
    Quoted,
    Authorized,
    Verified,
    Resolved,
    Expired,
    Disputed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub gate_id: String,
    pub tenant_id: String,
    pub payer_agent_id: String,
    pub payee_agent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub holdback_bps: u32,
    pub dispute_window_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub status: GateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_required_header_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_public_key_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_passport: Option<AgentPassport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    pub gate_id: String,
    pub request_binding_mode: RequestBindingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_binding_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub quote_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerPhase {
    Reserve,
    Release,
    Refund,
    HoldbackHold,
    HoldbackRelease,
    HoldbackRefund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowLedgerEntry {
    pub entry_id: String,
    pub gate_id: String,
    pub phase: LedgerPhase,
    pub amount_cents: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_entry_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Held,
    Released,
    Refunded,
    Disputed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub hold_hash: String,
    pub gate_id: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub dispute_window_ms: i64,
    pub policy_hash: String,
    pub status: HoldStatus,
    pub challenge_window_ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Green,
    Amber,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementDecisionRecord {
    pub decision_id: String,
    pub gate_id: String,
    pub verification_status: VerificationStatus,
    pub decision_mode: DecisionMode,
    pub policy_hash_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method_hash_used: Option<String>,
    pub released_amount_cents: i64,
    pub refunded_amount_cents: i64,
    pub heldback_amount_cents: i64,
    pub reason_codes: Vec<String>,
    pub evidence_refs: Vec<String>,
    pub decision_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub receipt_hash: String,
    pub gate: Gate,
    pub decision: SettlementDecisionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_signature: Option<ProviderSignatureV1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_quote_signature: Option<ProviderSignatureV1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_passport: Option<AgentPassport>,
    pub ledger_postings: Vec<EscrowLedgerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_signature_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub stream_id: String,
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub prev_chain_hash: String,
    pub chain_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_hex: Option<String>,
}

/// Genesis `prevChainHash` for an empty stream, per spec §8 (chain-hash
/// invariant starts from a fixed zero value).
pub const GENESIS_CHAIN_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRow {
    pub delivery_id: String,
    pub dedupe_key: String,
    pub artifact_hash: String,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverDedupeRow {
    pub dedupe_key: String,
    pub artifact_hash: String,
    pub delivery_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acked_at: Option<DateTime<Utc>>,
}
