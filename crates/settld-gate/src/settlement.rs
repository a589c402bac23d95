//! Policy evaluation, deterministic `SettlementDecisionRecord`, and receipt
//! emission (C7). `decide` is the NOO-48 replay invariant: given the same
//! normalized policy and inputs, it must produce a byte-identical
//! `decisionHash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settld_protocol::hash::canonical_hash;
use settld_protocol::token::ProviderSignatureV1;
use settld_protocol::ProtocolError;

use crate::error::GateError;
use crate::escrow::build_settlement_entries;
use crate::types::{DecisionMode, EscrowLedgerEntry, Gate, SettlementDecisionRecord, SettlementReceipt, VerificationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReleaseRule {
    #[serde(default)]
    pub auto_release: bool,
    #[serde(default)]
    pub release_rate_pct: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PolicyRules {
    #[serde(default)]
    pub green: ReleaseRule,
    #[serde(default)]
    pub amber: ReleaseRule,
    #[serde(default)]
    pub red: ReleaseRule,
}

impl Default for ReleaseRule {
    fn default() -> Self {
        Self { auto_release: false, release_rate_pct: 0 }
    }
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self { green: ReleaseRule::default(), amber: ReleaseRule::default(), red: ReleaseRule::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPolicy {
    pub mode: DecisionMode,
    #[serde(default)]
    pub rules: PolicyRules,
}

/// Release-100-on-green / refund-100-on-red default, per spec §4.9.
pub fn default_policy() -> SettlementPolicy {
    SettlementPolicy {
        mode: DecisionMode::Automatic,
        rules: PolicyRules {
            green: ReleaseRule { auto_release: true, release_rate_pct: 100 },
            amber: ReleaseRule { auto_release: true, release_rate_pct: 0 },
            red: ReleaseRule { auto_release: true, release_rate_pct: 0 },
        },
    }
}

/// Normalizes a caller-supplied policy: clamps rates into `[0,100]`,
/// defaults missing rules to 0. Unknown keys are already dropped by serde
/// at deserialization (no `#[serde(deny_unknown_fields)]`).
pub fn normalize_policy(policy: &SettlementPolicy) -> SettlementPolicy {
    let clamp = |rule: &ReleaseRule| ReleaseRule {
        auto_release: rule.auto_release,
        release_rate_pct: rule.release_rate_pct.min(100),
    };
    SettlementPolicy {
        mode: policy.mode,
        rules: PolicyRules {
            green: clamp(&policy.rules.green),
            amber: clamp(&policy.rules.amber),
            red: clamp(&policy.rules.red),
        },
    }
}

pub fn policy_hash(policy: &SettlementPolicy) -> Result<String, GateError> {
    Ok(canonical_hash(policy).map_err(ProtocolError::from)?)
}

fn rule_for(policy: &SettlementPolicy, status: VerificationStatus) -> &ReleaseRule {
    match status {
        VerificationStatus::Green => &policy.rules.green,
        VerificationStatus::Amber => &policy.rules.amber,
        VerificationStatus::Red => &policy.rules.red,
    }
}

#[derive(Debug, Clone)]
pub struct DecisionInput {
    pub gate_id: String,
    pub reserved_cents: i64,
    pub reserve_entry_id: String,
    pub holdback_bps: u32,
    pub verification_status: VerificationStatus,
    pub verification_method_hash: Option<String>,
    pub reason_codes: Vec<String>,
    pub evidence_refs: Vec<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Decision {
    pub record: SettlementDecisionRecord,
    pub ledger_entries: Vec<EscrowLedgerEntry>,
}

/// Evaluate the policy against `input` and build the immutable decision
/// record. `decisionHash` is computed last, over the record with
/// `decisionHash: null`, per spec §3.
pub fn decide(policy: &SettlementPolicy, input: DecisionInput) -> Result<Decision, GateError> {
    let normalized = normalize_policy(policy);
    let rule = rule_for(&normalized, input.verification_status);
    let policy_hash_used = policy_hash(&normalized)?;

    let settlement_entries = build_settlement_entries(
        &input.gate_id,
        input.reserved_cents,
        &input.reserve_entry_id,
        rule.release_rate_pct,
        input.holdback_bps,
        input.at,
    )?;

    let mut reason_codes = input.reason_codes;
    reason_codes.sort();
    reason_codes.dedup();

    let mut evidence_refs = input.evidence_refs;
    evidence_refs.sort();
    evidence_refs.dedup();

    let decision_id = format!(
        "decision_{}",
        &settld_protocol::hash::sha256_hex(format!("{}:{}", input.gate_id, input.at.timestamp_nanos_opt().unwrap_or_default()).as_bytes())[..24]
    );

    #[derive(Serialize)]
    struct HashInput<'a> {
        decision_id: &'a str,
        gate_id: &'a str,
        verification_status: VerificationStatus,
        decision_mode: DecisionMode,
        policy_hash_used: &'a str,
        verification_method_hash_used: &'a Option<String>,
        released_amount_cents: i64,
        refunded_amount_cents: i64,
        heldback_amount_cents: i64,
        reason_codes: &'a [String],
        evidence_refs: &'a [String],
        decision_hash: Option<()>,
    }
    let decision_hash = canonical_hash(&HashInput {
        decision_id: &decision_id,
        gate_id: &input.gate_id,
        verification_status: input.verification_status,
        decision_mode: normalized.mode,
        policy_hash_used: &policy_hash_used,
        verification_method_hash_used: &input.verification_method_hash,
        released_amount_cents: settlement_entries.net_released_cents,
        refunded_amount_cents: settlement_entries.refunded_cents,
        heldback_amount_cents: settlement_entries.heldback_cents,
        reason_codes: &reason_codes,
        evidence_refs: &evidence_refs,
        decision_hash: None,
    })
    .map_err(ProtocolError::from)?;

    let record = SettlementDecisionRecord {
        decision_id,
        gate_id: input.gate_id,
        verification_status: input.verification_status,
        decision_mode: normalized.mode,
        policy_hash_used,
        verification_method_hash_used: input.verification_method_hash,
        released_amount_cents: settlement_entries.net_released_cents,
        refunded_amount_cents: settlement_entries.refunded_cents,
        heldback_amount_cents: settlement_entries.heldback_cents,
        reason_codes,
        evidence_refs,
        decision_hash,
    };

    let ledger_entries = [settlement_entries.release_entry, settlement_entries.refund_entry, settlement_entries.holdback_entry]
        .into_iter()
        .flatten()
        .collect();

    Ok(Decision { record, ledger_entries })
}

/// Recompute `decisionHash` from a stored record to verify the NOO-48
/// replay invariant holds.
pub fn recompute_decision_hash(record: &SettlementDecisionRecord) -> Result<String, GateError> {
    #[derive(Serialize)]
    struct HashInput<'a> {
        decision_id: &'a str,
        gate_id: &'a str,
        verification_status: VerificationStatus,
        decision_mode: DecisionMode,
        policy_hash_used: &'a str,
        verification_method_hash_used: &'a Option<String>,
        released_amount_cents: i64,
        refunded_amount_cents: i64,
        heldback_amount_cents: i64,
        reason_codes: &'a [String],
        evidence_refs: &'a [String],
        decision_hash: Option<()>,
    }
    Ok(canonical_hash(&HashInput {
        decision_id: &record.decision_id,
        gate_id: &record.gate_id,
        verification_status: record.verification_status,
        decision_mode: record.decision_mode,
        policy_hash_used: &record.policy_hash_used,
        verification_method_hash_used: &record.verification_method_hash_used,
        released_amount_cents: record.released_amount_cents,
        refunded_amount_cents: record.refunded_amount_cents,
        heldback_amount_cents: record.heldback_amount_cents,
        reason_codes: &record.reason_codes,
        evidence_refs: &record.evidence_refs,
        decision_hash: None,
    })
    .map_err(ProtocolError::from)?)
}

pub fn build_receipt(
    gate: Gate,
    decision: SettlementDecisionRecord,
    provider_signature: Option<ProviderSignatureV1>,
    provider_quote_signature: Option<ProviderSignatureV1>,
    ledger_postings: Vec<EscrowLedgerEntry>,
    tenant_signature_hex: Option<String>,
) -> Result<SettlementReceipt, GateError> {
    let agent_passport = gate.agent_passport.clone();

    #[derive(Serialize)]
    struct ReceiptHashInput<'a> {
        gate: &'a Gate,
        decision: &'a SettlementDecisionRecord,
        provider_signature: &'a Option<ProviderSignatureV1>,
        provider_quote_signature: &'a Option<ProviderSignatureV1>,
        ledger_postings: &'a [EscrowLedgerEntry],
    }
    let receipt_hash = canonical_hash(&ReceiptHashInput {
        gate: &gate,
        decision: &decision,
        provider_signature: &provider_signature,
        provider_quote_signature: &provider_quote_signature,
        ledger_postings: &ledger_postings,
    })
    .map_err(ProtocolError::from)?;

    Ok(SettlementReceipt {
        receipt_hash,
        gate,
        decision,
        provider_signature,
        provider_quote_signature,
        agent_passport,
        ledger_postings,
        tenant_signature_hex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_hash_is_replay_stable() {
        let policy = default_policy();
        let input = DecisionInput {
            gate_id: "gate-1".to_string(),
            reserved_cents: 1000,
            reserve_entry_id: "entry_reserve".to_string(),
            holdback_bps: 0,
            verification_status: VerificationStatus::Green,
            verification_method_hash: None,
            reason_codes: vec!["OK".to_string()],
            evidence_refs: vec![],
            at: Utc::now(),
        };
        let first = decide(&policy, input.clone()).expect("decide");
        let second = decide(&policy, input).expect("decide again");
        assert_eq!(first.record.decision_hash, recompute_decision_hash(&first.record).expect("recompute"));
        assert_eq!(first.record.released_amount_cents, second.record.released_amount_cents);
    }

    #[test]
    fn green_autopay_releases_in_full() {
        let policy = default_policy();
        let input = DecisionInput {
            gate_id: "gate-1".to_string(),
            reserved_cents: 1000,
            reserve_entry_id: "entry_reserve".to_string(),
            holdback_bps: 0,
            verification_status: VerificationStatus::Green,
            verification_method_hash: None,
            reason_codes: vec![],
            evidence_refs: vec![],
            at: Utc::now(),
        };
        let decision = decide(&policy, input).expect("decide");
        assert_eq!(decision.record.released_amount_cents, 1000);
        assert_eq!(decision.record.refunded_amount_cents, 0);
    }

    #[test]
    fn red_refunds_in_full() {
        let policy = default_policy();
        let input = DecisionInput {
            gate_id: "gate-1".to_string(),
            reserved_cents: 1000,
            reserve_entry_id: "entry_reserve".to_string(),
            holdback_bps: 0,
            verification_status: VerificationStatus::Red,
            verification_method_hash: None,
            reason_codes: vec!["X402_GATEWAY_ERROR".to_string()],
            evidence_refs: vec![],
            at: Utc::now(),
        };
        let decision = decide(&policy, input).expect("decide");
        assert_eq!(decision.record.released_amount_cents, 0);
        assert_eq!(decision.record.refunded_amount_cents, 1000);
    }

    #[test]
    fn reason_codes_are_sorted_and_deduped() {
        let policy = default_policy();
        let input = DecisionInput {
            gate_id: "gate-1".to_string(),
            reserved_cents: 500,
            reserve_entry_id: "entry_reserve".to_string(),
            holdback_bps: 1000,
            verification_status: VerificationStatus::Green,
            verification_method_hash: None,
            reason_codes: vec!["b".to_string(), "a".to_string(), "a".to_string()],
            evidence_refs: vec![],
            at: Utc::now(),
        };
        let decision = decide(&policy, input).expect("decide");
        assert_eq!(decision.record.reason_codes, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(decision.record.heldback_amount_cents, 50);
    }
}
