//! Reserve / release / refund / holdback accounting with double-entry
//! invariants (C6). Pure computation lives here; `gate.rs` is responsible
//! for persisting the entries this module produces via the `Store`.

use chrono::{DateTime, Utc};
use settld_protocol::hash::canonical_hash;
use settld_protocol::ProtocolError;

use crate::error::GateError;
use crate::types::{EscrowLedgerEntry, Hold, HoldStatus, LedgerPhase};

pub fn reserve_entry(gate_id: &str, amount_cents: i64, at: DateTime<Utc>) -> EscrowLedgerEntry {
    EscrowLedgerEntry {
        entry_id: entry_id(gate_id, LedgerPhase::Reserve, at),
        gate_id: gate_id.to_string(),
        phase: LedgerPhase::Reserve,
        amount_cents,
        balance_before: 0,
        balance_after: amount_cents,
        at,
        parent_entry_id: None,
    }
}

/// Floor-release / remainder-to-refund split, per spec §4.5 and the open
/// question resolved in SPEC_FULL.md §9 (floor release, remainder refund,
/// floor holdback, assert the sum invariant).
pub fn release_rate_split(reserved_cents: i64, release_rate_pct: u32) -> (i64, i64) {
    let release_rate_pct = release_rate_pct.min(100) as i64;
    let release_cents = (reserved_cents * release_rate_pct) / 100;
    let refund_cents = reserved_cents - release_cents;
    (release_cents, refund_cents)
}

pub fn holdback_split(release_cents: i64, holdback_bps: u32) -> (i64, i64) {
    let holdback_bps = holdback_bps.min(10_000) as i64;
    let holdback_cents = (release_cents * holdback_bps) / 10_000;
    (release_cents - holdback_cents, holdback_cents)
}

/// Builds the release/refund/holdback ledger entries for a verification
/// decision, asserting `released + refunded + heldback == reserved`.
pub struct SettlementEntries {
    pub release_entry: Option<EscrowLedgerEntry>,
    pub refund_entry: Option<EscrowLedgerEntry>,
    pub holdback_entry: Option<EscrowLedgerEntry>,
    pub net_released_cents: i64,
    pub refunded_cents: i64,
    pub heldback_cents: i64,
}

#[allow(clippy::too_many_arguments)]
pub fn build_settlement_entries(
    gate_id: &str,
    reserved_cents: i64,
    reserve_entry_id: &str,
    release_rate_pct: u32,
    holdback_bps: u32,
    at: DateTime<Utc>,
) -> Result<SettlementEntries, GateError> {
    let (gross_release, refund_cents) = release_rate_split(reserved_cents, release_rate_pct);
    let (net_release, heldback_cents) = holdback_split(gross_release, holdback_bps);

    if net_release + refund_cents + heldback_cents != reserved_cents {
        return Err(GateError::GateInvalidState);
    }

    let release_entry = if net_release > 0 {
        Some(EscrowLedgerEntry {
            entry_id: entry_id(gate_id, LedgerPhase::Release, at),
            gate_id: gate_id.to_string(),
            phase: LedgerPhase::Release,
            amount_cents: -net_release,
            balance_before: reserved_cents,
            balance_after: reserved_cents - net_release,
            at,
            parent_entry_id: Some(reserve_entry_id.to_string()),
        })
    } else {
        None
    };

    let refund_entry = if refund_cents > 0 {
        Some(EscrowLedgerEntry {
            entry_id: entry_id(gate_id, LedgerPhase::Refund, at),
            gate_id: gate_id.to_string(),
            phase: LedgerPhase::Refund,
            amount_cents: -refund_cents,
            balance_before: reserved_cents - net_release,
            balance_after: reserved_cents - net_release - refund_cents,
            at,
            parent_entry_id: Some(reserve_entry_id.to_string()),
        })
    } else {
        None
    };

    // Earmarking, not departure: the held amount stays in escrow until the
    // dispute window closes, so this entry nets to zero. The actual debit
    // happens once in `hold_release_entry`/`hold_refund_entry` (escrow.rs),
    // or the sum invariant in spec §8 (`sum(ledger[G]) == 0`) double-counts
    // the holdback.
    let holdback_entry = if heldback_cents > 0 {
        Some(EscrowLedgerEntry {
            entry_id: entry_id(gate_id, LedgerPhase::HoldbackHold, at),
            gate_id: gate_id.to_string(),
            phase: LedgerPhase::HoldbackHold,
            amount_cents: 0,
            balance_before: reserved_cents - net_release - refund_cents,
            balance_after: reserved_cents - net_release - refund_cents,
            at,
            parent_entry_id: Some(reserve_entry_id.to_string()),
        })
    } else {
        None
    };

    Ok(SettlementEntries {
        release_entry,
        refund_entry,
        holdback_entry,
        net_released_cents: net_release,
        refunded_cents: refund_cents,
        heldback_cents,
    })
}

pub fn build_hold(gate_id: &str, amount_cents: i64, dispute_window_ms: i64, policy_hash: &str, now: DateTime<Utc>) -> Result<Hold, GateError> {
    #[derive(serde::Serialize)]
    struct HoldInput<'a> {
        gate_id: &'a str,
        amount_cents: i64,
        created_at: DateTime<Utc>,
        dispute_window_ms: i64,
        policy_hash: &'a str,
    }
    let hold_hash = canonical_hash(&HoldInput { gate_id, amount_cents, created_at: now, dispute_window_ms, policy_hash })
        .map_err(ProtocolError::from)?;
    Ok(Hold {
        hold_hash,
        gate_id: gate_id.to_string(),
        amount_cents,
        created_at: now,
        dispute_window_ms,
        policy_hash: policy_hash.to_string(),
        status: HoldStatus::Held,
        challenge_window_ends_at: now + chrono::Duration::milliseconds(dispute_window_ms),
    })
}

/// Ledger entries produced when a hold auto-releases or is refunded by a
/// dispute verdict. One deterministic adjustment per `holdHash`, so the
/// maintenance scheduler can retry ticks without double-posting.
pub fn hold_release_entry(hold: &Hold, balance_before: i64, at: DateTime<Utc>) -> EscrowLedgerEntry {
    EscrowLedgerEntry {
        entry_id: format!("entry_holdrel_{}", &hold.hold_hash[..24.min(hold.hold_hash.len())]),
        gate_id: hold.gate_id.clone(),
        phase: LedgerPhase::HoldbackRelease,
        amount_cents: -hold.amount_cents,
        balance_before,
        balance_after: balance_before - hold.amount_cents,
        at,
        parent_entry_id: None,
    }
}

pub fn hold_refund_entry(hold: &Hold, balance_before: i64, at: DateTime<Utc>) -> EscrowLedgerEntry {
    EscrowLedgerEntry {
        entry_id: format!("entry_holdref_{}", &hold.hold_hash[..24.min(hold.hold_hash.len())]),
        gate_id: hold.gate_id.clone(),
        phase: LedgerPhase::HoldbackRefund,
        amount_cents: -hold.amount_cents,
        balance_before,
        balance_after: balance_before - hold.amount_cents,
        at,
        parent_entry_id: None,
    }
}

fn entry_id(gate_id: &str, phase: LedgerPhase, at: DateTime<Utc>) -> String {
    let digest = settld_protocol::hash::sha256_hex(format!("{gate_id}:{phase:?}:{}", at.timestamp_nanos_opt().unwrap_or_default()).as_bytes());
    format!("entry_{}", &digest[..24])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_rate_split_floors_release() {
        let (release, refund) = release_rate_split(1000, 45);
        assert_eq!(release, 450);
        assert_eq!(refund, 550);
        assert_eq!(release + refund, 1000);
    }

    #[test]
    fn holdback_split_floors_holdback() {
        let (release, holdback) = holdback_split(500, 1000);
        assert_eq!(holdback, 50);
        assert_eq!(release, 450);
    }

    #[test]
    fn settlement_entries_sum_to_reserved() {
        let entries = build_settlement_entries("gate-1", 500, "entry_reserve", 100, 1000, Utc::now()).expect("entries");
        assert_eq!(entries.net_released_cents, 450);
        assert_eq!(entries.refunded_cents, 0);
        assert_eq!(entries.heldback_cents, 50);
        assert_eq!(entries.net_released_cents + entries.refunded_cents + entries.heldback_cents, 500);
    }

    #[test]
    fn red_decision_refunds_in_full() {
        let entries = build_settlement_entries("gate-1", 1000, "entry_reserve", 0, 0, Utc::now()).expect("entries");
        assert_eq!(entries.net_released_cents, 0);
        assert_eq!(entries.refunded_cents, 1000);
        assert_eq!(entries.heldback_cents, 0);
    }
}
