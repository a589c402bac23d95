//! Transactional CRUD + append-only event/outbox abstraction with
//! optimistic concurrency (C4). Both the in-memory and Postgres-backed
//! implementations satisfy this trait identically.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::GateError;
use crate::types::{EscrowLedgerEntry, Event, Gate, Hold, HoldStatus, OutboxRow, Quote, ReceiverDedupeRow, SettlementDecisionRecord};

/// Head metadata returned on an event-stream append conflict, per spec §4.4.
#[derive(Debug, Clone)]
pub struct StreamHead {
    pub head_seq: u64,
    pub head_chain_hash: String,
}

#[derive(Debug, Clone)]
pub enum IdempotencyOutcome {
    /// No prior row: caller should perform the operation and call
    /// `complete_idempotency_row` with the result.
    Fresh,
    /// A prior row with an identical `requestHash` exists; replay its
    /// cached response byte-identically.
    Replayed(Vec<u8>),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_gate(&self, tenant_id: &str, gate_id: &str) -> Result<Option<Gate>, GateError>;

    /// Optimistic CAS: succeeds only if the stored gate's `revision` equals
    /// `expected_revision`; the caller is responsible for having already
    /// incremented `gate.revision` to its new value.
    async fn put_gate_if_revision(&self, gate: Gate, expected_revision: u64) -> Result<(), GateError>;

    /// Appends a ledger entry atomically with the owning gate's CAS update.
    async fn append_ledger_entry(
        &self,
        entry: EscrowLedgerEntry,
        gate: Gate,
        expected_revision: u64,
    ) -> Result<(), GateError>;

    async fn list_ledger_entries(&self, gate_id: &str) -> Result<Vec<EscrowLedgerEntry>, GateError>;

    async fn put_quote(&self, quote: Quote) -> Result<(), GateError>;
    async fn get_quote(&self, quote_id: &str) -> Result<Option<Quote>, GateError>;

    async fn put_hold(&self, hold: Hold) -> Result<(), GateError>;
    async fn get_hold(&self, hold_hash: &str) -> Result<Option<Hold>, GateError>;
    async fn list_due_holds(&self, now: DateTime<Utc>) -> Result<Vec<Hold>, GateError>;
    async fn update_hold_status(&self, hold_hash: &str, status: HoldStatus) -> Result<(), GateError>;

    async fn put_decision(&self, decision: SettlementDecisionRecord) -> Result<(), GateError>;
    async fn get_decision(&self, gate_id: &str) -> Result<Option<SettlementDecisionRecord>, GateError>;

    /// Appends an event iff `expected_prev_chain_hash` matches the stream
    /// head; otherwise returns `SessionEventAppendConflict` carrying head
    /// metadata.
    async fn append_event(
        &self,
        stream_id: &str,
        payload: Value,
        expected_prev_chain_hash: &str,
        signer_key_id: Option<String>,
        signature_hex: Option<String>,
    ) -> Result<Event, GateError>;

    async fn stream_head(&self, stream_id: &str) -> Result<Option<StreamHead>, GateError>;
    async fn list_events(&self, stream_id: &str) -> Result<Vec<Event>, GateError>;

    /// Cooperative single-writer primitive for the maintenance scheduler.
    /// Returns `true` if the lock was acquired.
    async fn try_acquire_advisory_lock(&self, key: &str) -> Result<bool, GateError>;
    async fn release_advisory_lock(&self, key: &str) -> Result<(), GateError>;

    async fn idempotency_lookup(&self, scope: &str, key: &str, request_hash: &str) -> Result<IdempotencyOutcome, GateError>;
    async fn idempotency_complete(&self, scope: &str, key: &str, request_hash: &str, response_bytes: Vec<u8>) -> Result<(), GateError>;

    async fn enqueue_outbox(&self, row: OutboxRow) -> Result<(), GateError>;
    async fn due_outbox_rows(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxRow>, GateError>;
    async fn ack_outbox(&self, delivery_id: &str, at: DateTime<Utc>) -> Result<(), GateError>;
    async fn bump_outbox_attempt(&self, delivery_id: &str, next_attempt_at: DateTime<Utc>, last_error: String) -> Result<(), GateError>;

    async fn receiver_dedupe_lookup(&self, dedupe_key: &str) -> Result<Option<ReceiverDedupeRow>, GateError>;
    async fn receiver_dedupe_insert(&self, row: ReceiverDedupeRow) -> Result<(), GateError>;
}
