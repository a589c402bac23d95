//! In-memory `Store` implementation. Suitable for tests and single-process
//! demo deployments; mirrors the Postgres implementation's semantics
//! exactly (spec §4.4 requires both to satisfy identical contracts).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use settld_protocol::hash::{canonical_hash, sha256_hex};
use tokio::sync::Mutex;

use crate::error::GateError;
use crate::store::{IdempotencyOutcome, Store, StreamHead};
use crate::types::{
    EscrowLedgerEntry, Event, Gate, Hold, HoldStatus, OutboxRow, Quote, ReceiverDedupeRow,
    SettlementDecisionRecord, GENESIS_CHAIN_HASH,
};

#[derive(Default)]
struct MemoryInner {
    gates: HashMap<String, Gate>,
    ledger: HashMap<String, Vec<EscrowLedgerEntry>>,
    quotes: HashMap<String, Quote>,
    holds: HashMap<String, Hold>,
    decisions: HashMap<String, SettlementDecisionRecord>,
    streams: HashMap<String, Vec<Event>>,
    advisory_locks: HashSet<String>,
    idempotency: HashMap<(String, String), (String, Vec<u8>)>,
    outbox: HashMap<String, OutboxRow>,
    receiver_dedupe: HashMap<String, ReceiverDedupeRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_gate(&self, tenant_id: &str, gate_id: &str) -> Result<Option<Gate>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .gates
            .get(gate_id)
            .filter(|gate| gate.tenant_id == tenant_id)
            .cloned())
    }

    async fn put_gate_if_revision(&self, gate: Gate, expected_revision: u64) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.gates.get(&gate.gate_id) {
            if existing.revision != expected_revision {
                return Err(GateError::ConcurrentModification);
            }
        } else if expected_revision != 0 {
            return Err(GateError::ConcurrentModification);
        }
        inner.gates.insert(gate.gate_id.clone(), gate);
        Ok(())
    }

    async fn append_ledger_entry(
        &self,
        entry: EscrowLedgerEntry,
        gate: Gate,
        expected_revision: u64,
    ) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.gates.get(&gate.gate_id) {
            if existing.revision != expected_revision {
                return Err(GateError::ConcurrentModification);
            }
        } else if expected_revision != 0 {
            return Err(GateError::ConcurrentModification);
        }
        inner
            .ledger
            .entry(entry.gate_id.clone())
            .or_default()
            .push(entry);
        inner.gates.insert(gate.gate_id.clone(), gate);
        Ok(())
    }

    async fn list_ledger_entries(&self, gate_id: &str) -> Result<Vec<EscrowLedgerEntry>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.ledger.get(gate_id).cloned().unwrap_or_default())
    }

    async fn put_quote(&self, quote: Quote) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner.quotes.insert(quote.quote_id.clone(), quote);
        Ok(())
    }

    async fn get_quote(&self, quote_id: &str) -> Result<Option<Quote>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.quotes.get(quote_id).cloned())
    }

    async fn put_hold(&self, hold: Hold) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner.holds.insert(hold.hold_hash.clone(), hold);
        Ok(())
    }

    async fn get_hold(&self, hold_hash: &str) -> Result<Option<Hold>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.holds.get(hold_hash).cloned())
    }

    async fn list_due_holds(&self, now: DateTime<Utc>) -> Result<Vec<Hold>, GateError> {
        let inner = self.inner.lock().await;
        let mut due: Vec<Hold> = inner
            .holds
            .values()
            .filter(|hold| hold.status == HoldStatus::Held && hold.challenge_window_ends_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.hold_hash.cmp(&b.hold_hash));
        Ok(due)
    }

    async fn update_hold_status(&self, hold_hash: &str, status: HoldStatus) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        let hold = inner.holds.get_mut(hold_hash).ok_or(GateError::GateNotFound)?;
        hold.status = status;
        Ok(())
    }

    async fn put_decision(&self, decision: SettlementDecisionRecord) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner.decisions.insert(decision.gate_id.clone(), decision);
        Ok(())
    }

    async fn get_decision(&self, gate_id: &str) -> Result<Option<SettlementDecisionRecord>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.decisions.get(gate_id).cloned())
    }

    async fn append_event(
        &self,
        stream_id: &str,
        payload: Value,
        expected_prev_chain_hash: &str,
        signer_key_id: Option<String>,
        signature_hex: Option<String>,
    ) -> Result<Event, GateError> {
        let mut inner = self.inner.lock().await;
        let stream = inner.streams.entry(stream_id.to_string()).or_default();

        let (head_seq, head_chain_hash) = stream
            .last()
            .map(|event| (event.seq, event.chain_hash.clone()))
            .unwrap_or((0, GENESIS_CHAIN_HASH.to_string()));

        if head_chain_hash != expected_prev_chain_hash {
            return Err(GateError::SessionEventAppendConflict {
                expected_prev_chain_hash: expected_prev_chain_hash.to_string(),
                got_prev_chain_hash: head_chain_hash,
                head_seq,
            });
        }

        #[derive(serde::Serialize)]
        struct ChainInput<'a> {
            prev_chain_hash: &'a str,
            payload: &'a Value,
        }
        let chain_hash = canonical_hash(&ChainInput {
            prev_chain_hash: &head_chain_hash,
            payload: &payload,
        })
        .map_err(settld_protocol::ProtocolError::from)?;

        let event = Event {
            event_id: format!("evt_{}", &sha256_hex(format!("{stream_id}:{}", head_seq + 1).as_bytes())[..24]),
            stream_id: stream_id.to_string(),
            seq: head_seq + 1,
            at: Utc::now(),
            payload,
            prev_chain_hash: head_chain_hash,
            chain_hash,
            signer_key_id,
            signature_hex,
        };
        stream.push(event.clone());
        Ok(event)
    }

    async fn stream_head(&self, stream_id: &str) -> Result<Option<StreamHead>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.streams.get(stream_id).and_then(|stream| stream.last()).map(|event| StreamHead {
            head_seq: event.seq,
            head_chain_hash: event.chain_hash.clone(),
        }))
    }

    async fn list_events(&self, stream_id: &str) -> Result<Vec<Event>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.streams.get(stream_id).cloned().unwrap_or_default())
    }

    async fn try_acquire_advisory_lock(&self, key: &str) -> Result<bool, GateError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.advisory_locks.insert(key.to_string()))
    }

    async fn release_advisory_lock(&self, key: &str) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner.advisory_locks.remove(key);
        Ok(())
    }

    async fn idempotency_lookup(&self, scope: &str, key: &str, request_hash: &str) -> Result<IdempotencyOutcome, GateError> {
        let inner = self.inner.lock().await;
        match inner.idempotency.get(&(scope.to_string(), key.to_string())) {
            Some((stored_hash, response)) if stored_hash == request_hash => {
                Ok(IdempotencyOutcome::Replayed(response.clone()))
            }
            Some(_) => Err(GateError::IdempotencyConflict),
            None => Ok(IdempotencyOutcome::Fresh),
        }
    }

    async fn idempotency_complete(&self, scope: &str, key: &str, request_hash: &str, response_bytes: Vec<u8>) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner
            .idempotency
            .entry((scope.to_string(), key.to_string()))
            .or_insert((request_hash.to_string(), response_bytes));
        Ok(())
    }

    async fn enqueue_outbox(&self, row: OutboxRow) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        inner.outbox.insert(row.delivery_id.clone(), row);
        Ok(())
    }

    async fn due_outbox_rows(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxRow>, GateError> {
        let inner = self.inner.lock().await;
        let mut due: Vec<OutboxRow> = inner
            .outbox
            .values()
            .filter(|row| row.acked_at.is_none() && row.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.delivery_id.cmp(&b.delivery_id));
        due.truncate(limit);
        Ok(due)
    }

    async fn ack_outbox(&self, delivery_id: &str, at: DateTime<Utc>) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        let row = inner.outbox.get_mut(delivery_id).ok_or(GateError::GateNotFound)?;
        row.acked_at = Some(at);
        Ok(())
    }

    async fn bump_outbox_attempt(&self, delivery_id: &str, next_attempt_at: DateTime<Utc>, last_error: String) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        let row = inner.outbox.get_mut(delivery_id).ok_or(GateError::GateNotFound)?;
        row.attempts += 1;
        row.next_attempt_at = next_attempt_at;
        row.last_error = Some(last_error);
        Ok(())
    }

    async fn receiver_dedupe_lookup(&self, dedupe_key: &str) -> Result<Option<ReceiverDedupeRow>, GateError> {
        let inner = self.inner.lock().await;
        Ok(inner.receiver_dedupe.get(dedupe_key).cloned())
    }

    async fn receiver_dedupe_insert(&self, row: ReceiverDedupeRow) -> Result<(), GateError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.receiver_dedupe.get(&row.dedupe_key) {
            if existing.artifact_hash != row.artifact_hash {
                return Err(GateError::DedupeMismatch);
            }
            return Ok(());
        }
        inner.receiver_dedupe.insert(row.dedupe_key.clone(), row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GateStatus;

    fn sample_gate(revision: u64) -> Gate {
        Gate {
            gate_id: "gate-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            payer_agent_id: "payer-1".to_string(),
            payee_agent_id: "payee-1".to_string(),
            amount_cents: 1000,
            currency: "USD".to_string(),
            holdback_bps: 0,
            dispute_window_ms: 0,
            tool_id: None,
            provider_id: None,
            status: GateStatus::Created,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            revision,
            payment_required_header_raw: None,
            provider_public_key_pem: None,
            agent_passport: None,
        }
    }

    #[tokio::test]
    async fn put_gate_if_revision_rejects_stale_write() {
        let store = MemoryStore::new();
        store.put_gate_if_revision(sample_gate(0), 0).await.expect("initial insert");
        let stale = store.put_gate_if_revision(sample_gate(1), 0).await;
        assert!(matches!(stale, Err(GateError::ConcurrentModification)));
    }

    #[tokio::test]
    async fn append_event_detects_chain_conflict() {
        let store = MemoryStore::new();
        let first = store
            .append_event("stream-1", serde_json::json!({"a": 1}), GENESIS_CHAIN_HASH, None, None)
            .await
            .expect("first append");
        assert_eq!(first.seq, 1);

        let conflict = store
            .append_event("stream-1", serde_json::json!({"a": 2}), GENESIS_CHAIN_HASH, None, None)
            .await;
        assert!(matches!(conflict, Err(GateError::SessionEventAppendConflict { .. })));

        let second = store
            .append_event("stream-1", serde_json::json!({"a": 2}), &first.chain_hash, None, None)
            .await
            .expect("second append with correct head");
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn idempotency_replays_identical_request() {
        let store = MemoryStore::new();
        let outcome = store.idempotency_lookup("gate.create", "key-1", "hash-a").await.expect("lookup");
        assert!(matches!(outcome, IdempotencyOutcome::Fresh));
        store
            .idempotency_complete("gate.create", "key-1", "hash-a", b"response".to_vec())
            .await
            .expect("complete");

        let replay = store.idempotency_lookup("gate.create", "key-1", "hash-a").await.expect("replay lookup");
        assert!(matches!(replay, IdempotencyOutcome::Replayed(bytes) if bytes == b"response"));

        let conflict = store.idempotency_lookup("gate.create", "key-1", "hash-b").await;
        assert!(matches!(conflict, Err(GateError::IdempotencyConflict)));
    }

    #[tokio::test]
    async fn advisory_lock_is_single_writer() {
        let store = MemoryStore::new();
        assert!(store.try_acquire_advisory_lock("maint:tenant-1").await.expect("acquire"));
        assert!(!store.try_acquire_advisory_lock("maint:tenant-1").await.expect("acquire again"));
        store.release_advisory_lock("maint:tenant-1").await.expect("release");
        assert!(store.try_acquire_advisory_lock("maint:tenant-1").await.expect("reacquire"));
    }
}
