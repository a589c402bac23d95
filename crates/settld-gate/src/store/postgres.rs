//! Postgres-backed `Store` implementation. Connection handling mirrors the
//! teacher's `RuntimeDb` (single shared client behind a mutex, connection
//! future spawned on the runtime); each entity is persisted as a jsonb
//! blob alongside the scalar columns needed for CAS and lookups.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use settld_protocol::hash::{canonical_hash, sha256_hex};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

use crate::error::GateError;
use crate::store::{IdempotencyOutcome, Store, StreamHead};
use crate::types::{
    EscrowLedgerEntry, Event, Gate, Hold, HoldStatus, OutboxRow, Quote, ReceiverDedupeRow,
    SettlementDecisionRecord, GENESIS_CHAIN_HASH,
};

pub struct PostgresStore {
    client: Arc<Mutex<Client>>,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, GateError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|_| GateError::StoreUnavailable)?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::error!(%error, "settld-gate postgres connection error");
            }
        });
        Ok(Self { client: Arc::new(Mutex::new(client)) })
    }

    pub async fn migrate(&self) -> Result<(), GateError> {
        let client = self.client.lock().await;
        client
            .batch_execute(include_str!("schema.sql"))
            .await
            .map_err(|_| GateError::StoreUnavailable)
    }
}

fn to_store_err<E>(_: E) -> GateError {
    GateError::StoreUnavailable
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_gate(&self, tenant_id: &str, gate_id: &str) -> Result<Option<Gate>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT body FROM gates WHERE gate_id = $1 AND tenant_id = $2",
                &[&gate_id, &tenant_id],
            )
            .await
            .map_err(to_store_err)?;
        row.map(|row| {
            let body: Value = row.try_get("body").map_err(to_store_err)?;
            serde_json::from_value(body).map_err(to_store_err)
        })
        .transpose()
    }

    async fn put_gate_if_revision(&self, gate: Gate, expected_revision: u64) -> Result<(), GateError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(to_store_err)?;
        let current: Option<i64> = tx
            .query_opt("SELECT revision FROM gates WHERE gate_id = $1", &[&gate.gate_id])
            .await
            .map_err(to_store_err)?
            .map(|row| row.get("revision"));

        match current {
            Some(rev) if rev as u64 != expected_revision => return Err(GateError::ConcurrentModification),
            None if expected_revision != 0 => return Err(GateError::ConcurrentModification),
            _ => {}
        }

        let body = serde_json::to_value(&gate).map_err(to_store_err)?;
        tx.execute(
            "INSERT INTO gates (gate_id, tenant_id, revision, body) VALUES ($1, $2, $3, $4)
             ON CONFLICT (gate_id) DO UPDATE SET revision = EXCLUDED.revision, body = EXCLUDED.body",
            &[&gate.gate_id, &gate.tenant_id, &(gate.revision as i64), &body],
        )
        .await
        .map_err(to_store_err)?;
        tx.commit().await.map_err(to_store_err)
    }

    async fn append_ledger_entry(
        &self,
        entry: EscrowLedgerEntry,
        gate: Gate,
        expected_revision: u64,
    ) -> Result<(), GateError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(to_store_err)?;
        let current: Option<i64> = tx
            .query_opt("SELECT revision FROM gates WHERE gate_id = $1", &[&gate.gate_id])
            .await
            .map_err(to_store_err)?
            .map(|row| row.get("revision"));

        match current {
            Some(rev) if rev as u64 != expected_revision => return Err(GateError::ConcurrentModification),
            None if expected_revision != 0 => return Err(GateError::ConcurrentModification),
            _ => {}
        }

        let entry_body = serde_json::to_value(&entry).map_err(to_store_err)?;
        tx.execute(
            "INSERT INTO ledger_entries (entry_id, gate_id, body) VALUES ($1, $2, $3)",
            &[&entry.entry_id, &entry.gate_id, &entry_body],
        )
        .await
        .map_err(to_store_err)?;

        let gate_body = serde_json::to_value(&gate).map_err(to_store_err)?;
        tx.execute(
            "INSERT INTO gates (gate_id, tenant_id, revision, body) VALUES ($1, $2, $3, $4)
             ON CONFLICT (gate_id) DO UPDATE SET revision = EXCLUDED.revision, body = EXCLUDED.body",
            &[&gate.gate_id, &gate.tenant_id, &(gate.revision as i64), &gate_body],
        )
        .await
        .map_err(to_store_err)?;

        tx.commit().await.map_err(to_store_err)
    }

    async fn list_ledger_entries(&self, gate_id: &str) -> Result<Vec<EscrowLedgerEntry>, GateError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT body FROM ledger_entries WHERE gate_id = $1 ORDER BY inserted_at ASC",
                &[&gate_id],
            )
            .await
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|row| {
                let body: Value = row.get("body");
                serde_json::from_value(body).map_err(to_store_err)
            })
            .collect()
    }

    async fn put_quote(&self, quote: Quote) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let body = serde_json::to_value(&quote).map_err(to_store_err)?;
        client
            .execute(
                "INSERT INTO quotes (quote_id, gate_id, body) VALUES ($1, $2, $3)
                 ON CONFLICT (quote_id) DO UPDATE SET body = EXCLUDED.body",
                &[&quote.quote_id, &quote.gate_id, &body],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn get_quote(&self, quote_id: &str) -> Result<Option<Quote>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT body FROM quotes WHERE quote_id = $1", &[&quote_id])
            .await
            .map_err(to_store_err)?;
        row.map(|row| {
            let body: Value = row.get("body");
            serde_json::from_value(body).map_err(to_store_err)
        })
        .transpose()
    }

    async fn put_hold(&self, hold: Hold) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let body = serde_json::to_value(&hold).map_err(to_store_err)?;
        client
            .execute(
                "INSERT INTO holds (hold_hash, gate_id, status, challenge_window_ends_at, body)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (hold_hash) DO UPDATE SET status = EXCLUDED.status, body = EXCLUDED.body",
                &[
                    &hold.hold_hash,
                    &hold.gate_id,
                    &format!("{:?}", hold.status),
                    &hold.challenge_window_ends_at,
                    &body,
                ],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn get_hold(&self, hold_hash: &str) -> Result<Option<Hold>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT body FROM holds WHERE hold_hash = $1", &[&hold_hash])
            .await
            .map_err(to_store_err)?;
        row.map(|row| {
            let body: Value = row.get("body");
            serde_json::from_value(body).map_err(to_store_err)
        })
        .transpose()
    }

    async fn list_due_holds(&self, now: DateTime<Utc>) -> Result<Vec<Hold>, GateError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT body FROM holds WHERE status = 'Held' AND challenge_window_ends_at <= $1 ORDER BY hold_hash ASC",
                &[&now],
            )
            .await
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|row| {
                let body: Value = row.get("body");
                serde_json::from_value(body).map_err(to_store_err)
            })
            .collect()
    }

    async fn update_hold_status(&self, hold_hash: &str, status: HoldStatus) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let updated = client
            .execute(
                "UPDATE holds SET status = $2 WHERE hold_hash = $1",
                &[&hold_hash, &format!("{status:?}")],
            )
            .await
            .map_err(to_store_err)?;
        if updated == 0 {
            return Err(GateError::GateNotFound);
        }
        Ok(())
    }

    async fn put_decision(&self, decision: SettlementDecisionRecord) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let body = serde_json::to_value(&decision).map_err(to_store_err)?;
        client
            .execute(
                "INSERT INTO decisions (gate_id, decision_id, body) VALUES ($1, $2, $3)
                 ON CONFLICT (gate_id) DO UPDATE SET decision_id = EXCLUDED.decision_id, body = EXCLUDED.body",
                &[&decision.gate_id, &decision.decision_id, &body],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn get_decision(&self, gate_id: &str) -> Result<Option<SettlementDecisionRecord>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT body FROM decisions WHERE gate_id = $1", &[&gate_id])
            .await
            .map_err(to_store_err)?;
        row.map(|row| {
            let body: Value = row.get("body");
            serde_json::from_value(body).map_err(to_store_err)
        })
        .transpose()
    }

    async fn append_event(
        &self,
        stream_id: &str,
        payload: Value,
        expected_prev_chain_hash: &str,
        signer_key_id: Option<String>,
        signature_hex: Option<String>,
    ) -> Result<Event, GateError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(to_store_err)?;

        let head = tx
            .query_opt(
                "SELECT seq, chain_hash FROM events WHERE stream_id = $1 ORDER BY seq DESC LIMIT 1",
                &[&stream_id],
            )
            .await
            .map_err(to_store_err)?;

        let (head_seq, head_chain_hash): (i64, String) = match head {
            Some(row) => (row.get("seq"), row.get("chain_hash")),
            None => (0, GENESIS_CHAIN_HASH.to_string()),
        };

        if head_chain_hash != expected_prev_chain_hash {
            return Err(GateError::SessionEventAppendConflict {
                expected_prev_chain_hash: expected_prev_chain_hash.to_string(),
                got_prev_chain_hash: head_chain_hash,
                head_seq: head_seq as u64,
            });
        }

        #[derive(serde::Serialize)]
        struct ChainInput<'a> {
            prev_chain_hash: &'a str,
            payload: &'a Value,
        }
        let chain_hash = canonical_hash(&ChainInput { prev_chain_hash: &head_chain_hash, payload: &payload })
            .map_err(settld_protocol::ProtocolError::from)?;
        let seq = head_seq + 1;
        let event = Event {
            event_id: format!("evt_{}", &sha256_hex(format!("{stream_id}:{seq}").as_bytes())[..24]),
            stream_id: stream_id.to_string(),
            seq: seq as u64,
            at: Utc::now(),
            payload,
            prev_chain_hash: head_chain_hash,
            chain_hash,
            signer_key_id,
            signature_hex,
        };

        let body = serde_json::to_value(&event).map_err(to_store_err)?;
        tx.execute(
            "INSERT INTO events (stream_id, seq, chain_hash, body) VALUES ($1, $2, $3, $4)",
            &[&event.stream_id, &(event.seq as i64), &event.chain_hash, &body],
        )
        .await
        .map_err(to_store_err)?;
        tx.commit().await.map_err(to_store_err)?;
        Ok(event)
    }

    async fn stream_head(&self, stream_id: &str) -> Result<Option<StreamHead>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT seq, chain_hash FROM events WHERE stream_id = $1 ORDER BY seq DESC LIMIT 1",
                &[&stream_id],
            )
            .await
            .map_err(to_store_err)?;
        Ok(row.map(|row| {
            let seq: i64 = row.get("seq");
            StreamHead { head_seq: seq as u64, head_chain_hash: row.get("chain_hash") }
        }))
    }

    async fn list_events(&self, stream_id: &str) -> Result<Vec<Event>, GateError> {
        let client = self.client.lock().await;
        let rows = client
            .query("SELECT body FROM events WHERE stream_id = $1 ORDER BY seq ASC", &[&stream_id])
            .await
            .map_err(to_store_err)?;
        rows.into_iter()
            .map(|row| {
                let body: Value = row.get("body");
                serde_json::from_value(body).map_err(to_store_err)
            })
            .collect()
    }

    async fn try_acquire_advisory_lock(&self, key: &str) -> Result<bool, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT pg_try_advisory_lock(hashtext($1)) AS acquired", &[&key])
            .await
            .map_err(to_store_err)?;
        Ok(row.get("acquired"))
    }

    async fn release_advisory_lock(&self, key: &str) -> Result<(), GateError> {
        let client = self.client.lock().await;
        client
            .query_one("SELECT pg_advisory_unlock(hashtext($1))", &[&key])
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn idempotency_lookup(&self, scope: &str, key: &str, request_hash: &str) -> Result<IdempotencyOutcome, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT request_hash, response_bytes FROM idempotency_rows WHERE scope = $1 AND key = $2",
                &[&scope, &key],
            )
            .await
            .map_err(to_store_err)?;
        match row {
            None => Ok(IdempotencyOutcome::Fresh),
            Some(row) => {
                let stored_hash: String = row.get("request_hash");
                if stored_hash == request_hash {
                    Ok(IdempotencyOutcome::Replayed(row.get("response_bytes")))
                } else {
                    Err(GateError::IdempotencyConflict)
                }
            }
        }
    }

    async fn idempotency_complete(&self, scope: &str, key: &str, request_hash: &str, response_bytes: Vec<u8>) -> Result<(), GateError> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO idempotency_rows (scope, key, request_hash, response_bytes) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (scope, key) DO NOTHING",
                &[&scope, &key, &request_hash, &response_bytes],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn enqueue_outbox(&self, row: OutboxRow) -> Result<(), GateError> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO outbox (delivery_id, dedupe_key, artifact_hash, attempts, next_attempt_at, acked_at, last_error)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &row.delivery_id,
                    &row.dedupe_key,
                    &row.artifact_hash,
                    &(row.attempts as i32),
                    &row.next_attempt_at,
                    &row.acked_at,
                    &row.last_error,
                ],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }

    async fn due_outbox_rows(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxRow>, GateError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT delivery_id, dedupe_key, artifact_hash, attempts, next_attempt_at, acked_at, last_error
                 FROM outbox WHERE acked_at IS NULL AND next_attempt_at <= $1 ORDER BY delivery_id ASC LIMIT $2",
                &[&now, &(limit as i64)],
            )
            .await
            .map_err(to_store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| OutboxRow {
                delivery_id: row.get("delivery_id"),
                dedupe_key: row.get("dedupe_key"),
                artifact_hash: row.get("artifact_hash"),
                attempts: row.get::<_, i32>("attempts") as u32,
                next_attempt_at: row.get("next_attempt_at"),
                acked_at: row.get("acked_at"),
                last_error: row.get("last_error"),
            })
            .collect())
    }

    async fn ack_outbox(&self, delivery_id: &str, at: DateTime<Utc>) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let updated = client
            .execute("UPDATE outbox SET acked_at = $2 WHERE delivery_id = $1", &[&delivery_id, &at])
            .await
            .map_err(to_store_err)?;
        if updated == 0 {
            return Err(GateError::GateNotFound);
        }
        Ok(())
    }

    async fn bump_outbox_attempt(&self, delivery_id: &str, next_attempt_at: DateTime<Utc>, last_error: String) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let updated = client
            .execute(
                "UPDATE outbox SET attempts = attempts + 1, next_attempt_at = $2, last_error = $3 WHERE delivery_id = $1",
                &[&delivery_id, &next_attempt_at, &last_error],
            )
            .await
            .map_err(to_store_err)?;
        if updated == 0 {
            return Err(GateError::GateNotFound);
        }
        Ok(())
    }

    async fn receiver_dedupe_lookup(&self, dedupe_key: &str) -> Result<Option<ReceiverDedupeRow>, GateError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT dedupe_key, artifact_hash, delivery_id, stored_at, acked_at FROM receiver_dedupe WHERE dedupe_key = $1",
                &[&dedupe_key],
            )
            .await
            .map_err(to_store_err)?;
        Ok(row.map(|row| ReceiverDedupeRow {
            dedupe_key: row.get("dedupe_key"),
            artifact_hash: row.get("artifact_hash"),
            delivery_id: row.get("delivery_id"),
            stored_at: row.get("stored_at"),
            acked_at: row.get("acked_at"),
        }))
    }

    async fn receiver_dedupe_insert(&self, row: ReceiverDedupeRow) -> Result<(), GateError> {
        let client = self.client.lock().await;
        let existing = client
            .query_opt("SELECT artifact_hash FROM receiver_dedupe WHERE dedupe_key = $1", &[&row.dedupe_key])
            .await
            .map_err(to_store_err)?;
        if let Some(existing) = existing {
            let existing_hash: String = existing.get("artifact_hash");
            if existing_hash != row.artifact_hash {
                return Err(GateError::DedupeMismatch);
            }
            return Ok(());
        }
        client
            .execute(
                "INSERT INTO receiver_dedupe (dedupe_key, artifact_hash, delivery_id, stored_at, acked_at)
                 VALUES ($1, $2, $3, $4, $5)",
                &[&row.dedupe_key, &row.artifact_hash, &row.delivery_id, &row.stored_at, &row.acked_at],
            )
            .await
            .map_err(to_store_err)?;
        Ok(())
    }
}
