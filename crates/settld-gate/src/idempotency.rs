//! Generic JSON-request idempotency wrapper over `Store::idempotency_*`,
//! used by the HTTP layer so every mutating route gets replay semantics for
//! free (spec §4.5, §8: same key + same request → byte-identical replay;
//! same key + different request → `IDEMPOTENCY_CONFLICT`).

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use settld_protocol::hash::canonical_hash;
use settld_protocol::ProtocolError;

use crate::error::GateError;
use crate::store::{IdempotencyOutcome, Store};

pub enum Outcome<T> {
    Fresh,
    Replayed(T),
}

/// Looks up `(scope, key)` against the canonical hash of `request`. Callers
/// perform the operation only on `Outcome::Fresh`, then call
/// `complete` with the response to cache it.
pub async fn begin<Req: Serialize, Resp: DeserializeOwned>(
    store: &Arc<dyn Store>,
    scope: &str,
    key: &str,
    request: &Req,
) -> Result<(Outcome<Resp>, String), GateError> {
    let request_hash = canonical_hash(request).map_err(ProtocolError::from)?;
    match store.idempotency_lookup(scope, key, &request_hash).await? {
        IdempotencyOutcome::Fresh => Ok((Outcome::Fresh, request_hash)),
        IdempotencyOutcome::Replayed(bytes) => {
            let response = serde_json::from_slice(&bytes).map_err(|_| GateError::IdempotencyConflict)?;
            Ok((Outcome::Replayed(response), request_hash))
        }
    }
}

pub async fn complete<Resp: Serialize>(
    store: &Arc<dyn Store>,
    scope: &str,
    key: &str,
    request_hash: &str,
    response: &Resp,
) -> Result<(), GateError> {
    let bytes = serde_json::to_vec(response).map_err(|_| GateError::IdempotencyConflict)?;
    store.idempotency_complete(scope, key, request_hash, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Req {
        amount: i64,
    }
    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Resp {
        gate_id: String,
    }

    #[tokio::test]
    async fn replays_identical_request_byte_identically() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let req = Req { amount: 1000 };

        let (outcome, hash) = begin::<_, Resp>(&store, "gate.create", "key-1", &req).await.expect("begin");
        assert!(matches!(outcome, Outcome::Fresh));
        let response = Resp { gate_id: "gate-1".to_string() };
        complete(&store, "gate.create", "key-1", &hash, &response).await.expect("complete");

        let (replayed, _) = begin::<_, Resp>(&store, "gate.create", "key-1", &req).await.expect("replay begin");
        match replayed {
            Outcome::Replayed(resp) => assert_eq!(resp, response),
            Outcome::Fresh => panic!("expected replay"),
        }
    }

    #[tokio::test]
    async fn conflicting_request_body_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let req = Req { amount: 1000 };
        let (_, hash) = begin::<_, Resp>(&store, "gate.create", "key-1", &req).await.expect("begin");
        complete(&store, "gate.create", "key-1", &hash, &Resp { gate_id: "gate-1".to_string() }).await.expect("complete");

        let different = Req { amount: 2000 };
        let result = begin::<_, Resp>(&store, "gate.create", "key-1", &different).await;
        assert!(matches!(result, Err(GateError::IdempotencyConflict)));
    }
}
