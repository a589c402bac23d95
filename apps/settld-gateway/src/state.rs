//! Shared application state, built once in `main` and threaded through the
//! router by `Arc`, the way `build_runtime_state(config)` does in this
//! codebase's runtime service.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::SigningKey;
use settld_gate::gate::GateService;
use settld_gate::maintenance::MaintenanceScheduler;
use settld_gate::store::memory::MemoryStore;
use settld_gate::store::postgres::PostgresStore;
use settld_gate::store::Store;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub gate: Arc<GateService>,
    pub maintenance: Arc<MaintenanceScheduler>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn build(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = match &config.db_url {
            Some(url) => {
                let store = PostgresStore::connect(url).await.context("connect to postgres")?;
                store.migrate().await.context("run store migrations")?;
                Arc::new(store)
            }
            None => Arc::new(MemoryStore::new()),
        };

        let seed_bytes = STANDARD
            .decode(config.tenant_signing_key_b64.trim())
            .context("SETTLD_TENANT_SIGNING_KEY is not valid base64")?;
        let seed: [u8; 32] = seed_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("SETTLD_TENANT_SIGNING_KEY must decode to exactly 32 bytes"))?;
        let signing_key = SigningKey::from_bytes(&seed);
        let key_id = config
            .tenant_signer_key_id
            .clone()
            .unwrap_or_else(|| settld_protocol::crypto::key_id_from_verifying_key(&signing_key.verifying_key()));

        let gate = Arc::new(GateService::new(store.clone(), signing_key, key_id));
        let maintenance = Arc::new(MaintenanceScheduler::new(store.clone()));

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.upstream_timeout_ms))
            .build()
            .context("build upstream http client")?;

        Ok(Self {
            config: Arc::new(config),
            store,
            gate,
            maintenance,
            http_client,
        })
    }
}
