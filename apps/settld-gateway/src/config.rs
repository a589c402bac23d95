//! Single `Config` struct, built via an explicit `from_env()` constructor
//! with typed fallbacks, in the style this codebase always configures a
//! binary (spec §10.3).

use std::{env, net::SocketAddr};

use thiserror::Error;

#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub bind_addr: SocketAddr,
    pub build_sha: String,
    /// Absence selects the in-memory store.
    pub db_url: Option<String>,
    /// Base64-encoded 32-byte Ed25519 seed this tenant signs tokens and
    /// provider acknowledgements with.
    pub tenant_signing_key_b64: String,
    pub tenant_signer_key_id: Option<String>,
    pub jwks_cache_max_age_seconds: u64,
    pub upstream_timeout_ms: u64,
    pub jwks_fetch_timeout_ms: u64,
    pub webhook_ack_timeout_ms: u64,
    pub default_gate_ttl_ms: i64,
    pub auth_token_ttl_ms: i64,
    pub maintenance_tick_interval_ms: u64,
    pub outbox_retry_base_ms: i64,
    pub outbox_retry_max_ms: i64,
    pub outbox_retry_max_attempts: u32,
    pub max_response_buffer_bytes: usize,
    pub webhook_hmac_key: String,
    pub webhook_destination_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid RUNTIME_BIND_ADDR: {0}")]
    InvalidBindAddr(#[from] std::net::AddrParseError),
    #[error("SETTLD_TENANT_SIGNING_KEY must be set to a base64-encoded 32-byte Ed25519 seed")]
    MissingSigningKey,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "settld-gateway".to_string(),
            bind_addr: "127.0.0.1:8080".parse().unwrap_or_else(|_| {
                std::net::SocketAddr::from(([127, 0, 0, 1], 8080))
            }),
            build_sha: "dev".to_string(),
            db_url: None,
            tenant_signing_key_b64: String::new(),
            tenant_signer_key_id: None,
            jwks_cache_max_age_seconds: 300,
            upstream_timeout_ms: 15_000,
            jwks_fetch_timeout_ms: 2_000,
            webhook_ack_timeout_ms: 5_000,
            default_gate_ttl_ms: 300_000,
            auth_token_ttl_ms: 300_000,
            maintenance_tick_interval_ms: 30_000,
            outbox_retry_base_ms: 500,
            outbox_retry_max_ms: 60_000,
            outbox_retry_max_attempts: 50,
            max_response_buffer_bytes: 2 * 1024 * 1024,
            webhook_hmac_key: String::new(),
            webhook_destination_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = env::var("SETTLD_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;
        let service_name = env::var("SETTLD_SERVICE_NAME").unwrap_or(defaults.service_name);
        let build_sha = env::var("SETTLD_BUILD_SHA").unwrap_or(defaults.build_sha);
        let db_url = env::var("DB_URL").or_else(|_| env::var("DATABASE_URL")).ok();

        let tenant_signing_key_b64 = env::var("SETTLD_TENANT_SIGNING_KEY")
            .map_err(|_| ConfigError::MissingSigningKey)?;
        let tenant_signer_key_id = env::var("SETTLD_TENANT_SIGNER_KEY_ID").ok();

        let jwks_cache_max_age_seconds = env_u64("SETTLD_JWKS_CACHE_MAX_AGE_SECONDS", defaults.jwks_cache_max_age_seconds);
        let upstream_timeout_ms = env_u64("SETTLD_UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout_ms);
        let jwks_fetch_timeout_ms = env_u64("SETTLD_JWKS_FETCH_TIMEOUT_MS", defaults.jwks_fetch_timeout_ms);
        let webhook_ack_timeout_ms = env_u64("SETTLD_WEBHOOK_ACK_TIMEOUT_MS", defaults.webhook_ack_timeout_ms);
        let default_gate_ttl_ms = env_i64("SETTLD_DEFAULT_GATE_TTL_MS", defaults.default_gate_ttl_ms);
        let auth_token_ttl_ms = env_i64("SETTLD_AUTH_TOKEN_TTL_MS", defaults.auth_token_ttl_ms);
        let maintenance_tick_interval_ms = env_u64("SETTLD_MAINTENANCE_TICK_INTERVAL_MS", defaults.maintenance_tick_interval_ms);
        let outbox_retry_base_ms = env_i64("SETTLD_OUTBOX_RETRY_BASE_MS", defaults.outbox_retry_base_ms);
        let outbox_retry_max_ms = env_i64("SETTLD_OUTBOX_RETRY_MAX_MS", defaults.outbox_retry_max_ms);
        let outbox_retry_max_attempts = env_u64("SETTLD_OUTBOX_RETRY_MAX_ATTEMPTS", u64::from(defaults.outbox_retry_max_attempts)) as u32;
        let max_response_buffer_bytes = env_u64("SETTLD_MAX_RESPONSE_BUFFER_BYTES", defaults.max_response_buffer_bytes as u64) as usize;
        let webhook_hmac_key = env::var("SETTLD_WEBHOOK_HMAC_KEY").unwrap_or_default();
        let webhook_destination_url = env::var("SETTLD_WEBHOOK_DESTINATION_URL").ok();

        Ok(Self {
            service_name,
            bind_addr,
            build_sha,
            db_url,
            tenant_signing_key_b64,
            tenant_signer_key_id,
            jwks_cache_max_age_seconds,
            upstream_timeout_ms,
            jwks_fetch_timeout_ms,
            webhook_ack_timeout_ms,
            default_gate_ttl_ms,
            auth_token_ttl_ms,
            maintenance_tick_interval_ms,
            outbox_retry_base_ms,
            outbox_retry_max_ms,
            outbox_retry_max_attempts,
            max_response_buffer_bytes,
            webhook_hmac_key,
            webhook_destination_url,
        })
    }
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(fallback)
}

fn env_i64(key: &str, fallback: i64) -> i64 {
    env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_localhost() {
        let config = Config::default();
        assert_eq!(config.service_name, "settld-gateway");
        assert_eq!(config.max_response_buffer_bytes, 2 * 1024 * 1024);
    }
}
