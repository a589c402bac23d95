//! Stable error codes for the store, gate state machine, escrow ledger, and
//! settlement engine (spec §7 ERROR HANDLING DESIGN).

use settld_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("store unavailable")]
    StoreUnavailable,
    #[error("store lock timeout")]
    StoreLockTimeout,

    #[error("gate is not in a valid state for this operation")]
    GateInvalidState,
    #[error("quote request binding missing")]
    QuoteRequestBindingMissing,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("gate expired")]
    GateExpired,
    #[error("authorize-payment quote binding mismatch")]
    AuthQuoteBindingMismatch,
    #[error("authorization token expired, replay rejected")]
    AuthTokenExpiredReplay,
    #[error("cascade binding invalid")]
    CascadeBindingInvalid,

    #[error("idempotency conflict")]
    IdempotencyConflict,
    #[error("dedupe mismatch")]
    DedupeMismatch,
    #[error("concurrent modification")]
    ConcurrentModification,
    #[error("gate auto-expired")]
    GateAutoExpired,
    #[error("session event append conflict")]
    SessionEventAppendConflict {
        expected_prev_chain_hash: String,
        got_prev_chain_hash: String,
        head_seq: u64,
    },

    #[error("gate not found")]
    GateNotFound,
    #[error("quote not found")]
    QuoteNotFound,
}

impl GateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Protocol(inner) => inner.code(),
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::StoreLockTimeout => "STORE_LOCK_TIMEOUT",
            Self::GateInvalidState => "GATE_INVALID_STATE",
            Self::QuoteRequestBindingMissing => "QUOTE_REQUEST_BINDING_MISSING",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::GateExpired => "GATE_EXPIRED",
            Self::AuthQuoteBindingMismatch => "AUTH_QUOTE_BINDING_MISMATCH",
            Self::AuthTokenExpiredReplay => "AUTH_TOKEN_EXPIRED_REPLAY",
            Self::CascadeBindingInvalid => "CASCADE_BINDING_INVALID",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::DedupeMismatch => "DEDUPE_MISMATCH",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::GateAutoExpired => "GATE_AUTO_EXPIRED",
            Self::SessionEventAppendConflict { .. } => "SESSION_EVENT_APPEND_CONFLICT",
            Self::GateNotFound => "GATE_NOT_FOUND",
            Self::QuoteNotFound => "QUOTE_NOT_FOUND",
        }
    }

    /// HTTP status per the suffix taxonomy in spec §7.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::StoreUnavailable | Self::StoreLockTimeout => 503,
            Self::GateInvalidState
            | Self::QuoteRequestBindingMissing
            | Self::AuthQuoteBindingMismatch
            | Self::CascadeBindingInvalid
            | Self::InsufficientFunds => 400,
            Self::GateExpired | Self::AuthTokenExpiredReplay | Self::GateAutoExpired => 410,
            Self::IdempotencyConflict
            | Self::DedupeMismatch
            | Self::ConcurrentModification
            | Self::SessionEventAppendConflict { .. } => 409,
            Self::GateNotFound | Self::QuoteNotFound => 404,
        }
    }
}
