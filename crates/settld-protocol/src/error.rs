//! Stable error codes shared by the canonical-hash, crypto, and token-codec
//! layers. Each variant's `code()` is part of the wire contract and must
//! never be renamed once published.

use crate::hash::HashError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("canonical json: {0}")]
    Hash(#[from] HashError),

    #[error("token malformed")]
    TokenMalformed,
    #[error("token expired")]
    TokenExpired,
    #[error("token signer unknown")]
    TokenSignerUnknown,
    #[error("token signature invalid")]
    TokenSignatureInvalid,
    #[error("settldpay request binding mismatch")]
    RequestBindingMismatch,

    #[error("provider signature missing")]
    ProviderSignatureMissing,
    #[error("provider signature invalid")]
    ProviderSignatureInvalid,
    #[error("provider signature key id unknown")]
    ProviderSignatureKeyIdUnknown,
    #[error("provider response hash mismatch")]
    ProviderResponseHashMismatch,

    #[error("provider quote missing")]
    ProviderQuoteMissing,
    #[error("provider quote invalid")]
    ProviderQuoteInvalid,
    #[error("provider quote key id unknown")]
    ProviderQuoteKeyIdUnknown,
    #[error("provider quote mismatch")]
    ProviderQuoteMismatch,

    #[error("hmac verification failed")]
    HmacInvalid,
}

impl ProtocolError {
    /// Stable wire code, part of the error contract in spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Hash(HashError::Cyclic) => "CANONICAL_JSON_CYCLIC",
            Self::Hash(HashError::InvalidNumber) => "CANONICAL_JSON_INVALID_NUMBER",
            Self::Hash(HashError::Serde(_)) => "CANONICAL_JSON_INVALID_NUMBER",
            Self::TokenMalformed => "TOKEN_MALFORMED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenSignerUnknown => "TOKEN_SIGNER_UNKNOWN",
            Self::TokenSignatureInvalid => "TOKEN_SIGNATURE_INVALID",
            Self::RequestBindingMismatch => "SETTLDPAY_REQUEST_BINDING_MISMATCH",
            Self::ProviderSignatureMissing => "X402_PROVIDER_SIGNATURE_MISSING",
            Self::ProviderSignatureInvalid => "X402_PROVIDER_SIGNATURE_INVALID",
            Self::ProviderSignatureKeyIdUnknown => "X402_PROVIDER_SIGNATURE_KEY_ID_UNKNOWN",
            Self::ProviderResponseHashMismatch => "X402_PROVIDER_SIGNATURE_RESPONSE_HASH_MISMATCH",
            Self::ProviderQuoteMissing => "X402_PROVIDER_QUOTE_MISSING",
            Self::ProviderQuoteInvalid => "X402_PROVIDER_QUOTE_INVALID",
            Self::ProviderQuoteKeyIdUnknown => "X402_PROVIDER_QUOTE_KEY_ID_UNKNOWN",
            Self::ProviderQuoteMismatch => "X402_PROVIDER_QUOTE_MISMATCH",
            Self::HmacInvalid => "WEBHOOK_SIGNATURE_INVALID",
        }
    }
}
