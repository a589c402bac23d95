//! Ed25519 signing/verification, SPKI-derived key ids, and HMAC-SHA-256 for
//! webhook auth (C2).

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ProtocolError;

type HmacSha256 = Hmac<Sha256>;

/// `keyId = base64url(sha256(spkiDer))[:32]`.
pub fn key_id_from_spki_der(der: &[u8]) -> String {
    let digest = crate::hash::sha256_hex(der);
    let bytes = hex::decode(&digest).unwrap_or_default();
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    encoded.chars().take(32).collect()
}

/// Derive the key id directly from a raw 32-byte Ed25519 verifying key,
/// wrapping it in a minimal SPKI envelope first so the id matches what a
/// PEM-derived key would produce.
pub fn key_id_from_verifying_key(key: &VerifyingKey) -> String {
    key_id_from_spki_der(spki_der_for_ed25519(key.as_bytes()).as_slice())
}

/// Minimal DER SPKI wrapper for a raw Ed25519 public key (RFC 8410 OID).
fn spki_der_for_ed25519(raw_public_key: &[u8; 32]) -> Vec<u8> {
    const ALGORITHM_ID: [u8; 7] = [0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x00];
    let mut body = Vec::with_capacity(ALGORITHM_ID.len() + 2 + raw_public_key.len());
    body.extend_from_slice(&ALGORITHM_ID[..5]);
    body.push(0x03);
    body.push((raw_public_key.len() + 1) as u8);
    body.push(0x00);
    body.extend_from_slice(raw_public_key);

    let mut der = Vec::with_capacity(body.len() + 2);
    der.push(0x30);
    der.push(body.len() as u8);
    der.extend_from_slice(&body);
    der
}

pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

pub fn verify(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), ProtocolError> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| ProtocolError::TokenSignatureInvalid)
}

/// Decode a standard-base64 SPKI-wrapped public key PEM body into a
/// `VerifyingKey`. Accepts the raw 32-byte key appended at the tail of the
/// SPKI DER structure, matching OpenSSL's `ed25519` SPKI output.
pub fn verifying_key_from_spki_der(der: &[u8]) -> Result<VerifyingKey, ProtocolError> {
    if der.len() < 32 {
        return Err(ProtocolError::TokenMalformed);
    }
    let raw = &der[der.len() - 32..];
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(raw);
    VerifyingKey::from_bytes(&bytes).map_err(|_| ProtocolError::TokenMalformed)
}

/// Strip PEM armor and base64-decode the body, returning the inner DER.
pub fn der_from_pem(pem: &str) -> Result<Vec<u8>, ProtocolError> {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    STANDARD
        .decode(body.trim())
        .map_err(|_| ProtocolError::TokenMalformed)
}

/// An immutable snapshot of active signer keys plus a pinned fallback.
/// Rotation replaces the whole set atomically (construct a new `Keyset`).
#[derive(Debug, Clone, Default)]
pub struct Keyset {
    active: HashMap<String, VerifyingKey>,
    pinned: Option<(String, VerifyingKey)>,
}

impl Keyset {
    pub fn new(active: HashMap<String, VerifyingKey>, pinned: Option<(String, VerifyingKey)>) -> Self {
        Self { active, pinned }
    }

    pub fn resolve(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.active
            .get(key_id)
            .or_else(|| self.pinned.as_ref().filter(|(id, _)| id == key_id).map(|(_, k)| k))
    }
}

pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time verification of an HMAC-SHA256 tag.
pub fn verify_hmac_sha256(key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), ProtocolError> {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(message);
    mac.verify_slice(tag).map_err(|_| ProtocolError::HmacInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_and_verify_round_trips() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let message = b"hello settld";
        let signature = sign(&signing_key, message);
        assert!(verify(&signing_key.verifying_key(), message, &signature).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let signature = sign(&signing_key, b"hello settld");
        assert!(verify(&signing_key.verifying_key(), b"goodbye settld", &signature).is_err());
    }

    #[test]
    fn key_id_is_stable_for_same_key() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let a = key_id_from_verifying_key(&signing_key.verifying_key());
        let b = key_id_from_verifying_key(&signing_key.verifying_key());
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn hmac_round_trips() {
        let key = b"webhook-secret";
        let message = b"{\"a\":1}";
        let tag = hmac_sha256(key, message);
        assert!(verify_hmac_sha256(key, message, &tag).is_ok());
        assert!(verify_hmac_sha256(key, b"{\"a\":2}", &tag).is_err());
    }
}
