//! Key-material helpers for the Credential Store (§4.1 / §3 APIKey invariant).
//!
//! The lookup digest is a deterministic keyed HMAC so it can be used as an
//! equality-comparable database column; the ciphertext is non-deterministic
//! AES-GCM so the same plaintext key encrypts differently every time it is
//! stored. Both use the same process-wide `API_KEY_HASH_KEY` secret.

use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::Rng;
use sha2::Sha256;

use crate::errors::GatewayError;

type HmacSha256 = Hmac<Sha256>;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const UPPER_ALPHA: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

/// `api_` + 32 characters drawn uniformly from `[A-Za-z0-9]`, matching
/// `generateAPIKey` in the original source's `account-service/helper.go`.
pub fn generate_api_key() -> String {
    format!("api_{}", random_string(ALPHANUMERIC, 32))
}

/// `CASM-` + 12 characters from `[A-Z0-9]`.
pub fn generate_merchant_id() -> String {
    format!("CASM-{}", random_string(UPPER_ALNUM, 12))
}

/// `PI-` + 12 characters from `[A-Z0-9]`.
pub fn generate_payment_intent_id() -> String {
    format!("PI-{}", random_string(UPPER_ALNUM, 12))
}

/// 7 uppercase letters, uniformly drawn.
pub fn generate_third_party_reference() -> String {
    random_string(UPPER_ALPHA, 7)
}

/// 8 uniform digits, used as the account-number suffix.
pub fn generate_account_digits() -> String {
    random_string(DIGITS, 8)
}

/// First 10 characters of `key` followed by `...`, matching `maskAPIKey` in
/// the original source. Never log the full plaintext key.
pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() <= 10 {
        key.to_string()
    } else {
        let prefix: String = key.chars().take(10).collect();
        format!("{prefix}...")
    }
}

/// Deterministic HMAC-SHA-256 lookup digest, base64-encoded.
pub fn hmac_digest(secret: &[u8], plaintext: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(plaintext.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn aes_key(secret: &[u8]) -> Result<Key<Aes256Gcm>, GatewayError> {
    if secret.len() < 32 {
        return Err(GatewayError::Internal(
            "API_KEY_HASH_KEY shorter than 32 bytes".into(),
        ));
    }
    Ok(*Key::<Aes256Gcm>::from_slice(&secret[..32]))
}

/// AES-GCM encrypt `plaintext`, prepending the fresh 96-bit nonce to the
/// ciphertext before base64-encoding, matching `encryptAPIKey`.
pub fn encrypt(secret: &[u8], plaintext: &str) -> Result<String, GatewayError> {
    let cipher = Aes256Gcm::new(&aes_key(secret)?);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| GatewayError::Internal("AES-GCM encryption failed".into()))?;

    let mut combined = Vec::with_capacity(nonce.len() + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(combined))
}

/// Inverse of [`encrypt`]: splits the leading 12-byte nonce off the decoded
/// blob and opens the remainder, matching `decryptAPIKey`.
pub fn decrypt(secret: &[u8], encoded: &str) -> Result<String, GatewayError> {
    let cipher = Aes256Gcm::new(&aes_key(secret)?);
    let combined = BASE64
        .decode(encoded)
        .map_err(|_| GatewayError::Internal("malformed ciphertext encoding".into()))?;

    if combined.len() < 12 {
        return Err(GatewayError::Internal("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = combined.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| GatewayError::Internal("AES-GCM decryption failed".into()))?;

    String::from_utf8(plaintext).map_err(|_| GatewayError::Internal("decrypted key not utf8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"cashflow_test_2024_secure_key_123456789";

    #[test]
    fn hmac_digest_is_deterministic() {
        let a = hmac_digest(SECRET, "api_abc123");
        let b = hmac_digest(SECRET, "api_abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn hmac_digest_differs_by_input() {
        assert_ne!(hmac_digest(SECRET, "a"), hmac_digest(SECRET, "b"));
    }

    #[test]
    fn aes_gcm_round_trips() {
        let key = generate_api_key();
        let ciphertext = encrypt(SECRET, &key).unwrap();
        let plaintext = decrypt(SECRET, &ciphertext).unwrap();
        assert_eq!(plaintext, key);
    }

    #[test]
    fn aes_gcm_is_nondeterministic() {
        let key = generate_api_key();
        let a = encrypt(SECRET, &key).unwrap();
        let b = encrypt(SECRET, &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt(SECRET, &a).unwrap(), decrypt(SECRET, &b).unwrap());
    }

    #[test]
    fn merchant_and_intent_ids_have_expected_shape() {
        let merchant_id = generate_merchant_id();
        assert!(merchant_id.starts_with("CASM-"));
        assert_eq!(merchant_id.len(), 17);

        let intent_id = generate_payment_intent_id();
        assert!(intent_id.starts_with("PI-"));
        assert_eq!(intent_id.len(), 15);
    }

    #[test]
    fn mask_api_key_keeps_only_a_prefix() {
        let key = generate_api_key();
        let masked = mask_api_key(&key);
        assert!(masked.ends_with("..."));
        assert_eq!(masked.len(), 13);
    }
}
