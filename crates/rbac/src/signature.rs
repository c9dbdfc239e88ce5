//! Tamper detection for stored records.
//!
//! Records expose their canonical content through [`Signable`]; a single
//! HMAC-SHA-256 implementation ([`Keyring`]) signs and verifies every record
//! kind. The record kind is mixed into the MAC so a signature lifted from one
//! table never verifies a row of another.
//!
//! A mismatching signature is an expected outcome (`Ok(false)`). An `Err` means
//! the check itself could not run.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length accepted for a signing key.
pub const MIN_KEY_LEN: usize = 32;

/// Failure of the verification computation itself (never a plain mismatch).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no signing keys configured")]
    NoKeys,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}

/// A record carrying a signature over its own content.
pub trait Signable {
    /// Record kind, mixed into the MAC.
    const KIND: &'static str;

    /// Canonical bytes of every signed field, signature excluded.
    fn canonical_content(&self) -> Result<Vec<u8>, SignatureError>;

    /// The signature as stored alongside the record.
    fn signature(&self) -> &[u8];
}

/// Checks a record against a stored signature.
pub trait SignatureVerifier: Send + Sync {
    fn verify<R: Signable>(&self, record: &R, stored_signature: &[u8]) -> Result<bool, SignatureError>;
}

impl<V> SignatureVerifier for Arc<V>
where
    V: SignatureVerifier,
{
    fn verify<R: Signable>(&self, record: &R, stored_signature: &[u8]) -> Result<bool, SignatureError> {
        (**self).verify(record, stored_signature)
    }
}

/// Named HMAC secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    id: String,
    secret: Vec<u8>,
}

impl SigningKey {
    pub fn new(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, SignatureError> {
        let id = id.into();
        let secret = secret.into();
        if secret.len() < MIN_KEY_LEN {
            return Err(SignatureError::InvalidKey(format!(
                "key '{}' must be at least {} bytes, got {}",
                id,
                MIN_KEY_LEN,
                secret.len()
            )));
        }
        Ok(Self { id, secret })
    }

    /// Decode a hex-encoded secret.
    pub fn from_hex(id: impl Into<String>, secret_hex: &str) -> Result<Self, SignatureError> {
        let id = id.into();
        let secret = hex::decode(secret_hex.trim())
            .map_err(|e| SignatureError::InvalidKey(format!("key '{id}' is not valid hex: {e}")))?;
        Self::new(id, secret)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn mac(&self) -> Result<HmacSha256, SignatureError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SignatureError::InvalidKey(format!("key '{}': {e}", self.id)))
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Ordered set of signing keys: the first is current, the rest are previous
/// keys still accepted for verification during rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyring {
    keys: Vec<SigningKey>,
}

impl Keyring {
    pub fn new(current: SigningKey, previous: Vec<SigningKey>) -> Self {
        let mut keys = Vec::with_capacity(previous.len() + 1);
        keys.push(current);
        keys.extend(previous);
        Self { keys }
    }

    /// A keyring with no keys; every operation on it fails with [`SignatureError::NoKeys`].
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SigningKey> {
        self.keys.first()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sign a record with the current key.
    pub fn sign<R: Signable>(&self, record: &R) -> Result<Vec<u8>, SignatureError> {
        let key = self.current().ok_or(SignatureError::NoKeys)?;
        let content = record.canonical_content()?;
        Ok(digest::<R>(key.mac()?, &content).finalize().into_bytes().to_vec())
    }
}

impl SignatureVerifier for Keyring {
    fn verify<R: Signable>(&self, record: &R, stored_signature: &[u8]) -> Result<bool, SignatureError> {
        if self.keys.is_empty() {
            return Err(SignatureError::NoKeys);
        }
        let content = record.canonical_content()?;
        for key in &self.keys {
            // Constant-time comparison via hmac crate
            if digest::<R>(key.mac()?, &content)
                .verify_slice(stored_signature)
                .is_ok()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn digest<R: Signable>(mut mac: HmacSha256, content: &[u8]) -> HmacSha256 {
    mac.update(R::KIND.as_bytes());
    mac.update(&[0u8]);
    mac.update(content);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note {
        body: String,
        signature: Vec<u8>,
    }

    impl Signable for Note {
        const KIND: &'static str = "note";

        fn canonical_content(&self) -> Result<Vec<u8>, SignatureError> {
            Ok(self.body.as_bytes().to_vec())
        }

        fn signature(&self) -> &[u8] {
            &self.signature
        }
    }

    struct Memo(Note);

    impl Signable for Memo {
        const KIND: &'static str = "memo";

        fn canonical_content(&self) -> Result<Vec<u8>, SignatureError> {
            self.0.canonical_content()
        }

        fn signature(&self) -> &[u8] {
            &self.0.signature
        }
    }

    fn key(id: &str, byte: u8) -> SigningKey {
        SigningKey::new(id, vec![byte; MIN_KEY_LEN]).unwrap()
    }

    fn note(body: &str) -> Note {
        Note {
            body: body.to_string(),
            signature: Vec::new(),
        }
    }

    #[test]
    fn sign_then_verify() {
        let keyring = Keyring::new(key("k1", 0x42), vec![]);
        let mut n = note("hello");
        n.signature = keyring.sign(&n).unwrap();
        assert!(keyring.verify(&n, n.signature()).unwrap());
    }

    #[test]
    fn tampered_content_is_invalid_not_an_error() {
        let keyring = Keyring::new(key("k1", 0x42), vec![]);
        let mut n = note("hello");
        n.signature = keyring.sign(&n).unwrap();
        n.body = "hellO".to_string();
        assert_eq!(keyring.verify(&n, n.signature()), Ok(false));
    }

    #[test]
    fn truncated_signature_is_invalid() {
        let keyring = Keyring::new(key("k1", 0x42), vec![]);
        let n = note("hello");
        let sig = keyring.sign(&n).unwrap();
        assert_eq!(keyring.verify(&n, &sig[..16]), Ok(false));
        assert_eq!(keyring.verify(&n, &[]), Ok(false));
    }

    #[test]
    fn previous_key_still_verifies_after_rotation() {
        let old = Keyring::new(key("k1", 0x01), vec![]);
        let n = note("rotate me");
        let sig = old.sign(&n).unwrap();

        let rotated = Keyring::new(key("k2", 0x02), vec![key("k1", 0x01)]);
        assert!(rotated.verify(&n, &sig).unwrap());
        assert_ne!(rotated.sign(&n).unwrap(), sig);

        let dropped = Keyring::new(key("k2", 0x02), vec![]);
        assert!(!dropped.verify(&n, &sig).unwrap());
    }

    #[test]
    fn signatures_do_not_cross_record_kinds() {
        let keyring = Keyring::new(key("k1", 0x42), vec![]);
        let n = note("same bytes");
        let sig = keyring.sign(&n).unwrap();
        let memo = Memo(note("same bytes"));
        assert!(!keyring.verify(&memo, &sig).unwrap());
    }

    #[test]
    fn empty_keyring_is_a_computation_error() {
        let keyring = Keyring::empty();
        let n = note("hello");
        assert_eq!(keyring.verify(&n, &[0u8; 32]), Err(SignatureError::NoKeys));
        assert_eq!(keyring.sign(&n), Err(SignatureError::NoKeys));
    }

    #[test]
    fn short_or_malformed_keys_are_rejected() {
        assert!(matches!(
            SigningKey::new("short", vec![1u8; 8]),
            Err(SignatureError::InvalidKey(_))
        ));
        assert!(matches!(
            SigningKey::from_hex("bad", "zz"),
            Err(SignatureError::InvalidKey(_))
        ));
        let ok = SigningKey::from_hex("hex", &"ab".repeat(MIN_KEY_LEN)).unwrap();
        assert_eq!(ok.id(), "hex");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let k = key("k1", 0x42);
        let rendered = format!("{k:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("66"));
    }
}
