//! Encryption of provider parameter blobs at rest.
//!
//! Values written by [`SecretCipher::encrypt`] look like `enc:v1:<base64>` where
//! the base64 payload is `nonce || ciphertext` from AES-256-GCM. The key is the
//! SHA-256 digest of the configured secret. Values without the marker are
//! legacy plaintext and pass through [`SecretCipher::decrypt`] untouched.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Versioned marker prepended to every encrypted value.
pub const ENCRYPTED_PREFIX: &str = "enc:v1:";

/// AES-GCM standard nonce length.
const NONCE_LEN: usize = 12;

/// Errors produced by [`SecretCipher`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// An encrypted value was found but no key is configured.
    #[error("Encrypted value found but no encryption key is configured")]
    NoKeyConfigured,

    /// The value could not be decrypted (bad encoding, truncated, or tampered).
    #[error("Decryption failed: {0}")]
    DecryptionFailed(&'static str),

    /// The AEAD refused to encrypt the input.
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Returns true when `value` carries the versioned encryption marker.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Symmetric cipher for configuration secrets.
///
/// Constructed once at startup and shared by reference; with no key it is the
/// identity in both directions.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Option<Aes256Gcm>,
}

impl SecretCipher {
    /// Build a cipher from an optional secret. Blank secrets disable encryption.
    pub fn new(secret: Option<&str>) -> Self {
        let cipher = secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let key = Sha256::digest(s.as_bytes());
                Aes256Gcm::new(&key)
            });
        Self { cipher }
    }

    /// A cipher with no key configured.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Whether a key is configured.
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt `plaintext`. Identity when no key is configured.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(nonce.as_slice());
        raw.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(raw)))
    }

    /// Decrypt a stored value.
    ///
    /// Unmarked values are returned unchanged regardless of key state.
    pub fn decrypt(&self, value: &str) -> Result<String, CipherError> {
        let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };

        let cipher = self.cipher.as_ref().ok_or(CipherError::NoKeyConfigured)?;

        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::DecryptionFailed("invalid base64 payload"))?;
        if raw.len() < NONCE_LEN {
            return Err(CipherError::DecryptionFailed("payload shorter than nonce"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::DecryptionFailed("authentication failed"))?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::DecryptionFailed("plaintext is not valid UTF-8"))
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_key() {
        let cipher = SecretCipher::new(Some("correct horse battery staple"));
        for plaintext in ["", "hello", r#"{"webhook_url":"https://x/y"}"#, "ünïcødé ✓"] {
            let encrypted = cipher.encrypt(plaintext).unwrap();
            assert!(is_encrypted(&encrypted));
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn fresh_nonce_per_call() {
        let cipher = SecretCipher::new(Some("key"));
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn identity_without_key() {
        let cipher = SecretCipher::disabled();
        assert_eq!(cipher.encrypt("plain").unwrap(), "plain");
        assert_eq!(cipher.decrypt("plain").unwrap(), "plain");
        assert!(!cipher.is_enabled());
    }

    #[test]
    fn blank_secret_disables_encryption() {
        assert!(!SecretCipher::new(Some("   ")).is_enabled());
        assert!(!SecretCipher::new(None).is_enabled());
    }

    #[test]
    fn legacy_plaintext_passes_through_with_key() {
        let cipher = SecretCipher::new(Some("key"));
        assert_eq!(
            cipher.decrypt(r#"{"token":"abc"}"#).unwrap(),
            r#"{"token":"abc"}"#
        );
    }

    #[test]
    fn prefix_detection() {
        assert!(is_encrypted("enc:v1:x"));
        assert!(!is_encrypted("plain"));
        assert!(!is_encrypted("enc:v2:x"));
    }

    #[test]
    fn marked_value_without_key_fails() {
        let encrypted = SecretCipher::new(Some("key")).encrypt("secret").unwrap();
        let err = SecretCipher::disabled().decrypt(&encrypted).unwrap_err();
        assert_eq!(err, CipherError::NoKeyConfigured);
    }

    #[test]
    fn foreign_key_fails_authentication() {
        let encrypted = SecretCipher::new(Some("key-a")).encrypt("secret").unwrap();
        let err = SecretCipher::new(Some("key-b"))
            .decrypt(&encrypted)
            .unwrap_err();
        assert!(matches!(err, CipherError::DecryptionFailed(_)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = SecretCipher::new(Some("key"));
        let encrypted = cipher.encrypt("secret").unwrap();
        let mut raw = STANDARD
            .decode(encrypted.strip_prefix(ENCRYPTED_PREFIX).unwrap())
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(raw));
        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CipherError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn short_or_garbled_payload_fails() {
        let cipher = SecretCipher::new(Some("key"));
        let short = format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode([0u8; 4]));
        assert!(matches!(
            cipher.decrypt(&short),
            Err(CipherError::DecryptionFailed(_))
        ));
        assert!(matches!(
            cipher.decrypt("enc:v1:!!!not-base64!!!"),
            Err(CipherError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let cipher = SecretCipher::new(Some("super-secret"));
        let rendered = format!("{:?}", cipher);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("enabled: true"));
    }
}
