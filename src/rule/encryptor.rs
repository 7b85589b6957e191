//! Column encryptors.
//!
//! The reference implementation uses AES-256-GCM-SIV (RFC 8452) with a
//! synthetic nonce derived from the key and plaintext via HMAC-SHA-256, so
//! the same plaintext always produces the same ciphertext under one key.
//! Deterministic output is what lets rewritten equality predicates keep
//! matching; GCM-SIV tolerates the repeated nonces this implies, plain GCM
//! would not.

use aes_gcm_siv::{
    aead::{Aead, KeyInit},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Byte length of an AES-256 key.
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce.
pub const NONCE_LEN: usize = 12;

/// Prefix of every cipher value produced by [`AesGcmSivEncryptor`].
pub const VERSION_PREFIX: &str = "v1";

/// Errors produced by an [`Encryptor`].
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key has the wrong length.
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,
    /// AEAD encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,
    /// A cipher value does not match the expected wire format.
    #[error("invalid cipher value format")]
    InvalidFormat,
    /// This encryptor cannot derive assisted-query index values.
    #[error("encryptor does not support assisted-query indexing")]
    AssistedQueryUnsupported,
}

/// A pluggable column cipher.
///
/// Implementations must be pure functions of their inputs: any randomness or
/// counter state has to live inside the call, never shared across calls, so
/// concurrent rewrites need no coordination.
pub trait Encryptor: Send + Sync {
    /// Encrypt one plaintext value into its stored cipher text.
    fn encrypt(&self, plain: &str) -> Result<String, CipherError>;

    /// Recover the plaintext from a cipher value.
    ///
    /// Returns `Ok(None)` when this encryptor is one-way.
    fn decrypt(&self, _cipher: &str) -> Result<Option<String>, CipherError> {
        Ok(None)
    }

    /// Derive the deterministic, queryable index value for a plaintext.
    fn assisted_query_index(&self, _plain: &str) -> Result<String, CipherError> {
        Err(CipherError::AssistedQueryUnsupported)
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Deterministic AES-256-GCM-SIV column encryptor.
///
/// Cipher values are rendered as `v1.<base64url(nonce)>.<base64url(ct+tag)>`.
/// Assisted-query index values are a keyed HMAC-SHA-256 digest of the
/// plaintext, domain-separated from the nonce derivation.
pub struct AesGcmSivEncryptor {
    key: [u8; KEY_LEN],
}

impl AesGcmSivEncryptor {
    /// Build an encryptor from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength);
        }
        let mut fixed = [0u8; KEY_LEN];
        fixed.copy_from_slice(key);
        Ok(AesGcmSivEncryptor { key: fixed })
    }

    /// Build an encryptor from a base64url-encoded key.
    pub fn from_base64_key(key: &str) -> Result<Self, CipherError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(key.trim_end_matches('='))
            .map_err(|_| CipherError::InvalidKeyLength)?;
        Self::new(&bytes)
    }

    fn mac(&self, domain: &[u8], plain: &str) -> [u8; 32] {
        // `KeyInit` is in scope for the AEAD, so name the `Mac` impl explicitly.
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(domain);
        mac.update(plain.as_bytes());
        mac.finalize().into_bytes().into()
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, CipherError> {
        Aes256GcmSiv::new_from_slice(&self.key).map_err(|_| CipherError::InvalidKeyLength)
    }
}

impl Encryptor for AesGcmSivEncryptor {
    fn encrypt(&self, plain: &str) -> Result<String, CipherError> {
        let digest = self.mac(b"nonce:", plain);
        let nonce_bytes = &digest[..NONCE_LEN];
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(nonce_bytes), plain.as_bytes())
            .map_err(|_| CipherError::AeadFailure)?;
        Ok(format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(&ciphertext),
        ))
    }

    fn decrypt(&self, cipher: &str) -> Result<Option<String>, CipherError> {
        let parts: Vec<&str> = cipher.splitn(3, '.').collect();
        if parts.len() != 3 || parts[0] != VERSION_PREFIX {
            return Err(CipherError::InvalidFormat);
        }
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CipherError::InvalidFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CipherError::InvalidFormat);
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::InvalidFormat)?;
        let plain = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CipherError::AeadFailure)?;
        String::from_utf8(plain)
            .map(Some)
            .map_err(|_| CipherError::InvalidFormat)
    }

    fn assisted_query_index(&self, plain: &str) -> Result<String, CipherError> {
        Ok(URL_SAFE_NO_PAD.encode(self.mac(b"assisted-query:", plain)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> AesGcmSivEncryptor {
        AesGcmSivEncryptor::new(&[7u8; KEY_LEN]).expect("key has the right length")
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let enc = encryptor();
        let cipher = enc.encrypt("123-45-6789").unwrap();
        assert!(cipher.starts_with("v1."));
        assert_eq!(enc.decrypt(&cipher).unwrap().as_deref(), Some("123-45-6789"));
    }

    #[test]
    fn same_plaintext_same_ciphertext() {
        let enc = encryptor();
        assert_eq!(enc.encrypt("lu").unwrap(), enc.encrypt("lu").unwrap());
        assert_ne!(enc.encrypt("lu").unwrap(), enc.encrypt("wu").unwrap());
    }

    #[test]
    fn assisted_index_is_deterministic_and_distinct_from_cipher() {
        let enc = encryptor();
        let index = enc.assisted_query_index("lu").unwrap();
        assert_eq!(index, enc.assisted_query_index("lu").unwrap());
        assert_ne!(index, enc.encrypt("lu").unwrap());
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let cipher = encryptor().encrypt("secret").unwrap();
        let other = AesGcmSivEncryptor::new(&[9u8; KEY_LEN]).unwrap();
        assert!(matches!(
            other.decrypt(&cipher),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            AesGcmSivEncryptor::new(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength)
        ));
    }

    #[test]
    fn decrypt_rejects_malformed_values() {
        let enc = encryptor();
        assert!(matches!(
            enc.decrypt("v2.abc.def"),
            Err(CipherError::InvalidFormat)
        ));
        assert!(matches!(
            enc.decrypt("v1.abc"),
            Err(CipherError::InvalidFormat)
        ));
        assert!(matches!(
            enc.decrypt("v1.!!!.abc"),
            Err(CipherError::InvalidFormat)
        ));
    }

    #[test]
    fn base64_key_round_trip() {
        let key = URL_SAFE_NO_PAD.encode([7u8; KEY_LEN]);
        let enc = AesGcmSivEncryptor::from_base64_key(&key).unwrap();
        assert_eq!(enc.encrypt("lu").unwrap(), encryptor().encrypt("lu").unwrap());
    }
}
