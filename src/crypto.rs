//! Passphrase based secret sealing using Argon2id and AES-256-GCM.
//!
//! Each call to [`SecretCipher::encrypt`] draws a fresh salt and nonce, and the
//! ciphertext text form carries both:
//!
//! ```text
//! v1:<base64(salt[16] || nonce[12] || aes-gcm ciphertext+tag)>
//! ```
//!
//! The passphrase is borrowed for the duration of one call and never kept.

use crate::models::Ciphertext;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{password_hash::rand_core::RngCore, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const FORMAT_PREFIX: &str = "v1:";
const SALT_LEN: usize = 16; // 128 bits
const NONCE_LEN: usize = 12; // 96 bits (GCM standard)
const KEY_LEN: usize = 32; // 256 bits for AES-256
const TAG_LEN: usize = 16;

/// Strip the version prefix and decode `salt || nonce || ciphertext+tag`,
/// rejecting anything too short to hold a tag.
pub(crate) fn unframe(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let body = encoded
        .strip_prefix(FORMAT_PREFIX)
        .ok_or(CryptoError::MalformedCiphertext)?;
    let combined = STANDARD
        .decode(body)
        .map_err(|_| CryptoError::MalformedCiphertext)?;
    if combined.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::MalformedCiphertext);
    }
    Ok(combined)
}

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("{0} is empty")]
    EmptyInput(&'static str),
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Malformed ciphertext")]
    MalformedCiphertext,
    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for CipherParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl CipherParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

/// Stateless sealing of credential secrets.
#[derive(Debug, Clone, Default)]
pub struct SecretCipher {
    params: CipherParams,
}

impl SecretCipher {
    /// Create a cipher with the default (desktop tuned) cost parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cipher with explicit Argon2 parameters.
    pub fn with_params(params: CipherParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> CipherParams {
        self.params
    }

    fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Derive an encryption key from a passphrase using Argon2id.
    /// Returns a key that will be automatically zeroed on drop.
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut output = vec![0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut output)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(DerivedKey(output))
    }

    /// Seal `plaintext` under `passphrase`.
    ///
    /// Two calls with identical arguments yield different ciphertexts.
    pub fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<Ciphertext, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyInput("plaintext"));
        }
        if passphrase.is_empty() {
            return Err(CryptoError::EmptyInput("passphrase"));
        }

        let salt = Self::generate_salt();
        let key = self.derive_key(passphrase, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        // salt + nonce + ciphertext (tag is already appended by AES-GCM)
        let mut combined = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&sealed);

        Ok(Ciphertext::sealed(format!(
            "{FORMAT_PREFIX}{}",
            STANDARD.encode(&combined)
        )))
    }

    /// Open `ciphertext` with `passphrase`.
    ///
    /// A wrong passphrase or any tampering fails the GCM tag check and yields
    /// [`CryptoError::DecryptionFailed`]; a plaintext that is not non-empty
    /// UTF-8 is treated the same way.
    pub fn decrypt(&self, ciphertext: &Ciphertext, passphrase: &str) -> Result<String, CryptoError> {
        self.decrypt_str(ciphertext.as_str(), passphrase)
    }

    /// Same as [`Self::decrypt`] for an encoded ciphertext string.
    pub fn decrypt_str(&self, encoded: &str, passphrase: &str) -> Result<String, CryptoError> {
        if encoded.is_empty() {
            return Err(CryptoError::EmptyInput("ciphertext"));
        }
        if passphrase.is_empty() {
            return Err(CryptoError::EmptyInput("passphrase"));
        }

        let combined = unframe(encoded)?;
        let (salt, rest) = combined.split_at(SALT_LEN);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let key = self.derive_key(passphrase, salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let plaintext_bytes = cipher
            .decrypt(nonce, sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if plaintext_bytes.is_empty() {
            return Err(CryptoError::DecryptionFailed);
        }

        String::from_utf8(plaintext_bytes).map_err(|err| {
            err.into_bytes().zeroize();
            CryptoError::DecryptionFailed
        })
    }
}

/// A derived key that automatically zeroes itself on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey(Vec<u8>);

impl DerivedKey {
    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::with_params(CipherParams::new(1024, 1, 1))
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = cipher();
        let sealed = cipher.encrypt("This is a secret message!", "pass123").unwrap();
        assert!(sealed.as_str().starts_with("v1:"));

        let opened = cipher.decrypt(&sealed, "pass123").unwrap();
        assert_eq!(opened, "This is a secret message!");
    }

    #[test]
    fn test_decrypt_wrong_passphrase() {
        let cipher = cipher();
        let sealed = cipher.encrypt("Secret data", "hunter3").unwrap();

        let result = cipher.decrypt(&sealed, "hunter2");
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let cipher = cipher();
        let first = cipher.encrypt("Same data", "test_password").unwrap();
        let second = cipher.encrypt("Same data", "test_password").unwrap();

        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first, "test_password").unwrap(), "Same data");
        assert_eq!(cipher.decrypt(&second, "test_password").unwrap(), "Same data");
    }

    #[test]
    fn test_empty_arguments_rejected() {
        let cipher = cipher();
        assert!(matches!(
            cipher.encrypt("", "pw"),
            Err(CryptoError::EmptyInput("plaintext"))
        ));
        assert!(matches!(
            cipher.encrypt("secret", ""),
            Err(CryptoError::EmptyInput("passphrase"))
        ));

        let sealed = cipher.encrypt("secret", "pw").unwrap();
        assert!(matches!(
            cipher.decrypt(&sealed, ""),
            Err(CryptoError::EmptyInput("passphrase"))
        ));
        assert!(matches!(
            cipher.decrypt_str("", "pw"),
            Err(CryptoError::EmptyInput("ciphertext"))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_detected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret", "pw").unwrap();

        let mut raw = STANDARD
            .decode(sealed.as_str().strip_prefix(FORMAT_PREFIX).unwrap())
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = format!("{FORMAT_PREFIX}{}", STANDARD.encode(&raw));

        assert!(matches!(
            cipher.decrypt_str(&tampered, "pw"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_malformed_ciphertext_rejected() {
        let cipher = cipher();
        assert!(matches!(
            cipher.decrypt_str("U2FsdGVkX1+legacy", "pw"),
            Err(CryptoError::MalformedCiphertext)
        ));
        assert!(matches!(
            cipher.decrypt_str("v1:not base64!!", "pw"),
            Err(CryptoError::MalformedCiphertext)
        ));
        assert!(matches!(
            cipher.decrypt_str("v1:AAAA", "pw"),
            Err(CryptoError::MalformedCiphertext)
        ));
    }

    #[test]
    fn test_unicode_round_trip() {
        let cipher = cipher();
        let sealed = cipher.encrypt("pässwörd 🔑", "clé").unwrap();
        assert_eq!(cipher.decrypt(&sealed, "clé").unwrap(), "pässwörd 🔑");
    }

    #[test]
    fn test_invalid_params_fail_key_derivation() {
        let cipher = SecretCipher::with_params(CipherParams::new(1, 1, 1));
        assert!(matches!(
            cipher.encrypt("secret", "pw"),
            Err(CryptoError::KeyDerivationFailed)
        ));
    }
}
