//! Credentials generated for cloud extensions.
//!
//! Generated accounts are stored encrypted with AES-256-GCM. An encrypted
//! value is `base64(nonce || ciphertext)` with a fresh 96-bit nonce per call.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const USER_LEN: usize = 8;
const PASSWORD_LEN: usize = 16;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!#%^*()-_=+[]{}:,.?";

/// Errors of [`AccountCipher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key is not 32 bytes of valid base64.
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Input is not a value produced by [`AccountCipher::encrypt`].
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// AES-256-GCM cipher for extension credentials.
#[derive(Clone)]
pub struct AccountCipher {
    cipher: Aes256Gcm,
}

impl AccountCipher {
    /// Cipher with a raw 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if `key` is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Cipher with a base64 encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if the key does not decode to 32
    /// bytes.
    pub fn from_base64(key: &str) -> Result<Self, CipherError> {
        let raw = BASE64
            .decode(key.trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Self::new(&raw)
    }

    /// Encrypt `plaintext` into `base64(nonce || ciphertext)`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encrypt`] if the AEAD rejects the input.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Reverse of [`AccountCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decrypt`] for malformed or tampered input.
    pub fn decrypt(&self, sealed: &str) -> Result<String, CipherError> {
        let raw = BASE64
            .decode(sealed)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt("input too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

impl fmt::Debug for AccountCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountCipher { .. }")
    }
}

/// A generated service account, in plain and encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionAccount {
    /// User name.
    pub user: String,
    /// Password.
    pub pwd: String,
    /// Encrypted user name.
    pub encrypt_user: String,
    /// Encrypted password.
    pub encrypt_password: String,
}

impl ExtensionAccount {
    /// Generate a random account: an 8-character alphanumeric user and a
    /// 16-character password with lower, upper, digit and symbol characters.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encrypt`] if encryption fails.
    pub fn generate(cipher: &AccountCipher) -> Result<Self, CipherError> {
        let mut rng = rand::thread_rng();
        let user: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(USER_LEN)
            .map(char::from)
            .collect();
        let pwd = random_password(&mut rng);

        Ok(Self {
            encrypt_user: cipher.encrypt(&user)?,
            encrypt_password: cipher.encrypt(&pwd)?,
            user,
            pwd,
        })
    }
}

fn random_password<R: Rng>(rng: &mut R) -> String {
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .filter_map(|class| class.choose(&mut *rng).copied())
        .collect();
    while chars.len() < PASSWORD_LEN {
        if let Some(c) = all.choose(&mut *rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(&mut *rng);
    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher() -> AccountCipher {
        AccountCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(AccountCipher::new(&[0u8; 16]), Err(CipherError::InvalidKey(_))));
        assert!(AccountCipher::from_base64(&BASE64.encode([1u8; 32])).is_ok());
    }

    #[test]
    fn test_generated_account_shape() {
        let cipher = cipher();
        let account = ExtensionAccount::generate(&cipher).unwrap();

        assert_eq!(account.user.len(), USER_LEN);
        assert!(account.user.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(account.pwd.len(), PASSWORD_LEN);
        assert!(account.pwd.chars().any(|c| c.is_ascii_digit()));
        assert!(account.pwd.chars().any(|c| SYMBOLS.contains(&(c as u8))));
        assert_eq!(cipher.decrypt(&account.encrypt_user).unwrap(), account.user);
        assert_eq!(cipher.decrypt(&account.encrypt_password).unwrap(), account.pwd);
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other = AccountCipher::new(&[8u8; 32]).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CipherError::Decrypt(_))));
        assert!(matches!(other.decrypt("AAAA"), Err(CipherError::Decrypt(_))));
    }

    proptest! {
        #[test]
        fn prop_decrypt_inverts_encrypt(plaintext in "\\PC{0,64}") {
            let cipher = cipher();
            let sealed = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }
    }
}
