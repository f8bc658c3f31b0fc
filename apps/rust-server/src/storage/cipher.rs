// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption at rest for secret values and audit metadata.
//!
//! Values are sealed with AES-256-GCM under the master key and a fresh
//! random 96-bit nonce per value. Without a master key the sealer stores
//! values in plain form; such records stay readable once a key is added,
//! but sealed records can never be opened without it.

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use super::database::{StoreError, StoreResult};

/// Length of the AES-256 master key in bytes.
pub const MASTER_KEY_LEN: usize = 32;

/// A value as persisted inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "alg", rename_all = "snake_case")]
pub enum SealedValue {
    Plain {
        value: String,
    },
    Aes256Gcm {
        /// Base64 nonce.
        nonce: String,
        /// Base64 ciphertext with the GCM tag appended.
        ciphertext: String,
    },
}

/// AES-256-GCM key wrapper.
pub struct ValueCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for ValueCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCipher").finish_non_exhaustive()
    }
}

impl ValueCipher {
    /// Build a cipher from raw key bytes (must be 32 bytes).
    pub fn from_key_bytes(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(StoreError::Cipher(format!(
                "master key must be {MASTER_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| StoreError::Cipher("invalid master key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build a cipher from a standard base64 encoded key.
    pub fn from_base64(encoded: &str) -> StoreResult<Self> {
        let bytes = Base64::decode_vec(encoded.trim())
            .map_err(|_| StoreError::Cipher("master key is not valid base64".to_string()))?;
        Self::from_key_bytes(&bytes)
    }

    /// Generate a cipher with a random key.
    pub fn generate() -> StoreResult<Self> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| StoreError::Cipher("random source unavailable".to_string()))?;
        Self::from_key_bytes(&bytes)
    }

    fn seal(&self, plaintext: &str) -> StoreResult<SealedValue> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StoreError::Cipher("random source unavailable".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| StoreError::Cipher("seal failed".to_string()))?;

        Ok(SealedValue::Aes256Gcm {
            nonce: Base64::encode_string(&nonce_bytes),
            ciphertext: Base64::encode_string(&in_out),
        })
    }

    fn open(&self, nonce: &str, ciphertext: &str) -> StoreResult<String> {
        let nonce_vec = Base64::decode_vec(nonce)
            .map_err(|_| StoreError::Cipher("corrupt nonce".to_string()))?;
        let nonce = Nonce::try_assume_unique_for_key(&nonce_vec)
            .map_err(|_| StoreError::Cipher("corrupt nonce".to_string()))?;
        let mut in_out = Base64::decode_vec(ciphertext)
            .map_err(|_| StoreError::Cipher("corrupt ciphertext".to_string()))?;

        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StoreError::Cipher("authentication failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| StoreError::Cipher("plaintext is not UTF-8".to_string()))
    }
}

/// Seals and opens values, with or without a master key.
#[derive(Debug)]
pub struct Sealer {
    cipher: Option<ValueCipher>,
}

impl Sealer {
    pub fn new(cipher: Option<ValueCipher>) -> Self {
        Self { cipher }
    }

    /// Whether values are encrypted on write.
    pub fn is_encrypting(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn seal(&self, plaintext: &str) -> StoreResult<SealedValue> {
        match &self.cipher {
            Some(cipher) => cipher.seal(plaintext),
            None => Ok(SealedValue::Plain {
                value: plaintext.to_string(),
            }),
        }
    }

    pub fn open(&self, sealed: &SealedValue) -> StoreResult<String> {
        match sealed {
            SealedValue::Plain { value } => Ok(value.clone()),
            SealedValue::Aes256Gcm { nonce, ciphertext } => match &self.cipher {
                Some(cipher) => cipher.open(nonce, ciphertext),
                None => Err(StoreError::Cipher(
                    "value is encrypted but no master key is configured".to_string(),
                )),
            },
        }
    }
}
