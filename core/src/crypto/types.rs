// ## 📂 File: `src/crypto/types.rs`

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::constants::{BLOCK_LEN, TAG_LEN};

/// Symmetric ciphers accepted for envelope encryption.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymmetricAlgorithm {
    Aes128 = 7,
    Aes192 = 8,
    Aes256 = 9,
}

impl SymmetricAlgorithm {
    /// Session key length in bytes.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128 => 16,
            SymmetricAlgorithm::Aes192 => 24,
            SymmetricAlgorithm::Aes256 => 32,
        }
    }

    pub fn block_size(self) -> usize {
        BLOCK_LEN
    }

    pub fn id(self) -> u8 {
        self.into()
    }
}

/// AEAD modes for chunked encryption.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AeadAlgorithm {
    Eax = 1,
    Ocb = 2,
    Gcm = 3,
}

impl AeadAlgorithm {
    pub fn nonce_len(self) -> usize {
        match self {
            AeadAlgorithm::Eax => 16,
            AeadAlgorithm::Ocb => 15,
            AeadAlgorithm::Gcm => 12,
        }
    }

    pub fn tag_len(self) -> usize {
        TAG_LEN
    }

    pub fn id(self) -> u8 {
        self.into()
    }
}

/// Errors raised by the primitive layer. Mapped into `EnvelopeError` by callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Invalid key length provided to cipher.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// Nonce length does not match the AEAD mode.
    #[error("invalid nonce length: expected={expected}, actual={actual}")]
    InvalidNonceLen { expected: usize, actual: usize },

    /// AEAD tag mismatch (authentication failure).
    #[error("AEAD tag mismatch")]
    TagMismatch,

    /// General runtime error with context.
    #[error("crypto failure: {0}")]
    Failure(String),
}
