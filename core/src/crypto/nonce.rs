// ## 📂 File: `src/crypto/nonce.rs`

//! Per-chunk AEAD nonces.
//!
//! Two schedules, both keyed on a 64-bit big-endian chunk index placed in the
//! low eight bytes of the nonce:
//! - `Overwrite`: the index replaces those bytes (HKDF-derived IV, version 2 envelopes).
//! - `Xor`: the index is XORed into a random per-message IV (AEAD Encrypted Data packets).
//!
//! Never reuse an `(iv, index)` pair under one key. Fresh salt or IV per message guarantees it.

use bytes::Bytes;

use crate::constants::COUNTER_LEN;
use crate::crypto::types::CryptoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSchedule {
    Overwrite,
    Xor,
}

#[derive(Debug, Clone)]
pub struct ChunkNonce {
    iv: Vec<u8>,
    schedule: NonceSchedule,
}

impl ChunkNonce {
    /// `iv` must be the full nonce length of the AEAD mode.
    pub fn new(iv: Vec<u8>, schedule: NonceSchedule) -> Result<Self, CryptoError> {
        if iv.len() < COUNTER_LEN {
            return Err(CryptoError::InvalidNonceLen { expected: COUNTER_LEN, actual: iv.len() });
        }
        Ok(Self { iv, schedule })
    }

    pub fn len(&self) -> usize {
        self.iv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iv.is_empty()
    }

    /// Nonce for chunk `index`.
    pub fn for_chunk(&mut self, index: u64) -> Bytes {
        let tail = self.iv.len() - COUNTER_LEN;
        let ctr = index.to_be_bytes();
        match self.schedule {
            NonceSchedule::Overwrite => {
                self.iv[tail..].copy_from_slice(&ctr);
                Bytes::copy_from_slice(&self.iv)
            }
            NonceSchedule::Xor => {
                let mut nonce = self.iv.clone();
                for (n, c) in nonce[tail..].iter_mut().zip(ctr.iter()) {
                    *n ^= c;
                }
                Bytes::from(nonce)
            }
        }
    }
}
