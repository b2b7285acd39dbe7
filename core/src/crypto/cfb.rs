// ## 📂 File: `src/crypto/cfb.rs`

//! Full-block CFB with a zero IV, as used by version 1 envelopes.
//!
//! Buffered encryptor/decryptor so the legacy path can process arbitrary-sized
//! slices of one stream without re-synchronisation.

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};

use crate::constants::BLOCK_LEN;
use crate::crypto::types::{CryptoError, SymmetricAlgorithm};

const ZERO_IV: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];

pub enum CfbEncryptor {
    Aes128(BufEncryptor<Aes128>),
    Aes192(BufEncryptor<Aes192>),
    Aes256(BufEncryptor<Aes256>),
}

pub enum CfbDecryptor {
    Aes128(BufDecryptor<Aes128>),
    Aes192(BufDecryptor<Aes192>),
    Aes256(BufDecryptor<Aes256>),
}

fn key_err(cipher: SymmetricAlgorithm, key: &[u8]) -> CryptoError {
    CryptoError::InvalidKeyLen { expected: cipher.key_size(), actual: key.len() }
}

impl CfbEncryptor {
    pub fn new(cipher: SymmetricAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let enc = match cipher {
            SymmetricAlgorithm::Aes128 => Self::Aes128(
                BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
            SymmetricAlgorithm::Aes192 => Self::Aes192(
                BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
            SymmetricAlgorithm::Aes256 => Self::Aes256(
                BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
        };
        Ok(enc)
    }

    pub fn encrypt(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.encrypt(buf),
            Self::Aes192(c) => c.encrypt(buf),
            Self::Aes256(c) => c.encrypt(buf),
        }
    }
}

impl CfbDecryptor {
    pub fn new(cipher: SymmetricAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let dec = match cipher {
            SymmetricAlgorithm::Aes128 => Self::Aes128(
                BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
            SymmetricAlgorithm::Aes192 => Self::Aes192(
                BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
            SymmetricAlgorithm::Aes256 => Self::Aes256(
                BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(|_| key_err(cipher, key))?,
            ),
        };
        Ok(dec)
    }

    pub fn decrypt(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.decrypt(buf),
            Self::Aes192(c) => c.decrypt(buf),
            Self::Aes256(c) => c.decrypt(buf),
        }
    }
}
