// ## 📂 File: `src/crypto/aead.rs`

//! AEAD interface for the OpenPGP modes: EAX, OCB and GCM over AES-128/192/256.
//!
//! Design notes:
//! - Nonce length follows the mode (EAX 16, OCB 15, GCM 12); the tag is always 16 bytes.
//! - Tag verification fails closed: no partial plaintext is returned.
//! - Empty plaintext is legal (the final chunk of a message carries none).

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::{U12, U15};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::AesGcm;
use ocb3::Ocb3;

use crate::constants::TAG_LEN;
use crate::crypto::eax::Eax;
use crate::crypto::types::{AeadAlgorithm, CryptoError, SymmetricAlgorithm};

type Gcm<C> = AesGcm<C, U12>;
type Ocb<C> = Ocb3<C, U15>;

/// Keyed AEAD primitive selected by (cipher, mode).
pub enum AeadImpl {
    Eax128(Eax<Aes128>),
    Eax192(Eax<Aes192>),
    Eax256(Eax<Aes256>),
    Ocb128(Ocb<Aes128>),
    Ocb192(Ocb<Aes192>),
    Ocb256(Ocb<Aes256>),
    Gcm128(Gcm<Aes128>),
    Gcm192(Gcm<Aes192>),
    Gcm256(Gcm<Aes256>),
}

impl std::fmt::Debug for AeadImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadImpl")
            .field("cipher", &self.cipher())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl AeadImpl {
    /// Construct the primitive from the algorithm pair and a key of the cipher's size.
    pub fn new(
        cipher: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        key: &[u8],
    ) -> Result<Self, CryptoError> {
        if key.len() != cipher.key_size() {
            return Err(CryptoError::InvalidKeyLen {
                expected: cipher.key_size(),
                actual: key.len(),
            });
        }

        let bad_key = |_| CryptoError::InvalidKeyLen {
            expected: cipher.key_size(),
            actual: key.len(),
        };

        let imp = match (cipher, mode) {
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Eax) => Self::Eax128(Eax::new_from_slice(key)?),
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Eax) => Self::Eax192(Eax::new_from_slice(key)?),
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Eax) => Self::Eax256(Eax::new_from_slice(key)?),
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Ocb) => Self::Ocb128(Ocb::new_from_slice(key).map_err(bad_key)?),
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Ocb) => Self::Ocb192(Ocb::new_from_slice(key).map_err(bad_key)?),
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Ocb) => Self::Ocb256(Ocb::new_from_slice(key).map_err(bad_key)?),
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Gcm) => Self::Gcm128(Gcm::new_from_slice(key).map_err(bad_key)?),
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Gcm) => Self::Gcm192(Gcm::new_from_slice(key).map_err(bad_key)?),
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Gcm) => Self::Gcm256(Gcm::new_from_slice(key).map_err(bad_key)?),
        };
        Ok(imp)
    }

    pub fn cipher(&self) -> SymmetricAlgorithm {
        match self {
            Self::Eax128(_) | Self::Ocb128(_) | Self::Gcm128(_) => SymmetricAlgorithm::Aes128,
            Self::Eax192(_) | Self::Ocb192(_) | Self::Gcm192(_) => SymmetricAlgorithm::Aes192,
            Self::Eax256(_) | Self::Ocb256(_) | Self::Gcm256(_) => SymmetricAlgorithm::Aes256,
        }
    }

    pub fn mode(&self) -> AeadAlgorithm {
        match self {
            Self::Eax128(_) | Self::Eax192(_) | Self::Eax256(_) => AeadAlgorithm::Eax,
            Self::Ocb128(_) | Self::Ocb192(_) | Self::Ocb256(_) => AeadAlgorithm::Ocb,
            Self::Gcm128(_) | Self::Gcm192(_) | Self::Gcm256(_) => AeadAlgorithm::Gcm,
        }
    }

    pub fn nonce_len(&self) -> usize {
        self.mode().nonce_len()
    }

    pub fn tag_len(&self) -> usize {
        TAG_LEN
    }

    /// AEAD seal (encrypt) plaintext with nonce and associated data. Returns `ciphertext || tag`.
    pub fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        let payload = Payload { msg: plaintext, aad };
        let sealed = match self {
            Self::Eax128(c) => return c.encrypt(nonce, aad, plaintext),
            Self::Eax192(c) => return c.encrypt(nonce, aad, plaintext),
            Self::Eax256(c) => return c.encrypt(nonce, aad, plaintext),
            Self::Ocb128(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
            Self::Ocb192(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
            Self::Ocb256(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm128(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm192(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm256(c) => c.encrypt(GenericArray::from_slice(nonce), payload),
        };
        sealed.map_err(|_| CryptoError::Failure(format!("{:?} seal failed", self.mode())))
    }

    /// AEAD open (decrypt) `ciphertext || tag` with nonce and associated data.
    pub fn open(&self, nonce: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        if ciphertext_and_tag.len() < TAG_LEN {
            return Err(CryptoError::TagMismatch);
        }
        let payload = Payload { msg: ciphertext_and_tag, aad };
        let opened = match self {
            Self::Eax128(c) => return c.decrypt(nonce, aad, ciphertext_and_tag),
            Self::Eax192(c) => return c.decrypt(nonce, aad, ciphertext_and_tag),
            Self::Eax256(c) => return c.decrypt(nonce, aad, ciphertext_and_tag),
            Self::Ocb128(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
            Self::Ocb192(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
            Self::Ocb256(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm128(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm192(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
            Self::Gcm256(c) => c.decrypt(GenericArray::from_slice(nonce), payload),
        };
        opened.map_err(|_| CryptoError::TagMismatch)
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), CryptoError> {
        if nonce.len() != self.nonce_len() {
            return Err(CryptoError::InvalidNonceLen {
                expected: self.nonce_len(),
                actual: nonce.len(),
            });
        }
        Ok(())
    }
}
