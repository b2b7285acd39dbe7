// ## 📂 File: `src/crypto/aad.rs`

//! Associated data for chunked AEAD.
//!
//! Layout, all integers big-endian:
//!
//! | Family                | Per chunk                       | Final chunk                        |
//! | --------------------- | ------------------------------- | ---------------------------------- |
//! | Integrity protected   | prefix(5)                       | prefix(5) ‖ total(8)               |
//! | AEAD encrypted        | prefix(5) ‖ index(8)            | prefix(5) ‖ index(8) ‖ total(8)    |
//!
//! `prefix = [0xC0 | tag, version, cipher, aead, chunk_size_byte]`.
//!
//! The buffer is rewritten in place as the chunk counter advances; every call
//! returns an owned snapshot so queued chunk jobs never observe later mutations.

use bytes::Bytes;

use crate::constants::{packet_tags, COUNTER_LEN, SEIPD_V2, AEAD_ENCRYPTED_V1};
use crate::crypto::types::{AeadAlgorithm, SymmetricAlgorithm};

pub const AAD_PREFIX_LEN: usize = 5;
const AAD_MAX_LEN: usize = AAD_PREFIX_LEN + 2 * COUNTER_LEN;

/// Which packet family the associated data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AadFamily {
    /// Version 2 integrity-protected envelope (tag 18).
    IntegrityProtected,
    /// AEAD Encrypted Data packet (tag 20), chunk index bound into every AD.
    AeadEncrypted,
}

impl AadFamily {
    fn tag(self) -> u8 {
        match self {
            AadFamily::IntegrityProtected => packet_tags::SYM_ENCRYPTED_INTEGRITY_PROTECTED,
            AadFamily::AeadEncrypted => packet_tags::AEAD_ENCRYPTED_DATA,
        }
    }

    fn version(self) -> u8 {
        match self {
            AadFamily::IntegrityProtected => SEIPD_V2,
            AadFamily::AeadEncrypted => AEAD_ENCRYPTED_V1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssociatedData {
    family: AadFamily,
    buf: [u8; AAD_MAX_LEN],
}

impl AssociatedData {
    pub fn new(
        family: AadFamily,
        cipher: SymmetricAlgorithm,
        aead: AeadAlgorithm,
        chunk_size_byte: u8,
    ) -> Self {
        let mut buf = [0u8; AAD_MAX_LEN];
        buf[0] = 0xC0 | family.tag();       // 0  packet tag, new format
        buf[1] = family.version();          // 1  packet version
        buf[2] = cipher.id();               // 2  cipher
        buf[3] = aead.id();                 // 3  AEAD mode
        buf[4] = chunk_size_byte;           // 4  chunk size byte
        Self { family, buf }
    }

    /// The fixed five-byte header; also the HKDF info for integrity-protected envelopes.
    pub fn prefix(&self) -> &[u8] {
        &self.buf[..AAD_PREFIX_LEN]
    }

    /// AD for data chunk `index`.
    pub fn for_chunk(&mut self, index: u64) -> Bytes {
        match self.family {
            AadFamily::IntegrityProtected => Bytes::copy_from_slice(self.prefix()),
            AadFamily::AeadEncrypted => {
                self.put_counter(AAD_PREFIX_LEN, index);
                Bytes::copy_from_slice(&self.buf[..AAD_PREFIX_LEN + COUNTER_LEN])
            }
        }
    }

    /// AD for the final, length-qualified chunk.
    pub fn for_final(&mut self, index: u64, total_plaintext: u64) -> Bytes {
        let len = match self.family {
            AadFamily::IntegrityProtected => {
                self.put_counter(AAD_PREFIX_LEN, total_plaintext);
                AAD_PREFIX_LEN + COUNTER_LEN
            }
            AadFamily::AeadEncrypted => {
                self.put_counter(AAD_PREFIX_LEN, index);
                self.put_counter(AAD_PREFIX_LEN + COUNTER_LEN, total_plaintext);
                AAD_MAX_LEN
            }
        };
        debug_assert!(len <= AAD_MAX_LEN);
        Bytes::copy_from_slice(&self.buf[..len])
    }

    fn put_counter(&mut self, offset: usize, value: u64) {
        self.buf[offset..offset + COUNTER_LEN].copy_from_slice(&value.to_be_bytes());
    }
}
