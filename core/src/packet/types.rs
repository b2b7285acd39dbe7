// ## 📂 File: `src/packet/types.rs`

use std::fmt;
use std::io::Read;

use bytes::Bytes;

use crate::constants::{packet_tags, SALT_LEN};
use crate::crypto::{AeadAlgorithm, SymmetricAlgorithm};
use crate::types::EnvelopeError;

/// Inner packets a decrypted envelope may contain.
pub const ALLOWED_INNER_PACKETS: &[u8] = &[
    packet_tags::LITERAL_DATA,
    packet_tags::COMPRESSED_DATA,
    packet_tags::ONE_PASS_SIGNATURE,
    packet_tags::SIGNATURE,
    packet_tags::MARKER,
    packet_tags::PADDING,
];

/// Parameters fixed when a version 2 envelope is encrypted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SeipdV2Params {
    pub cipher: SymmetricAlgorithm,
    pub aead: AeadAlgorithm,
    pub chunk_size_byte: u8,
    pub salt: [u8; SALT_LEN],
}

impl fmt::Debug for SeipdV2Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeipdV2Params")
            .field("cipher", &self.cipher)
            .field("aead", &self.aead)
            .field("chunk_size_byte", &self.chunk_size_byte)
            .field("salt", &hex::encode(self.salt))
            .finish()
    }
}

/// Fixed fields preceding the encrypted body of a tag 18 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeipdHeader {
    pub version: u8,
    /// Present for version 2 only.
    pub params: Option<SeipdV2Params>,
}

impl SeipdHeader {
    pub fn encoded_len(&self) -> usize {
        match self.params {
            None => 1,
            Some(_) => 1 + 3 + SALT_LEN,
        }
    }
}

/// Fixed fields preceding the encrypted body of a tag 20 packet.
#[derive(Clone, PartialEq, Eq)]
pub struct AedpHeader {
    pub cipher: SymmetricAlgorithm,
    pub aead: AeadAlgorithm,
    pub chunk_size_byte: u8,
    /// Nonce-length starting IV, random per message.
    pub iv: Vec<u8>,
}

impl fmt::Debug for AedpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AedpHeader")
            .field("cipher", &self.cipher)
            .field("aead", &self.aead)
            .field("chunk_size_byte", &self.chunk_size_byte)
            .field("iv", &hex::encode(&self.iv))
            .finish()
    }
}

impl AedpHeader {
    pub fn encoded_len(&self) -> usize {
        4 + self.iv.len()
    }
}

/// Encrypted body: fully buffered, or a byte stream consumed once.
pub enum Payload {
    Buffered(Bytes),
    Stream(Box<dyn Read + Send>),
}

impl Payload {
    pub fn stream<R: Read + Send + 'static>(reader: R) -> Self {
        Payload::Stream(Box::new(reader))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Buffered(bytes) => write!(f, "Payload::Buffered({} bytes)", bytes.len()),
            Payload::Stream(_) => f.write_str("Payload::Stream"),
        }
    }
}

/// Outcome of a successful `decrypt`.
#[derive(Debug, Clone)]
pub enum Verification {
    /// Every byte was authenticated before any inner packet was produced.
    Authenticated,
    /// Streaming mode released data and then observed this failure.
    Unauthenticated(EnvelopeError),
}

impl Verification {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Verification::Authenticated)
    }

    pub fn into_result(self) -> Result<(), EnvelopeError> {
        match self {
            Verification::Authenticated => Ok(()),
            Verification::Unauthenticated(e) => Err(e),
        }
    }
}

pub(crate) fn parse_cipher(id: u8) -> Result<SymmetricAlgorithm, EnvelopeError> {
    SymmetricAlgorithm::try_from(id)
        .map_err(|_| EnvelopeError::UnsupportedAlgorithm { kind: "symmetric", id })
}

pub(crate) fn parse_aead(id: u8) -> Result<AeadAlgorithm, EnvelopeError> {
    AeadAlgorithm::try_from(id).map_err(|_| EnvelopeError::UnsupportedAlgorithm { kind: "AEAD", id })
}
