use std::io;
use std::sync::Arc;

use crate::crypto::{CryptoError, SymmetricAlgorithm};

/// Unified envelope error covering codec, integrity, crypto, pipeline and I/O failures.
/// - `From<T>` impls enable `?` across the engine and codec.
/// - `Clone` so one failure can be both returned and delivered to an aborted sink.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    /// Envelope version byte other than 1 or 2.
    #[error("unsupported envelope version: {version}")]
    UnsupportedVersion { version: u8 },

    /// Session key length does not match the cipher's key size.
    #[error("session key size mismatch for {cipher:?}: expected {expected} bytes, got {actual}")]
    SessionKeySize { cipher: SymmetricAlgorithm, expected: usize, actual: usize },

    /// Legacy SHA-1 trailer did not verify.
    #[error("modification detected")]
    IntegrityFailure,

    /// AEAD tag verification failed for a chunk (or the final tag).
    #[error("authentication failed at chunk {chunk}")]
    AuthenticationFailure { chunk: u64 },

    /// Truncated or structurally invalid packet body.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Algorithm id not in the supported registry.
    #[error("unsupported {kind} algorithm id: {id}")]
    UnsupportedAlgorithm { kind: &'static str, id: u8 },

    /// Caller's session key algorithm differs from the one recorded in the packet.
    #[error("session key algorithm {given:?} does not match packet algorithm {expected:?}")]
    CipherMismatch { given: SymmetricAlgorithm, expected: SymmetricAlgorithm },

    /// Packet chunk size exceeds the configured ceiling.
    #[error("chunk size byte {byte} exceeds the allowed maximum {max}")]
    ChunkSizeTooLarge { byte: u8, max: u8 },

    /// Decrypted inner packet is not in the allow-list.
    #[error("unexpected inner packet with tag {tag}")]
    UnexpectedPacket { tag: u8 },

    /// Rejected by the message grammar validator.
    #[error("grammar error: {0}")]
    Grammar(String),

    /// Encrypted payload absent or already present.
    #[error("invalid payload state: {0}")]
    PayloadState(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("chunk counter exhausted")]
    ChunkCounterExhausted,

    /// Pipeline wiring failure (thread or channel).
    #[error("pipeline error: {0}")]
    Pipeline(&'static str),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for EnvelopeError {
    fn from(e: io::Error) -> Self {
        Self::from_io(e)
    }
}

impl EnvelopeError {
    /// Recover a typed error that crossed a `Read` boundary, or wrap a plain I/O error.
    pub fn from_io(e: io::Error) -> Self {
        let is_envelope = e
            .get_ref()
            .map(|inner| inner.is::<EnvelopeError>())
            .unwrap_or(false);

        if is_envelope {
            if let Some(inner) = e.into_inner() {
                if let Ok(err) = inner.downcast::<EnvelopeError>() {
                    return *err;
                }
            }
            return EnvelopeError::Pipeline("lost error while unwrapping I/O error");
        }

        EnvelopeError::Io(Arc::new(e))
    }

    /// Wrap into an `io::Error` so it can travel through `Read` implementations.
    pub fn into_io(self) -> io::Error {
        match self {
            EnvelopeError::Io(e) => io::Error::new(e.kind(), EnvelopeError::Io(e)),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// True for failures that mean the ciphertext was tampered with.
    pub fn is_tamper(&self) -> bool {
        matches!(
            self,
            EnvelopeError::IntegrityFailure | EnvelopeError::AuthenticationFailure { .. }
        )
    }
}
