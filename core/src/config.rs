// ## 📂 File: `src/config.rs`

//! Runtime configuration consumed by the envelope codec and the chunk engine.
//!
//! Every field has a default, so partial JSON documents are accepted.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHUNK_SIZE_BYTE, DEFAULT_MAX_QUEUED_BYTES, MAX_CHUNK_SIZE_BYTE, MAX_WORKERS,
};
use crate::crypto::AeadAlgorithm;
use crate::types::EnvelopeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Produce version 2 (chunked AEAD) envelopes instead of version 1.
    pub aead_protect: bool,
    /// AEAD mode written into new version 2 envelopes.
    pub preferred_aead_algorithm: AeadAlgorithm,
    /// Chunk size byte written into new version 2 envelopes.
    pub aead_chunk_size_byte: u8,
    /// Largest chunk size byte accepted when decrypting.
    pub max_aead_chunk_size_byte: u8,
    /// Release plaintext from streamed payloads before integrity is confirmed.
    pub allow_unauthenticated_stream: bool,
    /// Crypto worker threads per message.
    pub workers: usize,
    /// Upper bound on bytes queued between reader, workers and writer.
    pub max_queued_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aead_protect: false,
            preferred_aead_algorithm: AeadAlgorithm::Gcm,
            aead_chunk_size_byte: DEFAULT_CHUNK_SIZE_BYTE,
            max_aead_chunk_size_byte: MAX_CHUNK_SIZE_BYTE,
            allow_unauthenticated_stream: false,
            workers: 1,
            max_queued_bytes: DEFAULT_MAX_QUEUED_BYTES,
        }
    }
}

impl Config {
    /// Parse a JSON document and validate it.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| EnvelopeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.max_aead_chunk_size_byte > MAX_CHUNK_SIZE_BYTE {
            return Err(EnvelopeError::InvalidConfig(format!(
                "max_aead_chunk_size_byte {} exceeds {}",
                self.max_aead_chunk_size_byte, MAX_CHUNK_SIZE_BYTE
            )));
        }
        if self.aead_chunk_size_byte > self.max_aead_chunk_size_byte {
            return Err(EnvelopeError::InvalidConfig(format!(
                "aead_chunk_size_byte {} exceeds max_aead_chunk_size_byte {}",
                self.aead_chunk_size_byte, self.max_aead_chunk_size_byte
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(EnvelopeError::InvalidConfig(format!(
                "workers must be in 1..={}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.max_queued_bytes == 0 {
            return Err(EnvelopeError::InvalidConfig("max_queued_bytes must be > 0".into()));
        }
        Ok(())
    }
}
