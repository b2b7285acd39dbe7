// ## 📂 File: `src/stream/worker.rs`

//! Chunk crypto workers. One job in, one result out; no ordering logic here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};

use crate::crypto::{AeadImpl, CryptoError};
use crate::types::EnvelopeError;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChunkFlags: u8 {
        /// Tag-only chunk authenticating the total length.
        const FINAL_CHUNK = 0b0000_0001;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Work item with nonce and associated data captured at dispatch time.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub index: u64,
    pub flags: ChunkFlags,
    pub nonce: Bytes,
    pub aad: Bytes,
    /// Plaintext when encrypting, `ciphertext || tag` when decrypting.
    pub input: Bytes,
}

#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    pub index: u64,
    pub flags: ChunkFlags,
    pub input_len: usize,
    pub output: Bytes,
    pub elapsed: Duration,
}

impl ProcessedChunk {
    pub fn is_final(&self) -> bool {
        self.flags.contains(ChunkFlags::FINAL_CHUNK)
    }
}

pub type ChunkResult = Result<ProcessedChunk, EnvelopeError>;

pub struct ChunkWorker {
    aead: Arc<AeadImpl>,
    direction: Direction,
}

impl ChunkWorker {
    pub fn new(aead: Arc<AeadImpl>, direction: Direction) -> Self {
        Self { aead, direction }
    }

    pub fn process(&self, job: ChunkJob) -> ChunkResult {
        let start = Instant::now();
        let output = match self.direction {
            Direction::Encrypt => self.aead.seal(&job.nonce, &job.aad, &job.input),
            Direction::Decrypt => self.aead.open(&job.nonce, &job.aad, &job.input),
        }
        .map_err(|e| match e {
            CryptoError::TagMismatch => EnvelopeError::AuthenticationFailure { chunk: job.index },
            other => EnvelopeError::Crypto(other),
        })?;

        tracing::trace!(
            index = job.index,
            final_chunk = job.flags.contains(ChunkFlags::FINAL_CHUNK),
            input_len = job.input.len(),
            output_len = output.len(),
            "chunk processed"
        );

        Ok(ProcessedChunk {
            index: job.index,
            flags: job.flags,
            input_len: job.input.len(),
            output: Bytes::from(output),
            elapsed: start.elapsed(),
        })
    }

    /// Drain jobs until the job channel closes or the result receiver is gone.
    pub fn run(self, rx: Receiver<ChunkJob>, tx: Sender<ChunkResult>) {
        while let Ok(job) = rx.recv() {
            let result = self.process(job);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "chunk worker failed");
            }
            if tx.send(result).is_err() {
                tracing::debug!("result receiver gone, worker exiting");
                return;
            }
        }
    }
}
