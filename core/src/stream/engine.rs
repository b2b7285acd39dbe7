// ## 📂 File: `src/stream/engine.rs`

//! Chunked AEAD engine.
//!
//! Wiring, per message:
//!
//! ```text
//! reader thread ──jobs──▶ N workers ──results──▶ ordered writer (caller thread) ──▶ sink
//! ```
//!
//! - The reader owns the chunk counter, the nonce builder and the AD builder;
//!   every job carries its own nonce/AD snapshot.
//! - Both channels are bounded, so a slow sink stalls the reader before its next read.
//! - The reader takes one credit per chunk and the writer returns it once the
//!   chunk reaches the sink, so at most `inflight` chunks are read but unwritten.
//!   A stalled head chunk therefore caps the reorder buffer as well.
//! - Any failure raises the abort flag and drops the channel ends; the reader
//!   stops at its next check or send and the sink is aborted with the error.
//!
//! Chunking follows the OpenPGP framing: chunk `i` is `2^(c+6)` plaintext bytes
//! sealed under nonce `i`, and a final tag-only chunk authenticates the total
//! plaintext length. The first chunk is always emitted, even when empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};

use crate::constants::{CHUNK_SIZE_SHIFT, MAX_CHUNK_SIZE_BYTE, SALT_LEN};
use crate::crypto::{
    derive_message_keys, AadFamily, AeadAlgorithm, AeadImpl, AssociatedData, ChunkNonce,
    NonceSchedule, SymmetricAlgorithm,
};
use crate::stream::io::{ChunkSink, ChunkSource, MemoryChunkReader, OrderedChunkWriter};
use crate::stream::parallelism::ParallelismProfile;
use crate::stream::worker::{ChunkFlags, ChunkJob, ChunkResult, ChunkWorker, Direction};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::EnvelopeError;

/// Plaintext bytes per chunk for a chunk size byte.
pub fn chunk_size_from_byte(chunk_size_byte: u8) -> Result<usize, EnvelopeError> {
    if chunk_size_byte > MAX_CHUNK_SIZE_BYTE {
        return Err(EnvelopeError::ChunkSizeTooLarge {
            byte: chunk_size_byte,
            max: MAX_CHUNK_SIZE_BYTE,
        });
    }
    Ok(1usize << (chunk_size_byte as u32 + CHUNK_SIZE_SHIFT))
}

pub(crate) fn check_session_key(
    cipher: SymmetricAlgorithm,
    session_key: &[u8],
) -> Result<(), EnvelopeError> {
    if session_key.len() != cipher.key_size() {
        return Err(EnvelopeError::SessionKeySize {
            cipher,
            expected: cipher.key_size(),
            actual: session_key.len(),
        });
    }
    Ok(())
}

/// Keyed state for one chunked AEAD message. Never reused across messages.
#[derive(Debug)]
pub struct AeadSession {
    aead: Arc<AeadImpl>,
    nonce: ChunkNonce,
    aad: AssociatedData,
    chunk_size: usize,
}

impl AeadSession {
    /// Version 2 envelope: message key and IV derived with HKDF from the session key and salt.
    pub fn integrity_protected(
        cipher: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        chunk_size_byte: u8,
        salt: &[u8; SALT_LEN],
        session_key: &[u8],
    ) -> Result<Self, EnvelopeError> {
        check_session_key(cipher, session_key)?;
        let chunk_size = chunk_size_from_byte(chunk_size_byte)?;

        let aad = AssociatedData::new(AadFamily::IntegrityProtected, cipher, mode, chunk_size_byte);
        let keys = derive_message_keys(
            session_key,
            salt,
            aad.prefix(),
            cipher.key_size(),
            mode.nonce_len(),
        )?;

        Ok(Self {
            aead: Arc::new(AeadImpl::new(cipher, mode, &keys.key)?),
            nonce: ChunkNonce::new(keys.iv, NonceSchedule::Overwrite)?,
            aad,
            chunk_size,
        })
    }

    /// AEAD Encrypted Data packet: session key used directly, index XORed into the packet IV.
    pub fn aead_encrypted(
        cipher: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        chunk_size_byte: u8,
        iv: &[u8],
        session_key: &[u8],
    ) -> Result<Self, EnvelopeError> {
        check_session_key(cipher, session_key)?;
        let chunk_size = chunk_size_from_byte(chunk_size_byte)?;
        if iv.len() != mode.nonce_len() {
            return Err(EnvelopeError::MalformedPacket(format!(
                "IV length {} does not match {:?} nonce length {}",
                iv.len(),
                mode,
                mode.nonce_len()
            )));
        }

        Ok(Self {
            aead: Arc::new(AeadImpl::new(cipher, mode, session_key)?),
            nonce: ChunkNonce::new(iv.to_vec(), NonceSchedule::Xor)?,
            aad: AssociatedData::new(AadFamily::AeadEncrypted, cipher, mode, chunk_size_byte),
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn tag_len(&self) -> usize {
        self.aead.tag_len()
    }

    fn into_parts(self, direction: Direction) -> (Arc<AeadImpl>, ChunkSchedule) {
        let trailing_len = match direction {
            Direction::Encrypt => 0,
            Direction::Decrypt => self.aead.tag_len(),
        };
        let schedule = ChunkSchedule {
            nonce: self.nonce,
            aad: self.aad,
            chunk_size: self.chunk_size,
            trailing_len,
            index: 0,
            processed: 0,
        };
        (self.aead, schedule)
    }
}

/// Reader-side counter state. Owned by exactly one thread.
struct ChunkSchedule {
    nonce: ChunkNonce,
    aad: AssociatedData,
    chunk_size: usize,
    /// Tag length when decrypting, zero when encrypting.
    trailing_len: usize,
    index: u64,
    processed: u64,
}

impl ChunkSchedule {
    fn read_len(&self) -> usize {
        self.chunk_size + 2 * self.trailing_len
    }

    fn data_job(&mut self, input: Bytes) -> Result<ChunkJob, EnvelopeError> {
        let index = self.index;
        let job = ChunkJob {
            index,
            flags: ChunkFlags::empty(),
            nonce: self.nonce.for_chunk(index),
            aad: self.aad.for_chunk(index),
            input,
        };
        let plaintext_len = job.input.len().saturating_sub(self.trailing_len) as u64;
        self.processed += plaintext_len;
        self.index = index.checked_add(1).ok_or(EnvelopeError::ChunkCounterExhausted)?;
        Ok(job)
    }

    fn final_job(&mut self, tag: Bytes) -> ChunkJob {
        ChunkJob {
            index: self.index,
            flags: ChunkFlags::FINAL_CHUNK,
            nonce: self.nonce.for_chunk(self.index),
            aad: self.aad.for_final(self.index, self.processed),
            input: tag,
        }
    }
}

/// Run one message through the engine, writing output to `sink` in chunk order.
pub fn run_aead<S, K>(
    session: AeadSession,
    direction: Direction,
    mut source: S,
    mut sink: K,
    profile: &ParallelismProfile,
) -> Result<TelemetrySnapshot, EnvelopeError>
where
    S: ChunkSource + Send,
    K: ChunkSink,
{
    let mut timer = TelemetryTimer::new();
    let tag_len = session.tag_len();
    let inflight = profile.inflight_chunks(session.chunk_size() + tag_len);
    let workers = profile.workers.max(1);
    let abort = AtomicBool::new(false);

    tracing::debug!(
        ?direction,
        chunk_size = session.chunk_size(),
        workers,
        inflight,
        "starting chunked AEAD run"
    );

    let (aead, schedule) = session.into_parts(direction);

    // ---- Channels ----
    let (job_tx, job_rx) = bounded::<ChunkJob>(inflight);
    let (out_tx, out_rx) = bounded::<ChunkResult>(inflight);
    let (credit_tx, credit_rx) = bounded::<()>(inflight);
    for _ in 0..inflight {
        credit_tx
            .try_send(())
            .map_err(|_| EnvelopeError::Pipeline("credit channel rejected initial credits"))?;
    }

    let (read_result, write_result) = thread::scope(|scope| {
        // ---- Reader thread ----
        let source = &mut source;
        let abort_flag = &abort;
        let reader = scope.spawn(move || {
            let start = Instant::now();
            let result = dispatch_chunks(schedule, source, job_tx, credit_rx, abort_flag);
            (result, start.elapsed())
        });

        // ---- Workers ----
        for i in 0..workers {
            let worker = ChunkWorker::new(Arc::clone(&aead), direction);
            let rx = job_rx.clone();
            let tx = out_tx.clone();
            scope.spawn(move || {
                tracing::trace!(worker = i, "chunk worker started");
                worker.run(rx, tx);
            });
        }
        drop(job_rx);
        drop(out_tx);

        // ---- Ordered writer ----
        let written = drain_ordered(out_rx, credit_tx, &mut sink, direction, tag_len, &mut timer);
        if written.is_err() {
            abort.store(true, Ordering::Release);
        }

        let read = match reader.join() {
            Ok((result, elapsed)) => {
                timer.add_stage_time(Stage::Read, elapsed);
                result
            }
            Err(_) => Err(EnvelopeError::Pipeline("chunk reader panicked")),
        };
        (read, written)
    });

    match (read_result, write_result) {
        (Err(e), _) | (Ok(()), Err(e)) => {
            tracing::warn!(error = %e, ?direction, "chunked AEAD run aborted");
            sink.abort(&e);
            Err(e)
        }
        (Ok(()), Ok(counters)) => {
            if let Err(e) = sink.close() {
                let e = EnvelopeError::from_io(e);
                tracing::warn!(error = %e, ?direction, "closing chunk sink failed");
                sink.abort(&e);
                return Err(e);
            }
            timer.finish();
            let snapshot = TelemetrySnapshot::from(&counters, &timer);
            tracing::debug!(
                ?direction,
                chunks = snapshot.tags(),
                plaintext_bytes = snapshot.bytes_plaintext,
                "chunked AEAD run finished"
            );
            Ok(snapshot)
        }
    }
}

/// Convenience wrapper for fully buffered input and output.
pub fn run_aead_buffered(
    session: AeadSession,
    direction: Direction,
    input: Bytes,
    profile: &ParallelismProfile,
) -> Result<(Bytes, TelemetrySnapshot), EnvelopeError> {
    let capacity = match direction {
        Direction::Encrypt => {
            let chunks = input.len() / session.chunk_size().max(1) + 2;
            input.len() + chunks * session.tag_len()
        }
        Direction::Decrypt => input.len(),
    };
    let mut out = Vec::with_capacity(capacity);
    let snapshot = run_aead(session, direction, MemoryChunkReader::new(input), &mut out, profile)?;
    Ok((Bytes::from(out), snapshot))
}

fn dispatch_chunks<S: ChunkSource>(
    mut schedule: ChunkSchedule,
    source: &mut S,
    jobs: Sender<ChunkJob>,
    credits: Receiver<()>,
    abort: &AtomicBool,
) -> Result<(), EnvelopeError> {
    loop {
        if credits.recv().is_err() {
            tracing::debug!(index = schedule.index, "writer gone, reader stopping");
            return Ok(());
        }
        if abort.load(Ordering::Acquire) {
            tracing::debug!(index = schedule.index, "reader observed abort");
            return Ok(());
        }

        let mut chunk = source.read_chunk(schedule.read_len())?;
        let split = chunk.len().saturating_sub(schedule.trailing_len);
        let trailing = chunk.split_off(split);

        let job = if schedule.index == 0 || !chunk.is_empty() {
            source.unshift(trailing);
            schedule.data_job(chunk)?
        } else {
            schedule.final_job(trailing)
        };

        let is_final = job.flags.contains(ChunkFlags::FINAL_CHUNK);
        if jobs.send(job).is_err() {
            tracing::debug!(index = schedule.index, "job channel closed, reader stopping");
            return Ok(());
        }
        if is_final {
            return Ok(());
        }
    }
}

fn drain_ordered<K: ChunkSink>(
    results: Receiver<ChunkResult>,
    credits: Sender<()>,
    sink: &mut K,
    direction: Direction,
    tag_len: usize,
    timer: &mut TelemetryTimer,
) -> Result<TelemetryCounters, EnvelopeError> {
    let crypto_stage = match direction {
        Direction::Encrypt => Stage::Encrypt,
        Direction::Decrypt => Stage::Decrypt,
    };
    let mut writer = OrderedChunkWriter::new(sink, direction, tag_len);

    for result in results.iter() {
        let chunk = result?;
        timer.add_stage_time(crypto_stage, chunk.elapsed);

        let start = Instant::now();
        let written = writer.push(chunk)?;
        timer.add_stage_time(Stage::Write, start.elapsed());

        // The reader may already be done; unused credits are dropped with the channel.
        for _ in 0..written {
            let _ = credits.try_send(());
        }

        if writer.is_complete() {
            break;
        }
    }

    writer.finish()
}
