// ## 📂 File: `src/stream/io.rs`

//! Chunk sources, chunk sinks and the ordered writer.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};

use crate::stream::worker::{Direction, ProcessedChunk};
use crate::telemetry::TelemetryCounters;
use crate::types::EnvelopeError;

// ================= Sources =================

/// Pull-based byte source with one level of push-back.
pub trait ChunkSource {
    /// Read up to `len` bytes. Returns fewer only at end of input.
    fn read_chunk(&mut self, len: usize) -> Result<Bytes, EnvelopeError>;

    /// Push back the tail of the most recent read so the next read starts with it.
    fn unshift(&mut self, bytes: Bytes);
}

/// Zero-copy source over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryChunkReader {
    data: Bytes,
    pos: usize,
}

impl MemoryChunkReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ChunkSource for MemoryChunkReader {
    fn read_chunk(&mut self, len: usize) -> Result<Bytes, EnvelopeError> {
        let end = self.pos + len.min(self.remaining());
        let out = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(out)
    }

    fn unshift(&mut self, bytes: Bytes) {
        debug_assert!(bytes.len() <= self.pos);
        debug_assert_eq!(&self.data[self.pos - bytes.len()..self.pos], &bytes[..]);
        self.pos -= bytes.len();
    }
}

/// Source over any `Read`, tolerant of arbitrary transport boundaries.
pub struct StreamChunkReader<R> {
    inner: R,
    pending: BytesMut,
}

impl<R: Read> StreamChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pending: BytesMut::new() }
    }
}

impl<R: Read> ChunkSource for StreamChunkReader<R> {
    fn read_chunk(&mut self, len: usize) -> Result<Bytes, EnvelopeError> {
        let take = len.min(self.pending.len());
        let mut out = self.pending.split_to(take);
        if out.len() < len {
            let rest = read_exact_or_eof(&mut self.inner, len - out.len())?;
            out.extend_from_slice(&rest);
        }
        Ok(out.freeze())
    }

    fn unshift(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        let mut joined = BytesMut::with_capacity(bytes.len() + self.pending.len());
        joined.extend_from_slice(&bytes);
        joined.extend_from_slice(&self.pending);
        self.pending = joined;
    }
}

/// Fill up to `len` bytes, stopping early only at EOF.
pub fn read_exact_or_eof<R: Read>(r: &mut R, len: usize) -> Result<Bytes, EnvelopeError> {
    let mut buf = vec![0u8; len];
    let mut off = 0;

    while off < len {
        match r.read(&mut buf[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EnvelopeError::from_io(e)),
        }
    }

    buf.truncate(off);
    Ok(Bytes::from(buf))
}

// ================= Sinks =================

/// Destination for ordered engine output.
pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Called once after the final chunk was written.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called once when processing fails; written output is not rolled back.
    fn abort(&mut self, _reason: &EnvelopeError) {}
}

impl ChunkSink for Vec<u8> {
    fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        (**self).write_chunk(chunk)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn abort(&mut self, reason: &EnvelopeError) {
        (**self).abort(reason)
    }
}

/// Adapter for plain `Write` destinations.
pub struct WriteSink<W: Write>(pub W);

impl<W: Write> WriteSink<W> {
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write> ChunkSink for WriteSink<W> {
    fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.0.write_all(&chunk)
    }

    fn close(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

// ================= Ordered writer =================

/// Re-sequences worker results so chunks reach the sink strictly in index order.
pub struct OrderedChunkWriter<'a, S: ChunkSink> {
    out: &'a mut S,
    direction: Direction,
    tag_len: usize,
    next: u64,
    pending: BTreeMap<u64, ProcessedChunk>,
    final_index: Option<u64>,
    counters: TelemetryCounters,
}

impl<'a, S: ChunkSink> OrderedChunkWriter<'a, S> {
    pub fn new(out: &'a mut S, direction: Direction, tag_len: usize) -> Self {
        Self {
            out,
            direction,
            tag_len,
            next: 0,
            pending: BTreeMap::new(),
            final_index: None,
            counters: TelemetryCounters::default(),
        }
    }

    /// Queue one result and write every chunk that is now in order.
    /// Returns how many chunks reached the sink.
    pub fn push(&mut self, chunk: ProcessedChunk) -> Result<usize, EnvelopeError> {
        if self.final_index.is_some() || chunk.index < self.next {
            return Err(EnvelopeError::Pipeline("chunk after final or duplicate chunk"));
        }
        self.pending.insert(chunk.index, chunk);
        self.counters.record_reordered(self.pending.len());
        self.flush_ready()
    }

    /// True once the final chunk reached the sink.
    pub fn is_complete(&self) -> bool {
        self.final_index.is_some()
    }

    pub fn finish(self) -> Result<TelemetryCounters, EnvelopeError> {
        if self.final_index.is_none() {
            return Err(EnvelopeError::Pipeline("stream ended before the final chunk"));
        }
        if !self.pending.is_empty() {
            return Err(EnvelopeError::Pipeline("chunks left after the final chunk"));
        }
        Ok(self.counters)
    }

    fn flush_ready(&mut self) -> Result<usize, EnvelopeError> {
        let mut written = 0;
        while let Some(chunk) = self.pending.remove(&self.next) {
            let is_final = chunk.is_final();
            self.write(chunk)?;
            written += 1;
            if is_final {
                self.final_index = Some(self.next);
                break;
            }
            self.next += 1;
        }
        Ok(written)
    }

    fn write(&mut self, chunk: ProcessedChunk) -> Result<(), EnvelopeError> {
        if chunk.is_final() {
            self.counters.add_final_chunk(self.tag_len);
        } else {
            match self.direction {
                Direction::Encrypt => self.counters.add_data_chunk(
                    chunk.input_len,
                    chunk.output.len().saturating_sub(self.tag_len),
                    self.tag_len,
                ),
                Direction::Decrypt => self.counters.add_data_chunk(
                    chunk.output.len(),
                    chunk.input_len.saturating_sub(self.tag_len),
                    self.tag_len,
                ),
            }
        }

        if !chunk.output.is_empty() {
            self.out.write_chunk(chunk.output).map_err(EnvelopeError::from_io)?;
        }
        Ok(())
    }
}
