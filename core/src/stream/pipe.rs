// ## 📂 File: `src/stream/pipe.rs`

//! Bounded in-process pipe: push-based `ChunkSink` on one end, `Read` on the other.
//!
//! The writer blocks when `capacity` chunks are queued. An aborted writer hands
//! its error to the reader; a writer dropped without `close` reads as a
//! truncated stream. Dropping the reader makes further writes fail with
//! `BrokenPipe`.

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use crossbeam::channel::{bounded, Receiver, Sender};

use crate::stream::io::ChunkSink;
use crate::types::EnvelopeError;

enum PipeMessage {
    Data(Bytes),
    Close,
    Abort(EnvelopeError),
}

pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        PipeWriter { tx: Some(tx) },
        PipeReader { rx, current: Bytes::new(), done: false },
    )
}

pub struct PipeWriter {
    tx: Option<Sender<PipeMessage>>,
}

impl PipeWriter {
    fn send(&mut self, msg: PipeMessage) -> io::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe already closed"))?;
        tx.send(msg)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))
    }
}

impl ChunkSink for PipeWriter {
    fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.send(PipeMessage::Data(chunk))
    }

    fn close(&mut self) -> io::Result<()> {
        self.send(PipeMessage::Close)?;
        self.tx = None;
        Ok(())
    }

    fn abort(&mut self, reason: &EnvelopeError) {
        // Reader may already be gone; nothing left to notify then.
        let _ = self.send(PipeMessage::Abort(reason.clone()));
        self.tx = None;
    }
}

pub struct PipeReader {
    rx: Receiver<PipeMessage>,
    current: Bytes,
    done: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.current.is_empty() {
                let n = buf.len().min(self.current.len());
                buf[..n].copy_from_slice(&self.current[..n]);
                self.current.advance(n);
                return Ok(n);
            }
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(PipeMessage::Data(bytes)) => self.current = bytes,
                Ok(PipeMessage::Close) => self.done = true,
                Ok(PipeMessage::Abort(err)) => {
                    self.done = true;
                    return Err(err.into_io());
                }
                Err(_) => {
                    self.done = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "pipe writer dropped before close",
                    ));
                }
            }
        }
    }
}
