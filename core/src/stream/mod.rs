//! stream — chunked AEAD engine and the legacy CFB + MDC body codec.
//!
//! Layers:
//! - `io`: chunk sources, sinks and the ordered writer
//! - `worker`: per-chunk seal/open
//! - `engine`: reader thread, worker pool and writer wiring
//! - `pipe`: bounded push-to-pull adapter for streamed decryption
//! - `legacy`: version 1 bodies

pub mod io;
pub mod worker;
pub mod parallelism;
pub mod engine;
pub mod pipe;
pub mod legacy;

pub use io::{ChunkSink, ChunkSource, MemoryChunkReader, OrderedChunkWriter, StreamChunkReader, WriteSink};
pub use worker::{ChunkFlags, ChunkJob, ChunkWorker, Direction, ProcessedChunk};
pub use parallelism::ParallelismProfile;
pub use engine::{chunk_size_from_byte, run_aead, run_aead_buffered, AeadSession};
pub use pipe::{pipe, PipeReader, PipeWriter};
pub use legacy::{decrypt_legacy, encrypt_legacy, UnverifiedMdcReader};
