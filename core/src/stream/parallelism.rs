// ## 📂 File: `src/stream/parallelism.rs`

use crate::config::Config;

/// Worker count and queue depth for one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelismProfile {
    pub workers: usize,
    /// Byte budget for chunks queued between reader, workers and writer.
    pub max_queued_bytes: usize,
}

impl ParallelismProfile {
    pub fn single_threaded() -> Self {
        Self { workers: 1, max_queued_bytes: 1 }
    }

    /// One worker per core, leaving one core to the reader and writer.
    pub fn dynamic(max_queued_bytes: usize) -> Self {
        let cores = num_cpus::get();
        Self {
            workers: cores.saturating_sub(1).max(1),
            max_queued_bytes,
        }
    }

    /// Channel capacity in chunks for a given wire chunk length. Always at least one.
    pub fn inflight_chunks(&self, chunk_wire_len: usize) -> usize {
        (self.max_queued_bytes / chunk_wire_len.max(1)).max(1)
    }
}

impl From<&Config> for ParallelismProfile {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers.max(1),
            max_queued_bytes: config.max_queued_bytes,
        }
    }
}
