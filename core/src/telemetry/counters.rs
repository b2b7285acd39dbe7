// ### `src/telemetry/counters.rs`

//! Mutable counters collected while a message is processed.
//! Converted into an immutable `TelemetrySnapshot` when the engine finishes.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub chunks_data: u64,
    pub chunks_final: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    /// Tags, prefixes and trailers that carry no plaintext.
    pub bytes_overhead: u64,
    /// Most results held at once waiting for an earlier chunk.
    pub peak_reordered: u64,
}

impl TelemetryCounters {
    /// Record one data chunk.
    ///
    /// - `pt_len`: plaintext bytes in the chunk
    /// - `ct_len`: ciphertext bytes excluding the tag
    /// - `tag_len`: authentication tag bytes
    pub fn add_data_chunk(&mut self, pt_len: usize, ct_len: usize, tag_len: usize) {
        self.chunks_data += 1;
        self.bytes_plaintext += pt_len as u64;
        self.bytes_ciphertext += ct_len as u64;
        self.bytes_overhead += tag_len as u64;
    }

    /// Record the final, tag-only chunk.
    pub fn add_final_chunk(&mut self, tag_len: usize) {
        self.chunks_final += 1;
        self.bytes_overhead += tag_len as u64;
    }

    /// Record a legacy (CFB + MDC) message processed in one piece.
    pub fn add_legacy(&mut self, pt_len: usize, overhead_len: usize) {
        self.chunks_data += 1;
        self.bytes_plaintext += pt_len as u64;
        self.bytes_ciphertext += (pt_len + overhead_len) as u64;
        self.bytes_overhead += overhead_len as u64;
    }

    pub fn record_reordered(&mut self, held: usize) {
        self.peak_reordered = self.peak_reordered.max(held as u64);
    }

    pub fn total_chunks(&self) -> u64 {
        self.chunks_data + self.chunks_final
    }

    pub fn merge(&mut self, other: &TelemetryCounters) {
        self.chunks_data += other.chunks_data;
        self.chunks_final += other.chunks_final;
        self.bytes_plaintext += other.bytes_plaintext;
        self.bytes_ciphertext += other.bytes_ciphertext;
        self.bytes_overhead += other.bytes_overhead;
        self.peak_reordered = self.peak_reordered.max(other.peak_reordered);
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
