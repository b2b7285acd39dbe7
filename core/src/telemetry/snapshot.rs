// ## src/telemetry/snapshot.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

/// Immutable per-message telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub chunks_data: u64,
    pub chunks_final: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    pub bytes_overhead: u64,
    pub peak_reordered_chunks: u64,
    pub throughput_plaintext_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_plaintext as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            chunks_data: counters.chunks_data,
            chunks_final: counters.chunks_final,
            bytes_plaintext: counters.bytes_plaintext,
            bytes_ciphertext: counters.bytes_ciphertext,
            bytes_overhead: counters.bytes_overhead,
            peak_reordered_chunks: counters.peak_reordered,
            throughput_plaintext_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    /// Number of AEAD tags emitted or verified.
    pub fn tags(&self) -> u64 {
        self.chunks_data + self.chunks_final
    }

    /// Bytes on the wire side of the transformation.
    pub fn output_bytes(&self) -> u64 {
        self.bytes_ciphertext + self.bytes_overhead
    }
}
