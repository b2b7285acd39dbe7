//! envelope-core
//!
//! OpenPGP symmetric envelopes: version 1 (CFB + MDC) and version 2 (chunked
//! AEAD) integrity-protected data packets, the AEAD Encrypted Data packet, the
//! chunked streaming AEAD engine behind them, and CMAC.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod config;

pub mod crypto;
pub mod telemetry;

// Chunk engine and legacy body codec
pub mod stream;

// Envelope packets
pub mod packet;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crypto::{derive_mac, AeadAlgorithm, Cmac, SymmetricAlgorithm};
    pub use crate::packet::{
        AeadEncryptedDataPacket, EnvelopeDataPacket, GrammarValidator, PacketSequence, Payload,
        RawPacket, RawPacketList, Verification,
    };
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::EnvelopeError;
}
