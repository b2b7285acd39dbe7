// ## 📂 File: `src/constants.rs`

/// OpenPGP packet tags used by this crate (RFC 9580 §5).
pub mod packet_tags {
    pub const SIGNATURE: u8                        = 2;
    pub const ONE_PASS_SIGNATURE: u8               = 4;
    pub const COMPRESSED_DATA: u8                  = 8;
    pub const MARKER: u8                           = 10;
    pub const LITERAL_DATA: u8                     = 11;
    pub const SYM_ENCRYPTED_INTEGRITY_PROTECTED: u8 = 18;
    pub const MODIFICATION_DETECTION_CODE: u8      = 19;
    pub const AEAD_ENCRYPTED_DATA: u8              = 20;
    pub const PADDING: u8                          = 21;
}

/// Envelope packet versions.
pub const SEIPD_V1: u8 = 1;
pub const SEIPD_V2: u8 = 2;
pub const AEAD_ENCRYPTED_V1: u8 = 1;

/// Per-message salt carried by version 2 envelopes.
pub const SALT_LEN: usize = 32;

/// Block size shared by every supported cipher.
pub const BLOCK_LEN: usize = 16;

/// AEAD tag length shared by EAX, OCB and GCM.
pub const TAG_LEN: usize = 16;

/// Width of the chunk index / length fields in associated data.
pub const COUNTER_LEN: usize = 8;

/// Legacy integrity trailer: marker packet header followed by a SHA-1 digest.
pub const MDC_DIGEST_LEN: usize = 20;
pub const MDC_MARKER: [u8; 2] = [0xC0 | packet_tags::MODIFICATION_DETECTION_CODE, MDC_DIGEST_LEN as u8];
pub const MDC_TRAILER_LEN: usize = MDC_MARKER.len() + MDC_DIGEST_LEN;

/// Chunk size is `2^(chunk_size_byte + CHUNK_SIZE_SHIFT)` plaintext bytes.
pub const CHUNK_SIZE_SHIFT: u32 = 6;

/// Largest chunk size byte permitted on the wire (4 MiB chunks).
pub const MAX_CHUNK_SIZE_BYTE: u8 = 16;

/// Defaults used when `Config` fields are absent.
pub const DEFAULT_CHUNK_SIZE_BYTE: u8 = 12; // 256 KiB
pub const DEFAULT_MAX_QUEUED_BYTES: usize = 4 * 1024 * 1024;
pub const MAX_WORKERS: usize = 64;
