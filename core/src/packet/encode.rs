// ## 📂 File: `src/packet/encode.rs`
//! Packet header encoding.
//!
//! - Envelope headers are written field by field in wire order.
//! - Inner packets use new-format (RFC 9580 §4.2.1) headers.

use crate::constants::AEAD_ENCRYPTED_V1;
use crate::packet::types::{AedpHeader, SeipdHeader};
use crate::types::EnvelopeError;

fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    out.extend_from_slice(b);
}

/// Serialize the fixed fields of a tag 18 packet.
pub fn encode_seipd_header(h: &SeipdHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(h.encoded_len());
    out.push(h.version);                                 // 0      version
    if let Some(p) = &h.params {
        out.push(p.cipher.id());                         // 1      cipher
        out.push(p.aead.id());                           // 2      AEAD mode
        out.push(p.chunk_size_byte);                     // 3      chunk size byte
        put_bytes(&mut out, &p.salt);                    // 4..36  salt
    }
    debug_assert_eq!(out.len(), h.encoded_len());
    out
}

/// Serialize the fixed fields of a tag 20 packet.
pub fn encode_aedp_header(h: &AedpHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(h.encoded_len());
    out.push(AEAD_ENCRYPTED_V1);                         // 0      version
    out.push(h.cipher.id());                             // 1      cipher
    out.push(h.aead.id());                               // 2      AEAD mode
    out.push(h.chunk_size_byte);                         // 3      chunk size byte
    put_bytes(&mut out, &h.iv);                          // 4..    starting IV
    debug_assert_eq!(out.len(), h.encoded_len());
    out
}

/// New-format packet header for a body of `len` bytes.
pub fn encode_packet_header(tag: u8, len: usize) -> Result<Vec<u8>, EnvelopeError> {
    if tag > 63 {
        return Err(EnvelopeError::MalformedPacket(format!("packet tag {tag} out of range")));
    }
    let mut out = Vec::with_capacity(6);
    out.push(0xC0 | tag);
    match len {
        0..=191 => out.push(len as u8),
        192..=8383 => {
            let v = len - 192;
            out.push(((v >> 8) + 192) as u8);
            out.push((v & 0xFF) as u8);
        }
        _ => {
            let v = u32::try_from(len).map_err(|_| {
                EnvelopeError::MalformedPacket(format!("packet body of {len} bytes is too large"))
            })?;
            out.push(0xFF);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    Ok(out)
}

/// Header followed by the concatenated body parts.
pub fn frame_packet(tag: u8, body_parts: &[&[u8]]) -> Result<Vec<u8>, EnvelopeError> {
    let len: usize = body_parts.iter().map(|p| p.len()).sum();
    let mut out = encode_packet_header(tag, len)?;
    out.reserve(len);
    for part in body_parts {
        out.extend_from_slice(part);
    }
    Ok(out)
}
