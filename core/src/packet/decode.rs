// ## 📂 File: `src/packet/decode.rs`
//! Packet header decoding.
//!
//! - Readers are consumed exactly up to the end of the fixed fields, so the
//!   remaining bytes are the encrypted body.
//! - Running out of input inside a header is `MalformedPacket`.

use std::io::{self, Read};

use crate::constants::{AEAD_ENCRYPTED_V1, SALT_LEN, SEIPD_V1, SEIPD_V2};
use crate::packet::types::{parse_aead, parse_cipher, AedpHeader, SeipdHeader, SeipdV2Params};
use crate::types::EnvelopeError;

fn read_array<R: Read + ?Sized, const N: usize>(r: &mut R, what: &str) -> Result<[u8; N], EnvelopeError> {
    let mut buf = [0u8; N];
    read_exact_or_malformed(r, &mut buf, what)?;
    Ok(buf)
}

fn read_exact_or_malformed<R: Read + ?Sized>(
    r: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<(), EnvelopeError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            EnvelopeError::MalformedPacket(format!("truncated {what}"))
        } else {
            EnvelopeError::from_io(e)
        }
    })
}

/// Read the version byte and, for version 2, the algorithm fields and salt.
pub fn read_seipd_header<R: Read + ?Sized>(r: &mut R) -> Result<SeipdHeader, EnvelopeError> {
    let [version] = read_array::<_, 1>(r, "envelope version")?;
    match version {
        SEIPD_V1 => Ok(SeipdHeader { version, params: None }),
        SEIPD_V2 => {
            let [cipher, aead, chunk_size_byte] = read_array::<_, 3>(r, "envelope header")?;
            let salt = read_array::<_, SALT_LEN>(r, "envelope salt")?;
            Ok(SeipdHeader {
                version,
                params: Some(SeipdV2Params {
                    cipher: parse_cipher(cipher)?,
                    aead: parse_aead(aead)?,
                    chunk_size_byte,
                    salt,
                }),
            })
        }
        other => Err(EnvelopeError::UnsupportedVersion { version: other }),
    }
}

/// Read the fixed fields of an AEAD Encrypted Data packet.
pub fn read_aedp_header<R: Read + ?Sized>(r: &mut R) -> Result<AedpHeader, EnvelopeError> {
    let [version] = read_array::<_, 1>(r, "AEAD packet version")?;
    if version != AEAD_ENCRYPTED_V1 {
        return Err(EnvelopeError::UnsupportedVersion { version });
    }

    let [cipher, aead, chunk_size_byte] = read_array::<_, 3>(r, "AEAD packet header")?;
    let cipher = parse_cipher(cipher)?;
    let aead = parse_aead(aead)?;

    let mut iv = vec![0u8; aead.nonce_len()];
    read_exact_or_malformed(r, &mut iv, "AEAD packet IV")?;

    Ok(AedpHeader { cipher, aead, chunk_size_byte, iv })
}

/// Body length of an inner packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Definite(u32),
    /// Old-format length type 3: the body runs to end of input.
    Indeterminate,
}

/// Read one packet header. `Ok(None)` on clean end of input.
pub fn read_packet_header<R: Read + ?Sized>(r: &mut R) -> Result<Option<(u8, BodyLength)>, EnvelopeError> {
    let mut first = [0u8; 1];
    let n = loop {
        match r.read(&mut first) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EnvelopeError::from_io(e)),
        }
    };
    if n == 0 {
        return Ok(None);
    }

    let b = first[0];
    if b & 0x80 == 0 {
        return Err(EnvelopeError::MalformedPacket(format!("invalid packet header octet {b:#04x}")));
    }

    if b & 0x40 != 0 {
        // New format
        let tag = b & 0x3F;
        let [o1] = read_array::<_, 1>(r, "packet length")?;
        let len = match o1 {
            0..=191 => o1 as u32,
            192..=223 => {
                let [o2] = read_array::<_, 1>(r, "packet length")?;
                ((o1 as u32 - 192) << 8) + o2 as u32 + 192
            }
            255 => u32::from_be_bytes(read_array::<_, 4>(r, "packet length")?),
            _ => {
                return Err(EnvelopeError::MalformedPacket(
                    "partial body lengths are not supported".into(),
                ))
            }
        };
        Ok(Some((tag, BodyLength::Definite(len))))
    } else {
        // Old format
        let tag = (b >> 2) & 0x0F;
        let len = match b & 0x03 {
            0 => BodyLength::Definite(read_array::<_, 1>(r, "packet length")?[0] as u32),
            1 => BodyLength::Definite(u16::from_be_bytes(read_array::<_, 2>(r, "packet length")?) as u32),
            2 => BodyLength::Definite(u32::from_be_bytes(read_array::<_, 4>(r, "packet length")?)),
            _ => BodyLength::Indeterminate,
        };
        Ok(Some((tag, len)))
    }
}

/// Read a packet body of the given length.
pub fn read_packet_body<R: Read + ?Sized>(r: &mut R, len: BodyLength) -> Result<Vec<u8>, EnvelopeError> {
    let mut body = Vec::new();
    match len {
        BodyLength::Definite(n) => {
            Read::take(&mut *r, u64::from(n))
                .read_to_end(&mut body)
                .map_err(EnvelopeError::from_io)?;
            if body.len() != n as usize {
                return Err(EnvelopeError::MalformedPacket(format!(
                    "truncated packet body: expected {n} bytes, got {}",
                    body.len()
                )));
            }
        }
        BodyLength::Indeterminate => {
            r.read_to_end(&mut body).map_err(EnvelopeError::from_io)?;
        }
    }
    Ok(body)
}
