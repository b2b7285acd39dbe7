// ## 📂 File: `src/stream/legacy.rs`

//! Version 1 envelope body: CFB with a zero IV over
//!
//! ```text
//! prefix(block + 2) ‖ plaintext ‖ 0xD3 0x14 ‖ SHA-1(everything before the digest)
//! ```
//!
//! The prefix is `block` random bytes followed by a repeat of the last two.
//! Decryption verifies the digest in constant time before any plaintext is
//! released. `UnverifiedMdcReader` is the opt-in streaming variant that releases
//! plaintext early and reports the integrity failure at end of input.

use std::io::{self, Read};

use bytes::Bytes;
use rand::RngCore;

use crate::constants::{MDC_DIGEST_LEN, MDC_MARKER, MDC_TRAILER_LEN};
use crate::crypto::{compute_mdc, mdc_matches, CfbDecryptor, CfbEncryptor, MdcHasher, SymmetricAlgorithm};
use crate::stream::engine::check_session_key;
use crate::types::EnvelopeError;

const READ_BUF_LEN: usize = 64 * 1024;

fn prefix_len(cipher: SymmetricAlgorithm) -> usize {
    cipher.block_size() + 2
}

fn too_short() -> EnvelopeError {
    EnvelopeError::MalformedPacket("encrypted payload shorter than prefix and trailer".into())
}

/// Encrypt `plaintext` into a version 1 envelope body.
pub fn encrypt_legacy(
    cipher: SymmetricAlgorithm,
    session_key: &[u8],
    plaintext: &[u8],
) -> Result<Bytes, EnvelopeError> {
    check_session_key(cipher, session_key)?;
    let block = cipher.block_size();

    let mut data = Vec::with_capacity(prefix_len(cipher) + plaintext.len() + MDC_TRAILER_LEN);
    data.resize(block, 0);
    rand::thread_rng().fill_bytes(&mut data[..block]);
    let repeat = [data[block - 2], data[block - 1]];
    data.extend_from_slice(&repeat);
    data.extend_from_slice(plaintext);
    data.extend_from_slice(&MDC_MARKER);

    let digest = compute_mdc(&data);
    data.extend_from_slice(&digest);

    CfbEncryptor::new(cipher, session_key)?.encrypt(&mut data);
    Ok(Bytes::from(data))
}

/// Decrypt and verify a buffered version 1 envelope body.
pub fn decrypt_legacy(
    cipher: SymmetricAlgorithm,
    session_key: &[u8],
    ciphertext: &[u8],
) -> Result<Bytes, EnvelopeError> {
    check_session_key(cipher, session_key)?;
    if ciphertext.len() < prefix_len(cipher) + MDC_TRAILER_LEN {
        return Err(too_short());
    }

    let mut data = ciphertext.to_vec();
    CfbDecryptor::new(cipher, session_key)?.decrypt(&mut data);

    let (hashed, digest) = data.split_at(data.len() - MDC_DIGEST_LEN);
    let expected = compute_mdc(hashed);
    let marker_ok = hashed[hashed.len() - MDC_MARKER.len()..] == MDC_MARKER;

    if !(mdc_matches(&expected, digest) & marker_ok) {
        tracing::warn!(len = ciphertext.len(), "legacy envelope failed integrity check");
        return Err(EnvelopeError::IntegrityFailure);
    }

    let start = prefix_len(cipher);
    let end = data.len() - MDC_TRAILER_LEN;
    Ok(Bytes::from(data).slice(start..end))
}

/// Streaming decryptor that yields plaintext before the trailer is checked.
///
/// The last 22 decrypted bytes are always held back; at end of input they are
/// checked as marker + digest and a mismatch surfaces as an `io::Error` wrapping
/// `EnvelopeError::IntegrityFailure`.
pub struct UnverifiedMdcReader<R> {
    inner: R,
    decryptor: CfbDecryptor,
    hasher: MdcHasher,
    skip: usize,
    tail: Vec<u8>,
    ready: Bytes,
    finished: bool,
}

impl<R: Read> UnverifiedMdcReader<R> {
    pub fn new(cipher: SymmetricAlgorithm, session_key: &[u8], inner: R) -> Result<Self, EnvelopeError> {
        check_session_key(cipher, session_key)?;
        Ok(Self {
            inner,
            decryptor: CfbDecryptor::new(cipher, session_key)?,
            hasher: MdcHasher::new(),
            skip: prefix_len(cipher),
            tail: Vec::with_capacity(READ_BUF_LEN + MDC_TRAILER_LEN),
            ready: Bytes::new(),
            finished: false,
        })
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = vec![0u8; READ_BUF_LEN];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if n == 0 {
            return self.verify_trailer();
        }

        chunk.truncate(n);
        self.decryptor.decrypt(&mut chunk);
        self.tail.extend_from_slice(&chunk);

        if self.tail.len() > MDC_TRAILER_LEN {
            let release = self.tail.len() - MDC_TRAILER_LEN;
            let released: Vec<u8> = self.tail.drain(..release).collect();
            self.hasher.update(&released);

            let skip = self.skip.min(released.len());
            self.skip -= skip;
            self.ready = Bytes::from(released).slice(skip..);
        }
        Ok(())
    }

    fn verify_trailer(&mut self) -> io::Result<()> {
        self.finished = true;
        if self.skip > 0 || self.tail.len() < MDC_TRAILER_LEN {
            return Err(too_short().into_io());
        }

        let (marker, digest) = self.tail.split_at(MDC_MARKER.len());
        let mut hasher = std::mem::take(&mut self.hasher);
        hasher.update(marker);
        let expected = hasher.finalize();

        if !(mdc_matches(&expected, digest) & (marker == MDC_MARKER)) {
            tracing::warn!("streamed legacy envelope failed integrity check");
            return Err(EnvelopeError::IntegrityFailure.into_io());
        }
        Ok(())
    }
}

impl<R: Read> Read for UnverifiedMdcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.ready.is_empty() {
                let n = buf.len().min(self.ready.len());
                buf[..n].copy_from_slice(&self.ready.split_to(n));
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}
