// ## 📂 File: `src/packet/seipd.rs`
//! Symmetrically Encrypted Integrity Protected Data packet (tag 18).
//!
//! Version 1 bodies use CFB with a SHA-1 trailer, version 2 bodies use the
//! chunked AEAD engine under an HKDF-derived message key.
//!
//! ```text
//! v1: 0x01 ‖ CFB(prefix ‖ packets ‖ 0xD3 0x14 ‖ SHA-1)
//! v2: 0x02 ‖ cipher ‖ aead ‖ chunk size ‖ salt(32) ‖ chunks ‖ final tag
//! ```

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use rand::RngCore;

use crate::config::Config;
use crate::constants::{SALT_LEN, SEIPD_V1, SEIPD_V2};
use crate::crypto::SymmetricAlgorithm;
use crate::packet::decode::read_seipd_header;
use crate::packet::encode::encode_seipd_header;
use crate::packet::list::{AcceptAllGrammar, GrammarValidator, PacketSequence, RawPacketList};
use crate::packet::payload::{decrypt_chunked, decrypt_legacy_payload};
use crate::packet::types::{Payload, SeipdHeader, SeipdV2Params, Verification};
use crate::stream::engine::check_session_key;
use crate::stream::{encrypt_legacy, run_aead_buffered, AeadSession, Direction, ParallelismProfile};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::EnvelopeError;

#[derive(Debug)]
pub struct EnvelopeDataPacket<P = RawPacketList> {
    version: u8,
    params: Option<SeipdV2Params>,
    encrypted: Option<Payload>,
    packets: Option<P>,
}

impl<P: PacketSequence> EnvelopeDataPacket<P> {
    /// Wrap `packets` for encryption. The version follows `config.aead_protect`.
    pub fn from_packets(packets: P, config: &Config) -> Self {
        let version = if config.aead_protect { SEIPD_V2 } else { SEIPD_V1 };
        Self {
            version,
            params: None,
            encrypted: None,
            packets: Some(packets),
        }
    }

    /// Parse a buffered packet body.
    pub fn read(body: impl Into<Bytes>) -> Result<Self, EnvelopeError> {
        let body: Bytes = body.into();
        let header = read_seipd_header(&mut &body[..])?;
        let encrypted = body.slice(header.encoded_len()..);
        Ok(Self::from_header(header, Payload::Buffered(encrypted)))
    }

    /// Parse the fixed fields from `reader`; the rest stays unread until `decrypt`.
    pub fn read_stream<R: Read + Send + 'static>(mut reader: R) -> Result<Self, EnvelopeError> {
        let header = read_seipd_header(&mut reader)?;
        Ok(Self::from_header(header, Payload::stream(reader)))
    }

    fn from_header(header: SeipdHeader, encrypted: Payload) -> Self {
        tracing::debug!(version = header.version, params = ?header.params, "read envelope header");
        Self {
            version: header.version,
            params: header.params,
            encrypted: Some(encrypted),
            packets: None,
        }
    }

    fn header(&self) -> Result<SeipdHeader, EnvelopeError> {
        if self.version == SEIPD_V2 && self.params.is_none() {
            return Err(EnvelopeError::PayloadState("version 2 envelope has not been encrypted"));
        }
        Ok(SeipdHeader { version: self.version, params: self.params })
    }

    /// Serialize a buffered packet body.
    pub fn write(&self) -> Result<Bytes, EnvelopeError> {
        let header = encode_seipd_header(&self.header()?);
        match &self.encrypted {
            Some(Payload::Buffered(ciphertext)) => {
                let mut out = BytesMut::with_capacity(header.len() + ciphertext.len());
                out.extend_from_slice(&header);
                out.extend_from_slice(ciphertext);
                Ok(out.freeze())
            }
            Some(Payload::Stream(_)) => Err(EnvelopeError::PayloadState(
                "streamed payload can only be written with write_to",
            )),
            None => Err(EnvelopeError::PayloadState("no encrypted payload")),
        }
    }

    /// Serialize into `out`, consuming a streamed payload. Returns bytes written.
    pub fn write_to<W: Write>(mut self, out: &mut W) -> Result<u64, EnvelopeError> {
        let header = encode_seipd_header(&self.header()?);
        let payload = self
            .encrypted
            .take()
            .ok_or(EnvelopeError::PayloadState("no encrypted payload"))?;

        out.write_all(&header).map_err(EnvelopeError::from_io)?;
        let body_len = match payload {
            Payload::Buffered(ciphertext) => {
                out.write_all(&ciphertext).map_err(EnvelopeError::from_io)?;
                ciphertext.len() as u64
            }
            Payload::Stream(mut reader) => io::copy(&mut reader, out).map_err(EnvelopeError::from_io)?,
        };
        Ok(header.len() as u64 + body_len)
    }

    /// Encrypt the held packets under `session_key`.
    ///
    /// Version 2 draws a fresh salt on every call, so no key and nonce pair
    /// repeats across messages.
    pub fn encrypt(
        &mut self,
        cipher: SymmetricAlgorithm,
        session_key: &[u8],
        config: &Config,
    ) -> Result<TelemetrySnapshot, EnvelopeError> {
        config.validate()?;
        check_session_key(cipher, session_key)?;
        if self.encrypted.is_some() {
            return Err(EnvelopeError::PayloadState("payload already encrypted"));
        }
        let packets = self
            .packets
            .as_ref()
            .ok_or(EnvelopeError::PayloadState("no packets to encrypt"))?;
        let plaintext = packets.to_bytes()?;

        let (ciphertext, snapshot) = match self.version {
            SEIPD_V1 => {
                let mut timer = TelemetryTimer::new();
                let ciphertext = encrypt_legacy(cipher, session_key, &plaintext)?;
                timer.add_stage_time(Stage::Encrypt, timer.elapsed());
                timer.finish();

                let mut counters = TelemetryCounters::default();
                counters.add_legacy(plaintext.len(), ciphertext.len() - plaintext.len());
                (ciphertext, TelemetrySnapshot::from(&counters, &timer))
            }
            _ => {
                let mut salt = [0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                let params = SeipdV2Params {
                    cipher,
                    aead: config.preferred_aead_algorithm,
                    chunk_size_byte: config.aead_chunk_size_byte,
                    salt,
                };

                let session = AeadSession::integrity_protected(
                    params.cipher,
                    params.aead,
                    params.chunk_size_byte,
                    &params.salt,
                    session_key,
                )?;
                let result = run_aead_buffered(
                    session,
                    Direction::Encrypt,
                    Bytes::from(plaintext),
                    &ParallelismProfile::from(config),
                )?;
                self.params = Some(params);
                result
            }
        };

        tracing::debug!(
            version = self.version,
            plaintext_bytes = snapshot.bytes_plaintext,
            ciphertext_bytes = ciphertext.len(),
            "envelope encrypted"
        );
        self.encrypted = Some(Payload::Buffered(ciphertext));
        Ok(snapshot)
    }

    /// Decrypt and parse the inner packets with the default grammar.
    pub fn decrypt(
        &mut self,
        cipher: SymmetricAlgorithm,
        session_key: &[u8],
        config: &Config,
    ) -> Result<Verification, EnvelopeError> {
        self.decrypt_with(cipher, session_key, config, &mut AcceptAllGrammar)
    }

    /// Decrypt and parse the inner packets, consulting `grammar` for each one.
    ///
    /// Every argument check runs before the encrypted payload is taken, so a
    /// rejected call can be retried with corrected arguments.
    pub fn decrypt_with(
        &mut self,
        cipher: SymmetricAlgorithm,
        session_key: &[u8],
        config: &Config,
        grammar: &mut dyn GrammarValidator,
    ) -> Result<Verification, EnvelopeError> {
        config.validate()?;
        if let Some(params) = &self.params {
            if params.cipher != cipher {
                return Err(EnvelopeError::CipherMismatch { given: cipher, expected: params.cipher });
            }
        }
        check_session_key(cipher, session_key)?;

        let session = match self.version {
            SEIPD_V1 => None,
            _ => {
                let params = self.params.ok_or(EnvelopeError::PayloadState("no encrypted payload"))?;
                if params.chunk_size_byte > config.max_aead_chunk_size_byte {
                    return Err(EnvelopeError::ChunkSizeTooLarge {
                        byte: params.chunk_size_byte,
                        max: config.max_aead_chunk_size_byte,
                    });
                }
                Some(AeadSession::integrity_protected(
                    params.cipher,
                    params.aead,
                    params.chunk_size_byte,
                    &params.salt,
                    session_key,
                )?)
            }
        };

        let payload = self
            .encrypted
            .take()
            .ok_or(EnvelopeError::PayloadState("no encrypted payload"))?;

        let (packets, verification) = match session {
            None => decrypt_legacy_payload(cipher, session_key, payload, config, grammar)?,
            Some(session) => decrypt_chunked(session, payload, config, grammar)?,
        };

        tracing::debug!(
            version = self.version,
            authenticated = verification.is_authenticated(),
            "envelope decrypted"
        );
        self.packets = Some(packets);
        Ok(verification)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Version 2 parameters, set by `read` or `encrypt`.
    pub fn params(&self) -> Option<&SeipdV2Params> {
        self.params.as_ref()
    }

    pub fn packets(&self) -> Option<&P> {
        self.packets.as_ref()
    }

    pub fn take_packets(&mut self) -> Option<P> {
        self.packets.take()
    }

    pub fn encrypted(&self) -> Option<&Payload> {
        self.encrypted.as_ref()
    }
}
