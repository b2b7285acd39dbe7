// ## 📂 File: `src/packet/aedp.rs`
//! AEAD Encrypted Data packet (tag 20, version 1).
//!
//! Same chunk framing as a version 2 envelope, but the session key is used
//! directly, the nonce is the packet IV with the chunk index XORed in, and the
//! associated data carries the chunk index.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use rand::RngCore;

use crate::config::Config;
use crate::crypto::SymmetricAlgorithm;
use crate::packet::decode::read_aedp_header;
use crate::packet::encode::encode_aedp_header;
use crate::packet::list::{AcceptAllGrammar, GrammarValidator, PacketSequence, RawPacketList};
use crate::packet::payload::decrypt_chunked;
use crate::packet::types::{AedpHeader, Payload, Verification};
use crate::stream::engine::check_session_key;
use crate::stream::{run_aead_buffered, AeadSession, Direction, ParallelismProfile};
use crate::telemetry::TelemetrySnapshot;
use crate::types::EnvelopeError;

#[derive(Debug)]
pub struct AeadEncryptedDataPacket<P = RawPacketList> {
    header: Option<AedpHeader>,
    encrypted: Option<Payload>,
    packets: Option<P>,
}

impl<P: PacketSequence> AeadEncryptedDataPacket<P> {
    pub fn from_packets(packets: P) -> Self {
        Self { header: None, encrypted: None, packets: Some(packets) }
    }

    pub fn read(body: impl Into<Bytes>) -> Result<Self, EnvelopeError> {
        let body: Bytes = body.into();
        let header = read_aedp_header(&mut &body[..])?;
        let encrypted = body.slice(header.encoded_len()..);
        Ok(Self { header: Some(header), encrypted: Some(Payload::Buffered(encrypted)), packets: None })
    }

    pub fn read_stream<R: Read + Send + 'static>(mut reader: R) -> Result<Self, EnvelopeError> {
        let header = read_aedp_header(&mut reader)?;
        Ok(Self { header: Some(header), encrypted: Some(Payload::stream(reader)), packets: None })
    }

    fn encoded_header(&self) -> Result<Vec<u8>, EnvelopeError> {
        self.header
            .as_ref()
            .map(encode_aedp_header)
            .ok_or(EnvelopeError::PayloadState("AEAD packet has not been encrypted"))
    }

    pub fn write(&self) -> Result<Bytes, EnvelopeError> {
        let header = self.encoded_header()?;
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

    pub fn write_to<W: Write>(mut self, out: &mut W) -> Result<u64, EnvelopeError> {
        let header = self.encoded_header()?;
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

    /// Encrypt under a fresh random IV with the configured AEAD mode and chunk size.
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

        let aead = config.preferred_aead_algorithm;
        let mut iv = vec![0u8; aead.nonce_len()];
        rand::thread_rng().fill_bytes(&mut iv);
        let header = AedpHeader { cipher, aead, chunk_size_byte: config.aead_chunk_size_byte, iv };

        let session =
            AeadSession::aead_encrypted(cipher, aead, header.chunk_size_byte, &header.iv, session_key)?;
        let (ciphertext, snapshot) = run_aead_buffered(
            session,
            Direction::Encrypt,
            Bytes::from(plaintext),
            &ParallelismProfile::from(config),
        )?;

        tracing::debug!(?aead, ciphertext_bytes = ciphertext.len(), "AEAD packet encrypted");
        self.header = Some(header);
        self.encrypted = Some(Payload::Buffered(ciphertext));
        Ok(snapshot)
    }

    pub fn decrypt(
        &mut self,
        cipher: SymmetricAlgorithm,
        session_key: &[u8],
        config: &Config,
    ) -> Result<Verification, EnvelopeError> {
        self.decrypt_with(cipher, session_key, config, &mut AcceptAllGrammar)
    }

    pub fn decrypt_with(
        &mut self,
        cipher: SymmetricAlgorithm,
        session_key: &[u8],
        config: &Config,
        grammar: &mut dyn GrammarValidator,
    ) -> Result<Verification, EnvelopeError> {
        config.validate()?;
        let header = self
            .header
            .as_ref()
            .ok_or(EnvelopeError::PayloadState("no encrypted payload"))?;
        if header.cipher != cipher {
            return Err(EnvelopeError::CipherMismatch { given: cipher, expected: header.cipher });
        }
        check_session_key(cipher, session_key)?;
        if header.chunk_size_byte > config.max_aead_chunk_size_byte {
            return Err(EnvelopeError::ChunkSizeTooLarge {
                byte: header.chunk_size_byte,
                max: config.max_aead_chunk_size_byte,
            });
        }
        let session = AeadSession::aead_encrypted(
            header.cipher,
            header.aead,
            header.chunk_size_byte,
            &header.iv,
            session_key,
        )?;

        let payload = self
            .encrypted
            .take()
            .ok_or(EnvelopeError::PayloadState("no encrypted payload"))?;
        let (packets, verification) = decrypt_chunked(session, payload, config, grammar)?;

        self.packets = Some(packets);
        Ok(verification)
    }

    pub fn header(&self) -> Option<&AedpHeader> {
        self.header.as_ref()
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
