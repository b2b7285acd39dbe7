// ## 📂 File: `src/packet/payload.rs`
//! Payload decryption shared by both envelope packet types.
//!
//! Buffered payloads and streamed payloads without the opt-in are fully
//! authenticated before the inner packets are parsed. Streamed payloads with
//! `allow_unauthenticated_stream` are parsed while they decrypt; a failure
//! seen after data was released comes back as `Verification::Unauthenticated`.

use std::io::{self, Read};
use std::thread;

use crate::config::Config;
use crate::crypto::SymmetricAlgorithm;
use crate::packet::list::{GrammarValidator, PacketSequence};
use crate::packet::types::{Payload, Verification, ALLOWED_INNER_PACKETS};
use crate::stream::{
    decrypt_legacy, pipe, run_aead, run_aead_buffered, AeadSession, Direction, ParallelismProfile,
    StreamChunkReader, UnverifiedMdcReader,
};
use crate::types::EnvelopeError;

pub(crate) fn parse_inner<P: PacketSequence>(
    reader: &mut dyn Read,
    config: &Config,
    grammar: &mut dyn GrammarValidator,
    delay_errors: bool,
) -> Result<(P, Verification), EnvelopeError> {
    let packets = P::from_reader(&mut *reader, ALLOWED_INNER_PACKETS, config, grammar, delay_errors)?;
    if !delay_errors {
        return Ok((packets, Verification::Authenticated));
    }

    // The integrity verdict only arrives at end of input.
    let drained = io::copy(reader, &mut io::sink()).map_err(EnvelopeError::from_io);
    let deferred = packets.deferred_error().cloned();

    let verification = match (deferred, drained) {
        (_, Err(e)) if e.is_tamper() => Verification::Unauthenticated(e),
        (Some(e), _) | (None, Err(e)) => Verification::Unauthenticated(e),
        (None, Ok(_)) => Verification::Authenticated,
    };
    if let Verification::Unauthenticated(e) = &verification {
        tracing::warn!(error = %e, "released plaintext failed verification");
    }
    Ok((packets, verification))
}

/// Decrypt a chunked AEAD payload and parse its inner packets.
pub(crate) fn decrypt_chunked<P: PacketSequence>(
    session: AeadSession,
    payload: Payload,
    config: &Config,
    grammar: &mut dyn GrammarValidator,
) -> Result<(P, Verification), EnvelopeError> {
    let profile = ParallelismProfile::from(config);

    match payload {
        Payload::Buffered(bytes) => {
            let (plaintext, snapshot) = run_aead_buffered(session, Direction::Decrypt, bytes, &profile)?;
            tracing::debug!(chunks = snapshot.tags(), "buffered payload authenticated");
            parse_inner(&mut &plaintext[..], config, grammar, false)
        }
        Payload::Stream(reader) if config.allow_unauthenticated_stream => {
            let capacity = profile.inflight_chunks(session.chunk_size() + session.tag_len());
            let (writer, mut plaintext) = pipe(capacity);

            let engine = thread::Builder::new()
                .name("envelope-decrypt".into())
                .spawn(move || {
                    run_aead(session, Direction::Decrypt, StreamChunkReader::new(reader), writer, &profile)
                })
                .map_err(EnvelopeError::from_io)?;

            let parsed = parse_inner::<P>(&mut plaintext, config, grammar, true);
            // Unblocks the engine if parsing stopped before end of input.
            drop(plaintext);

            let engine_result = engine
                .join()
                .map_err(|_| EnvelopeError::Pipeline("decryption thread panicked"))?;

            let (packets, verification) = parsed?;
            match (verification, engine_result) {
                (Verification::Authenticated, Err(e)) => Ok((packets, Verification::Unauthenticated(e))),
                (verification, _) => Ok((packets, verification)),
            }
        }
        Payload::Stream(reader) => {
            let mut plaintext = Vec::new();
            run_aead(
                session,
                Direction::Decrypt,
                StreamChunkReader::new(reader),
                &mut plaintext,
                &profile,
            )?;
            parse_inner(&mut &plaintext[..], config, grammar, false)
        }
    }
}

/// Decrypt a version 1 (CFB + MDC) payload and parse its inner packets.
pub(crate) fn decrypt_legacy_payload<P: PacketSequence>(
    cipher: SymmetricAlgorithm,
    session_key: &[u8],
    payload: Payload,
    config: &Config,
    grammar: &mut dyn GrammarValidator,
) -> Result<(P, Verification), EnvelopeError> {
    match payload {
        Payload::Buffered(bytes) => {
            let plaintext = decrypt_legacy(cipher, session_key, &bytes)?;
            parse_inner(&mut &plaintext[..], config, grammar, false)
        }
        Payload::Stream(reader) if config.allow_unauthenticated_stream => {
            let mut plaintext = UnverifiedMdcReader::new(cipher, session_key, reader)?;
            parse_inner(&mut plaintext, config, grammar, true)
        }
        Payload::Stream(mut reader) => {
            let mut ciphertext = Vec::new();
            reader.read_to_end(&mut ciphertext).map_err(EnvelopeError::from_io)?;
            let plaintext = decrypt_legacy(cipher, session_key, &ciphertext)?;
            parse_inner(&mut &plaintext[..], config, grammar, false)
        }
    }
}
