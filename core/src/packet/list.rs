// ## 📂 File: `src/packet/list.rs`
//! Inner packet sequences.
//!
//! The envelope only needs to serialize its inner packets before encryption and
//! to rebuild them from decrypted bytes. `RawPacketList` keeps bodies opaque.

use std::fmt;
use std::io::Read;

use bytes::Bytes;

use crate::config::Config;
use crate::constants::packet_tags;
use crate::packet::decode::{read_packet_body, read_packet_header};
use crate::packet::encode::frame_packet;
use crate::types::EnvelopeError;

/// Message grammar hook consulted for every parsed inner packet.
pub trait GrammarValidator {
    fn record_packet(&mut self, tag: u8) -> Result<(), EnvelopeError>;

    /// Called after the last packet.
    fn record_end(&mut self) -> Result<(), EnvelopeError>;
}

/// Validator that accepts any sequence of allowed packets.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllGrammar;

impl GrammarValidator for AcceptAllGrammar {
    fn record_packet(&mut self, _tag: u8) -> Result<(), EnvelopeError> {
        Ok(())
    }

    fn record_end(&mut self) -> Result<(), EnvelopeError> {
        Ok(())
    }
}

/// Packet list carried inside an envelope.
pub trait PacketSequence: Sized {
    fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError>;

    /// Parse packets until end of input.
    ///
    /// With `delay_errors` set, a failure after at least the header stage is
    /// stored and reported by `deferred_error` instead of being returned.
    fn from_reader(
        reader: &mut dyn Read,
        allowed: &[u8],
        config: &Config,
        grammar: &mut dyn GrammarValidator,
        delay_errors: bool,
    ) -> Result<Self, EnvelopeError>;

    fn deferred_error(&self) -> Option<&EnvelopeError>;
}

/// One packet with an uninterpreted body.
#[derive(Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub tag: u8,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(tag: u8, body: impl Into<Bytes>) -> Self {
        Self { tag, body: body.into() }
    }

    /// Binary literal data packet with an empty file name and zero date.
    pub fn literal(data: &[u8]) -> Self {
        let mut body = Vec::with_capacity(6 + data.len());
        body.extend_from_slice(&[b'b', 0, 0, 0, 0, 0]);
        body.extend_from_slice(data);
        Self::new(packet_tags::LITERAL_DATA, body)
    }

    /// Payload of a literal data packet, `None` for other tags.
    pub fn literal_data(&self) -> Option<&[u8]> {
        if self.tag != packet_tags::LITERAL_DATA || self.body.len() < 2 {
            return None;
        }
        let name_len = self.body[1] as usize;
        self.body.get(2 + name_len + 4..)
    }
}

impl fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPacket {{ tag: {}, body: {} bytes }}", self.tag, self.body.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawPacketList {
    packets: Vec<RawPacket>,
    deferred: Option<EnvelopeError>,
}

impl RawPacketList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, packet: RawPacket) {
        self.packets.push(packet);
    }

    pub fn packets(&self) -> &[RawPacket] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawPacket> {
        self.packets.iter()
    }

    fn parse_into(
        &mut self,
        reader: &mut dyn Read,
        allowed: &[u8],
        grammar: &mut dyn GrammarValidator,
    ) -> Result<(), EnvelopeError> {
        while let Some((tag, len)) = read_packet_header(&mut *reader)? {
            if !allowed.contains(&tag) {
                return Err(EnvelopeError::UnexpectedPacket { tag });
            }
            grammar.record_packet(tag)?;
            let body = read_packet_body(&mut *reader, len)?;
            tracing::trace!(tag, len = body.len(), "parsed inner packet");
            self.packets.push(RawPacket::new(tag, body));
        }
        grammar.record_end()
    }
}

impl From<Vec<RawPacket>> for RawPacketList {
    fn from(packets: Vec<RawPacket>) -> Self {
        Self { packets, deferred: None }
    }
}

impl PacketSequence for RawPacketList {
    fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut out = Vec::new();
        for p in &self.packets {
            out.extend_from_slice(&frame_packet(p.tag, &[&p.body[..]])?);
        }
        Ok(out)
    }

    fn from_reader(
        reader: &mut dyn Read,
        allowed: &[u8],
        _config: &Config,
        grammar: &mut dyn GrammarValidator,
        delay_errors: bool,
    ) -> Result<Self, EnvelopeError> {
        let mut list = RawPacketList::new();
        match list.parse_into(reader, allowed, grammar) {
            Ok(()) => Ok(list),
            Err(e) if delay_errors => {
                tracing::warn!(error = %e, parsed = list.len(), "deferring inner packet error");
                list.deferred = Some(e);
                Ok(list)
            }
            Err(e) => Err(e),
        }
    }

    fn deferred_error(&self) -> Option<&EnvelopeError> {
        self.deferred.as_ref()
    }
}
