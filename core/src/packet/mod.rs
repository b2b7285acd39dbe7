//! packet — envelope packet types, their wire codec and inner packet lists.

pub mod types;
pub mod encode;
pub mod decode;
pub mod list;
mod payload;
pub mod seipd;
pub mod aedp;

pub use types::{AedpHeader, Payload, SeipdHeader, SeipdV2Params, Verification, ALLOWED_INNER_PACKETS};
pub use encode::{encode_aedp_header, encode_packet_header, encode_seipd_header, frame_packet};
pub use decode::{read_aedp_header, read_packet_body, read_packet_header, read_seipd_header, BodyLength};
pub use list::{AcceptAllGrammar, GrammarValidator, PacketSequence, RawPacket, RawPacketList};
pub use seipd::EnvelopeDataPacket;
pub use aedp::AeadEncryptedDataPacket;
