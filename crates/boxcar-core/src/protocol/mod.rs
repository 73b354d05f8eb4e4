//! Protocol module containing the message vocabulary and the byte codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_command, decode_inbound, encode_command, InboundBatch, ProtocolError};
pub use messages::*;
