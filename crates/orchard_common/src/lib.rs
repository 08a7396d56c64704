//! Wire-level plumbing shared by the orchard server and its middleware
//! peers: the untyped [`WirePacket`], connection identifiers, the blanket
//! [`OrchardMessage`] trait, the [`ServiceMessage`] request/response trait,
//! and the frame codec.

pub mod messages;
pub use messages::*;

pub mod service;
pub use service::*;

pub mod codec;

pub mod error;

use serde::{Deserialize, Serialize};

use std::fmt::Debug;
use std::fmt::Display;

#[derive(Serialize, Deserialize, Clone)]
/// [`WirePacket`]s are untyped packets to be sent over the wire.
///
/// A packet carries both a human-readable channel name (for debugging) and a
/// channel hash (for matching). Receivers try to match by `channel` first and
/// fall back to `channel_hash`, which survives module refactoring on the peer.
pub struct WirePacket {
    /// Full channel name. For plain messages this is the Rust type path,
    /// for service traffic it is a `ServiceCall(..)` / `ServiceReply(..)` name.
    pub channel: String,
    /// Hash computed from the short channel name, stable across module moves.
    pub channel_hash: u64,
    /// The bincode-encoded message payload.
    pub payload: Vec<u8>,
}

impl Debug for WirePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WirePacket")
            .field("channel", &self.channel)
            .field("channel_hash", &format_args!("0x{:016x}", self.channel_hash))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[derive(Serialize, Deserialize, Hash, PartialEq, Eq, Clone, Copy, Debug)]
/// A [`ConnectionId`] denotes a single connection
pub struct ConnectionId {
    /// The key of the connection.
    pub id: u32,
}

impl ConnectionId {
    /// Represents the server's own connection ID
    pub const SERVER: Self = ConnectionId { id: 0 };

    /// Returns true if this ConnectionId represents the server
    pub fn is_server(&self) -> bool {
        self.id == Self::SERVER.id
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Connection with ID={0}", self.id))
    }
}
