//! An ordered sequence of packets shipped in one HTTP body or WS frame.
//!

use crate::packet::Packet;

/// An ordered group of packets.
///
pub type Payload = Vec<Packet>;

/// Extension methods for [`Payload`].
///
pub trait PayloadExt {
    /// Returns `true` if the payload contains at least one binary packet.
    ///
    fn contains_binary(&self) -> bool;
}

impl PayloadExt for Payload {
    fn contains_binary(&self) -> bool {
        self.iter().any(|packet| packet.binary)
    }
}
