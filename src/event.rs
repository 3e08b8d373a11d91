//! Events the server emits as sessions connect, exchange messages, and
//! disconnect. Grounded on `event.go`'s `EventType`/`Event` pair and via's
//! `src/event.rs` `EventListener` (an event carries everything a caller
//! needs, rather than requiring a second lookup against the server).

use bytes::Bytes;

/// A notification about a session's lifecycle or traffic.
///
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// A session completed its handshake.
    Connect { sid: String },

    /// A session received a message packet from the client.
    Message { sid: String, binary: bool, data: Bytes },

    /// A session closed, carrying the reason it closed for.
    Disconnect { sid: String, reason: String },
}

impl Event {
    /// The id of the session this event concerns.
    ///
    pub fn sid(&self) -> &str {
        match self {
            Self::Connect { sid } => sid,
            Self::Message { sid, .. } => sid,
            Self::Disconnect { sid, .. } => sid,
        }
    }
}
