//! Wire encoding of packets and payloads: XHR (string and binary framed),
//! JSONP-wrapped XHR, and WebSocket framing.

mod jsonp;
mod websocket;
mod xhr;

pub use jsonp::Jsonp;
pub use websocket::WebSocketCodec;
pub use xhr::Xhr;

use bytes::BytesMut;

use crate::error::Result;
use crate::payload::Payload;

/// Encodes and decodes packet payloads for one transport framing.
///
pub trait Codec {
    fn encode(&self, payload: &Payload, out: &mut BytesMut) -> Result<()>;
    fn decode(&self, data: &[u8]) -> Result<Payload>;
}
