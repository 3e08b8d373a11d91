//! The WebSocket framing codec: one frame per packet.

use bytes::{Bytes, BytesMut};

use super::Codec;
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketType};
use crate::payload::Payload;

/// Encodes/decodes a single packet per WebSocket frame.
///
/// [`Codec::decode`] rejects any frame that does not contain exactly one
/// packet — per spec, a WS frame carrying zero or more than one packet is
/// malformed, even though the [`Codec`] trait is payload-shaped.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketCodec;

impl Codec for WebSocketCodec {
    fn encode(&self, payload: &Payload, out: &mut BytesMut) -> Result<()> {
        for packet in payload {
            let type_byte = if packet.binary {
                packet.kind.to_byte()
            } else {
                packet.kind.to_char()
            };

            out.extend_from_slice(&[type_byte]);
            out.extend_from_slice(&packet.data);
        }

        Ok(())
    }

    fn decode(&self, data: &[u8]) -> Result<Payload> {
        let Some((&type_byte, rest)) = data.split_first() else {
            return Err(Error::empty_payload("empty websocket frame"));
        };

        let binary = !type_byte.is_ascii_digit();

        let kind = if binary {
            PacketType::from_byte(type_byte)
        } else {
            PacketType::from_char(type_byte)
        }
        .ok_or_else(|| Error::invalid_packet_type("invalid packet type"))?;

        Ok(vec![Packet::new(binary, kind, Bytes::copy_from_slice(rest))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_one(packet: &Packet) -> Vec<u8> {
        let mut out = BytesMut::new();
        WebSocketCodec.encode(&vec![packet.clone()], &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn encodes_text_packet() {
        assert_eq!(encode_one(&Packet::message(false, "hello")), b"4hello");
    }

    #[test]
    fn encodes_binary_packet() {
        assert_eq!(encode_one(&Packet::message(true, vec![1u8, 2, 3])), [4, 1, 2, 3]);
    }

    #[test]
    fn decodes_text_frame() {
        let payload = WebSocketCodec.decode(b"2probe").unwrap();
        assert_eq!(payload, vec![Packet::ping("probe")]);
    }

    #[test]
    fn decodes_binary_frame() {
        let payload = WebSocketCodec.decode(&[4, 9, 9, 9]).unwrap();
        assert_eq!(payload, vec![Packet::message(true, vec![9u8, 9, 9])]);
    }

    #[test]
    fn rejects_empty_frame() {
        assert!(WebSocketCodec.decode(&[]).is_err());
    }

    #[test]
    fn round_trips_single_packets() {
        let packets = vec![
            Packet::message(false, "hello world"),
            Packet::message(true, vec![0u8, 255, 128]),
            Packet::ping("probe"),
            Packet::pong(""),
            Packet::noop(),
        ];

        for packet in packets {
            let encoded = encode_one(&packet);
            assert_eq!(WebSocketCodec.decode(&encoded).unwrap(), vec![packet]);
        }
    }
}
