//! The XHR long-polling codec: string framing (UTF-8 codepoint counted) and
//! binary framing (length-prefixed, `0xFF`-terminated), auto-detected on
//! decode.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64_engine;
use bytes::{Bytes, BytesMut};

use super::Codec;
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketType};
use crate::payload::{Payload, PayloadExt};

/// Encodes/decodes payloads for the standard (non-JSONP) long-polling
/// transport.
///
/// When `force_base64` is set, binary packets are always base64-encoded
/// inside the string framing rather than switching the whole payload to
/// binary framing — this is what the JSONP codec needs, since a JSONP
/// response body must be a single JS string literal.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct Xhr {
    pub force_base64: bool,
}

impl Codec for Xhr {
    fn encode(&self, payload: &Payload, out: &mut BytesMut) -> Result<()> {
        let binary_framing = payload.contains_binary() && !self.force_base64;

        for packet in payload {
            if binary_framing {
                encode_binary_framed(packet, out);
            } else {
                encode_string_framed(packet, out);
            }
        }

        Ok(())
    }

    fn decode(&self, data: &[u8]) -> Result<Payload> {
        if data.is_empty() {
            return Err(Error::empty_payload("empty payload"));
        }

        if data[0] == 0 || data[0] == 1 {
            decode_binary_framed(data)
        } else {
            decode_string_framed(data)
        }
    }
}

fn digits(mut value: usize) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }

    let mut out = Vec::new();

    while value > 0 {
        out.push((value % 10) as u8);
        value /= 10;
    }

    out.reverse();
    out
}

fn encode_string_framed(packet: &Packet, out: &mut BytesMut) {
    let mut body = BytesMut::new();

    if packet.binary {
        body.extend_from_slice(b"b");
        body.extend_from_slice(&[packet.kind.to_char()]);
        body.extend_from_slice(base64_engine.encode(&packet.data).as_bytes());
    } else {
        body.extend_from_slice(&[packet.kind.to_char()]);
        body.extend_from_slice(&packet.data);
    }

    let length = if packet.binary {
        body.len()
    } else {
        // The length field counts codepoints, not bytes, for text bodies.
        String::from_utf8_lossy(&body).chars().count()
    };

    out.extend_from_slice(length.to_string().as_bytes());
    out.extend_from_slice(b":");
    out.extend_from_slice(&body);
}

fn encode_binary_framed(packet: &Packet, out: &mut BytesMut) {
    out.extend_from_slice(&[if packet.binary { 1 } else { 0 }]);

    let length = packet.data.len() + 1;
    out.extend_from_slice(&digits(length));
    out.extend_from_slice(&[0xFF]);

    let type_byte = if packet.binary {
        packet.kind.to_byte()
    } else {
        packet.kind.to_char()
    };

    out.extend_from_slice(&[type_byte]);
    out.extend_from_slice(&packet.data);
}

fn decode_string_framed(data: &[u8]) -> Result<Payload> {
    // Decoding must index by codepoint, not byte, to honour the length
    // field's units. Collecting once up front keeps the indexing O(1) per
    // packet instead of O(n) per `chars().nth()` call.
    let text = std::str::from_utf8(data).map_err(|_| Error::invalid_length("invalid utf-8"))?;
    let chars: Vec<char> = text.chars().collect();

    let mut payload = Payload::new();
    let mut cursor = 0usize;

    while cursor < chars.len() {
        let start = cursor;

        while cursor < chars.len() && chars[cursor] != ':' {
            if !chars[cursor].is_ascii_digit() {
                return Err(Error::invalid_length("non-digit in length field"));
            }
            cursor += 1;
        }

        if cursor >= chars.len() {
            return Err(Error::invalid_length("missing ':' after length"));
        }

        let length_str: String = chars[start..cursor].iter().collect();

        if length_str.is_empty() {
            return Err(Error::invalid_length("empty length field"));
        }

        let length: usize = length_str
            .parse()
            .map_err(|_| Error::length_overflow("length field overflowed"))?;

        cursor += 1; // skip ':'

        if cursor + length > chars.len() {
            return Err(Error::length_overflow("stated length exceeds input"));
        }

        let body: String = chars[cursor..cursor + length].iter().collect();
        cursor += length;

        payload.push(decode_string_body(&body)?);
    }

    Ok(payload)
}

fn decode_string_body(body: &str) -> Result<Packet> {
    let mut chars = body.chars();

    let Some(first) = chars.next() else {
        return Err(Error::missing_packet_type("packet type missing"));
    };

    if first == 'b' {
        let Some(type_char) = chars.next() else {
            return Err(Error::missing_packet_type("packet type missing"));
        };

        let kind = PacketType::from_char(type_char as u8)
            .ok_or_else(|| Error::invalid_packet_type("invalid packet type"))?;

        let data = base64_engine
            .decode(chars.as_str())
            .map_err(|_| Error::invalid_base64("invalid base64"))?;

        Ok(Packet::new(true, kind, data))
    } else {
        let kind = PacketType::from_char(first as u8)
            .ok_or_else(|| Error::invalid_packet_type("invalid packet type"))?;

        Ok(Packet::new(false, kind, Bytes::copy_from_slice(chars.as_str().as_bytes())))
    }
}

fn decode_binary_framed(data: &[u8]) -> Result<Payload> {
    let mut payload = Payload::new();
    let mut cursor = 0usize;

    while cursor < data.len() {
        let indicator = data[cursor];
        let binary = indicator == 1;
        cursor += 1;

        let digits_start = cursor;

        while cursor < data.len() && data[cursor] != 0xFF {
            if data[cursor] >= 10 {
                return Err(Error::invalid_length("invalid length digit"));
            }
            cursor += 1;
        }

        if cursor >= data.len() {
            return Err(Error::invalid_length("missing 0xFF sentinel"));
        }

        if cursor == digits_start {
            return Err(Error::invalid_length("empty length field"));
        }

        let mut length: usize = 0;

        for &digit in &data[digits_start..cursor] {
            length = length
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit as usize))
                .ok_or_else(|| Error::length_overflow("length field overflowed"))?;
        }

        cursor += 1; // skip 0xFF

        if length == 0 {
            return Err(Error::missing_packet_type("packet type missing"));
        }

        if cursor + length > data.len() {
            return Err(Error::length_overflow("stated length exceeds input"));
        }

        let type_byte = data[cursor];
        let kind = if binary {
            PacketType::from_byte(type_byte)
        } else {
            PacketType::from_char(type_byte)
        }
        .ok_or_else(|| Error::invalid_packet_type("invalid packet type"))?;

        let packet_data = &data[cursor + 1..cursor + length];
        cursor += length;

        payload.push(Packet::new(binary, kind, Bytes::copy_from_slice(packet_data)));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &Payload, force_base64: bool) -> Vec<u8> {
        let codec = Xhr { force_base64 };
        let mut out = BytesMut::new();
        codec.encode(payload, &mut out).unwrap();
        out.to_vec()
    }

    fn decode(data: &[u8]) -> Result<Payload> {
        Xhr::default().decode(data)
    }

    #[test]
    fn encodes_empty_payload_as_empty_string() {
        assert_eq!(encode(&vec![], false), b"");
    }

    #[test]
    fn encodes_multibyte_string_by_codepoint_length() {
        let payload = vec![Packet::message(false, "utf\u{00c2}\u{00d6}\u{00b4} string")];
        assert_eq!(encode(&payload, false), b"12:4utf\xc3\x82\xc3\x96\xc2\xb4 string");
    }

    #[test]
    fn encodes_multiple_string_packets() {
        let payload = vec![Packet::open("hello"), Packet::message(false, "world")];
        assert_eq!(encode(&payload, false), b"6:0hello6:4world");
    }

    #[test]
    fn encodes_mixed_payload_with_binary_framing() {
        let payload = vec![
            Packet::message(true, vec![2u8, 4, 8]),
            Packet::message(false, "Hello\u{1F44B}"),
        ];

        let expected: Vec<u8> = vec![
            1, 4, 255, 4, 2, 4, 8, 0, 1, 0, 255, b'4', b'H', b'e', b'l', b'l', b'o', 0xf0, 0x9f,
            0x91, 0x8b,
        ];

        assert_eq!(encode(&payload, false), expected);
    }

    #[test]
    fn encode_force_base64_keeps_string_framing() {
        let payload = vec![Packet::message(true, vec![2u8, 4, 8])];
        assert_eq!(encode(&payload, true), b"6:b4AgQI");
    }

    #[test]
    fn decodes_multibyte_string() {
        let payload = decode("8:4hello \u{2764}".as_bytes()).unwrap();
        assert_eq!(payload, vec![Packet::message(false, "hello \u{2764}")]);
    }

    #[test]
    fn decodes_multiple_string_packets() {
        let payload = decode(b"6:4hello6:4world6:3probe").unwrap();
        assert_eq!(
            payload,
            vec![
                Packet::message(false, "hello"),
                Packet::message(false, "world"),
                Packet::pong("probe"),
            ]
        );
    }

    #[test]
    fn decodes_base64_string_framing() {
        let payload = decode(b"6:b4AgQI").unwrap();
        assert_eq!(payload, vec![Packet::message(true, vec![2u8, 4, 8])]);
    }

    #[test]
    fn decodes_close_then_binary() {
        let payload = decode(b"1:16:b4Kg==").unwrap();
        assert_eq!(payload, vec![Packet::close(), Packet::message(true, vec![42u8])]);
    }

    #[test]
    fn decodes_binary_framed_stream() {
        let data: Vec<u8> = vec![
            1, 4, 255, 4, 2, 4, 8, 0, 1, 0, 255, b'4', b'H', b'e', b'l', b'l', b'o', 0xf0, 0x9f,
            0x91, 0x8b,
        ];

        let payload = decode(&data).unwrap();

        assert_eq!(
            payload,
            vec![
                Packet::message(true, vec![2u8, 4, 8]),
                Packet::message(false, "Hello\u{1F44B}"),
            ]
        );
    }

    #[test]
    fn round_trips_arbitrary_payloads() {
        let payloads: Vec<Payload> = vec![
            vec![Packet::message(false, "plain text")],
            vec![Packet::message(true, vec![9u8, 8, 7, 6])],
            vec![
                Packet::open("{}"),
                Packet::message(true, vec![1u8, 2, 3]),
                Packet::pong("probe"),
            ],
        ];

        for payload in payloads {
            let encoded = encode(&payload, false);
            assert_eq!(decode(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn decode_rejects_invalid_length() {
        for input in [
            &b""[..],
            &b"INVALID_LENGTH:3"[..],
            &b"1:30:"[..],
            &b"6:b4AGQI0:"[..],
            &b"8:bINVALID_BASE64"[..],
            &b"1:b"[..],
        ] {
            assert!(decode(input).is_err(), "expected error for {:?}", input);
        }
    }

    #[test]
    fn decode_rejects_empty_input() {
        let err = decode(b"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EmptyPayload);
    }

    #[test]
    fn decode_rejects_malformed_binary_framing() {
        assert!(decode(&[1, 5, 255, 4]).is_err());
        assert!(decode(&[1, 0, 255]).is_err());
    }
}
