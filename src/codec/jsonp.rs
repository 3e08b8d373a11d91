//! The JSONP codec: wraps the XHR codec (forcing base64 framing) inside a
//! `___eio[INDEX]("...");` callback invocation.

use bytes::BytesMut;

use super::{Codec, Xhr};
use crate::error::{Error, Result};
use crate::payload::Payload;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Encodes/decodes payloads for cross-domain polling via a `<script>` tag.
///
#[derive(Clone, Debug)]
pub struct Jsonp {
    pub index: String,
}

impl Jsonp {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }
}

impl Codec for Jsonp {
    fn encode(&self, payload: &Payload, out: &mut BytesMut) -> Result<()> {
        let delegate = Xhr { force_base64: true };
        let mut inner = BytesMut::new();
        delegate.encode(payload, &mut inner)?;

        out.extend_from_slice(b"___eio[");
        out.extend_from_slice(self.index.as_bytes());
        out.extend_from_slice(b"](\"");
        escape(&inner, out);
        out.extend_from_slice(b"\");");

        Ok(())
    }

    fn decode(&self, data: &[u8]) -> Result<Payload> {
        // The request body is `d=<value>` form encoding; skip the `d=` prefix.
        let Some(raw) = data.strip_prefix(b"d=") else {
            return Err(Error::invalid_length("invalid form data"));
        };

        let query = std::str::from_utf8(raw).map_err(|_| Error::invalid_length("invalid utf-8"))?;
        let unescaped = unescape_query(query)?;
        let unescaped = unescape_newlines(&unescaped);

        Xhr::default().decode(unescaped.as_bytes())
    }
}

fn escape(data: &[u8], out: &mut BytesMut) {
    let text = String::from_utf8_lossy(data);

    for ch in text.chars() {
        match ch {
            '\\' | '"' | '/' => {
                out.extend_from_slice(&[b'\\', ch as u8]);
            }
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{2028}' | '\u{2029}' => {
                out.extend_from_slice(b"\\u202");
                out.extend_from_slice(&[HEX[(ch as u32 & 0xF) as usize]]);
            }
            other if (other as u32) < 0x20 => {
                let code = other as u32;
                out.extend_from_slice(b"\\u00");
                out.extend_from_slice(&[HEX[((code >> 4) & 0xF) as usize]]);
                out.extend_from_slice(&[HEX[(code & 0xF) as usize]]);
            }
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

/// Mirrors `net/url.QueryUnescape`: `+` is a literal space, `%XX` is a
/// percent-encoded byte.
///
fn unescape_query(data: &str) -> Result<String> {
    let bytes = data.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| Error::invalid_length("truncated percent-encoding"))?;
                let value = std::str::from_utf8(hex)
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| Error::invalid_length("invalid percent-encoding"))?;
                out.push(value);
                i += 3;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| Error::invalid_length("invalid utf-8 after unescape"))
}

/// Reverses the JS-side escaping of newlines the client applies before
/// form-encoding its request body.
///
fn unescape_newlines(data: &str) -> String {
    data.replace("\\\\\\\\n", "\\\\n").replace("\\\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    fn encode(payload: &Payload, index: &str) -> Vec<u8> {
        let codec = Jsonp::new(index);
        let mut out = BytesMut::new();
        codec.encode(payload, &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn wraps_payload_in_callback() {
        let payload = vec![Packet::message(false, "hi")];
        let encoded = encode(&payload, "0");

        assert!(encoded.starts_with(b"___eio[0](\""));
        assert!(encoded.ends_with(b"\");"));
    }

    #[test]
    fn escapes_control_and_reserved_characters() {
        let payload = vec![Packet::message(false, "a\\b\"c/d\n")];
        let encoded = encode(&payload, "0");
        let text = String::from_utf8(encoded).unwrap();

        assert!(text.contains("a\\\\b\\\"c\\/d\\n"));
    }

    #[test]
    fn unescape_newlines_only_reverses_the_double_escaped_form() {
        // Four backslashes (what the client emits for an embedded newline,
        // having escaped `escape`'s `\n` a second time) collapse to a real
        // newline.
        assert_eq!(unescape_newlines("a\\\\\\\\nb"), "a\nb");

        // A single backslash-n is left alone, matching the ground truth.
        assert_eq!(unescape_newlines("a\\nb"), "a\\nb");
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let payload = vec![
            Packet::message(false, "hello world"),
            Packet::message(true, vec![5u8, 6, 7]),
        ];

        let codec = Jsonp::new("0");
        let mut out = BytesMut::new();
        codec.encode(&payload, &mut out).unwrap();

        // Extract the string literal body the way the client would submit it.
        let full = String::from_utf8(out.to_vec()).unwrap();
        let start = full.find('"').unwrap() + 1;
        let end = full.rfind('"').unwrap();
        let literal = &full[start..end];

        // A real client form-encodes the literal (encodeURIComponent) before
        // submitting it; percent-encoding every non-alphanumeric byte is a
        // valid (over-escaped but reversible) stand-in for that step.
        let encoded_literal =
            percent_encoding::utf8_percent_encode(literal, percent_encoding::NON_ALPHANUMERIC)
                .to_string();

        let mut form_body = b"d=".to_vec();
        form_body.extend_from_slice(encoded_literal.as_bytes());

        assert_eq!(codec.decode(&form_body).unwrap(), payload);
    }
}
