//! The packet type and the typed packet record.
//!

use bytes::Bytes;

/// The seven packet types of the engine.io wire protocol.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

/// An immutable, typed unit of application data.
///
/// `binary` signals that `data` must travel on a binary-capable framing;
/// `data` may be empty (e.g. for [`PacketType::Close`] and
/// [`PacketType::Noop`]).
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub binary: bool,
    pub kind: PacketType,
    pub data: Bytes,
}

impl PacketType {
    /// The ASCII-decimal character used by string framings (`'0'..='6'`).
    ///
    pub fn to_char(self) -> u8 {
        self.to_byte() + b'0'
    }

    /// The raw numeric byte used by binary framings.
    ///
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Recovers a packet type from its character representation.
    ///
    pub fn from_char(byte: u8) -> Option<Self> {
        Self::from_byte(byte.checked_sub(b'0')?)
    }

    /// Recovers a packet type from its numeric representation.
    ///
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Open,
            1 => Self::Close,
            2 => Self::Ping,
            3 => Self::Pong,
            4 => Self::Message,
            5 => Self::Upgrade,
            6 => Self::Noop,
            _ => return None,
        })
    }
}

impl Packet {
    pub fn new(binary: bool, kind: PacketType, data: impl Into<Bytes>) -> Self {
        Self {
            binary,
            kind,
            data: data.into(),
        }
    }

    pub fn open(data: impl Into<Bytes>) -> Self {
        Self::new(false, PacketType::Open, data.into())
    }

    pub fn close() -> Self {
        Self::new(false, PacketType::Close, Bytes::new())
    }

    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(false, PacketType::Ping, data.into())
    }

    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(false, PacketType::Pong, data.into())
    }

    pub fn upgrade() -> Self {
        Self::new(false, PacketType::Upgrade, Bytes::new())
    }

    pub fn noop() -> Self {
        Self::new(false, PacketType::Noop, Bytes::new())
    }

    /// Creates a text or binary message packet depending on `binary`.
    ///
    pub fn message(binary: bool, data: impl Into<Bytes>) -> Self {
        Self::new(binary, PacketType::Message, data.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_and_byte_round_trip() {
        for byte in 0..=6u8 {
            let kind = PacketType::from_byte(byte).unwrap();
            assert_eq!(kind.to_byte(), byte);
            assert_eq!(PacketType::from_char(kind.to_char()), Some(kind));
        }
    }

    #[test]
    fn out_of_range_type_is_none() {
        assert_eq!(PacketType::from_byte(7), None);
        assert_eq!(PacketType::from_char(b'9'), None);
    }
}
