//! Unified error type for the engine.io wire protocol.
//!

use http::StatusCode;
use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::io;

/// A type alias for a boxed `dyn Error + Send + Sync`.
///
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A type alias for `Result<T, Error>`.
///
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// The distinct ways a request, codec, transport, or session operation can
/// fail. Matching on `kind()` lets callers distinguish "drop and continue"
/// failures (codec errors) from failures that must be surfaced as an HTTP
/// status.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidLength,
    LengthOverflow,
    InvalidBase64,
    MissingPacketType,
    InvalidPacketType,
    EmptyPayload,
    MultiplePacketsPerFrame,
    TransportStopped,
    TransportNotRunning,
    UpgradeFailure,
    HandshakeFailure,
    InvalidSession,
    SessionClosed,
    Io,
    Eof,
}

/// An error that occurred somewhere in the engine.io stack.
///
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    reason: Cow<'static, str>,
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn from_source(kind: ErrorKind, reason: impl Into<Cow<'static, str>>, source: BoxError) -> Self {
        Self {
            kind,
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The HTTP status this error should be reported as, if the spec assigns
    /// one. Codec and transport-internal errors have no status: they are
    /// dropped by the caller rather than turned into a response.
    ///
    pub fn status(&self) -> Option<StatusCode> {
        match self.kind {
            ErrorKind::UpgradeFailure | ErrorKind::HandshakeFailure => {
                Some(StatusCode::BAD_REQUEST)
            }
            ErrorKind::InvalidSession => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.reason)?;

        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|error| error as _)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            return Self::new(ErrorKind::Eof, "unexpected eof");
        }

        Self::from_source(ErrorKind::Io, "io error", Box::new(error))
    }
}

macro_rules! ctor {
    ($name:ident, $kind:ident) => {
        impl Error {
            pub(crate) fn $name(reason: impl Into<Cow<'static, str>>) -> Self {
                Self::new(ErrorKind::$kind, reason)
            }
        }
    };
}

ctor!(invalid_length, InvalidLength);
ctor!(length_overflow, LengthOverflow);
ctor!(invalid_base64, InvalidBase64);
ctor!(missing_packet_type, MissingPacketType);
ctor!(invalid_packet_type, InvalidPacketType);
ctor!(empty_payload, EmptyPayload);
ctor!(multiple_packets_per_frame, MultiplePacketsPerFrame);
ctor!(transport_stopped, TransportStopped);
ctor!(transport_not_running, TransportNotRunning);
ctor!(upgrade_failure, UpgradeFailure);
ctor!(handshake_failure, HandshakeFailure);
ctor!(invalid_session, InvalidSession);
ctor!(session_closed, SessionClosed);
