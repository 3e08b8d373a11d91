//! The transport abstraction shared by the polling and WebSocket transports.

pub mod polling;
pub mod websocket;

pub use polling::Polling;
pub use websocket::WebSocket;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::http_types::{Request, Response};
use crate::packet::Packet;

pub const POLLING: &str = "polling";
pub const WEBSOCKET: &str = "websocket";

/// A predicate evaluated against the parts of an upgrade/polling request,
/// used to reject cross-origin requests before a transport does any work.
///
pub type OriginCheck = Arc<dyn Fn(&http::request::Parts) -> bool + Send + Sync>;

/// The uniform contract both transports implement.
///
/// A [`crate::Session`] owns exactly one `Transport` at a time, replacing it
/// atomically during an upgrade (see the session's upgrade handshake). The
/// replacement happens behind an `Arc<dyn Transport>` swap, and WebSocket's
/// upgrade handler needs to outlive the request that triggers it, so
/// `handle_request` takes `self: Arc<Self>` rather than `&self`.
///
#[async_trait]
pub trait Transport: Send + Sync {
    /// The transport's string identifier (`"polling"` or `"websocket"`).
    ///
    fn kind(&self) -> &'static str;

    /// The transport names this transport can upgrade to.
    ///
    fn upgrades(&self) -> &'static [&'static str];

    /// Whether the transport is currently able to send and receive.
    ///
    fn is_running(&self) -> bool;

    /// Handles one HTTP request against this transport.
    ///
    async fn handle_request(self: Arc<Self>, request: Request) -> Response;

    /// Enqueues or writes a packet to the client.
    ///
    async fn send(&self, packet: Packet) -> Result<()>;

    /// Waits for and returns the next packet from the client.
    ///
    async fn receive(&self) -> Result<Packet>;

    /// Idempotently tears down the transport, unblocking any pending
    /// `send`/`receive`/`handle_request` calls.
    ///
    async fn shutdown(&self);
}
