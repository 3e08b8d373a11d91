//! A single client connection: its transport, handshake, receive loop, and
//! upgrade protocol.
//!
//! Grounded on `session/session.go`, `session/handshake.go`, and
//! `session/state.go` — reworked around `Arc<dyn Transport>` swaps and
//! `tokio::sync::RwLock` instead of a single embedding mutex, since the
//! upgrade protocol needs to hold the new transport's read side open across
//! an `.await` while still letting `Send` read the old pointer concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::event::Event;
use crate::http_types::{Request, Response, error_response};
use crate::logger::{log_debug, log_warn};
use crate::packet::{Packet, PacketType};
use crate::query;
use crate::sync::InFlight;
use crate::transport::{POLLING, Polling, Transport, WEBSOCKET, WebSocket};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenPacketBody {
    sid: String,
    upgrades: Vec<&'static str>,
    ping_timeout: u64,
    ping_interval: u64,
}

/// A client connection, from handshake through close.
///
pub struct Session {
    id: String,
    config: Config,
    events: tokio::sync::mpsc::UnboundedSender<Event>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    handshake_started: AtomicBool,
    handshaked: AtomicBool,
    closed: AtomicBool,
    last_ping: StdMutex<Instant>,
    sending: InFlight,
}

impl Session {
    pub(crate) fn new(
        id: String,
        config: Config,
        events: tokio::sync::mpsc::UnboundedSender<Event>,
    ) -> Arc<Self> {
        Arc::new(Session {
            id,
            config,
            events,
            transport: RwLock::new(None),
            handshake_started: AtomicBool::new(false),
            handshaked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_ping: StdMutex::new(Instant::now()),
            sending: InFlight::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `lastPing + (pingInterval + pingTimeout) < now`, or already closed.
    ///
    pub fn expired(&self) -> bool {
        if self.is_closed() {
            return true;
        }

        let last_ping = *self.last_ping.lock().expect("last_ping mutex poisoned");
        Instant::now() > last_ping + self.config.ping_interval + self.config.ping_timeout
    }

    fn new_transport(&self, name: &str) -> Arc<dyn Transport> {
        let logger = Arc::clone(&self.config.logger);
        let origin_check = self.config.check_origin.clone();

        match name {
            POLLING => Arc::new(Polling::new(
                self.config.polling_flush_limit,
                self.config.polling_receive_limit,
                origin_check,
                logger,
            )),
            WEBSOCKET => Arc::new(WebSocket::new(
                self.config.ws_read_buffer_size,
                self.config.ws_write_buffer_size,
                self.config.per_message_deflate,
                origin_check,
                logger,
            )),
            _ => unreachable!("transport name was already validated against the configured transport list"),
        }
    }

    /// Dispatches one HTTP request belonging to this session (spec §4.5
    /// "Request dispatch").
    ///
    pub async fn handle_request(self: Arc<Self>, request: Request) -> Response {
        let params = query::parse(request.uri().query().unwrap_or(""));
        let requested = params
            .get("transport")
            .map(String::as_str)
            .unwrap_or(POLLING)
            .to_string();

        if !self.config.transports.iter().any(|name| *name == requested) {
            let error = Error::handshake_failure(format!("transport {requested} is not enabled"));
            log_warn!(self.config.logger, "session {}: {error}", self.id);
            return error_response(&error);
        }

        let existing = self.transport.read().await.clone();

        let current = match existing {
            Some(transport) => transport,
            None => {
                let transport = self.new_transport(&requested);
                *self.transport.write().await = Some(Arc::clone(&transport));
                transport
            }
        };

        if !self.handshaked.load(Ordering::SeqCst) {
            let session = Arc::clone(&self);
            tokio::spawn(async move { session.handshake().await });
        }

        if current.kind() == requested {
            current.handle_request(request).await
        } else {
            self.upgrade(current, requested, request).await
        }
    }

    async fn handshake(self: Arc<Self>) {
        if self.handshake_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(transport) = self.transport.read().await.clone() else {
            return;
        };

        let upgrades = if self.config.allow_upgrades {
            transport
                .upgrades()
                .iter()
                .copied()
                .filter(|name| self.config.transports.iter().any(|t| t == name))
                .collect()
        } else {
            Vec::new()
        };

        let body = OpenPacketBody {
            sid: self.id.clone(),
            upgrades,
            ping_timeout: self.config.ping_timeout.as_millis() as u64,
            ping_interval: self.config.ping_interval.as_millis() as u64,
        };

        let json = match serde_json::to_vec(&body) {
            Ok(json) => json,
            Err(error) => {
                log_warn!(self.config.logger, "session {}: failed to encode open packet: {error}", self.id);
                return;
            }
        };

        if let Err(error) = transport.send(Packet::open(json)).await {
            log_warn!(self.config.logger, "session {}: handshake send failed: {error}", self.id);
            return;
        }

        self.handshaked.store(true, Ordering::SeqCst);
        *self.last_ping.lock().expect("last_ping mutex poisoned") = Instant::now();

        let receiver = Arc::clone(&self);
        tokio::spawn(async move { receiver.receive_loop().await });

        let _ = self.events.send(Event::Connect { sid: self.id.clone() });
    }

    async fn receive_loop(self: Arc<Self>) {
        while !self.is_closed() {
            let Some(transport) = self.transport.read().await.clone() else {
                break;
            };

            match transport.receive().await {
                Ok(packet) => {
                    *self.last_ping.lock().expect("last_ping mutex poisoned") = Instant::now();
                    self.dispatch_packet(&transport, packet).await;
                }
                Err(error) if error.kind() == ErrorKind::Eof => {
                    if !transport.is_running() {
                        self.close("EOF").await;
                        break;
                    }
                    // The transport was swapped out from under us during an
                    // upgrade; loop around and pick up the new one.
                }
                Err(error) => {
                    log_warn!(self.config.logger, "session {}: receive error: {error}", self.id);
                }
            }
        }
    }

    async fn dispatch_packet(&self, transport: &Arc<dyn Transport>, packet: Packet) {
        match packet.kind {
            PacketType::Ping => {
                log_debug!(self.config.logger, "session {}: ping", self.id);
                let _ = transport.send(Packet::pong(packet.data)).await;
            }
            PacketType::Close => {
                self.close("close packet received").await;
            }
            PacketType::Message => {
                let _ = self.events.send(Event::Message {
                    sid: self.id.clone(),
                    binary: packet.binary,
                    data: packet.data,
                });
            }
            PacketType::Upgrade | PacketType::Noop | PacketType::Open | PacketType::Pong => {}
        }
    }

    async fn upgrade(self: Arc<Self>, old: Arc<dyn Transport>, requested: String, request: Request) -> Response {
        if !self.config.allow_upgrades || !old.upgrades().iter().any(|name| *name == requested) {
            let error = Error::upgrade_failure(format!("{requested} is not a valid upgrade from {}", old.kind()));
            log_warn!(self.config.logger, "session {}: {error}", self.id);
            return error_response(&error);
        }

        let new_transport = self.new_transport(&requested);
        let response = Arc::clone(&new_transport).handle_request(request).await;

        let session = Arc::clone(&self);
        tokio::spawn(async move { session.run_probe(old, new_transport).await });

        response
    }

    /// Reads probe packets off the newly-created transport until the client
    /// confirms the upgrade, or the probe fails and the attempt is
    /// abandoned (the session stays on its current transport).
    ///
    async fn run_probe(self: Arc<Self>, old: Arc<dyn Transport>, new_transport: Arc<dyn Transport>) {
        loop {
            let packet = match new_transport.receive().await {
                Ok(packet) => packet,
                Err(error) => {
                    log_warn!(self.config.logger, "session {}: upgrade probe failed: {error}", self.id);
                    new_transport.shutdown().await;
                    return;
                }
            };

            match packet.kind {
                PacketType::Ping if packet.data.as_ref() == b"probe" => {
                    if new_transport.send(Packet::pong("probe")).await.is_err() {
                        new_transport.shutdown().await;
                        return;
                    }

                    // Unblocks a long-poll GET stuck on the old transport so
                    // the client's upgrade commit isn't starved.
                    let _ = old.send(Packet::noop()).await;
                }
                PacketType::Upgrade => {
                    old.shutdown().await;
                    *self.transport.write().await = Some(Arc::clone(&new_transport));
                    return;
                }
                _ => continue,
            }
        }
    }

    /// Forwards a packet to the current transport, if any.
    ///
    pub async fn send(&self, packet: Packet) -> Result<()> {
        if self.is_closed() {
            return Err(Error::session_closed("session is closed"));
        }

        let guard = self.sending.enter();
        let transport = self.transport.read().await.clone();

        let result = match transport {
            Some(transport) => transport.send(packet).await,
            None => Err(Error::transport_not_running("session has no transport yet")),
        };

        drop(guard);
        result
    }

    /// Idempotently closes the session, waiting for in-flight sends to
    /// finish before tearing down the transport.
    ///
    pub async fn close(&self, reason: impl Into<String>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.sending.wait_idle().await;

        if let Some(transport) = self.transport.read().await.clone() {
            transport.shutdown().await;
        }

        let _ = self.events.send(Event::Disconnect {
            sid: self.id.clone(),
            reason: reason.into(),
        });
    }
}
