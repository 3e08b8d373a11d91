//! The WebSocket transport.
//!
//! Grounded on `via`'s `src/ws/upgrade.rs` (the SHA-1 accept-key derivation
//! and the `hyper::upgrade::on` dance) and on `internal/transport/websocket.go`
//! (holding the read and write locks until the upgrade completes, so a
//! `Send`/`Receive` racing the handshake blocks instead of erroring).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64_engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, StatusCode, header};
use hyper_util::rt::TokioIo;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_websockets::server::Builder;
use tokio_websockets::{Config, Limits, Message as WsMessage, WebSocketStream};

#[cfg(feature = "aws-lc-rs")]
use aws_lc_rs::digest::{Context as Hasher, SHA1_FOR_LEGACY_USE_ONLY};
#[cfg(feature = "ring")]
use ring::digest::{Context as Hasher, SHA1_FOR_LEGACY_USE_ONLY};

use super::{OriginCheck, Transport};
use crate::codec::{Codec, WebSocketCodec};
use crate::error::{Error, Result};
use crate::http_types::{Request, Response, empty_response};
use crate::logger::{SharedLogger, log_warn};
use crate::packet::Packet;

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

type Socket = WebSocketStream<TokioIo<hyper::upgrade::Upgraded>>;
type Reader = SplitStream<Socket>;
type Writer = SplitSink<Socket, WsMessage>;

pub struct WebSocket {
    read_buffer_size: usize,
    write_buffer_size: usize,
    per_message_deflate: bool,
    origin_check: Option<OriginCheck>,
    logger: SharedLogger,
    running: AtomicBool,
    reader: Arc<AsyncMutex<Option<Reader>>>,
    writer: Arc<AsyncMutex<Option<Writer>>>,
    // Held from construction until the upgrade attempt finishes (whether it
    // succeeds or fails), so that a `send`/`receive` racing the handshake
    // blocks on `reader`/`writer` instead of seeing a premature error.
    reader_gate: std::sync::Mutex<Option<OwnedMutexGuard<Option<Reader>>>>,
    writer_gate: std::sync::Mutex<Option<OwnedMutexGuard<Option<Writer>>>>,
}

impl WebSocket {
    pub fn new(
        read_buffer_size: usize,
        write_buffer_size: usize,
        per_message_deflate: bool,
        origin_check: Option<OriginCheck>,
        logger: SharedLogger,
    ) -> Self {
        let reader = Arc::new(AsyncMutex::new(None));
        let writer = Arc::new(AsyncMutex::new(None));

        let reader_gate = Arc::clone(&reader)
            .try_lock_owned()
            .expect("freshly constructed mutex is uncontended");
        let writer_gate = Arc::clone(&writer)
            .try_lock_owned()
            .expect("freshly constructed mutex is uncontended");

        WebSocket {
            read_buffer_size,
            write_buffer_size,
            per_message_deflate,
            origin_check,
            logger,
            running: AtomicBool::new(false),
            reader,
            writer,
            reader_gate: std::sync::Mutex::new(Some(reader_gate)),
            writer_gate: std::sync::Mutex::new(Some(writer_gate)),
        }
    }

    fn origin_allowed(&self, parts: &http::request::Parts) -> bool {
        match &self.origin_check {
            Some(check) => check(parts),
            None => true,
        }
    }

    /// Releases the read/write gates, letting any blocked `send`/`receive`
    /// proceed against whatever (if anything) was stored behind them.
    ///
    fn open_gates(&self) {
        self.reader_gate.lock().expect("gate mutex poisoned").take();
        self.writer_gate.lock().expect("gate mutex poisoned").take();
    }

    async fn complete_upgrade(self: Arc<Self>, upgraded: hyper::upgrade::Upgraded) {
        let io = TokioIo::new(upgraded);
        let limits = Limits::default().max_payload_len(Some(self.read_buffer_size.max(self.write_buffer_size)));
        let config = Config::default().frame_size(self.write_buffer_size);
        let stream = Builder::new().config(config).limits(limits).serve(io);
        let (writer, reader) = stream.split();

        {
            let mut reader_guard = self.reader_gate.lock().expect("gate mutex poisoned");
            if let Some(guard) = reader_guard.as_mut() {
                **guard = Some(reader);
            }
        }
        {
            let mut writer_guard = self.writer_gate.lock().expect("gate mutex poisoned");
            if let Some(guard) = writer_guard.as_mut() {
                **guard = Some(writer);
            }
        }

        self.running.store(true, Ordering::SeqCst);
        self.open_gates();
    }
}

fn gen_accept_key(key: &[u8]) -> String {
    let mut hasher = Hasher::new(&SHA1_FOR_LEGACY_USE_ONLY);

    hasher.update(key);
    hasher.update(GUID);

    base64_engine.encode(hasher.finish())
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"websocket"))
}

fn version_is_supported(headers: &HeaderMap) -> bool {
    headers.get(header::SEC_WEBSOCKET_VERSION).is_some_and(|value| value == "13")
}

fn wants_deflate(headers: &HeaderMap) -> bool {
    headers
        .get(header::SEC_WEBSOCKET_EXTENSIONS)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("permessage-deflate"))
}

#[async_trait]
impl Transport for WebSocket {
    fn kind(&self) -> &'static str {
        super::WEBSOCKET
    }

    fn upgrades(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn handle_request(self: Arc<Self>, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        if !self.origin_allowed(&parts) {
            self.open_gates();
            return empty_response(StatusCode::FORBIDDEN);
        }

        if !is_websocket_upgrade(&parts.headers) {
            self.open_gates();
            return empty_response(StatusCode::BAD_REQUEST);
        }

        if !version_is_supported(&parts.headers) {
            self.open_gates();
            return empty_response(StatusCode::BAD_REQUEST);
        }

        let Some(accept) = parts
            .headers
            .get(header::SEC_WEBSOCKET_KEY)
            .map(|value| gen_accept_key(value.as_bytes()))
        else {
            self.open_gates();
            return empty_response(StatusCode::BAD_REQUEST);
        };

        let negotiate_deflate = self.per_message_deflate && wants_deflate(&parts.headers);
        let mut request = Request::from_parts(parts, body);
        let upgrade_fut = hyper::upgrade::on(&mut request);

        tokio::spawn({
            let transport = Arc::clone(&self);
            async move {
                match upgrade_fut.await {
                    Ok(upgraded) => transport.complete_upgrade(upgraded).await,
                    Err(error) => {
                        log_warn!(transport.logger, "websocket: upgrade failed: {error}");
                        transport.open_gates();
                    }
                }
            }
        });

        let mut builder = http::Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_ACCEPT, accept);

        if negotiate_deflate {
            builder = builder.header(header::SEC_WEBSOCKET_EXTENSIONS, "permessage-deflate");
        }

        builder
            .body(http_body_util::Full::new(bytes::Bytes::new()))
            .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR))
    }

    async fn send(&self, packet: Packet) -> Result<()> {
        let mut writer = self.writer.lock().await;

        let Some(socket) = writer.as_mut() else {
            return Err(Error::transport_not_running("websocket has not upgraded"));
        };

        let mut frame = bytes::BytesMut::new();
        WebSocketCodec.encode(&vec![packet.clone()], &mut frame)?;

        let message = if packet.binary {
            WsMessage::binary(frame.freeze())
        } else {
            let text = String::from_utf8(frame.to_vec())
                .map_err(|error| Error::from_source(crate::error::ErrorKind::Io, "packet data is not valid utf-8", Box::new(error)))?;
            WsMessage::text(text)
        };

        socket
            .send(message)
            .await
            .map_err(|error| Error::from_source(crate::error::ErrorKind::Io, "websocket send failed", Box::new(error)))
    }

    async fn receive(&self) -> Result<Packet> {
        let mut reader = self.reader.lock().await;

        let Some(socket) = reader.as_mut() else {
            return Err(Error::new(crate::error::ErrorKind::Eof, "websocket has not upgraded"));
        };

        match socket.next().await {
            Some(Ok(message)) => {
                let is_binary = message.is_binary();
                let data = message.into_payload();
                let mut frame = bytes::BytesMut::new();

                if is_binary {
                    frame.extend_from_slice(&[crate::packet::PacketType::Message.to_byte()]);
                } else {
                    frame.extend_from_slice(&[crate::packet::PacketType::Message.to_char()]);
                }
                frame.extend_from_slice(&data);

                let mut payload = WebSocketCodec.decode(&frame)?;

                if payload.len() != 1 {
                    return Err(Error::multiple_packets_per_frame("expected exactly one packet per frame"));
                }

                Ok(payload.remove(0))
            }
            Some(Err(error)) => {
                log_warn!(self.logger, "websocket: read failed: {error}");
                *reader = None;
                self.running.store(false, Ordering::SeqCst);
                Err(Error::new(crate::error::ErrorKind::Eof, "websocket read failed"))
            }
            None => {
                *reader = None;
                self.running.store(false, Ordering::SeqCst);
                Err(Error::new(crate::error::ErrorKind::Eof, "websocket closed"))
            }
        }
    }

    async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let mut reader = self.reader.lock().await;

        self.running.store(false, Ordering::SeqCst);

        if let Some(socket) = writer.as_mut() {
            let _ = socket.close().await;
        }

        *writer = None;
        *reader = None;
    }
}
