//! The XHR/JSONP long-polling transport.
//!
//! Grounded on `transport/xhr.go` and `internal/transport/transport.go`: a
//! `GET` flushes whatever is buffered for the client, a `POST` decodes a
//! payload out of the request body and pushes its packets onto a channel the
//! session drains from. `PollingBufferFlushLimit`/`PollingBufferReceiveLimit`
//! (see `internal/config/config.go`) bound how much one `GET`/`POST` moves at
//! a time.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::{OriginCheck, Transport};
use crate::buffer::PacketBuffer;
use crate::codec::{Codec, Jsonp, Xhr};
use crate::error::{Error, Result};
use crate::http_types::{Request, Response, empty_response, text_response};
use crate::logger::{SharedLogger, log_warn};
use crate::packet::Packet;
use crate::query;
use crate::sync::InFlight;

pub struct Polling {
    origin_check: Option<OriginCheck>,
    logger: SharedLogger,
    running: AtomicBool,
    buffer: Arc<PacketBuffer>,
    receiving: InFlight,
    sender: StdMutex<Option<mpsc::Sender<Packet>>>,
    receiver: AsyncMutex<mpsc::Receiver<Packet>>,
}

impl Polling {
    pub fn new(flush_limit: usize, receive_limit: usize, origin_check: Option<OriginCheck>, logger: SharedLogger) -> Self {
        let (sender, receiver) = mpsc::channel(receive_limit);

        Polling {
            origin_check,
            logger,
            running: AtomicBool::new(true),
            buffer: Arc::new(PacketBuffer::new(flush_limit)),
            receiving: InFlight::new(),
            sender: StdMutex::new(Some(sender)),
            receiver: AsyncMutex::new(receiver),
        }
    }

    fn origin_allowed(&self, parts: &http::request::Parts) -> bool {
        match &self.origin_check {
            Some(check) => check(parts),
            None => true,
        }
    }

    /// Picks the codec named by the `j=`/`b64=` query parameters. JSONP
    /// responses are always `text/javascript`; XHR responses are
    /// `application/octet-stream` only when the payload is binary-framed
    /// (i.e. contains a binary packet and `b64` was not requested).
    ///
    fn codec_for(
        params: &std::collections::HashMap<String, String>,
    ) -> (Box<dyn Codec + Send + Sync>, &'static str) {
        match params.get("j") {
            Some(index) => (
                Box::new(Jsonp {
                    index: index.clone(),
                }),
                "text/javascript; charset=UTF-8",
            ),
            None => {
                let force_base64 = params.get("b64").map(String::as_str).unwrap_or("") != "";
                let content_type = if force_base64 {
                    "text/plain; charset=UTF-8"
                } else {
                    "application/octet-stream"
                };

                (Box::new(Xhr { force_base64 }), content_type)
            }
        }
    }

    async fn handle_get(&self, codec: Box<dyn Codec + Send + Sync>, content_type: &'static str) -> Response {
        let buffer = Arc::clone(&self.buffer);
        let payload = match tokio::task::spawn_blocking(move || buffer.flush()).await {
            Ok(payload) => payload,
            Err(error) => {
                log_warn!(self.logger, "polling: flush task panicked: {error}");
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };
        let mut body = bytes::BytesMut::new();

        if let Err(error) = codec.encode(&payload, &mut body) {
            log_warn!(self.logger, "polling: failed to encode payload: {error}");
            return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
        }

        http::Response::builder()
            .status(StatusCode::OK)
            .header(http::header::CONTENT_TYPE, content_type)
            .body(http_body_util::Full::new(body.freeze()))
            .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR))
    }

    async fn handle_post(&self, codec: Box<dyn Codec + Send + Sync>, body: bytes::Bytes) -> Response {
        let guard = self.receiving.enter();
        let payload = match codec.decode(&body) {
            Ok(payload) => payload,
            Err(error) => {
                log_warn!(self.logger, "polling: failed to decode payload: {error}");
                drop(guard);
                return text_response(StatusCode::OK, "ok");
            }
        };

        let sender = self.sender.lock().expect("sender mutex poisoned").clone();

        if let Some(sender) = sender {
            for packet in payload {
                if sender.send(packet).await.is_err() {
                    break;
                }
            }
        }

        drop(guard);
        text_response(StatusCode::OK, "ok")
    }
}

#[async_trait]
impl Transport for Polling {
    fn kind(&self) -> &'static str {
        super::POLLING
    }

    fn upgrades(&self) -> &'static [&'static str] {
        &[super::WEBSOCKET]
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn handle_request(self: std::sync::Arc<Self>, request: Request) -> Response {
        if !self.is_running() {
            return empty_response(StatusCode::OK);
        }

        let (parts, body) = request.into_parts();

        if !self.origin_allowed(&parts) {
            return empty_response(StatusCode::FORBIDDEN);
        }

        let query = parts.uri.query().unwrap_or("");
        let params = query::parse(query);
        let (codec, content_type) = Self::codec_for(&params);

        match parts.method {
            Method::GET => self.handle_get(codec, content_type).await,
            Method::POST => match body.collect().await {
                Ok(collected) => self.handle_post(codec, collected.to_bytes()).await,
                Err(_) => empty_response(StatusCode::BAD_REQUEST),
            },
            _ => empty_response(StatusCode::METHOD_NOT_ALLOWED),
        }
    }

    async fn send(&self, packet: Packet) -> Result<()> {
        self.buffer.add(packet);
        Ok(())
    }

    async fn receive(&self) -> Result<Packet> {
        let mut receiver = self.receiver.lock().await;

        receiver
            .recv()
            .await
            .ok_or_else(|| Error::transport_stopped("polling transport is shut down"))
    }

    async fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.buffer.add(Packet::noop());
            self.receiving.wait_idle().await;
            self.buffer.close();
            self.sender.lock().expect("sender mutex poisoned").take();
        }
    }
}
