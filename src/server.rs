//! The session directory: creates sessions for unrecognized requests, routes
//! recognized ones, and sweeps expired sessions on a timer.
//!
//! Grounded on `server.go`'s `Server` (a `sync.Map` of sessions plus a
//! background `sweep` goroutine) and via's `src/lib.rs`/`src/middleware.rs`
//! for how a request-handling type is exposed as the crate's public entry
//! point.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::event::Event;
use crate::http_types::{Request, Response, empty_response};
use crate::id;
use crate::logger::log_debug;
use crate::packet::Packet;
use crate::session::Session;

/// A running engine.io server: a session directory plus the expiration
/// sweeper that keeps it from growing unbounded.
///
pub struct Server {
    config: Config,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    events: mpsc::UnboundedSender<Event>,
    sweeper: JoinHandle<()>,
}

impl Server {
    /// Builds a server and starts its background expiration sweeper. The
    /// returned receiver yields a [`Event`] for every connect, message, and
    /// disconnect across every session this server owns.
    ///
    pub fn new(config: Config) -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let server = Arc::new_cyclic(|handle: &std::sync::Weak<Server>| {
            let sweeper = tokio::spawn(sweep(handle.clone(), config.ping_interval() + config.ping_timeout()));

            Server {
                config,
                sessions: RwLock::new(HashMap::new()),
                events,
                sweeper,
            }
        });

        (server, receiver)
    }

    /// Dispatches one inbound HTTP request, creating a session when `sid` is
    /// absent and routing to the existing one otherwise.
    ///
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        let params = crate::query::parse(request.uri().query().unwrap_or(""));
        let sid = params.get("sid").cloned().unwrap_or_default();

        let session = if sid.is_empty() {
            self.create_session().await
        } else {
            match self.sessions.read().await.get(&sid).cloned() {
                Some(session) => session,
                None => {
                    log_debug!(self.config.logger, "server: unknown session {sid}");
                    return empty_response(http::StatusCode::OK);
                }
            }
        };

        session.handle_request(request).await
    }

    async fn create_session(self: &Arc<Self>) -> Arc<Session> {
        let sid = id::generate();
        let session = Session::new(sid.clone(), self.config.clone(), self.events.clone());

        self.sessions.write().await.insert(sid, Arc::clone(&session));
        session
    }

    /// Sends a message to a specific session by id.
    ///
    pub async fn send(&self, sid: &str, binary: bool, data: impl Into<bytes::Bytes>) -> Result<()> {
        let session = self
            .sessions
            .read()
            .await
            .get(sid)
            .cloned()
            .ok_or_else(|| Error::invalid_session(format!("no session with id {sid}")))?;

        session.send(Packet::message(binary, data.into())).await
    }

    /// Closes a specific session by id, if it exists.
    ///
    pub async fn close(&self, sid: &str, reason: impl Into<String>) {
        if let Some(session) = self.sessions.read().await.get(sid).cloned() {
            session.close(reason).await;
        }
    }

    /// The number of sessions currently tracked, handshaked or not.
    ///
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// Periodically removes sessions that have missed their ping window,
/// closing their transport and emitting `Disconnect`.
///
async fn sweep(server: std::sync::Weak<Server>, interval: std::time::Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(server) = server.upgrade() else {
            return;
        };

        let expired: Vec<Arc<Session>> = {
            let sessions = server.sessions.read().await;
            sessions.values().filter(|session| session.expired()).cloned().collect()
        };

        if expired.is_empty() {
            continue;
        }

        let mut sessions = server.sessions.write().await;
        for session in &expired {
            sessions.remove(session.id());
        }
        drop(sessions);

        for session in expired {
            session.close("ping timeout").await;
        }
    }
}
