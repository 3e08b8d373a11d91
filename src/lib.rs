//! A server-side implementation of the engine.io wire protocol: the packet
//! and payload encodings, the XHR/JSONP and WebSocket transports, session
//! lifecycle and upgrade handling, and the session directory that ties them
//! together behind a single [`Server::handle`] entry point.
//!
//! ```no_run
//! use engineio::{Config, Server};
//!
//! # async fn serve() {
//! let (server, mut events) = Server::new(Config::default());
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//!
//! // mount `server.handle(request)` behind your hyper-based listener
//! # }
//! ```

mod buffer;
mod codec;
mod config;
mod error;
mod event;
mod http_types;
mod id;
mod logger;
mod packet;
mod payload;
mod query;
mod server;
mod session;
mod sync;
mod transport;

pub use config::{Config, ConfigBuilder};
pub use error::{BoxError, Error, ErrorKind, Result};
pub use event::Event;
pub use http_types::{Request, Response, ResponseBody};
pub use logger::{LogCrateLogger, Logger};
pub use packet::{Packet, PacketType};
pub use payload::{Payload, PayloadExt};
pub use server::Server;
pub use transport::{POLLING, WEBSOCKET};
