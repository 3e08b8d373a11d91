//! Server configuration.
//!
//! Grounded on `internal/config/config.go`'s defaults and via's
//! `ResponseBuilder` (a consuming, chainable builder over an immutable
//! value).

use std::sync::Arc;
use std::time::Duration;

use crate::logger::{self, SharedLogger};
use crate::transport::{OriginCheck, POLLING, WEBSOCKET};

/// Immutable runtime configuration for a [`crate::Server`].
///
/// Build one with [`ConfigBuilder`] (`Config::builder()`), or use
/// [`Config::default`] for the reference defaults.
///
#[derive(Clone)]
pub struct Config {
    pub(crate) ping_interval: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) transports: Vec<&'static str>,
    pub(crate) allow_upgrades: bool,
    pub(crate) upgrade_timeout: Duration,
    pub(crate) polling_flush_limit: usize,
    pub(crate) polling_receive_limit: usize,
    pub(crate) ws_read_buffer_size: usize,
    pub(crate) ws_write_buffer_size: usize,
    pub(crate) per_message_deflate: bool,
    pub(crate) check_origin: Option<OriginCheck>,
    pub(crate) logger: SharedLogger,
}

/// A consuming builder over [`Config`].
///
#[derive(Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder { config: Config::default() }
    }

    /// The ping interval the reference client is told to honor during the
    /// handshake.
    ///
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// How long after a missed ping a session is considered expired.
    ///
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            transports: vec![POLLING, WEBSOCKET],
            allow_upgrades: true,
            upgrade_timeout: Duration::from_secs(10),
            polling_flush_limit: 10,
            polling_receive_limit: 10,
            ws_read_buffer_size: 1024,
            ws_write_buffer_size: 1024,
            per_message_deflate: true,
            check_origin: None,
            logger: logger::default(),
        }
    }
}

impl ConfigBuilder {
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    /// The transports the server will accept, in the order advertised to
    /// the client as `upgrades` during the handshake.
    ///
    pub fn transports(mut self, transports: Vec<&'static str>) -> Self {
        self.config.transports = transports;
        self
    }

    pub fn allow_upgrades(mut self, allow: bool) -> Self {
        self.config.allow_upgrades = allow;
        self
    }

    pub fn upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.config.upgrade_timeout = timeout;
        self
    }

    pub fn polling_flush_limit(mut self, limit: usize) -> Self {
        self.config.polling_flush_limit = limit;
        self
    }

    pub fn polling_receive_limit(mut self, limit: usize) -> Self {
        self.config.polling_receive_limit = limit;
        self
    }

    pub fn ws_read_buffer_size(mut self, size: usize) -> Self {
        self.config.ws_read_buffer_size = size;
        self
    }

    pub fn ws_write_buffer_size(mut self, size: usize) -> Self {
        self.config.ws_write_buffer_size = size;
        self
    }

    pub fn per_message_deflate(mut self, enabled: bool) -> Self {
        self.config.per_message_deflate = enabled;
        self
    }

    /// Installs a predicate used to reject cross-origin polling/upgrade
    /// requests. The default allows every origin.
    ///
    pub fn check_origin<F>(mut self, check: F) -> Self
    where
        F: Fn(&http::request::Parts) -> bool + Send + Sync + 'static,
    {
        self.config.check_origin = Some(Arc::new(check));
        self
    }

    pub fn logger(mut self, logger: impl crate::logger::Logger + 'static) -> Self {
        self.config.logger = Arc::new(logger);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
