//! A small async-aware "wait until idle" counter.
//!
//! The protocol relies on this in two places: a polling transport must let
//! in-flight `POST` bodies finish pushing into the receive channel before it
//! tears down ([`crate::transport::polling`]), and a session must let any
//! in-flight `Send` calls finish before it shuts down its transport
//! ([`crate::session`]). The reference implementation expressed both with a
//! Go `sync.WaitGroup`; `tokio::sync::Notify` plus an atomic counter is the
//! async-friendly equivalent, since a `WaitGroup`'s blocking `Wait()` would
//! stall the executor if used directly from async code.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

/// A cloneable handle to a shared in-flight counter.
///
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<Inner>,
}

/// Decrements the counter when dropped, waking `wait_idle` if it reaches
/// zero.
///
pub struct InFlightGuard {
    inner: Arc<Inner>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one in-flight operation. The returned guard must be held
    /// for the duration of that operation.
    ///
    pub fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);

        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Waits until no in-flight operations remain.
    ///
    pub async fn wait_idle(&self) {
        loop {
            if self.inner.count.load(Ordering::SeqCst) == 0 {
                return;
            }

            self.inner.notify.notified().await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
