//! A bounded, flushable queue coupling a packet producer and a long-poll
//! flusher.
//!
//! The original implementation this crate is derived from built this on top
//! of a buffered Go channel; here the same blocking-flush contract is
//! expressed with a [`Condvar`] guarding a plain [`VecDeque`], which is the
//! idiomatic Rust shape for "wait until a predicate holds, or until closed".

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::packet::Packet;
use crate::payload::Payload;

struct State {
    queue: VecDeque<Packet>,
    closed: bool,
}

/// A FIFO queue of packets with a bounded flush and a close signal.
///
/// Once closed, [`PacketBuffer::add`] silently drops new packets and
/// [`PacketBuffer::flush`] never blocks again — any remaining packets drain
/// on the next (and every subsequent) call.
///
pub struct PacketBuffer {
    flush_limit: usize,
    state: Mutex<State>,
    condvar: Condvar,
}

impl PacketBuffer {
    /// Creates a new buffer. `flush_limit == 0` means unlimited: a single
    /// `flush()` drains the entire queue.
    ///
    pub fn new(flush_limit: usize) -> Self {
        Self {
            flush_limit,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Appends a packet to the queue. A no-op once the buffer is closed.
    ///
    pub fn add(&self, packet: Packet) {
        let mut state = self.state.lock().unwrap();

        if state.closed {
            return;
        }

        state.queue.push_back(packet);
        self.condvar.notify_all();
    }

    /// Blocks while the queue is empty and the buffer is open; once woken
    /// (by `add` or `close`), drains up to `flush_limit` packets — or the
    /// entire queue if `flush_limit == 0` or the buffer is closed.
    ///
    pub fn flush(&self) -> Payload {
        let mut state = self.state.lock().unwrap();

        while state.queue.is_empty() && !state.closed {
            state = self.condvar.wait(state).unwrap();
        }

        let take = if self.flush_limit == 0 || state.closed {
            state.queue.len()
        } else {
            self.flush_limit.min(state.queue.len())
        };

        state.queue.drain(..take).collect()
    }

    /// Marks the buffer closed and wakes any blocked `flush`.
    ///
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();

        state.closed = true;
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}
