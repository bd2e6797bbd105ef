//! FIFO links between agent threads.
//!
//! A link is the raw conduit underneath a channel: one sending end, one
//! receiving end, envelopes delivered in the order they were sent.
//!
//! ```text
//! Agent A                      Link                       Agent B
//!   |                            |                           |
//!   |-- send(envelope) --------->|  [FIFO, maybe bounded]    |
//!   |                            |-------------------------->|-- recv() -> envelope
//! ```
//!
//! Dropping either end disconnects the link: a blocked `recv` on the other
//! side returns [`EnvError::Disconnected`] once the buffered envelopes are
//! drained, and `send` fails immediately. This is how the failure of one
//! agent reaches the peers waiting on it.

use crate::error::EnvError;
use crate::types::Envelope;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Sending end of a link.
#[derive(Debug)]
pub struct LinkSender<T> {
    tx: Sender<Envelope<T>>,
    next_seq: u64,
}

/// Receiving end of a link.
#[derive(Debug)]
pub struct LinkReceiver<T> {
    rx: Receiver<Envelope<T>>,
}

/// Creates a link.
///
/// # Arguments
/// * `capacity` - `None` for an unbounded queue; `Some(n)` for a bounded
///   queue on which `send` blocks while `n` envelopes are in flight
///   (`Some(0)` is a rendezvous link)
pub fn link<T>(capacity: Option<usize>) -> (LinkSender<T>, LinkReceiver<T>) {
    let (tx, rx) = match capacity {
        Some(n) => channel::bounded(n),
        None => channel::unbounded(),
    };
    (LinkSender { tx, next_seq: 0 }, LinkReceiver { rx })
}

impl<T> LinkSender<T> {
    /// Emits an item, stamping it with a sequence number.
    ///
    /// # Returns
    /// * `Ok(seq)` - Envelope queued for delivery
    /// * `Err((EnvError::Disconnected, payload))` - The receiver is gone; the
    ///   payload is handed back to the caller
    ///
    /// # Blocking
    /// Blocks only on a bounded link that is full.
    pub fn send(
        &mut self,
        payload: Option<T>,
        sent_at: f64,
        propagation_delay: f64,
    ) -> Result<u64, (EnvError, Option<T>)> {
        let seq = self.next_seq;
        let envelope = Envelope::new(payload, sent_at, propagation_delay, seq);
        match self.tx.send(envelope) {
            Ok(()) => {
                self.next_seq += 1;
                Ok(seq)
            }
            Err(err) => Err((EnvError::Disconnected, err.into_inner().payload)),
        }
    }

    /// Returns the number of envelopes emitted so far.
    pub fn sent(&self) -> u64 {
        self.next_seq
    }

    /// Returns the number of envelopes waiting in the queue.
    pub fn in_flight(&self) -> usize {
        self.tx.len()
    }
}

impl<T> LinkReceiver<T> {
    /// Receives the next envelope, blocking until one is available.
    pub fn recv(&self) -> Result<Envelope<T>, EnvError> {
        self.rx.recv().map_err(|_| EnvError::Disconnected)
    }

    /// Receives the next envelope, giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Envelope<T>, EnvError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => EnvError::timeout(timeout),
            RecvTimeoutError::Disconnected => EnvError::Disconnected,
        })
    }

    /// Receives an envelope if one is already queued.
    pub fn try_recv(&self) -> Result<Option<Envelope<T>>, EnvError> {
        match self.rx.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EnvError::Disconnected),
        }
    }
}
