//! A single peer stream presented as a connection listener
//!
//! Server code written against a listener expects `accept` to keep producing
//! connections. A [`StreamListener`] has exactly one to give: the first
//! `accept` returns it, every later `accept` fails. The one-shot hand-off is
//! a single-slot gate guarded by a mutex, so a racing `accept` and `close`
//! always resolve to one clear outcome.
//!
//! ```text
//! Pending ──offer──> Available ──accept──> Consumed
//!    │                   │                    │
//!    └───────close───────┴───────close────────┴──> Closed
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::conn::{PLACEHOLDER_ADDR, StreamConn};
use crate::error::{BridgeError, BridgeResult};
use crate::stream::PeerStream;

/// Observable listener state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Waiting for the stream to be offered
    Pending,
    /// Stream present, not yet accepted
    Available,
    /// The one connection has been handed out
    Consumed,
    /// Terminal
    Closed,
}

enum Gate<S> {
    Pending,
    Available(Arc<S>),
    Consumed(Arc<S>),
    Closed,
}

struct Shared<S> {
    gate: Mutex<Gate<S>>,
    notify: Notify,
}

impl<S: PeerStream> Shared<S> {
    fn try_accept(&self) -> Option<BridgeResult<StreamConn<S>>> {
        let mut gate = self.gate.lock();
        let stream = match &*gate {
            Gate::Pending => return None,
            Gate::Consumed(_) => return Some(Err(BridgeError::Consumed)),
            Gate::Closed => return Some(Err(BridgeError::Closed)),
            Gate::Available(stream) => Arc::clone(stream),
        };
        *gate = Gate::Consumed(Arc::clone(&stream));
        drop(gate);

        debug!(stream = %stream.id(), "Listener handed out its connection");
        Some(Ok(StreamConn::new(stream)))
    }

    fn close(&self) -> BridgeResult<()> {
        let previous = std::mem::replace(&mut *self.gate.lock(), Gate::Closed);
        self.notify.notify_waiters();

        match previous {
            Gate::Available(stream) | Gate::Consumed(stream) => {
                info!(stream = %stream.id(), "Closing bridged stream");
                stream.close()?;
            }
            Gate::Pending => debug!("Listener closed before a stream arrived"),
            Gate::Closed => {}
        }
        Ok(())
    }
}

/// Listener that yields one connection over one stream
///
/// Clones share the same gate, so one task can `close` while another is
/// blocked in `accept`.
pub struct StreamListener<S> {
    shared: Arc<Shared<S>>,
}

impl<S: PeerStream> StreamListener<S> {
    /// Listener whose stream is already established
    pub fn new(stream: S) -> Self {
        Self::from_arc(Arc::new(stream))
    }

    pub fn from_arc(stream: Arc<S>) -> Self {
        Self::with_gate(Gate::Available(stream))
    }

    /// Listener that can be served before its stream exists
    ///
    /// `accept` waits until the returned [`StreamOffer`] delivers the stream
    /// or the listener is closed. Dropping the offer unused closes the
    /// listener.
    pub fn pending() -> (Self, StreamOffer<S>) {
        let listener = Self::with_gate(Gate::Pending);
        let offer = StreamOffer {
            shared: Arc::clone(&listener.shared),
        };
        (listener, offer)
    }

    fn with_gate(gate: Gate<S>) -> Self {
        Self {
            shared: Arc::new(Shared {
                gate: Mutex::new(gate),
                notify: Notify::new(),
            }),
        }
    }

    /// Wait for the connection
    ///
    /// Succeeds at most once over the lifetime of the listener. Afterwards
    /// fails with [`BridgeError::Consumed`], or [`BridgeError::Closed`] once
    /// the listener has been closed.
    pub async fn accept(&self) -> BridgeResult<StreamConn<S>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a close between the check and the
            // await is not missed
            notified.as_mut().enable();

            if let Some(result) = self.shared.try_accept() {
                return result;
            }
            notified.await;
        }
    }

    /// Close the listener and the underlying stream
    ///
    /// Wakes every pending `accept`. Closing more than once is a no-op.
    pub fn close(&self) -> BridgeResult<()> {
        self.shared.close()
    }

    pub fn local_addr(&self) -> SocketAddr {
        PLACEHOLDER_ADDR
    }

    pub fn state(&self) -> ListenerState {
        match &*self.shared.gate.lock() {
            Gate::Pending => ListenerState::Pending,
            Gate::Available(_) => ListenerState::Available,
            Gate::Consumed(_) => ListenerState::Consumed,
            Gate::Closed => ListenerState::Closed,
        }
    }
}

impl<S> Clone for StreamListener<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: PeerStream> fmt::Debug for StreamListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamListener")
            .field("state", &self.state())
            .finish()
    }
}

/// One-time handle for supplying the stream to a pending listener
pub struct StreamOffer<S: PeerStream> {
    shared: Arc<Shared<S>>,
}

impl<S: PeerStream> StreamOffer<S> {
    /// Deliver the stream, waking a pending `accept`
    ///
    /// If the listener was closed first the stream is handed back untouched.
    pub fn offer(self, stream: S) -> Result<(), S> {
        let mut gate = self.shared.gate.lock();
        if !matches!(*gate, Gate::Pending) {
            return Err(stream);
        }
        debug!(stream = %stream.id(), "Stream offered to pending listener");
        *gate = Gate::Available(Arc::new(stream));
        drop(gate);

        self.shared.notify.notify_waiters();
        Ok(())
    }
}

impl<S: PeerStream> Drop for StreamOffer<S> {
    fn drop(&mut self) {
        let abandoned = matches!(*self.shared.gate.lock(), Gate::Pending);
        if abandoned {
            let _ = self.shared.close();
        }
    }
}
