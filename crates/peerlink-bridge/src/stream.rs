//! The stream interface consumed from the peer-to-peer layer
//!
//! The bridge never opens or accepts streams itself. Whatever substrate
//! establishes them implements [`PeerStream`] and the bridge forwards to it.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::ReadBuf;
use tokio::time::Instant;

/// Opaque stream identifier, only meaningful in logs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(Arc<str>);

impl StreamId {
    /// Create an identifier from any string label
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// One full-duplex byte stream owned by the peer-to-peer layer
///
/// All methods take `&self` so one task can read while another writes on the
/// same stream. Implementations must keep the two directions independent:
/// a pending read never holds up a write and vice versa.
///
/// Deadlines are absolute. `None` means no timeout. A deadline applies to the
/// operation currently pending as well as every later one until it is reset.
pub trait PeerStream: Send + Sync + 'static {
    /// Identifier for diagnostics
    fn id(&self) -> &StreamId;

    /// Read into `buf`. Filling fewer bytes than requested is not an error;
    /// filling zero bytes means the peer finished its side.
    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>>;

    /// Write from `buf`, returning how many bytes were accepted
    fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>>;

    fn poll_flush(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

    /// Finish the write direction; the peer observes end-of-stream
    fn poll_shutdown(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

    /// Close both directions
    ///
    /// Any read or write pending on this stream is woken and fails.
    fn close(&self) -> io::Result<()>;

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;

    /// Set the read and write deadlines together
    fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }
}
