//! iroh bidirectional streams as bridge [`PeerStream`]s

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use iroh::endpoint::{RecvStream, SendStream};
use peerlink_bridge::{BiStream, Instant, PeerStream, StreamId};
use tokio::io::ReadBuf;

use crate::identity::IrohIdentity;

static NEXT_STREAM: AtomicU64 = AtomicU64::new(0);

/// One QUIC bidirectional stream to a known peer
///
/// Closing drops both QUIC halves: the send side is finished and the receive
/// side stopped, so the peer reads end-of-stream.
pub struct IrohStream {
    inner: BiStream<RecvStream, SendStream>,
    remote: IrohIdentity,
}

impl IrohStream {
    pub fn new(remote: IrohIdentity, send: SendStream, recv: RecvStream) -> Self {
        let n = NEXT_STREAM.fetch_add(1, Ordering::Relaxed);
        let id = StreamId::new(format!("{}/{}", remote.short_id(), n));
        Self {
            inner: BiStream::new(id, recv, send),
            remote,
        }
    }

    /// The peer on the other end of this stream
    pub fn remote_peer(&self) -> IrohIdentity {
        self.remote
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl std::fmt::Debug for IrohStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrohStream")
            .field("id", self.inner.id())
            .field("remote", &self.remote)
            .finish()
    }
}

impl PeerStream for IrohStream {
    fn id(&self) -> &StreamId {
        self.inner.id()
    }

    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_read(cx, buf)
    }

    fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.inner.poll_write(cx, buf)
    }

    fn poll_flush(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_flush(cx)
    }

    fn poll_shutdown(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_shutdown(cx)
    }

    fn close(&self) -> io::Result<()> {
        self.inner.close()
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.inner.set_read_deadline(deadline)
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.inner.set_write_deadline(deadline)
    }
}
