//! A single peer stream presented as a network connection

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::stream::{PeerStream, StreamId};

/// Address reported for bridged connections and listeners
///
/// Peer streams have no IP endpoints. Callers must not use this for identity
/// or routing; substrate-specific peer identity is reachable through
/// [`StreamConn::stream`].
pub const PLACEHOLDER_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// Connection over one [`PeerStream`]
///
/// Holds no buffers and no state of its own: every call forwards to the
/// stream. Cloning yields another handle to the same stream, which is how a
/// reader task and a writer task share one connection.
pub struct StreamConn<S> {
    stream: Arc<S>,
}

impl<S: PeerStream> StreamConn<S> {
    pub fn new(stream: Arc<S>) -> Self {
        Self { stream }
    }

    pub fn id(&self) -> &StreamId {
        self.stream.id()
    }

    /// The wrapped stream
    pub fn stream(&self) -> &Arc<S> {
        &self.stream
    }

    /// Close the underlying stream, failing any pending read or write
    pub fn close(&self) -> io::Result<()> {
        self.stream.close()
    }

    pub fn local_addr(&self) -> SocketAddr {
        PLACEHOLDER_ADDR
    }

    pub fn peer_addr(&self) -> SocketAddr {
        PLACEHOLDER_ADDR
    }

    /// Set both deadlines. `None` disables the timeout.
    pub fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.stream.set_deadline(deadline)
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.stream.set_read_deadline(deadline)
    }

    /// A write that stalls past the deadline may already have accepted part of
    /// the buffer; that count is returned first and the timeout on the next call.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.stream.set_write_deadline(deadline)
    }
}

impl<S> Clone for StreamConn<S> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
        }
    }
}

impl<S: PeerStream> fmt::Debug for StreamConn<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConn")
            .field("stream", self.stream.id())
            .finish()
    }
}

impl<S: PeerStream> AsyncRead for StreamConn<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.stream.poll_read(cx, buf)
    }
}

impl<S: PeerStream> AsyncWrite for StreamConn<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.stream.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplex::pipe;

    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn conn_pair(capacity: usize) -> (StreamConn<crate::MemStream>, StreamConn<crate::MemStream>) {
        let (a, b) = pipe(capacity);
        (StreamConn::new(Arc::new(a)), StreamConn::new(Arc::new(b)))
    }

    #[test]
    fn test_addresses_are_placeholders() {
        let (a, _b) = conn_pair(8);

        assert_eq!(a.local_addr(), PLACEHOLDER_ADDR);
        assert_eq!(a.peer_addr(), PLACEHOLDER_ADDR);
        assert!(a.local_addr().ip().is_unspecified());
    }

    #[test]
    fn test_clone_shares_stream() {
        let (a, _b) = conn_pair(8);
        let a2 = a.clone();

        assert!(Arc::ptr_eq(a.stream(), a2.stream()));
        assert_eq!(a.id(), a2.id());
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let (mut a, mut b) = conn_pair(64);

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_past_deadline_read_times_out() {
        let (mut a, _b) = conn_pair(64);
        a.set_read_deadline(Some(Instant::now())).unwrap();

        let mut buf = [0u8; 1];
        let err = tokio::time::timeout(Duration::from_secs(1), a.read(&mut buf))
            .await
            .expect("read should fail without blocking")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_partial_write_then_timeout() {
        // 8 bytes of buffering and nobody reading on the other side
        let (mut a, _b) = conn_pair(8);
        a.set_write_deadline(Some(Instant::now() + Duration::from_millis(30)))
            .unwrap();

        let payload = [7u8; 32];
        let written = a.write(&payload).await.unwrap();
        assert_eq!(written, 8);

        let err = tokio::time::timeout(Duration::from_secs(2), a.write(&payload[written..]))
            .await
            .expect("write deadline should fire")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_close_unblocks_read_on_clone() {
        let (a, _b) = conn_pair(64);
        let mut reader = a.clone();

        let task = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            reader.read(&mut buf).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        a.close().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("close should unblock the read")
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_gives_peer_eof() {
        let (mut a, mut b) = conn_pair(64);

        a.write_all(b"bye").await.unwrap();
        a.shutdown().await.unwrap();

        let mut out = Vec::new();
        b.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"bye");
    }
}
