//! Deadline-aware duplex adaptor
//!
//! [`BiStream`] turns a tokio read half and write half into a [`PeerStream`].
//! Each direction sits behind its own lock and carries its own deadline, so a
//! reader task and a writer task never wait on each other.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf, ReadHalf, WriteHalf};
use tokio::time::{Instant, Sleep};
use tracing::debug;

use crate::stream::{PeerStream, StreamId};

/// One direction of a [`BiStream`]
struct Half<T> {
    /// `None` once the stream has been closed
    io: Option<T>,
    deadline: Option<Instant>,
    /// Created lazily on first poll so deadlines can be set outside a runtime
    timer: Option<Pin<Box<Sleep>>>,
    /// Task currently waiting on this direction
    waker: Option<Waker>,
}

impl<T> Half<T> {
    fn new(io: T) -> Self {
        Self {
            io: Some(io),
            deadline: None,
            timer: None,
            waker: None,
        }
    }

    fn register(&mut self, cx: &Context<'_>) {
        match &self.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => self.waker = Some(cx.waker().clone()),
        }
    }

    /// Returns the waiting task so the caller can wake it outside the lock
    fn set_deadline(&mut self, deadline: Option<Instant>) -> Option<Waker> {
        self.deadline = deadline;
        self.timer = None;
        self.waker.take()
    }

    fn poll_expired(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if Instant::now() >= deadline {
            return true;
        }
        let timer = self
            .timer
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        timer.as_mut().poll(cx).is_ready()
    }

    fn shut(&mut self) -> Option<Waker> {
        self.io = None;
        self.timer = None;
        self.waker.take()
    }
}

fn timed_out(id: &StreamId) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("stream {id}: i/o deadline exceeded"),
    )
}

fn closed(id: &StreamId) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, format!("stream {id}: closed"))
}

/// A [`PeerStream`] built from a separate reader and writer
///
/// Closing drops both halves, which for QUIC and in-memory pipes signals
/// end-of-stream to the peer.
pub struct BiStream<R, W> {
    id: StreamId,
    reader: Mutex<Half<R>>,
    writer: Mutex<Half<W>>,
    closed: AtomicBool,
}

impl<R, W> BiStream<R, W> {
    pub fn new(id: StreamId, reader: R, writer: W) -> Self {
        Self {
            id,
            reader: Mutex::new(Half::new(reader)),
            writer: Mutex::new(Half::new(writer)),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`PeerStream::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<R, W> std::fmt::Debug for BiStream<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiStream")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<R, W> PeerStream for BiStream<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> &StreamId {
        &self.id
    }

    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let mut half = self.reader.lock();
        if half.io.is_none() {
            return Poll::Ready(Err(closed(&self.id)));
        }
        half.register(cx);
        if half.poll_expired(cx) {
            return Poll::Ready(Err(timed_out(&self.id)));
        }
        match half.io.as_mut() {
            Some(io) => Pin::new(io).poll_read(cx, buf),
            None => Poll::Ready(Err(closed(&self.id))),
        }
    }

    fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut half = self.writer.lock();
        if half.io.is_none() {
            return Poll::Ready(Err(closed(&self.id)));
        }
        half.register(cx);
        if half.poll_expired(cx) {
            return Poll::Ready(Err(timed_out(&self.id)));
        }
        match half.io.as_mut() {
            Some(io) => Pin::new(io).poll_write(cx, buf),
            None => Poll::Ready(Err(closed(&self.id))),
        }
    }

    fn poll_flush(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut half = self.writer.lock();
        if half.io.is_none() {
            return Poll::Ready(Err(closed(&self.id)));
        }
        half.register(cx);
        if half.poll_expired(cx) {
            return Poll::Ready(Err(timed_out(&self.id)));
        }
        match half.io.as_mut() {
            Some(io) => Pin::new(io).poll_flush(cx),
            None => Poll::Ready(Err(closed(&self.id))),
        }
    }

    fn poll_shutdown(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut half = self.writer.lock();
        match half.io.as_mut() {
            Some(io) => Pin::new(io).poll_shutdown(cx),
            // Already fully closed
            None => Poll::Ready(Ok(())),
        }
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let read_waker = self.reader.lock().shut();
        let write_waker = self.writer.lock().shut();
        for waker in [read_waker, write_waker].into_iter().flatten() {
            waker.wake();
        }

        debug!(stream = %self.id, "Stream closed");
        Ok(())
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        if let Some(waker) = self.reader.lock().set_deadline(deadline) {
            waker.wake();
        }
        Ok(())
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        if let Some(waker) = self.writer.lock().set_deadline(deadline) {
            waker.wake();
        }
        Ok(())
    }
}

/// One end of an in-memory loopback pair
pub type MemStream = BiStream<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

static NEXT_PIPE: AtomicU64 = AtomicU64::new(0);

/// Create a connected in-memory stream pair
///
/// Bytes written to one end are read from the other. `max_buf_size` bounds
/// how much each direction buffers before writes stall.
pub fn pipe(max_buf_size: usize) -> (MemStream, MemStream) {
    let n = NEXT_PIPE.fetch_add(1, Ordering::Relaxed);
    let (a, b) = tokio::io::duplex(max_buf_size);
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    (
        BiStream::new(StreamId::new(format!("mem-{n}/a")), a_read, a_write),
        BiStream::new(StreamId::new(format!("mem-{n}/b")), b_read, b_write),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::future::poll_fn;
    use std::time::Duration;

    async fn read_some(stream: &impl PeerStream, buf: &mut [u8]) -> io::Result<usize> {
        let mut buf = ReadBuf::new(buf);
        poll_fn(|cx| stream.poll_read(cx, &mut buf)).await?;
        Ok(buf.filled().len())
    }

    async fn write_some(stream: &impl PeerStream, data: &[u8]) -> io::Result<usize> {
        poll_fn(|cx| stream.poll_write(cx, data)).await
    }

    #[tokio::test]
    async fn test_pipe_carries_bytes_both_ways() {
        let (a, b) = pipe(64);

        assert_eq!(write_some(&a, b"ping").await.unwrap(), 4);
        let mut buf = [0u8; 16];
        let n = read_some(&b, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        assert_eq!(write_some(&b, b"pong").await.unwrap(), 4);
        let n = read_some(&a, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn test_pipe_ids_are_distinct() {
        let (a, b) = pipe(8);
        let (c, _d) = pipe(8);

        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert!(a.id().as_str().ends_with("/a"));
        assert!(b.id().as_str().ends_with("/b"));
    }

    #[tokio::test]
    async fn test_partial_reads_pass_through() {
        let reader = tokio_test::io::Builder::new()
            .read(b"hel")
            .read(b"lo")
            .build();
        let stream = BiStream::new(StreamId::new("mock"), reader, tokio::io::sink());

        let mut buf = [0u8; 16];
        let n = read_some(&stream, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hel");
        let n = read_some(&stream, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"lo");
    }

    #[tokio::test]
    async fn test_past_read_deadline_fails_immediately() {
        let (a, _b) = pipe(64);
        a.set_read_deadline(Some(Instant::now())).unwrap();

        let mut buf = [0u8; 4];
        let err = tokio::time::timeout(Duration::from_secs(1), read_some(&a, &mut buf))
            .await
            .expect("read should not block")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_read_deadline_fires_while_pending() {
        let (a, _b) = pipe(64);
        a.set_read_deadline(Some(Instant::now() + Duration::from_millis(30)))
            .unwrap();

        let mut buf = [0u8; 4];
        let err = tokio::time::timeout(Duration::from_secs(2), read_some(&a, &mut buf))
            .await
            .expect("deadline should end the read")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_clearing_deadline_restores_io() {
        let (a, b) = pipe(64);
        a.set_read_deadline(Some(Instant::now())).unwrap();

        let mut buf = [0u8; 8];
        assert!(read_some(&a, &mut buf).await.is_err());

        a.set_read_deadline(None).unwrap();
        write_some(&b, b"ok").await.unwrap();
        let n = read_some(&a, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ok");
    }

    #[tokio::test]
    async fn test_write_deadline_does_not_affect_reads() {
        let (a, b) = pipe(64);
        a.set_write_deadline(Some(Instant::now())).unwrap();

        let err = write_some(&a, b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        write_some(&b, b"y").await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(read_some(&a, &mut buf).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_close_wakes_pending_read() {
        let (a, _b) = pipe(64);
        let a = std::sync::Arc::new(a);

        let reader = {
            let a = a.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4];
                read_some(&*a, &mut buf).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        a.close().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("close should unblock the reader")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_close_wakes_pending_write() {
        let (a, _b) = pipe(8);
        let a = std::sync::Arc::new(a);

        let writer = {
            let a = a.clone();
            tokio::spawn(async move {
                // Nobody reads, so this stalls once the buffer is full
                loop {
                    if let Err(e) = write_some(&*a, &[1u8; 64]).await {
                        return e;
                    }
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());
        a.close().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .expect("close should unblock the writer")
            .unwrap();
        assert_eq!(result.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_new_deadline_wakes_blocked_read() {
        let (a, _b) = pipe(64);
        let a = std::sync::Arc::new(a);

        let reader = {
            let a = a.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4];
                read_some(&*a, &mut buf).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());
        a.set_read_deadline(Some(Instant::now())).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("deadline change should wake the reader")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (a, b) = pipe(64);
        a.close().unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(read_some(&b, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_double_close_is_harmless() {
        let (a, _b) = pipe(64);

        a.close().unwrap();
        a.close().unwrap();
        assert!(a.is_closed());
        assert!(write_some(&a, b"late").await.is_err());
    }
}
