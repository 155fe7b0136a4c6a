//! Generic connection, listener and dialer contracts
//!
//! Server and client code is written against these traits so that it runs the
//! same over a bridged peer stream as over anything else that implements them.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::conn::StreamConn;
use crate::dial::DialRedirector;
use crate::error::BridgeResult;
use crate::listener::StreamListener;
use crate::stream::PeerStream;

/// A bidirectional byte connection with deadlines
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    fn local_addr(&self) -> SocketAddr;

    fn peer_addr(&self) -> SocketAddr;

    /// Close both directions, failing pending I/O
    fn close(&self) -> io::Result<()>;

    fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;
}

/// Source of inbound connections
#[async_trait]
pub trait Listener: Send + Sync {
    type Conn: Connection;

    /// Wait for the next connection
    ///
    /// An error for which [`BridgeError::is_closed`](crate::BridgeError::is_closed)
    /// holds means no further connection will ever arrive.
    async fn accept(&self) -> BridgeResult<Self::Conn>;

    /// Stop accepting and wake pending `accept` calls
    fn close(&self) -> BridgeResult<()>;

    fn local_addr(&self) -> SocketAddr;
}

/// Opens a connection to a named target
#[async_trait]
pub trait Dialer: Send + Sync {
    type Conn: Connection;

    async fn dial(&self, cancel: &CancellationToken, target: &str) -> BridgeResult<Self::Conn>;
}

impl<S: PeerStream> Connection for StreamConn<S> {
    fn local_addr(&self) -> SocketAddr {
        StreamConn::local_addr(self)
    }

    fn peer_addr(&self) -> SocketAddr {
        StreamConn::peer_addr(self)
    }

    fn close(&self) -> io::Result<()> {
        StreamConn::close(self)
    }

    fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        StreamConn::set_deadline(self, deadline)
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        StreamConn::set_read_deadline(self, deadline)
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        StreamConn::set_write_deadline(self, deadline)
    }
}

#[async_trait]
impl<S: PeerStream> Listener for StreamListener<S> {
    type Conn = StreamConn<S>;

    async fn accept(&self) -> BridgeResult<StreamConn<S>> {
        StreamListener::accept(self).await
    }

    fn close(&self) -> BridgeResult<()> {
        StreamListener::close(self)
    }

    fn local_addr(&self) -> SocketAddr {
        StreamListener::local_addr(self)
    }
}

#[async_trait]
impl<S: PeerStream> Dialer for DialRedirector<S> {
    type Conn = StreamConn<S>;

    async fn dial(&self, cancel: &CancellationToken, target: &str) -> BridgeResult<StreamConn<S>> {
        DialRedirector::dial(self, cancel, target).await
    }
}
