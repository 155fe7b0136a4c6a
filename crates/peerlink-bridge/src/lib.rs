//! # Peerlink Bridge
//!
//! Adapts a single, already-established peer-to-peer stream into the shapes a
//! connection-oriented RPC stack expects.
//!
//! The peer-to-peer layer hands us one full-duplex stream (see [`PeerStream`]).
//! This crate lets that one stream be used as:
//!
//! - a connection: [`StreamConn`] implements tokio's `AsyncRead`/`AsyncWrite`
//!   plus close and absolute read/write deadlines
//! - a listener: [`StreamListener`] yields exactly one [`StreamConn`] from
//!   `accept`, then reports itself exhausted
//! - a dialer: [`DialRedirector`] ignores the dial target and always returns a
//!   connection over the same stream
//!
//! ## Example
//!
//! ```rust,ignore
//! use peerlink_bridge::{DialRedirector, StreamListener, pipe};
//! use tokio_util::sync::CancellationToken;
//!
//! let (server_side, client_side) = pipe(64 * 1024);
//!
//! // Server: drive a generic accept loop off the one inbound stream
//! let listener = StreamListener::new(server_side);
//! let conn = listener.accept().await?;
//!
//! // Client: "dial" any address and land on the stream we already have
//! let dialer = DialRedirector::new(client_side);
//! let conn = dialer.dial(&CancellationToken::new(), "peer-b").await?;
//! ```

pub mod conn;
pub mod dial;
pub mod duplex;
pub mod error;
pub mod listener;
pub mod stream;
pub mod traits;

pub use conn::{PLACEHOLDER_ADDR, StreamConn};
pub use dial::DialRedirector;
pub use duplex::{BiStream, MemStream, pipe};
pub use error::{BridgeError, BridgeResult};
pub use listener::{ListenerState, StreamListener, StreamOffer};
pub use stream::{PeerStream, StreamId};
pub use traits::{Connection, Dialer, Listener};

// Re-exported so callers can build deadlines and dial tokens without extra deps
pub use tokio::time::Instant;
pub use tokio_util::sync::CancellationToken;
