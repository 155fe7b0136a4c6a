//! # Peerlink Transport
//!
//! iroh plumbing that produces the streams the bridge wraps.
//!
//! Relay traversal, hole punching and address lookup are iroh's job. This
//! crate only binds an endpoint, opens bidirectional streams to peers on
//! [`ALPN_BRIDGE`], and turns inbound ones into single-shot listeners.
//!
//! ## Example
//!
//! ```rust,ignore
//! use peerlink_transport::{StreamManager, TransportConfig, SecretKey};
//!
//! // Accepting side
//! let host_key = SecretKey::generate(&mut rand::rng());
//! let host = StreamManager::new(host_key, TransportConfig::default()).await?;
//! let mut inbound = host.listen().await?;
//! while let Some(stream) = inbound.recv().await {
//!     let conn = stream.listener.accept().await?;
//!     // serve `conn`
//! }
//!
//! // Initiating side
//! let client_key = SecretKey::generate(&mut rand::rng());
//! let client = StreamManager::new(client_key, TransportConfig::default()).await?;
//! let dialer = client.dial_redirector(host_addr).await?;
//! let conn = dialer.dial(&CancellationToken::new(), "host").await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod stream;

pub use config::TransportConfig;
pub use connection::{ConnectionStats, StreamManager};
pub use error::{IdentityError, TransportError, TransportResult};
pub use identity::IrohIdentity;
pub use protocol::{ALPN_BRIDGE, BridgeProtocolHandler, InboundStream};
pub use stream::IrohStream;

// Re-export iroh types that users will need
pub use iroh::{Endpoint, EndpointAddr, PublicKey, SecretKey};
