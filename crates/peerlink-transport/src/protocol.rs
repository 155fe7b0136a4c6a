//! Inbound side of the bridge protocol
//!
//! The iroh `Router` hands every connection negotiated on [`ALPN_BRIDGE`] to
//! [`BridgeProtocolHandler`]. Each bidirectional stream the peer opens on it
//! becomes one [`StreamListener`], queued for the application to serve.

use iroh::endpoint::Connection;
use iroh::protocol::{AcceptError, ProtocolHandler};
use peerlink_bridge::{PeerStream, StreamListener};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::identity::IrohIdentity;
use crate::stream::IrohStream;

/// Application-Level Protocol Negotiation identifier for bridged streams
pub const ALPN_BRIDGE: &[u8] = b"peerlink/bridge/1";

/// A stream a peer opened to us, ready to be served
#[derive(Debug)]
pub struct InboundStream {
    /// Who opened it
    pub peer: IrohIdentity,
    /// Single-shot listener over the stream
    pub listener: StreamListener<IrohStream>,
}

/// Handler for connections on the bridge ALPN
///
/// Pushes into a bounded queue. When the queue is full the handler waits, so a
/// slow consumer slows stream acceptance instead of piling up work. Dropping
/// the receiving end is the shutdown signal: the handler closes the stream it
/// could not deliver and stops accepting on that connection.
#[derive(Debug, Clone)]
pub struct BridgeProtocolHandler {
    sender: mpsc::Sender<InboundStream>,
}

impl BridgeProtocolHandler {
    pub fn new(sender: mpsc::Sender<InboundStream>) -> Self {
        Self { sender }
    }

    /// Create a handler together with the queue it feeds
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<InboundStream>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }

    /// Queue one inbound stream, closing it if nobody is listening anymore
    pub async fn deliver(
        &self,
        peer: IrohIdentity,
        stream: IrohStream,
    ) -> Result<(), AcceptError> {
        let inbound = InboundStream {
            peer,
            listener: StreamListener::new(stream),
        };

        if let Err(mpsc::error::SendError(rejected)) = self.sender.send(inbound).await {
            warn!(remote_peer = %peer.short_id(), "Inbound stream queue closed, dropping stream");
            close_undelivered(&rejected.listener);
            return Err(AcceptError::from(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Inbound stream queue closed",
            )));
        }
        Ok(())
    }
}

fn close_undelivered<S: PeerStream>(listener: &StreamListener<S>) {
    if let Err(e) = listener.close() {
        warn!(error = %e, "Failed to close undelivered stream");
    }
}

impl ProtocolHandler for BridgeProtocolHandler {
    async fn accept(&self, connection: Connection) -> Result<(), AcceptError> {
        let peer = IrohIdentity::new(connection.remote_id());
        debug!(remote_peer = %peer.short_id(), "Accepted bridge connection");

        // The connection stays open for as long as this future holds it
        loop {
            let (send, recv) = match connection.accept_bi().await {
                Ok(pair) => pair,
                Err(e) => {
                    debug!(
                        remote_peer = %peer.short_id(),
                        reason = %e,
                        "Bridge connection finished"
                    );
                    return Ok(());
                }
            };

            let stream = IrohStream::new(peer, send, recv);
            debug!(remote_peer = %peer.short_id(), stream = %stream.id(), "Inbound bridged stream");
            self.deliver(peer, stream).await?;
        }
    }
}
