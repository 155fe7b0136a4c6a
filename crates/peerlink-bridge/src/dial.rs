//! Dialer that always lands on one existing stream

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::conn::StreamConn;
use crate::error::{BridgeError, BridgeResult};
use crate::stream::PeerStream;

/// Redirects every dial onto a fixed, already-open stream
///
/// An RPC client configured with a custom dialer asks to connect to some
/// target; the peer-to-peer layer has already opened a stream to that peer,
/// so the target string is ignored and the client is handed that stream.
pub struct DialRedirector<S> {
    stream: Arc<S>,
}

impl<S: PeerStream> DialRedirector<S> {
    pub fn new(stream: S) -> Self {
        Self::from_arc(Arc::new(stream))
    }

    pub fn from_arc(stream: Arc<S>) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &Arc<S> {
        &self.stream
    }

    /// Return a connection over the fixed stream, whatever `target` says
    ///
    /// Never blocks. Fails only when `cancel` is already cancelled.
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        target: &str,
    ) -> BridgeResult<StreamConn<S>> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        trace!(
            dial_target = %target,
            stream = %self.stream.id(),
            "Redirecting dial onto existing stream"
        );
        Ok(StreamConn::new(Arc::clone(&self.stream)))
    }
}

impl<S> Clone for DialRedirector<S> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
        }
    }
}

impl<S: PeerStream> fmt::Debug for DialRedirector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialRedirector")
            .field("stream", self.stream.id())
            .finish()
    }
}
