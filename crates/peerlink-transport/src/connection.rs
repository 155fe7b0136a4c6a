//! Endpoint and connection management for bridged streams
//!
//! Opens outbound streams to peers and, once [`StreamManager::listen`] is
//! called, accepts inbound ones through an iroh `Router`.

use std::hash::Hash;

use dashmap::DashMap;
use iroh::endpoint::Connection;
use iroh::protocol::Router;
use iroh::{Endpoint, EndpointAddr, PublicKey, SecretKey};
use peerlink_bridge::{DialRedirector, PeerStream};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::identity::IrohIdentity;
use crate::protocol::{ALPN_BRIDGE, BridgeProtocolHandler, InboundStream};
use crate::stream::IrohStream;

/// Owns the iroh endpoint and the connections streams are opened on
pub struct StreamManager {
    endpoint: Endpoint,
    identity: IrohIdentity,
    /// Open connections indexed by peer identity
    connections: DashMap<IrohIdentity, Connection>,
    config: TransportConfig,
    /// Present once `listen` has been called
    router: Mutex<Option<Router>>,
    shutdown: RwLock<bool>,
}

impl StreamManager {
    /// Bind an iroh endpoint with the given secret key
    pub async fn new(secret_key: SecretKey, config: TransportConfig) -> TransportResult<Self> {
        let endpoint = Endpoint::builder()
            .secret_key(secret_key.clone())
            .alpns(vec![ALPN_BRIDGE.to_vec()])
            .bind()
            .await
            .map_err(|e| TransportError::Bind(e.to_string()))?;

        let identity = IrohIdentity::new(secret_key.public());

        info!(
            identity = %identity.short_id(),
            "Stream manager initialized"
        );

        Ok(Self {
            endpoint,
            identity,
            connections: DashMap::new(),
            config,
            router: Mutex::new(None),
            shutdown: RwLock::new(false),
        })
    }

    pub fn local_identity(&self) -> IrohIdentity {
        self.identity
    }

    /// Address to share with peers
    pub fn endpoint_addr(&self) -> EndpointAddr {
        self.endpoint.addr()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Connect to a peer, reusing a live connection when there is one
    #[instrument(skip(self, addr), fields(remote_peer = %IrohIdentity::new(addr.id).short_id()))]
    pub async fn connect(&self, addr: EndpointAddr) -> TransportResult<Connection> {
        if *self.shutdown.read().await {
            return Err(TransportError::Shutdown);
        }

        let peer_id = IrohIdentity::new(addr.id);

        if let Some(conn) = self.connections.get(&peer_id) {
            if conn.close_reason().is_none() {
                debug!("Reusing existing connection");
                return Ok(conn.clone());
            }
            drop(conn);
            self.connections.remove(&peer_id);
        }

        let current = self.cleanup_stale();
        if current >= self.config.max_connections {
            warn!(
                current = current,
                max = self.config.max_connections,
                "Connection limit reached"
            );
            return Err(TransportError::TooManyConnections {
                current,
                max: self.config.max_connections,
            });
        }

        debug!("Establishing new connection");

        let conn = tokio::time::timeout(
            std::time::Duration::from_millis(self.config.connect_timeout_ms),
            self.endpoint.connect(addr, ALPN_BRIDGE),
        )
        .await
        .map_err(|_| {
            warn!(
                timeout_ms = self.config.connect_timeout_ms,
                "Connection timeout"
            );
            TransportError::Timeout
        })?
        .map_err(|e| {
            warn!(error = %e, "Connection failed");
            TransportError::Connect(e.to_string())
        })?;

        info!("Connection established");
        self.connections.insert(peer_id, conn.clone());

        Ok(conn)
    }

    /// Open a new bidirectional stream to a peer
    ///
    /// QUIC only announces a stream to the peer once data is sent on it, so
    /// the opener should write first.
    #[instrument(skip(self, addr), fields(remote_peer = %IrohIdentity::new(addr.id).short_id()))]
    pub async fn open_stream(&self, addr: EndpointAddr) -> TransportResult<IrohStream> {
        let peer = IrohIdentity::new(addr.id);
        let conn = self.connect(addr).await?;

        let (send, recv) = conn
            .open_bi()
            .await
            .map_err(|e| TransportError::StreamOpen(e.to_string()))?;

        let stream = IrohStream::new(peer, send, recv);
        debug!(stream = %stream.id(), "Opened bridged stream");
        Ok(stream)
    }

    /// Open a stream to a peer known only by key
    ///
    /// Relies on iroh's address lookup to find the peer.
    pub async fn open_stream_by_key(&self, public_key: PublicKey) -> TransportResult<IrohStream> {
        self.open_stream(EndpointAddr::new(public_key)).await
    }

    /// Open a stream and wrap it for a client that insists on dialing
    pub async fn dial_redirector(
        &self,
        addr: EndpointAddr,
    ) -> TransportResult<DialRedirector<IrohStream>> {
        let stream = self.open_stream(addr).await?;
        Ok(DialRedirector::new(stream))
    }

    /// Start accepting bridged streams
    ///
    /// Returns the bounded queue inbound streams are delivered on. Can only
    /// be called once per manager.
    pub async fn listen(&self) -> TransportResult<mpsc::Receiver<InboundStream>> {
        if *self.shutdown.read().await {
            return Err(TransportError::Shutdown);
        }

        let mut router = self.router.lock().await;
        if router.is_some() {
            return Err(TransportError::AlreadyListening);
        }

        let (handler, inbound) =
            BridgeProtocolHandler::with_capacity(self.config.inbound_queue_capacity);
        *router = Some(
            Router::builder(self.endpoint.clone())
                .accept(ALPN_BRIDGE, handler)
                .spawn(),
        );

        info!(
            identity = %self.identity.short_id(),
            queue = self.config.inbound_queue_capacity,
            "Listening for bridged streams"
        );
        Ok(inbound)
    }

    pub fn connected_peers(&self) -> Vec<IrohIdentity> {
        self.connections
            .iter()
            .filter(|c| c.value().close_reason().is_none())
            .map(|c| *c.key())
            .collect()
    }

    /// Close all connections, stop accepting, and shut the endpoint down
    pub async fn close(&self) {
        let mut shutdown = self.shutdown.write().await;
        if *shutdown {
            return;
        }
        *shutdown = true;

        info!("Shutting down stream manager");

        for entry in self.connections.iter() {
            entry.value().close(0u32.into(), b"shutdown");
        }
        self.connections.clear();

        // The router closes the endpoint as part of its own shutdown
        let router = self.router.lock().await.take();
        match router {
            Some(router) => {
                if let Err(e) = router.shutdown().await {
                    warn!(error = %e, "Router shutdown error");
                }
            }
            None => self.endpoint.close().await,
        }
    }

    /// Drop connections that have already closed, returning how many are left
    fn cleanup_stale(&self) -> usize {
        let before = self.connections.len();
        let live = prune_closed(&self.connections, |conn| conn.close_reason().is_none());
        if live < before {
            debug!(removed = before - live, "Removed stale connections");
        }
        live
    }

    pub fn stats(&self) -> ConnectionStats {
        let active = self
            .connections
            .iter()
            .filter(|c| c.value().close_reason().is_none())
            .count();

        ConnectionStats {
            active_connections: active,
            total_connections: self.connections.len(),
            max_connections: self.config.max_connections,
        }
    }
}

fn prune_closed<K, V>(cache: &DashMap<K, V>, is_open: impl Fn(&V) -> bool) -> usize
where
    K: Eq + Hash,
{
    cache.retain(|_, value| is_open(value));
    cache.len()
}

/// Connection statistics
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Number of active (not closed) connections
    pub active_connections: usize,
    /// Total connections in the pool (including closed)
    pub total_connections: usize,
    pub max_connections: usize,
}
