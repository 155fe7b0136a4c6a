//! Configuration for the stream transport

/// Configuration for [`StreamManager`](crate::StreamManager)
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum number of concurrent peer connections
    pub max_connections: usize,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Inbound bridged streams buffered before the protocol handler waits
    pub inbound_queue_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            connect_timeout_ms: 10_000,
            inbound_queue_capacity: 16,
        }
    }
}

impl TransportConfig {
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Must be at least 1
    pub fn with_inbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.inbound_queue_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();

        assert_eq!(config.max_connections, 100);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.inbound_queue_capacity, 16);
    }

    #[test]
    fn test_transport_config_builders() {
        let config = TransportConfig::default()
            .with_max_connections(4)
            .with_connect_timeout_ms(500)
            .with_inbound_queue_capacity(0);

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout_ms, 500);
        assert_eq!(config.inbound_queue_capacity, 1);
    }
}
