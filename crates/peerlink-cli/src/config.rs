use std::path::PathBuf;

use clap::{Parser, Subcommand};
use peerlink_transport::TransportConfig;

/// Settings for one process, resolved once at startup
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Where the identity key lives
    pub data_dir: PathBuf,
    pub transport: TransportConfig,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./peerlink-data"),
            transport: TransportConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl NodeConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            data_dir: cli.data_dir.clone(),
            transport: TransportConfig::default()
                .with_connect_timeout_ms(cli.connect_timeout_ms),
            log_level: cli.log_level.clone(),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

#[derive(Parser)]
#[command(name = "peerlink", about = "Line echo over bridged peer-to-peer streams")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Directory holding the host identity
    #[arg(long, global = true, default_value = "./peerlink-data")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Give up connecting to a peer after this many milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    pub connect_timeout_ms: u64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the echo service on every stream peers open to us
    Host,
    /// Send lines to a host and print what comes back
    Client {
        /// Endpoint id printed by the host
        peer: String,
        /// Name handed to the dialer; ignored by the redirect
        #[arg(long, default_value = "peerlink")]
        target: String,
        /// Lines to send
        #[arg(default_value = "hello")]
        messages: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host() {
        let cli = Cli::parse_from(["peerlink", "host", "--data-dir", "/tmp/pl"]);
        assert!(matches!(cli.command, Command::Host));

        let config = NodeConfig::from_cli(&cli);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pl"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_client() {
        let cli = Cli::parse_from([
            "peerlink",
            "--log-level",
            "debug",
            "client",
            "abc",
            "one",
            "two",
        ]);

        match cli.command {
            Command::Client {
                ref peer,
                ref target,
                ref messages,
            } => {
                assert_eq!(peer, "abc");
                assert_eq!(target, "peerlink");
                assert_eq!(messages, &["one", "two"]);
            }
            _ => panic!("Expected client command"),
        }
        assert_eq!(NodeConfig::from_cli(&cli).log_level, "debug");
    }

    #[test]
    fn test_connect_timeout_flows_into_transport() {
        let cli = Cli::parse_from(["peerlink", "host", "--connect-timeout-ms", "2500"]);
        let config = NodeConfig::from_cli(&cli);
        assert_eq!(config.transport.connect_timeout_ms, 2500);
    }

    #[test]
    fn test_builders() {
        let config = NodeConfig::default()
            .with_data_dir("/var/lib/peerlink")
            .with_log_level("warn")
            .with_transport(TransportConfig::default().with_max_connections(3));

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/peerlink"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.transport.max_connections, 3);
    }
}
