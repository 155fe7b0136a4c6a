//! # Peerlink CLI
//!
//! Host and client halves of a small line-echo service, run over bridged
//! peer streams.
//!
//! The service code in [`echo`] only sees the generic
//! [`Listener`](peerlink_bridge::Listener) and
//! [`Dialer`](peerlink_bridge::Dialer) contracts. The binary decides what
//! sits underneath.

pub mod config;
pub mod echo;
pub mod keystore;

pub use config::{Cli, Command, NodeConfig};
pub use echo::{echo, echo_lines, serve};
pub use keystore::{Keystore, KeystoreError};
