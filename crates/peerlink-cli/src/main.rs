use anyhow::Context;
use clap::Parser;
use peerlink_bridge::{CancellationToken, DialRedirector};
use peerlink_cli::config::{Cli, Command, NodeConfig};
use peerlink_cli::{Keystore, echo_lines, serve};
use peerlink_transport::{IrohIdentity, SecretKey, StreamManager};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::from_cli(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    match cli.command {
        Command::Host => run_host(&config).await,
        Command::Client {
            peer,
            target,
            messages,
        } => run_client(&config, &peer, &target, &messages).await,
    }
}

async fn run_host(config: &NodeConfig) -> anyhow::Result<()> {
    let secret = Keystore::new(&config.data_dir)
        .load_or_generate()
        .context("Failed to load host identity")?;

    let manager = StreamManager::new(secret, config.transport.clone()).await?;
    let mut inbound = manager.listen().await?;

    println!("Host id: {}", manager.local_identity());
    println!("Connect with: peerlink client {}", manager.local_identity());

    loop {
        tokio::select! {
            next = inbound.recv() => {
                let Some(stream) = next else { break };
                info!(remote_peer = %stream.peer.short_id(), "Serving bridged stream");
                tokio::spawn(async move {
                    if let Err(e) = serve(&stream.listener).await {
                        warn!(
                            remote_peer = %stream.peer.short_id(),
                            error = %e,
                            "Echo service failed"
                        );
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    drop(inbound);
    manager.close().await;
    Ok(())
}

async fn run_client(
    config: &NodeConfig,
    peer: &str,
    target: &str,
    messages: &[String],
) -> anyhow::Result<()> {
    let host: IrohIdentity = peer.parse().context("Invalid host id")?;

    // Clients do not need a stable identity
    let manager = StreamManager::new(
        SecretKey::generate(&mut rand::rng()),
        config.transport.clone(),
    )
    .await?;
    let stream = manager
        .open_stream_by_key(host.into())
        .await
        .with_context(|| format!("Failed to open stream to {}", host.short_id()))?;
    let dialer = DialRedirector::new(stream);

    let replies = echo_lines(&dialer, &CancellationToken::new(), target, messages).await?;
    for reply in replies {
        println!("{reply}");
    }

    manager.close().await;
    Ok(())
}
