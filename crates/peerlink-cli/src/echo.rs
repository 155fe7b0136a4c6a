//! Line echo service written against the generic bridge contracts

use std::io;

use peerlink_bridge::{BridgeError, CancellationToken, Connection, Dialer, Listener};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Echo every connection `listener` yields until it is exhausted
///
/// Returns the number of connections served once the listener stops
/// producing them and every handler has finished.
pub async fn serve<L: Listener>(listener: &L) -> Result<usize, BridgeError> {
    let mut handlers = JoinSet::new();
    let mut served = 0usize;

    let outcome = loop {
        match listener.accept().await {
            Ok(conn) => {
                served += 1;
                handlers.spawn(echo(conn));
            }
            Err(e) if e.is_closed() => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    while let Some(joined) = handlers.join_next().await {
        match joined {
            Ok(Ok(bytes)) => debug!(bytes, "Echo connection finished"),
            Ok(Err(e)) => warn!(error = %e, "Echo connection failed"),
            Err(e) => warn!(error = %e, "Echo task panicked"),
        }
    }

    info!(served, "Listener exhausted");
    outcome.map(|_| served)
}

/// Copy everything read from `conn` back to it, then shut the write side
pub async fn echo<C: Connection>(conn: C) -> io::Result<u64> {
    let (mut reader, mut writer) = tokio::io::split(conn);
    let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(bytes)
}

/// Send `lines` over a dialed connection and collect the replies
///
/// Writing and reading run concurrently so a peer that answers as it reads
/// cannot stall on a full buffer.
pub async fn echo_lines<D: Dialer>(
    dialer: &D,
    cancel: &CancellationToken,
    target: &str,
    lines: &[String],
) -> Result<Vec<String>, BridgeError> {
    let conn = dialer.dial(cancel, target).await?;
    let (reader, mut writer) = tokio::io::split(conn);

    let send = async move {
        for line in lines {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.shutdown().await
    };

    let recv = async move {
        let mut replies = Vec::with_capacity(lines.len());
        let mut reader = BufReader::new(reader).lines();
        while let Some(line) = reader.next_line().await? {
            replies.push(line);
        }
        Ok::<_, io::Error>(replies)
    };

    let (sent, received) = tokio::join!(send, recv);
    sent?;
    Ok(received?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_bridge::{DialRedirector, StreamListener, pipe};

    #[tokio::test]
    async fn test_serve_counts_single_connection() {
        let (a, b) = pipe(64);
        let listener = StreamListener::new(a);
        let dialer = DialRedirector::new(b);

        let server = tokio::spawn(async move { serve(&listener).await });

        let lines = vec!["ping".to_string()];
        let replies = echo_lines(&dialer, &CancellationToken::new(), "anywhere", &lines)
            .await
            .unwrap();

        assert_eq!(replies, lines);
        assert_eq!(server.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_serve_on_closed_listener_returns_zero() {
        let (a, _b) = pipe(64);
        let listener = StreamListener::new(a);
        listener.close().unwrap();

        assert_eq!(serve(&listener).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_echo_lines_cancelled() {
        let (_a, b) = pipe(64);
        let dialer = DialRedirector::new(b);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = echo_lines(&dialer, &cancel, "anywhere", &["x".to_string()]).await;
        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }
}
