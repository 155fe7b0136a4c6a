//! The echo service over in-memory bridged streams

use std::time::Duration;

use peerlink_bridge::{CancellationToken, DialRedirector, ListenerState, StreamListener, pipe};
use peerlink_cli::{echo_lines, serve};

#[tokio::test]
async fn test_multiline_round_trip() {
    let (a, b) = pipe(16);
    let listener = StreamListener::new(a);
    let dialer = DialRedirector::new(b);

    let server = {
        let listener = listener.clone();
        tokio::spawn(async move { serve(&listener).await })
    };

    // Enough data to overflow the pipe buffer in both directions
    let lines: Vec<String> = (0..50).map(|i| format!("line number {i}")).collect();
    let replies = echo_lines(&dialer, &CancellationToken::new(), "ignored:1", &lines)
        .await
        .expect("echo failed");

    assert_eq!(replies, lines);
    assert_eq!(server.await.unwrap().unwrap(), 1);
    assert_eq!(listener.state(), ListenerState::Consumed);
}

#[tokio::test]
async fn test_serve_waits_for_offered_stream() {
    let (listener, offer) = StreamListener::pending();
    let server = {
        let listener = listener.clone();
        tokio::spawn(async move { serve(&listener).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!server.is_finished());

    let (a, b) = pipe(64);
    offer.offer(a).expect("listener already closed");

    let replies = echo_lines(
        &DialRedirector::new(b),
        &CancellationToken::new(),
        "host",
        &["late".to_string()],
    )
    .await
    .unwrap();

    assert_eq!(replies, ["late"]);
    assert_eq!(server.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_dropped_offer_ends_serve() {
    let (listener, offer) = StreamListener::<peerlink_bridge::MemStream>::pending();
    drop(offer);

    let served = tokio::time::timeout(Duration::from_secs(1), serve(&listener))
        .await
        .expect("serve did not notice the closed listener")
        .unwrap();
    assert_eq!(served, 0);
}
