//! WebSocket transport tests against an in-process echo server

use futures_util::{SinkExt, StreamExt};
use stampede_transport::{
    Transport, TransportError, TransportEvent, TransportReceiver, TransportSender,
    WebSocketTransport,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Echo every text frame back once, then close after `frames` messages
async fn spawn_echo_server(frames: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut seen = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                ws.send(Message::Text(text)).await.unwrap();
                seen += 1;
                if seen == frames {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        }
    });

    format!("ws://{}/ws", addr)
}

#[tokio::test]
async fn test_echo_and_close() {
    let url = spawn_echo_server(1).await;
    let transport = WebSocketTransport::new();

    let (sender, mut receiver) = transport.connect(&url).await.expect("connect failed");
    assert!(sender.is_connected());

    sender.send("hello".to_string()).expect("send failed");

    let event = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out")
        .expect("stream ended");
    assert_eq!(event, TransportEvent::Data("hello".into()));

    let event = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out")
        .expect("stream ended");
    assert!(matches!(event, TransportEvent::Disconnected { .. }));
}

#[tokio::test]
async fn test_send_after_close_is_rejected() {
    let url = spawn_echo_server(10).await;
    let transport = WebSocketTransport::new();

    let (sender, _receiver) = transport.connect(&url).await.expect("connect failed");
    sender.close().await.expect("close failed");

    assert!(!sender.is_connected());
    assert!(matches!(
        sender.send("late".to_string()),
        Err(TransportError::NotConnected)
    ));
}
