//! WebSocket transport implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportEvent, TransportReceiver, TransportSender};

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Outbound frames that may wait for the writer before sends are rejected
    pub send_queue: usize,
    /// Inbound events buffered ahead of the consumer
    pub event_queue: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            send_queue: 64,
            event_queue: 256,
        }
    }
}

/// WebSocket transport
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    fn send(&self, frame: String) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .try_send(WsMessage::Text(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
            })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.try_send(WsMessage::Close(None));
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        debug!("Connecting to WebSocket: {}", url);

        let (ws_stream, response) = connect_async(url).await?;

        debug!("WebSocket connected, response: {:?}", response.status());

        // Split the WebSocket stream
        let (write, read) = ws_stream.split();

        // Create channels
        let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(self.config.send_queue);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(self.config.event_queue);

        let connected = Arc::new(Mutex::new(true));
        let connected_write = connected.clone();
        let connected_read = connected.clone();

        // Spawn writer task
        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = send_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            *connected_write.lock() = false;
        });

        // Spawn reader task
        tokio::spawn(async move {
            let mut read = read;

            while let Some(result) = read.next().await {
                let event = match result {
                    Ok(WsMessage::Text(text)) => TransportEvent::Data(Bytes::from(text)),
                    Ok(WsMessage::Binary(data)) => TransportEvent::Data(Bytes::from(data)),
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {
                        // Pong is handled automatically by tungstenite
                        continue;
                    }
                    Ok(WsMessage::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        info!("WebSocket closed: {:?}", reason);
                        let _ = event_tx.send(TransportEvent::Disconnected { reason }).await;
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        let _ = event_tx
                            .send(TransportEvent::Disconnected {
                                reason: Some(e.to_string()),
                            })
                            .await;
                        break;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    // Consumer is gone
                    break;
                }
            }

            *connected_read.lock() = false;
        });

        let sender = WebSocketSender {
            tx: send_tx,
            connected,
        };

        let receiver = WebSocketReceiver { rx: event_rx };

        Ok((sender, receiver))
    }
}
