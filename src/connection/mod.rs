//! Connection lifecycle manager for the single WebSocket to the probe endpoint.
//!
//! One `Connection` per open attempt, no pooling and no reconnection. Inbound
//! traffic and lifecycle transitions are delivered to a single consumer as
//! [`ConnectionEvent`]s; outbound sends are fire-and-forget through an
//! unbounded channel drained by a dedicated send task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::ConnectionError;

/// Events delivered to the consumer of a connection, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    Closed,
}

/// Cheap cloneable handle for the outbound half of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    outbound: mpsc::UnboundedSender<Message>,
    /// Cleared by `close()` so an intentional shutdown stays silent.
    notify_close: Arc<AtomicBool>,
}

impl ConnectionSender {
    /// Queues a text frame for sending. Fire-and-forget: failures are logged
    /// by the send task, never surfaced per message.
    pub fn send(&self, text: String) {
        if self.outbound.send(Message::Text(text)).is_err() {
            warn!("Dropping send on closed connection");
        }
    }

    /// Initiates shutdown. Close notification is suppressed first so an
    /// intentional close never looks like a remote failure. The connection
    /// is unusable afterwards.
    pub fn close(&self) {
        self.notify_close.store(false, Ordering::SeqCst);
        if self.outbound.send(Message::Close(None)).is_err() {
            debug!("Connection already closed");
        }
    }
}

pub struct Connection {
    sender: ConnectionSender,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Connection {
    /// Opens a WebSocket connection to `endpoint`, failing if the handshake
    /// does not complete within `connect_timeout`.
    pub async fn open(
        endpoint: &str,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let url = Url::parse(endpoint)
            .map_err(|e| ConnectionError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        info!("Connecting to {}", url);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout(endpoint.to_string()))?
            .map_err(|source| ConnectionError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        info!("Connection to {} established", endpoint);

        let (ws_sink, ws_stream) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let notify_close = Arc::new(AtomicBool::new(true));

        let _ = event_tx.send(ConnectionEvent::Opened);

        // Forward outbound messages to the socket.
        tokio::spawn(async move {
            let mut ws_sink = ws_sink;
            let mut out_rx: mpsc::UnboundedReceiver<Message> = out_rx;

            while let Some(message) = out_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_sink.send(message).await {
                    error!("Error sending WebSocket message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }

            if let Err(e) = ws_sink.close().await {
                debug!("Error closing WebSocket sink: {}", e);
            }
        });

        // Route inbound frames to the event channel.
        let notify = notify_close.clone();
        tokio::spawn(async move {
            let mut ws_stream = ws_stream;

            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(ConnectionEvent::Message(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(reason)) => {
                        info!("Server closed connection: {:?}", reason);
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(other) => {
                        warn!("Ignoring unsupported message: {:?}", other);
                    }
                    Err(e) => {
                        error!("Error receiving WebSocket message: {}", e);
                        break;
                    }
                }
            }

            if notify.load(Ordering::SeqCst) {
                let _ = event_tx.send(ConnectionEvent::Closed);
            }
        });

        Ok(Self {
            sender: ConnectionSender {
                outbound: out_tx,
                notify_close,
            },
            events: event_rx,
        })
    }

    /// Outbound handle, independent of the event side.
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    /// Queues a text frame for sending. Fire-and-forget.
    pub fn send(&self, text: String) {
        self.sender.send(text);
    }

    /// Waits for the next connection event. `None` once the connection is
    /// gone and all pending events have been drained.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Initiates shutdown; see [`ConnectionSender::close`].
    pub fn close(&mut self) {
        self.sender.close();
    }

    /// Test double wired to raw channels instead of a socket.
    #[cfg(test)]
    pub(crate) fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedSender<ConnectionEvent>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = Self {
            sender: ConnectionSender {
                outbound: out_tx,
                notify_close: Arc::new(AtomicBool::new(true)),
            },
            events: event_rx,
        };
        (connection, out_rx, event_tx)
    }
}
