//! WebSocket transport for relay connections.

use super::AppState;
use crate::connection::{Connection, ConnectionHandle, Outbound};
use crate::error::{RelayError, Result};
use crate::relay::Relay;
use crate::types::ConnectionId;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Server side of a WebSocket, as seen by the relay.
///
/// Writes go through an unbounded queue drained by the socket's send task,
/// so sending never blocks the routing path.
pub(crate) struct WsConnection {
    id: ConnectionId,
    open: AtomicBool,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl WsConnection {
    fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            open: AtomicBool::new(true),
            outbound,
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn send_text(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(RelayError::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| RelayError::ConnectionClosed)
    }

    fn ping(&self) {
        if self.is_open() {
            let _ = self.outbound.send(Outbound::Ping);
        }
    }

    fn terminate(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

pub(crate) async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let id = relay.next_connection_id();
    let connection = Arc::new(WsConnection::new(id, tx));
    let handle: ConnectionHandle = connection.clone();
    relay.connect(handle.clone());

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let result = match frame {
                Outbound::Text(text) => sender.send(Message::Text(text.into())).await,
                Outbound::Ping => sender.send(Message::Ping(Bytes::new())).await,
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!(connection = %id, error = %e, "Error sending message");
                break;
            }
        }
    });

    let recv_relay = Arc::clone(&relay);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    let _ = recv_relay.handle_frame(&handle, text.as_str());
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        let _ = recv_relay.handle_frame(&handle, text);
                    }
                    Err(_) => debug!(connection = %id, "Ignoring non UTF-8 binary frame"),
                },
                Message::Pong(_) => recv_relay.heartbeat_received(id),
                // Pings are answered by the transport itself.
                Message::Ping(_) => {}
                Message::Close(frame) => {
                    if let Some(cf) = frame {
                        debug!(connection = %id, code = cf.code, reason = cf.reason.as_str(), "Close received");
                    }
                    break;
                }
            }
        }
    });

    // If any one of the tasks exit, abort the other.
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    connection.mark_closed();
    relay.disconnect(id);
    info!(connection = %id, "Websocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_closed_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection::new(ConnectionId(1), tx);
        assert!(conn.is_open());

        drop(rx);
        assert!(!conn.is_open());
        assert!(matches!(
            conn.send_text("x".into()),
            Err(RelayError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_terminate_queues_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = WsConnection::new(ConnectionId(1), tx);

        conn.send_text("a".into()).unwrap();
        conn.terminate();
        conn.ping();

        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("a".into()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
        assert!(!conn.is_open());
    }
}
