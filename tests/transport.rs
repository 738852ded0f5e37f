//! Tests for the network transports: the WebSocket loop and the HTTP
//! webhook sender, each against a real local listener.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bridge_relay::{
    HttpWebhookSender, Relay, RelayConfig, RelayServer, SocketMessage, WebhookNotice,
    WebhookSender,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct NoopSender;

impl WebhookSender for NoopSender {
    fn send(&self, _url: &str, _notice: WebhookNotice) {}
}

async fn serve_relay(relay: Arc<Relay>) -> SocketAddr {
    let server = RelayServer::new(RelayConfig::default(), relay);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = server.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Local webhook target that forwards every JSON body it receives.
async fn serve_hook() -> (SocketAddr, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(body);
                StatusCode::OK
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rx)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn subscribe(relay: &Relay, ws: &mut WsClient, topic: &str) {
    let before = relay.subscriptions().subscribers_of(topic).len();
    let frame = format!(r#"{{"topic":"{topic}","type":"sub","payload":"","time":0}}"#);
    ws.send(Message::text(frame)).await.unwrap();
    wait_until(|| relay.subscriptions().subscribers_of(topic).len() == before + 1).await;
}

/// Read until the server pings, then answer it.
async fn answer_ping(ws: &mut WsClient) {
    loop {
        match timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Ping(payload))) => {
                ws.send(Message::Pong(payload)).await.unwrap();
                return;
            }
            Some(Ok(_)) => continue,
            other => panic!("Expected ping, got {:?}", other),
        }
    }
}

/// Round-trip the text keepalive. The server handles frames in order, so
/// everything sent before it has been processed once the reply arrives.
async fn sync(ws: &mut WsClient) {
    ws.send(Message::text("ping")).await.unwrap();
    loop {
        match timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) if text.as_str() == "pong" => return,
            Some(Ok(_)) => continue,
            other => panic!("Expected pong, got {:?}", other),
        }
    }
}

// --- WebSocket loop ---

#[tokio::test]
async fn test_ws_pong_keeps_connection_alive() {
    let relay = Arc::new(Relay::new(Arc::new(NoopSender)));
    let addr = serve_relay(Arc::clone(&relay)).await;

    let mut answering = connect(addr).await;
    let mut silent = connect(addr).await;
    subscribe(&relay, &mut answering, "x").await;
    subscribe(&relay, &mut silent, "x").await;
    assert_eq!(relay.stats().connections, 2);

    let first = relay.heartbeat_tick();
    assert_eq!(first.probed, 2);

    answer_ping(&mut answering).await;
    sync(&mut answering).await;

    let second = relay.heartbeat_tick();
    assert_eq!(second.terminated.len(), 1);
    assert_eq!(second.probed, 1);

    let subs = relay.subscriptions().subscribers_of("x");
    assert_eq!(subs.len(), 1);
    assert!(!second.terminated.contains(&subs[0].connection_id()));

    // The terminated socket's loop exits and finds nothing left to tear down.
    let terminated = second.terminated[0];
    wait_until(|| relay.stats().connections == 1).await;
    assert!(!relay.disconnect(terminated));
    assert_eq!(relay.subscriptions().subscribers_of("x").len(), 1);
}

#[tokio::test]
async fn test_ws_close_disconnects_once() {
    let relay = Arc::new(Relay::new(Arc::new(NoopSender)));
    let addr = serve_relay(Arc::clone(&relay)).await;

    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;
    subscribe(&relay, &mut leaving, "x").await;
    subscribe(&relay, &mut staying, "x").await;
    subscribe(&relay, &mut leaving, "y").await;

    let ids: Vec<_> = relay
        .subscriptions()
        .subscribers_of("y")
        .iter()
        .map(|s| s.connection_id())
        .collect();
    assert_eq!(ids.len(), 1);
    let leaving_id = ids[0];

    leaving.close(None).await.unwrap();
    wait_until(|| relay.stats().connections == 1).await;

    assert!(!relay.subscriptions().contains_topic("y"));
    let remaining = relay.subscriptions().subscribers_of("x");
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].connection_id(), leaving_id);
    assert!(!relay.disconnect(leaving_id));

    // The other connection still routes.
    relay.publish(SocketMessage::publish("x", "after"));
    loop {
        match timeout(WAIT, staying.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(value["payload"], "after");
                break;
            }
            Some(Ok(_)) => continue,
            other => panic!("Expected delivery, got {:?}", other),
        }
    }
}

// --- Webhook sender ---

#[tokio::test]
async fn test_webhook_posts_topic_json() {
    let (addr, mut bodies) = serve_hook().await;
    let sender = HttpWebhookSender::new(tokio::runtime::Handle::current());

    sender.send(
        &format!("http://{addr}/hook"),
        WebhookNotice { topic: "x".into() },
    );

    let body = timeout(WAIT, bodies.recv()).await.unwrap().unwrap();
    assert_eq!(body, json!({ "topic": "x" }));
}

#[tokio::test]
async fn test_publish_reaches_registered_webhook() {
    let (addr, mut bodies) = serve_hook().await;
    let sender = Arc::new(HttpWebhookSender::new(tokio::runtime::Handle::current()));
    let relay = Relay::new(sender);
    relay.register_webhook("wallet", &format!("http://{addr}/hook"));

    relay.publish(SocketMessage::publish("wallet", "p"));

    let body = timeout(WAIT, bodies.recv()).await.unwrap().unwrap();
    assert_eq!(body, json!({ "topic": "wallet" }));
}

#[tokio::test]
async fn test_unreachable_webhook_is_ignored() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sender = HttpWebhookSender::new(tokio::runtime::Handle::current());
    sender.send(&format!("http://{addr}/hook"), WebhookNotice { topic: "x".into() });
    sleep(Duration::from_millis(50)).await;
}
