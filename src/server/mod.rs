//! Network surface: WebSocket relay endpoint, HTTP control plane and the
//! periodic heartbeat and stats timers.
//!
//! Routes:
//! - `GET /` (WebSocket upgrade): relay connection
//! - `GET /health`: 204
//! - `GET /hello`, `GET /info`: version banners
//! - `GET /checkTopic?topic=`: `{"isAlive": bool}`
//! - `POST /subscribe`: register a webhook `{topic, webhook}`

mod http;
mod webhook;
mod ws;

pub use webhook::HttpWebhookSender;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::relay::Relay;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info};

/// State shared by every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    relay: Arc<Relay>,
    config: Arc<RelayConfig>,
}

/// HTTP + WebSocket front end for a [`Relay`].
pub struct RelayServer {
    config: Arc<RelayConfig>,
    relay: Arc<Relay>,
}

impl RelayServer {
    pub fn new(config: RelayConfig, relay: Arc<Relay>) -> Self {
        Self {
            config: Arc::new(config),
            relay,
        }
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Build the router with CORS applied.
    pub fn router(&self) -> Router {
        let origins: Vec<HeaderValue> = self
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
            .allow_origin(AllowOrigin::list(origins));

        let state = AppState {
            relay: Arc::clone(&self.relay),
            config: Arc::clone(&self.config),
        };

        Router::new()
            .route("/", get(ws::ws_handler))
            .route("/health", get(http::health))
            .route("/hello", get(http::hello))
            .route("/info", get(http::service_info))
            .route("/checkTopic", get(http::check_topic))
            .route("/subscribe", post(http::register_webhook))
            .with_state(state)
            .layer(cors)
    }

    /// Start the heartbeat and stats timers on the current runtime.
    pub fn spawn_timers(&self) -> Vec<JoinHandle<()>> {
        let heartbeat = spawn_periodic(self.config.heartbeat_interval, {
            let relay = Arc::clone(&self.relay);
            move || {
                let report = relay.heartbeat_tick();
                debug!(
                    probed = report.probed,
                    terminated = report.terminated.len(),
                    evicted = report.evicted,
                    "Heartbeat tick"
                );
            }
        });

        let stats = spawn_periodic(self.config.stats_interval, {
            let relay = Arc::clone(&self.relay);
            move || relay.log_stats()
        });

        vec![heartbeat, stats]
    }

    /// Bind, start the timers and serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.listen_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(RelayError::Bind)?;

        let timers = self.spawn_timers();
        info!("Server listening on {}", addr);

        let result = axum::serve(listener, self.router()).await;

        for timer in timers {
            timer.abort();
        }
        info!("http server exited {:?}", result);
        result.map_err(RelayError::Io)
    }
}

/// Run `tick` every `period`, starting one period from now.
fn spawn_periodic<F>(period: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            tick();
        }
    })
}
