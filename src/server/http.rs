//! HTTP control plane: health, info, topic liveness and webhook registration.

use super::AppState;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::types::WebhookRegistration;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// For container health checks.
pub(crate) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(crate) async fn hello() -> String {
    format!(
        "Hello World, this is WalletConnect v{}",
        env!("CARGO_PKG_VERSION")
    )
}

pub(crate) async fn service_info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicQuery {
    topic: Option<String>,
}

pub(crate) async fn check_topic(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<Value>> {
    let topic = query
        .topic
        .filter(|t| !t.is_empty())
        .ok_or(RelayError::InvalidTopic)?;

    Ok(Json(json!({ "isAlive": state.relay.is_topic_alive(&topic) })))
}

pub(crate) async fn register_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let registration = parse_registration(&body, &state.config)?;
    state
        .relay
        .register_webhook(&registration.topic, &registration.webhook);
    info!(topic = %registration.topic, webhook = %registration.webhook, "Webhook registered");

    Ok(Json(json!({ "success": true })))
}

/// Validate a `{topic, webhook}` registration body against the allow-list.
pub(crate) fn parse_registration(body: &[u8], config: &RelayConfig) -> Result<WebhookRegistration> {
    let value: Value = serde_json::from_slice(body).map_err(|_| RelayError::InvalidBody)?;
    let object = value.as_object().ok_or(RelayError::InvalidBody)?;

    let topic = object
        .get("topic")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(RelayError::InvalidField("topic"))?;

    let webhook = object
        .get("webhook")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(RelayError::InvalidField("webhook"))?;

    if !config.webhook_allowed(webhook) {
        return Err(RelayError::WebhookNotAllowed(webhook.to_string()));
    }

    Ok(WebhookRegistration {
        topic: topic.to_string(),
        webhook: webhook.to_string(),
    })
}
