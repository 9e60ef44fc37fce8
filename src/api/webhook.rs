//! Inbound event webhook
//!
//! The messaging network delivers session events here; they are enqueued on
//! the ingestion stream and processed by the single pipeline consumer. The
//! bounded channel applies natural backpressure to the network when
//! ingestion falls behind.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::ApiState;
use crate::session::SessionEvent;

/// Webhook acknowledgement
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// `POST /api/webhook` — accept one session event from the network
pub async fn handle_event(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<SessionEvent>,
) -> (StatusCode, Json<WebhookResponse>) {
    if let SessionEvent::Message(message) = &event {
        tracing::debug!(id = %message.id, chat = %message.chat, "webhook event received");
    }

    if state.events.send(event).await.is_err() {
        tracing::error!("ingestion stream closed, rejecting webhook event");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(WebhookResponse { ok: false }),
        );
    }

    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}
