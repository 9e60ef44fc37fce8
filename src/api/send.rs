//! Outbound send endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::session::jid_user;

/// Request body for `POST /api/send`
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub jid: String,
    pub message: String,
}

/// Response body after a successful send
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub id: String,
}

/// `POST /api/send` — send a text message through the session
pub async fn send_message(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SendRequest>,
) -> Response {
    if jid_user(&request.jid).is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            format!("invalid JID: {}", request.jid),
        )
            .into_response();
    }

    match state
        .session
        .send_text(&request.jid, &request.message)
        .await
    {
        Ok(id) => {
            tracing::info!(to = %request.jid, id = %id, "message sent");
            Json(SendResponse { id }).into_response()
        }
        Err(e) => {
            tracing::error!(to = %request.jid, error = %e, "send failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to send message: {e}"),
            )
                .into_response()
        }
    }
}
