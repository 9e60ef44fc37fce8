//! Message history endpoint

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::ApiState;
use crate::db::MessageQuery;

/// Default number of messages returned when `limit` is absent or unparseable
pub const DEFAULT_LIMIT: i64 = 10;

/// Raw query parameters for `GET /api/messages`
///
/// Everything arrives as an optional string so malformed values fall back to
/// safe defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct MessagesParams {
    pub chat_jid: Option<String>,
    pub sender_jid: Option<String>,
    pub limit: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl MessagesParams {
    /// Lower the raw parameters into a store query
    ///
    /// Empty strings are treated as absent; time bounds must be positive
    /// epoch seconds to take effect.
    #[must_use]
    pub fn into_query(self) -> MessageQuery {
        MessageQuery {
            chat: self.chat_jid.filter(|s| !s.is_empty()),
            sender: self.sender_jid.filter(|s| !s.is_empty()),
            limit: self
                .limit
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LIMIT),
            start_time: parse_epoch(self.start_time),
            end_time: parse_epoch(self.end_time),
        }
    }
}

fn parse_epoch(value: Option<String>) -> Option<i64> {
    value.and_then(|s| s.parse().ok()).filter(|v| *v > 0)
}

/// `GET /api/messages` — filtered, chronologically ordered history
pub async fn list_messages(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<MessagesParams>,
) -> Response {
    let query = params.into_query();
    match state.history.query(&query) {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "history query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to retrieve messages: {e}"),
            )
                .into_response()
        }
    }
}
