//! Best-effort delivery to the external agent consumer
//!
//! The consumer is an HTTP sink. Delivery is at-most-once with no retry and
//! no acknowledgement: a failed POST is logged and dropped, and callers must
//! never assume a notification arrived. Nothing here blocks the ingestion
//! path. There is no explicit request timeout beyond the client defaults; a
//! hung consumer is an accepted risk surface.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::MessageContent;
use crate::history::MessageRecord;
use crate::Result;

/// Consumer route for forwarded messages
const MESSAGE_PATH: &str = "/api/message";

/// Consumer route for connection status updates
const STATUS_PATH: &str = "/api/status";

/// Normalized message forwarded to the consumer
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    #[serde(rename = "messageID")]
    pub message_id: String,

    pub timestamp: DateTime<Utc>,

    #[serde(rename = "senderJID")]
    pub sender_jid: String,

    #[serde(rename = "chatJID")]
    pub chat_jid: String,

    #[serde(rename = "isGroup")]
    pub is_group: bool,

    #[serde(rename = "isFromMe")]
    pub is_from_me: bool,

    pub content: MessageContent,
}

/// Combined payload delivered per inbound message
#[derive(Debug, Clone, Serialize)]
pub struct ForwardedMessage {
    pub message: AgentMessage,

    /// The last messages of the same chat, chronological
    pub history: Vec<MessageRecord>,
}

/// Session connection state reported to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    LoggedIn,
    Disconnected,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct StatusUpdate {
    status: LinkStatus,
}

/// Fire-and-forget HTTP client for the agent consumer
#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    client: reqwest::Client,
}

impl AgentClient {
    /// Create a client for a consumer base URL
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Forward a normalized message with its chat history
    pub fn message(&self, payload: &ForwardedMessage) {
        self.notify(MESSAGE_PATH, payload);
    }

    /// Report a connection status change
    pub fn status(&self, status: LinkStatus) {
        self.notify(STATUS_PATH, &StatusUpdate { status });
    }

    /// Deliver a JSON payload without waiting for the outcome
    ///
    /// The POST runs on a spawned task; failures are logged at warn and
    /// dropped, never retried.
    fn notify<T: Serialize>(&self, path: &'static str, payload: &T) {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(path, error = %e, "failed to serialize agent payload");
                return;
            }
        };

        let client = self.clone();
        drop(tokio::spawn(async move {
            if let Err(e) = client.post(path, &body).await {
                tracing::warn!(path, error = %e, "agent delivery failed");
            } else {
                tracing::debug!(path, "agent notified");
            }
        }));
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
