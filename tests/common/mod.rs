//! Shared test utilities

use async_trait::async_trait;
use courier_bridge::{db, DbPool, MediaPayload, ProtocolSession, RawMessage, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Deterministic in-memory protocol session
pub struct StubSession {
    identity: Option<String>,
    media_bytes: Vec<u8>,
}

impl StubSession {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Some(identity.to_string()),
            media_bytes: Vec::new(),
        }
    }

    /// Fix the bytes returned by `download`
    pub fn with_media(identity: &str, media_bytes: Vec<u8>) -> Self {
        Self {
            identity: Some(identity.to_string()),
            media_bytes,
        }
    }
}

#[async_trait]
impl ProtocolSession for StubSession {
    fn identity(&self) -> Option<String> {
        self.identity.clone()
    }

    async fn send_text(&self, _jid: &str, _body: &str) -> Result<String> {
        Ok("SENT-1".to_string())
    }

    async fn download(&self, _media: &MediaPayload) -> Result<Vec<u8>> {
        Ok(self.media_bytes.clone())
    }
}

/// Serialize a plain text payload the way the ingestion pipeline stores it
pub fn text_payload(body: &str) -> RawMessage {
    RawMessage {
        conversation: Some(body.to_string()),
        ..RawMessage::default()
    }
}
