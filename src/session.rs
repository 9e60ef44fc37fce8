//! Protocol session capability
//!
//! The underlying messaging network is consumed as an opaque capability:
//! a stream of [`SessionEvent`]s plus the [`ProtocolSession`] operations
//! (send a message, download referenced media, report the own identity).
//! The shipped [`NetworkSession`] talks to the network's HTTP API; inbound
//! events are delivered by the network to this bridge's webhook route and
//! funneled into an mpsc channel consumed by the ingestion pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::{Error, Result};

/// An event delivered by the protocol session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session is connected and logged in
    Connected,
    /// The session lost its connection
    Disconnected,
    /// An inbound message
    Message(MessageEvent),
}

/// Envelope of one inbound message event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Globally unique message identifier
    pub id: String,

    /// When the message was sent (epoch seconds on the wire)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,

    /// Sender JID
    pub sender: String,

    /// Conversation JID (individual or group)
    pub chat: String,

    /// Whether the conversation is a group
    #[serde(default)]
    pub is_group: bool,

    /// The protocol-level payload
    pub message: RawMessage,
}

/// The opaque protocol-level message payload
///
/// A bag of optional sub-payloads mirroring the wire shape; at most one is
/// meaningful per message. This struct round-trips through the store's BLOB
/// column, so the historical decode path classifies exactly what the live
/// path saw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    /// Plain text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,

    /// Extended text (quoted/linked text messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text: Option<ExtendedTextPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaPayload>,

    /// Contact card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactPayload>,

    /// Button prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<ButtonsPayload>,

    /// List prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListPayload>,

    /// Internal key-distribution payload; carries no user content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_key_distribution: Option<KeyDistributionPayload>,
}

/// Extended text sub-payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedTextPayload {
    #[serde(default)]
    pub text: String,
}

/// Downloadable media sub-payload — the opaque handle held by the media
/// reference cache and resolved by [`ProtocolSession::download`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Network media path; absolute URL or relative to the network API
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
}

/// Contact card sub-payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcard: Option<String>,
}

/// Button prompt sub-payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonsPayload {
    #[serde(default)]
    pub content_text: String,
}

/// List prompt sub-payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub description: String,
}

/// Key-distribution sub-payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyDistributionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_jid: Option<String>,
}

/// Operations the bridge needs from the protocol session
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// JID of the account this session is logged in as, when known
    fn identity(&self) -> Option<String>;

    /// Send a text message, returning the new message identifier
    ///
    /// # Errors
    ///
    /// Returns error if the JID is rejected or the network call fails
    async fn send_text(&self, jid: &str, body: &str) -> Result<String>;

    /// Download the media referenced by a payload handle
    ///
    /// # Errors
    ///
    /// Returns error if the network fetch fails
    async fn download(&self, media: &MediaPayload) -> Result<Vec<u8>>;
}

/// Extract the user portion of a JID
///
/// `15551234567:2@s.whatsapp.net` → `15551234567`. Device suffixes (`:n`)
/// are ignored so any device of the same account compares equal.
#[must_use]
pub fn jid_user(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}

/// Whether two JIDs name the same account (user portions match)
#[must_use]
pub fn same_user(a: &str, b: &str) -> bool {
    jid_user(a) == jid_user(b)
}

/// Session backed by the messaging network's HTTP API
pub struct NetworkSession {
    api_url: String,
    access_token: String,
    own_jid: Option<String>,
    client: Client,
}

impl NetworkSession {
    /// Create a session from configuration
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            own_jid: config.own_jid.clone(),
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    to: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendTextResponse {
    id: String,
}

#[async_trait]
impl ProtocolSession for NetworkSession {
    fn identity(&self) -> Option<String> {
        self.own_jid.clone()
    }

    async fn send_text(&self, jid: &str, body: &str) -> Result<String> {
        if jid_user(jid).is_empty() {
            return Err(Error::Session(format!("invalid JID: {jid}")));
        }

        let response = self
            .client
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(&self.access_token)
            .json(&SendTextRequest { to: jid, body })
            .send()
            .await
            .map_err(|e| Error::Session(format!("network API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Session(format!(
                "network API error: {status} - {body}"
            )));
        }

        let sent: SendTextResponse = response
            .json()
            .await
            .map_err(|e| Error::Session(format!("malformed send response: {e}")))?;

        tracing::debug!(to = %jid, id = %sent.id, "message sent");
        Ok(sent.id)
    }

    async fn download(&self, media: &MediaPayload) -> Result<Vec<u8>> {
        let url = if media.path.starts_with("http://") || media.path.starts_with("https://") {
            media.path.clone()
        } else {
            format!("{}/media/{}", self.api_url, media.path)
        };

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Media(format!("media fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Media(format!(
                "media fetch failed: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Media(format!("media read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jid_user_plain() {
        assert_eq!(jid_user("15551234567@s.whatsapp.net"), "15551234567");
    }

    #[test]
    fn test_jid_user_device_suffix() {
        assert_eq!(jid_user("15551234567:2@s.whatsapp.net"), "15551234567");
    }

    #[test]
    fn test_jid_user_bare() {
        assert_eq!(jid_user("15551234567"), "15551234567");
    }

    #[test]
    fn test_same_user_across_devices() {
        assert!(same_user(
            "15551234567:2@s.whatsapp.net",
            "15551234567@s.whatsapp.net"
        ));
        assert!(!same_user(
            "15551234567@s.whatsapp.net",
            "19998887777@s.whatsapp.net"
        ));
    }

    #[test]
    fn test_message_event_round_trip() {
        let event = SessionEvent::Message(MessageEvent {
            id: "MSG-1".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            sender: "15551234567@s.whatsapp.net".to_string(),
            chat: "15551234567@s.whatsapp.net".to_string(),
            is_group: false,
            message: RawMessage {
                conversation: Some("hello".to_string()),
                ..RawMessage::default()
            },
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"message\""));

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        let SessionEvent::Message(msg) = back else {
            panic!("expected message event");
        };
        assert_eq!(msg.id, "MSG-1");
        assert_eq!(msg.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(msg.message.conversation.as_deref(), Some("hello"));
    }

    #[test]
    fn test_status_event_tags() {
        let json = serde_json::to_string(&SessionEvent::Connected).unwrap();
        assert_eq!(json, "{\"event\":\"connected\"}");

        let back: SessionEvent = serde_json::from_str("{\"event\":\"disconnected\"}").unwrap();
        assert!(matches!(back, SessionEvent::Disconnected));
    }
}
