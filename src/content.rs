//! Normalized message content
//!
//! Classifies the open-ended set of protocol payload shapes into one stable,
//! typed representation. The same classifier runs on the live ingestion path
//! and on stored payloads decoded for history queries, so the two can never
//! diverge; only the live path attaches a download reference (historical
//! media is not re-downloadable through this bridge).

use serde::{Deserialize, Serialize};

use crate::session::{MediaPayload, RawMessage};

/// Diagnostic body attached to payloads outside the supported set
pub const UNSUPPORTED_BODY: &str = "message type not supported";

/// Normalized content variant tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Document,
    Audio,
    Sticker,
    Contact,
    Buttons,
    List,
    Unsupported,
}

impl ContentKind {
    /// Whether this variant carries downloadable media
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Video | Self::Document | Self::Audio | Self::Sticker
        )
    }
}

/// Normalized message content
///
/// The stable schema forwarded to the agent and reconstructed for history
/// rows. Absent fields are omitted from the JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,

    /// URL pointing back at this bridge's download endpoint.
    /// Set only on the live ingestion path for media variants.
    #[serde(
        rename = "downloadURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
}

/// Outcome of classifying a raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Internal key-distribution payload: drop the event entirely
    Ignore,
    /// Exactly one normalized variant
    Content(MessageContent),
}

impl MessageContent {
    const fn empty(kind: ContentKind) -> Self {
        Self {
            kind,
            body: None,
            caption: None,
            mimetype: None,
            download_url: None,
        }
    }

    fn text(body: &str) -> Self {
        Self {
            body: Some(body.to_string()),
            ..Self::empty(ContentKind::Text)
        }
    }

    fn media(kind: ContentKind, payload: &MediaPayload, with_caption: bool) -> Self {
        Self {
            caption: if with_caption {
                payload.caption.clone()
            } else {
                None
            },
            mimetype: payload.mimetype.clone(),
            ..Self::empty(kind)
        }
    }

    /// Classify a raw payload into exactly one normalized variant
    ///
    /// Priority order is fixed: key-distribution payloads are dropped;
    /// otherwise plain text, extended text, image, video, document, audio,
    /// sticker, contact, buttons, list — first match wins — and anything
    /// else is `unsupported` with a fixed diagnostic body. Pure: media
    /// registration and download references are the caller's concern.
    #[must_use]
    pub fn classify(raw: &RawMessage) -> Classified {
        if raw.sender_key_distribution.is_some() {
            return Classified::Ignore;
        }

        let content = if let Some(text) = raw.conversation.as_deref().filter(|t| !t.is_empty()) {
            Self::text(text)
        } else if let Some(extended) = raw.extended_text.as_ref().filter(|e| !e.text.is_empty()) {
            Self::text(&extended.text)
        } else if let Some(image) = &raw.image {
            Self::media(ContentKind::Image, image, true)
        } else if let Some(video) = &raw.video {
            Self::media(ContentKind::Video, video, true)
        } else if let Some(document) = &raw.document {
            Self::media(ContentKind::Document, document, true)
        } else if let Some(audio) = &raw.audio {
            Self::media(ContentKind::Audio, audio, false)
        } else if let Some(sticker) = &raw.sticker {
            Self::media(ContentKind::Sticker, sticker, false)
        } else if let Some(contact) = &raw.contact {
            Self {
                body: Some(contact.display_name.clone()),
                ..Self::empty(ContentKind::Contact)
            }
        } else if let Some(buttons) = &raw.buttons {
            Self {
                body: Some(buttons.content_text.clone()),
                ..Self::empty(ContentKind::Buttons)
            }
        } else if let Some(list) = &raw.list {
            Self {
                body: Some(list.description.clone()),
                ..Self::empty(ContentKind::List)
            }
        } else {
            Self {
                body: Some(UNSUPPORTED_BODY.to_string()),
                ..Self::empty(ContentKind::Unsupported)
            }
        };

        Classified::Content(content)
    }
}

impl RawMessage {
    /// The downloadable sub-structure of the winning media variant, if any
    ///
    /// Follows the same priority order as [`MessageContent::classify`], so a
    /// payload classified as a media variant always yields its handle here.
    #[must_use]
    pub fn media(&self) -> Option<&MediaPayload> {
        if self.conversation.is_some() || self.extended_text.is_some() {
            return None;
        }
        if let Some(image) = &self.image {
            Some(image)
        } else if let Some(video) = &self.video {
            Some(video)
        } else if let Some(document) = &self.document {
            Some(document)
        } else if let Some(audio) = &self.audio {
            Some(audio)
        } else if let Some(sticker) = &self.sticker {
            Some(sticker)
        } else {
            None
        }
    }
}
