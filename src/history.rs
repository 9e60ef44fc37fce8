//! Chronological history retrieval
//!
//! Builds filtered, bounded, time-ordered slices over the message store and
//! reconstructs normalized content for each returned row. Stored payloads go
//! through the same classifier as live ingestion, so the two paths cannot
//! drift apart; the decode path never touches the media cache (historical
//! media is not re-downloadable).

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;

use crate::content::{Classified, ContentKind, MessageContent, UNSUPPORTED_BODY};
use crate::db::{MessageQuery, MessageRepo, StoredMessage};
use crate::session::{ProtocolSession, RawMessage, same_user};
use crate::Result;

/// Time zone for the human-readable timestamp rendering
const DISPLAY_TZ: Tz = chrono_tz::Asia::Kolkata;

/// Display format, e.g. `Wed, 15 Nov 2023 03:43:20 IST`
const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Marker body for rows whose stored payload no longer parses
const PARSE_ERROR_BODY: &str = "failed to parse stored message content";

/// Content attached to a history row
///
/// A row whose payload fails to decode keeps its place in the result set
/// with an explicit error marker instead of aborting the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecordContent {
    Decoded(MessageContent),
    ParseError { error: String },
}

/// A decoded history row
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: String,

    /// Zoned display timestamp; the raw epoch form remains the queryable
    /// representation (`start_time`/`end_time` filters)
    pub timestamp: String,

    pub sender: String,

    pub chat: String,

    /// Whether the sender is the active session's own identity,
    /// computed at query time
    #[serde(rename = "isFromMe")]
    pub is_from_me: bool,

    pub content: RecordContent,
}

/// History query engine over the message store
#[derive(Clone)]
pub struct HistoryReader {
    repo: MessageRepo,
    session: Arc<dyn ProtocolSession>,
}

impl HistoryReader {
    /// Create a reader over a repository, bound to the active session for
    /// self-origin computation
    #[must_use]
    pub fn new(repo: MessageRepo, session: Arc<dyn ProtocolSession>) -> Self {
        Self { repo, session }
    }

    /// Fetch decoded records matching a query, ascending by timestamp
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails; individual rows never fail
    /// the batch (see [`RecordContent`])
    pub fn query(&self, query: &MessageQuery) -> Result<Vec<MessageRecord>> {
        let identity = self.session.identity();
        let rows = self.repo.query(query)?;
        Ok(rows
            .into_iter()
            .map(|row| decode_row(row, identity.as_deref()))
            .collect())
    }

    /// The last `limit` messages of one chat, in chronological order
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails
    pub fn recent(&self, chat: &str, limit: i64) -> Result<Vec<MessageRecord>> {
        self.query(&MessageQuery::recent_chat(chat, limit))
    }
}

fn decode_row(row: StoredMessage, identity: Option<&str>) -> MessageRecord {
    let is_from_me = identity.is_some_and(|me| same_user(&row.sender, me));

    MessageRecord {
        id: row.id,
        timestamp: format_timestamp(row.timestamp),
        sender: row.sender,
        chat: row.chat,
        is_from_me,
        content: decode_content(&row.content),
    }
}

/// Decode a stored payload BLOB into row content
fn decode_content(bytes: &[u8]) -> RecordContent {
    match serde_json::from_slice::<RawMessage>(bytes) {
        Ok(raw) => match MessageContent::classify(&raw) {
            Classified::Content(content) => RecordContent::Decoded(content),
            // Key-distribution payloads are dropped before persistence, so
            // a stored one is treated like any other non-extractable shape.
            Classified::Ignore => RecordContent::Decoded(MessageContent {
                kind: ContentKind::Unsupported,
                body: Some(UNSUPPORTED_BODY.to_string()),
                caption: None,
                mimetype: None,
                download_url: None,
            }),
        },
        Err(e) => {
            tracing::debug!(error = %e, "stored payload failed to decode");
            RecordContent::ParseError {
                error: PARSE_ERROR_BODY.to_string(),
            }
        }
    }
}

/// Render an epoch timestamp in the fixed zoned display format
fn format_timestamp(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0).map_or_else(
        || epoch.to_string(),
        |dt| dt.with_timezone(&DISPLAY_TZ).format(DISPLAY_FORMAT).to_string(),
    )
}
