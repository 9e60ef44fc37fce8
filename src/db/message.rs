//! Message repository — the append-only raw message store

use rusqlite::types::Value;

use super::DbPool;
use crate::{Error, Result};

/// A durable raw message row
///
/// The `content` BLOB holds the serialized protocol-level payload, not the
/// normalized form; history queries decode it on the way out.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub chat: String,
    pub sender: String,
    pub content: Vec<u8>,
    /// Epoch seconds
    pub timestamp: i64,
}

/// Filter set for history queries
///
/// `None` fields are unconstrained; time bounds are inclusive epoch seconds.
/// A positive `limit` selects the `limit` most-recent matching rows, which
/// are then reordered ascending; zero or negative returns all matches
/// ascending.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub chat: Option<String>,
    pub sender: Option<String>,
    pub limit: i64,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl MessageQuery {
    /// Query for the most recent `limit` messages of one chat
    #[must_use]
    pub fn recent_chat(chat: &str, limit: i64) -> Self {
        Self {
            chat: Some(chat.to_string()),
            limit,
            ..Self::default()
        }
    }
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepo {
    pool: DbPool,
}

impl MessageRepo {
    /// Create a new message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one raw message row
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateMessage`] when a row with the same
    /// identifier already exists (redelivery), which callers swallow as
    /// benign; any other database failure is returned as-is.
    pub fn insert(&self, msg: &StoredMessage) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let inserted = conn.execute(
            "INSERT INTO messages (message_id, chat_jid, sender_jid, message_content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![msg.id, msg.chat, msg.sender, msg.content, msg.timestamp],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateMessage(msg.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch raw rows matching a query, in ascending timestamp order
    ///
    /// With a positive limit the most-recent matching rows are selected
    /// first (descending subquery) and then reordered ascending, so
    /// "the latest N" and "chronological order" hold simultaneously.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn query(&self, query: &MessageQuery) -> Result<Vec<StoredMessage>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = String::from(
            "SELECT message_id, timestamp, sender_jid, chat_jid, message_content \
             FROM messages WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(chat) = &query.chat {
            sql.push_str(" AND chat_jid = ?");
            args.push(Value::Text(chat.clone()));
        }
        if let Some(sender) = &query.sender {
            sql.push_str(" AND sender_jid = ?");
            args.push(Value::Text(sender.clone()));
        }
        if let Some(start) = query.start_time {
            sql.push_str(" AND timestamp >= ?");
            args.push(Value::Integer(start));
        }
        if let Some(end) = query.end_time {
            sql.push_str(" AND timestamp <= ?");
            args.push(Value::Integer(end));
        }

        let sql = if query.limit > 0 {
            args.push(Value::Integer(query.limit));
            format!("SELECT * FROM ({sql} ORDER BY timestamp DESC LIMIT ?) sub ORDER BY timestamp ASC")
        } else {
            format!("{sql} ORDER BY timestamp ASC")
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), |row| {
                Ok(StoredMessage {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    sender: row.get(2)?,
                    chat: row.get(3)?,
                    content: row.get(4)?,
                })
            })?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> MessageRepo {
        MessageRepo::new(init_memory().unwrap())
    }

    fn msg(id: &str, chat: &str, sender: &str, ts: i64) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            chat: chat.to_string(),
            sender: sender.to_string(),
            content: b"{}".to_vec(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_insert_and_query_by_chat() {
        let repo = setup();
        repo.insert(&msg("M1", "chat-a", "s1", 100)).unwrap();
        repo.insert(&msg("M2", "chat-b", "s1", 200)).unwrap();

        let rows = repo
            .query(&MessageQuery::recent_chat("chat-a", 10))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "M1");
    }

    #[test]
    fn test_duplicate_insert_is_rejected_once() {
        let repo = setup();
        repo.insert(&msg("M1", "chat-a", "s1", 100)).unwrap();

        let err = repo.insert(&msg("M1", "chat-a", "s1", 100)).unwrap_err();
        assert!(err.is_duplicate());

        let rows = repo.query(&MessageQuery::default()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_limit_selects_most_recent_then_ascending() {
        let repo = setup();
        for i in 1..=15 {
            repo.insert(&msg(&format!("M{i}"), "chat-a", "s1", i64::from(i) * 10))
                .unwrap();
        }

        let rows = repo
            .query(&MessageQuery::recent_chat("chat-a", 10))
            .unwrap();
        assert_eq!(rows.len(), 10);
        // The 10 most recent of 15 are records 6..=15, ascending.
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let expected: Vec<String> = (6..=15).map(|i| format!("M{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_no_limit_returns_all_ascending() {
        let repo = setup();
        repo.insert(&msg("M2", "chat-a", "s1", 200)).unwrap();
        repo.insert(&msg("M1", "chat-a", "s1", 100)).unwrap();

        let rows = repo
            .query(&MessageQuery {
                chat: Some("chat-a".to_string()),
                ..MessageQuery::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "M1");
        assert_eq!(rows[1].id, "M2");
    }

    #[test]
    fn test_sender_and_time_filters() {
        let repo = setup();
        repo.insert(&msg("M1", "chat-a", "alice", 100)).unwrap();
        repo.insert(&msg("M2", "chat-a", "bob", 200)).unwrap();
        repo.insert(&msg("M3", "chat-a", "alice", 300)).unwrap();

        let rows = repo
            .query(&MessageQuery {
                chat: Some("chat-a".to_string()),
                sender: Some("alice".to_string()),
                ..MessageQuery::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 2);

        // Inclusive bounds on both ends
        let rows = repo
            .query(&MessageQuery {
                start_time: Some(100),
                end_time: Some(200),
                ..MessageQuery::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "M1");
        assert_eq!(rows[1].id, "M2");
    }
}
