//! Event ingestion pipeline
//!
//! The single consumer of the session event stream. Each inbound message is
//! classified, enriched with recent chat history, forwarded to the agent
//! consumer, and finally handed to a pool of persistence workers so storage
//! never delays forwarding or the next event. Forwarding and persistence are
//! independent outcomes: no failure on one side blocks the other, and one
//! bad event never halts the stream.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::{AgentClient, AgentMessage, ForwardedMessage, LinkStatus};
use crate::content::{Classified, MessageContent};
use crate::db::{MessageRepo, StoredMessage};
use crate::history::HistoryReader;
use crate::media::MediaCache;
use crate::session::{MessageEvent, ProtocolSession, SessionEvent, same_user};

/// How many chronological messages of the same chat accompany a forward
pub const HISTORY_CONTEXT_LIMIT: i64 = 10;

/// Capacity of the persistence queue; a full queue drops records rather
/// than ever blocking the forwarding path
const PERSIST_QUEUE: usize = 256;

/// Fixed number of persistence workers
const PERSIST_WORKERS: usize = 4;

/// The event ingestion pipeline
pub struct Ingestor {
    session: Arc<dyn ProtocolSession>,
    agent: AgentClient,
    history: HistoryReader,
    media: Arc<MediaCache>,
    server_base_url: String,
    persist_tx: mpsc::Sender<StoredMessage>,
}

impl Ingestor {
    /// Wire the pipeline and spawn its persistence workers
    ///
    /// `server_base_url` is the externally reachable base of this bridge,
    /// used to mint download references for media messages.
    #[must_use]
    pub fn new(
        session: Arc<dyn ProtocolSession>,
        agent: AgentClient,
        history: HistoryReader,
        media: Arc<MediaCache>,
        repo: MessageRepo,
        server_base_url: &str,
    ) -> Self {
        Self {
            session,
            agent,
            history,
            media,
            server_base_url: server_base_url.trim_end_matches('/').to_string(),
            persist_tx: spawn_persist_workers(repo),
        }
    }

    /// Consume the session event stream until it closes
    pub async fn run(self, mut events: mpsc::Receiver<SessionEvent>) {
        tracing::info!("event ingestion started");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::info!("event stream closed, ingestion stopped");
    }

    /// Process one session event
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                tracing::info!("session connected");
                self.agent.status(LinkStatus::LoggedIn);
            }
            SessionEvent::Disconnected => {
                tracing::warn!("session disconnected");
                self.agent.status(LinkStatus::Disconnected);
            }
            SessionEvent::Message(message) => self.handle_message(message).await,
        }
    }

    async fn handle_message(&self, event: MessageEvent) {
        let content = match MessageContent::classify(&event.message) {
            Classified::Ignore => {
                tracing::debug!(id = %event.id, "ignoring key distribution message");
                return;
            }
            Classified::Content(content) => content,
        };

        tracing::info!(
            id = %event.id,
            sender = %event.sender,
            chat = %event.chat,
            is_group = event.is_group,
            kind = ?content.kind,
            "message received"
        );

        let content = self.attach_media(&event, content).await;

        let is_from_me = self
            .session
            .identity()
            .is_some_and(|me| same_user(&event.sender, &me));

        let history = self
            .history
            .recent(&event.chat, HISTORY_CONTEXT_LIMIT)
            .unwrap_or_else(|e| {
                tracing::warn!(
                    chat = %event.chat,
                    error = %e,
                    "history fetch failed, forwarding without context"
                );
                Vec::new()
            });

        let forwarded = ForwardedMessage {
            message: AgentMessage {
                message_id: event.id.clone(),
                timestamp: event.timestamp,
                sender_jid: event.sender.clone(),
                chat_jid: event.chat.clone(),
                is_group: event.is_group,
                is_from_me,
                content,
            },
            history,
        };
        self.agent.message(&forwarded);

        self.enqueue_persist(&event);
    }

    /// Register a media handle and mint its download reference
    async fn attach_media(
        &self,
        event: &MessageEvent,
        mut content: MessageContent,
    ) -> MessageContent {
        if content.kind.is_media() {
            if let Some(handle) = event.message.media() {
                self.media.put(&event.id, handle.clone()).await;
                content.download_url = Some(format!(
                    "{}/api/download/{}",
                    self.server_base_url, event.id
                ));
            }
        }
        content
    }

    fn enqueue_persist(&self, event: &MessageEvent) {
        let blob = match serde_json::to_vec(&event.message) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(id = %event.id, error = %e, "failed to serialize message for storage");
                return;
            }
        };

        let record = StoredMessage {
            id: event.id.clone(),
            chat: event.chat.clone(),
            sender: event.sender.clone(),
            content: blob,
            timestamp: event.timestamp.timestamp(),
        };

        if self.persist_tx.try_send(record).is_err() {
            tracing::warn!(id = %event.id, "persistence queue full, dropping record");
        }
    }
}

/// Start the bounded persistence pool and return its submission handle
fn spawn_persist_workers(repo: MessageRepo) -> mpsc::Sender<StoredMessage> {
    let (tx, rx) = mpsc::channel::<StoredMessage>(PERSIST_QUEUE);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    for worker in 0..PERSIST_WORKERS {
        let rx = rx.clone();
        let repo = repo.clone();
        tokio::spawn(async move {
            loop {
                let record = rx.lock().await.recv().await;
                let Some(record) = record else { break };
                persist(&repo, &record);
            }
            tracing::debug!(worker, "persistence worker stopped");
        });
    }

    tx
}

fn persist(repo: &MessageRepo, record: &StoredMessage) {
    match repo.insert(record) {
        Ok(()) => {
            tracing::debug!(id = %record.id, chat = %record.chat, "message stored");
        }
        Err(e) if e.is_duplicate() => {
            tracing::debug!(id = %record.id, "duplicate message, already stored");
        }
        Err(e) => {
            tracing::warn!(id = %record.id, error = %e, "failed to store message");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;
    use wiremock::MockServer;

    use super::*;
    use crate::db::{MessageQuery, init_memory};
    use crate::session::{KeyDistributionPayload, MediaPayload, RawMessage};
    use crate::{Error, Result};

    struct StubSession;

    #[async_trait]
    impl ProtocolSession for StubSession {
        fn identity(&self) -> Option<String> {
            Some("me@s.whatsapp.net".to_string())
        }

        async fn send_text(&self, _jid: &str, _body: &str) -> Result<String> {
            Err(Error::Session("not wired in tests".to_string()))
        }

        async fn download(&self, _media: &MediaPayload) -> Result<Vec<u8>> {
            Err(Error::Session("not wired in tests".to_string()))
        }
    }

    async fn setup(server: &MockServer) -> (Ingestor, MessageRepo, Arc<MediaCache>) {
        let repo = MessageRepo::new(init_memory().unwrap());
        let session: Arc<dyn ProtocolSession> = Arc::new(StubSession);
        let media = Arc::new(MediaCache::new());
        let ingestor = Ingestor::new(
            session.clone(),
            AgentClient::new(&server.uri()),
            HistoryReader::new(repo.clone(), session),
            media.clone(),
            repo.clone(),
            "http://localhost:8080",
        );
        (ingestor, repo, media)
    }

    fn message_event(id: &str, chat: &str, message: RawMessage) -> SessionEvent {
        SessionEvent::Message(MessageEvent {
            id: id.to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            sender: "friend@s.whatsapp.net".to_string(),
            chat: chat.to_string(),
            is_group: false,
            message,
        })
    }

    async fn wait_for_rows(repo: &MessageRepo, n: usize) {
        for _ in 0..100 {
            let rows = repo.query(&MessageQuery::default()).unwrap();
            if rows.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {n} stored rows");
    }

    #[tokio::test]
    async fn test_text_message_is_persisted() {
        let server = MockServer::start().await;
        let (ingestor, repo, _media) = setup(&server).await;

        let raw = RawMessage {
            conversation: Some("hello".to_string()),
            ..RawMessage::default()
        };
        ingestor.handle_event(message_event("M1", "chat-a", raw)).await;

        wait_for_rows(&repo, 1).await;
        let rows = repo.query(&MessageQuery::default()).unwrap();
        assert_eq!(rows[0].id, "M1");
        assert_eq!(rows[0].timestamp, 1_700_000_000);

        // The stored BLOB round-trips to the original payload
        let raw: RawMessage = serde_json::from_slice(&rows[0].content).unwrap();
        assert_eq!(raw.conversation.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_media_message_registers_cache_and_url() {
        let server = MockServer::start().await;
        let (ingestor, repo, media) = setup(&server).await;

        let raw = RawMessage {
            image: Some(MediaPayload {
                path: "media/img1".to_string(),
                mimetype: Some("image/jpeg".to_string()),
                ..MediaPayload::default()
            }),
            ..RawMessage::default()
        };
        ingestor.handle_event(message_event("M1", "chat-a", raw)).await;

        assert_eq!(media.get("M1").await.unwrap().path, "media/img1");

        wait_for_rows(&repo, 1).await;

        // The forwarded payload carries the minted download reference
        for _ in 0..100 {
            if !server.received_requests().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["message"]["content"]["downloadURL"],
            "http://localhost:8080/api/download/M1"
        );
        assert_eq!(body["message"]["isFromMe"], false);
    }

    #[tokio::test]
    async fn test_key_distribution_is_dropped_entirely() {
        let server = MockServer::start().await;
        let (ingestor, repo, media) = setup(&server).await;

        let raw = RawMessage {
            sender_key_distribution: Some(KeyDistributionPayload::default()),
            ..RawMessage::default()
        };
        ingestor.handle_event(message_event("M1", "chat-a", raw)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(repo.query(&MessageQuery::default()).unwrap().is_empty());
        assert!(media.is_empty().await);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_message_is_stored_once() {
        let server = MockServer::start().await;
        let (ingestor, repo, _media) = setup(&server).await;

        let raw = RawMessage {
            conversation: Some("again".to_string()),
            ..RawMessage::default()
        };
        ingestor
            .handle_event(message_event("M1", "chat-a", raw.clone()))
            .await;
        ingestor.handle_event(message_event("M1", "chat-a", raw)).await;

        wait_for_rows(&repo, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(repo.query(&MessageQuery::default()).unwrap().len(), 1);
    }
}
