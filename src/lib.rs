//! Courier Bridge - messaging-network bridge and history gateway for AI agents
//!
//! This library provides the core functionality for the courier bridge:
//! - Classification of inbound protocol payloads into normalized content
//! - Durable, queryable message history over `SQLite`
//! - Ephemeral media references bridging downloads to past events
//! - Fire-and-forget forwarding to an external agent consumer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Messaging network                     │
//! │   webhook events  │  send API  │  media fetch       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Courier Bridge                        │
//! │   Ingest  │  Classify  │  History  │  Media cache   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Agent consumer (HTTP sink)              │
//! │   /api/message  │  /api/status                      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod history;
pub mod ingest;
pub mod media;
pub mod session;

pub use agent::{AgentClient, AgentMessage, ForwardedMessage, LinkStatus};
pub use config::{Config, SessionConfig};
pub use content::{Classified, ContentKind, MessageContent};
pub use db::{DbConn, DbPool, MessageQuery, MessageRepo, StoredMessage};
pub use error::{Error, Result};
pub use history::{HistoryReader, MessageRecord, RecordContent};
pub use ingest::Ingestor;
pub use media::MediaCache;
pub use session::{
    MediaPayload, MessageEvent, NetworkSession, ProtocolSession, RawMessage, SessionEvent,
};
