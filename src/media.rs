//! Ephemeral media reference cache
//!
//! Maps a message identifier to the downloadable payload handle seen when
//! the message was classified, bridging the asynchronous download endpoint
//! to previously seen events. Entries live for the process lifetime; there
//! is no eviction, which trades memory growth for never losing a reference
//! while the process is up. A miss is a normal outcome (the reference
//! expired with a restart or was never registered), surfaced as not-found.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::session::MediaPayload;

/// Concurrent message-id → media-handle map
#[derive(Debug, Default)]
pub struct MediaCache {
    inner: RwLock<HashMap<String, MediaPayload>>,
}

impl MediaCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a media handle, silently replacing any previous entry for
    /// the same identifier (redelivery is idempotent, last write wins)
    pub async fn put(&self, message_id: &str, media: MediaPayload) {
        self.inner
            .write()
            .await
            .insert(message_id.to_string(), media);
    }

    /// Look up the handle for a message identifier
    pub async fn get(&self, message_id: &str) -> Option<MediaPayload> {
        self.inner.read().await.get(message_id).cloned()
    }

    /// Number of cached references
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the cache holds no references
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(path: &str) -> MediaPayload {
        MediaPayload {
            path: path.to_string(),
            ..MediaPayload::default()
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MediaCache::new();
        cache.put("MSG-1", handle("media/a")).await;

        let found = cache.get("MSG-1").await.unwrap();
        assert_eq!(found.path, "media/a");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let cache = MediaCache::new();
        assert!(cache.get("MSG-404").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MediaCache::new();
        cache.put("MSG-1", handle("media/a")).await;
        cache.put("MSG-1", handle("media/b")).await;

        assert_eq!(cache.get("MSG-1").await.unwrap().path, "media/b");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_write_wins_per_id() {
        use std::sync::Arc;

        let cache = Arc::new(MediaCache::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put(&format!("MSG-{i}"), handle("media/x")).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(cache.len().await, 16);
    }
}
