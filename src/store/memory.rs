//! In-process store for single-process deployments and tests

use super::{SessionRecord, StateStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    record: SessionRecord,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Store backed by a map in this process
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) records
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(session_id) {
                Some(entry) if !entry.is_expired(now) => return Ok(entry.record.clone()),
                Some(_) => {}
                None => return Err(StoreError::NotFound(session_id.to_string())),
            }
        }

        // Expired: evict lazily
        self.entries.write().await.remove(session_id);
        tracing::debug!("Session {} expired", session_id);
        Err(StoreError::NotFound(session_id.to_string()))
    }

    async fn set(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let expires_at = match ttl {
            Some(ttl) => Some(now + ttl),
            None => entries
                .get(session_id)
                .filter(|e| !e.is_expired(now))
                .and_then(|e| e.expires_at),
        };

        entries.insert(
            session_id.to_string(),
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
