//! Shared state store - the cross-process source of truth for sessions
//!
//! Every server process reads and writes session records through a
//! [`StateStore`]. The store offers no cross-key transactions; `update` is a
//! read-merge-write and concurrent updates of one key are last-write-wins.

mod memory;
mod record;
mod redis;

pub use self::redis::RedisStore;
pub use memory::MemoryStore;
pub use record::{Member, RecordUpdate, SessionRecord, Side};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Session '{0}' has ended")]
    SessionEnded(String),

    #[error("Record invariant violated: {0}")]
    Invariant(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record for '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Key/value store holding one [`SessionRecord`] per session id
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch a record
    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError>;

    /// Overwrite a record. With `ttl = None` an existing expiry is kept.
    async fn set(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Merge the named fields into an existing record and write it back.
    ///
    /// Fails with [`StoreError::NotFound`] when there is no record; use
    /// [`StateStore::set`] to create one.
    async fn update(
        &self,
        session_id: &str,
        update: RecordUpdate,
    ) -> Result<SessionRecord, StoreError> {
        let mut record = self.get(session_id).await?;
        if update.is_empty() {
            return Ok(record);
        }
        record.apply(update)?;
        self.set(session_id, &record, None).await?;
        Ok(record)
    }
}
