//! Redis-backed store: one JSON value per session key

use super::{SessionRecord, StateStore, StoreError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

/// Store shared by every server process through one Redis instance
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisStore {
    /// Connect and verify the server answers
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        let store = Self {
            conn,
            key_prefix: key_prefix.into(),
        };
        store.ping().await?;
        tracing::info!("Connected to Redis store");
        Ok(store)
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        let json = value.ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }

    async fn set(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let key = self.key(session_id);
        let json = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(json);
        match ttl {
            Some(ttl) => {
                cmd.arg("EX").arg(ttl.as_secs().max(1));
            }
            None => {
                cmd.arg("KEEPTTL");
            }
        }

        let mut conn = self.conn.clone();
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(StoreError::Unavailable(format!(
                "unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }
}
