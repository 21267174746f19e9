//! Server module - WebSocket listener, per-connection handling, and the
//! process-wide services they share

mod connection;
pub mod game;
mod listener;
pub mod router;
mod session;

pub use connection::{
    client_writer_task, identity_from_cookies, session_id_from_path, ClientConnection, Delivery,
    DeliveryStats,
};
pub use listener::ServerListener;
pub use session::{CreatedSession, SessionError, SessionInfo, SessionManager};

use crate::bus::EventBus;
use crate::clock::{SystemTime, TimeSource};
use crate::config::ServerConfig;
use crate::registry::{GameRegistry, Subscriptions};
use crate::rules::RulesEngine;
use crate::store::StateStore;
use serde::Serialize;
use std::sync::Arc;

/// Everything one server process shares between its connections.
///
/// Built once at startup and passed by reference; several contexts can
/// share one store and bus to act as separate processes.
pub struct ServerContext {
    pub config: ServerConfig,
    pub store: Arc<dyn StateStore>,
    pub bus: Arc<dyn EventBus>,
    pub rules: Arc<dyn RulesEngine>,
    pub time: Arc<dyn TimeSource>,
    pub registry: Arc<GameRegistry>,
    pub subscriptions: Subscriptions,
    pub stats: Arc<DeliveryStats>,
}

/// Health as reported by the `status` command
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub store_available: bool,
    pub sessions: usize,
    pub connections: usize,
    pub subscriptions: usize,
    pub dropped_messages: u64,
    pub unencodable_messages: u64,
}

impl ServerContext {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn StateStore>,
        bus: Arc<dyn EventBus>,
        rules: Arc<dyn RulesEngine>,
    ) -> Self {
        let registry = Arc::new(GameRegistry::new());
        let subscriptions = Subscriptions::new(Arc::clone(&bus), Arc::clone(&registry));
        Self {
            config,
            store,
            bus,
            rules,
            time: Arc::new(SystemTime),
            registry,
            subscriptions,
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    /// Replace the wall clock, e.g. with [`crate::clock::ManualTime`]
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub async fn health(&self) -> Health {
        let store_available = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Store health check failed: {}", e);
                false
            }
        };
        Health {
            store_available,
            sessions: self.registry.len().await,
            connections: self.registry.connection_count().await,
            subscriptions: self.subscriptions.count().await,
            dropped_messages: self.stats.dropped(),
            unencodable_messages: self.stats.unencodable(),
        }
    }

    /// Stop all bus subscriptions
    pub async fn shutdown(&self) {
        self.subscriptions.shutdown().await;
    }
}
