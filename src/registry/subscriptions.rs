//! One bus subscription per (process, session)

use super::GameRegistry;
use crate::bus::{BusError, EventBus};
use crate::server::router;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Slot {
    refs: usize,
    task: Option<JoinHandle<()>>,
    /// Removed from the map; whoever finds it must look the session up again
    retired: bool,
}

type SlotRef = Arc<Mutex<Slot>>;

/// Owns this process's bus subscriptions and their router tasks.
///
/// Every attached connection holds one reference on its session's
/// subscription; the subscription ends when the last local connection of
/// the session releases it, or on [`Subscriptions::shutdown`].
///
/// The map lock only guards lookups. Subscribing happens under the
/// session's own slot lock, so a slow bus holds up that session alone.
pub struct Subscriptions {
    bus: Arc<dyn EventBus>,
    registry: Arc<GameRegistry>,
    active: Mutex<HashMap<String, SlotRef>>,
}

impl Subscriptions {
    pub fn new(bus: Arc<dyn EventBus>, registry: Arc<GameRegistry>) -> Self {
        Self {
            bus,
            registry,
            active: Mutex::new(HashMap::new()),
        }
    }

    async fn slot_for(&self, session_id: &str) -> SlotRef {
        let mut active = self.active.lock().await;
        Arc::clone(active.entry(session_id.to_string()).or_default())
    }

    async fn lookup(&self, session_id: &str) -> Option<SlotRef> {
        self.active.lock().await.get(session_id).cloned()
    }

    /// Drop a slot from the map, unless it was already replaced.
    /// Called with the slot locked.
    async fn retire(&self, session_id: &str, slot_ref: &SlotRef, slot: &mut Slot) {
        slot.retired = true;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        let mut active = self.active.lock().await;
        if active
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot_ref))
        {
            active.remove(session_id);
        }
    }

    /// Take a reference on the session's subscription, subscribing first if
    /// this process has none (or its stream has ended). Returns whether a
    /// new underlying subscription was created.
    pub async fn subscribe_if_absent(&self, session_id: &str) -> Result<bool, BusError> {
        loop {
            let slot_ref = self.slot_for(session_id).await;
            let mut slot = slot_ref.lock().await;
            if slot.retired {
                continue;
            }

            match slot.task.as_ref().map(JoinHandle::is_finished) {
                Some(false) => {
                    slot.refs += 1;
                    return Ok(false);
                }
                Some(true) => {
                    tracing::warn!("Subscription for session {} ended, resubscribing", session_id);
                }
                None => {}
            }

            let mut stream = match self.bus.subscribe(session_id).await {
                Ok(stream) => stream,
                Err(e) => {
                    if slot.refs == 0 {
                        self.retire(session_id, &slot_ref, &mut slot).await;
                    }
                    return Err(e);
                }
            };

            let registry = Arc::clone(&self.registry);
            let session = session_id.to_string();
            let task = tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    if event.session_id != session {
                        tracing::warn!(
                            "Event for session {} arrived on channel of {}",
                            event.session_id,
                            session
                        );
                        continue;
                    }
                    router::forward_event(&registry, &event).await;
                }
                tracing::info!("Event stream for session {} closed", session);
            });

            slot.task = Some(task);
            slot.refs += 1;
            tracing::info!("Subscribed to session {}", session_id);
            return Ok(true);
        }
    }

    /// Drop one reference; the last one tears the subscription down
    pub async fn release(&self, session_id: &str) {
        let Some(slot_ref) = self.lookup(session_id).await else {
            return;
        };
        let mut slot = slot_ref.lock().await;
        if slot.retired {
            return;
        }

        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            self.retire(session_id, &slot_ref, &mut slot).await;
            tracing::info!("Unsubscribed from session {}", session_id);
        }
    }

    pub async fn is_subscribed(&self, session_id: &str) -> bool {
        self.active.lock().await.contains_key(session_id)
    }

    /// Local references held on a session's subscription
    pub async fn ref_count(&self, session_id: &str) -> usize {
        match self.lookup(session_id).await {
            Some(slot_ref) => slot_ref.lock().await.refs,
            None => 0,
        }
    }

    pub async fn count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Stop every subscription (process shutdown)
    pub async fn shutdown(&self) {
        let slots: Vec<(String, SlotRef)> = self.active.lock().await.drain().collect();
        for (session_id, slot_ref) in slots {
            let mut slot = slot_ref.lock().await;
            slot.retired = true;
            if let Some(task) = slot.task.take() {
                task.abort();
            }
            tracing::debug!("Stopped subscription for session {}", session_id);
        }
    }
}
