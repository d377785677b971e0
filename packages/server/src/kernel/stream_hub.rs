//! In-process pub/sub hub for real-time progress streaming.
//!
//! Topic-keyed broadcast channels connecting job workers (producers) to SSE
//! endpoints (consumers). Payloads are already-enveloped `serde_json::Value`
//! messages; the hub itself has no knowledge of what flows through it.
//!
//! Producers (job workers):
//!   hub.publish(&check_topic(org_id), message).await;
//!
//! Consumers (SSE endpoints):
//!   let rx = hub.subscribe(&check_topic(org_id)).await;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Topic carrying check-progress messages for one organization.
pub fn check_topic(organization_id: Uuid) -> String {
    format!("checks:{}", organization_id)
}

/// Generic in-process pub/sub hub.
///
/// Thread-safe, cloneable. Keyed by string topics.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new hub with default capacity (64 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new hub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a message to a topic. No-op if no subscribers.
    pub async fn publish(&self, topic: &str, message: serde_json::Value) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(topic) {
            // Send errors mean no active receivers
            let _ = tx.send(message);
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(topic).map_or(0, |tx| tx.receiver_count())
    }

    /// Drop channels with zero subscribers (housekeeping).
    pub async fn prune(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
