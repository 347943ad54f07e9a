use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::domain_events::DomainEvent;
use crate::config::EventsConfig;

/// Fire-and-forget destination of domain events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub idempotency_key: String,
    pub event: DomainEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Broadcast publisher that drops events whose idempotency key was already seen
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
    seen: Arc<DashMap<String, ()>>,
    seen_order: Arc<Mutex<VecDeque<String>>>,
    dedupe_capacity: usize,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        Self::with_config(&EventsConfig {
            channel_capacity: capacity,
            ..EventsConfig::default()
        })
    }

    pub fn with_config(config: &EventsConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            seen: Arc::new(DashMap::new()),
            seen_order: Arc::new(Mutex::new(VecDeque::new())),
            dedupe_capacity: config.dedupe_capacity.max(1),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns false when the key was already published
    fn remember(&self, key: &str) -> bool {
        if self.seen.insert(key.to_string(), ()).is_some() {
            return false;
        }

        let mut order = self.seen_order.lock();
        order.push_back(key.to_string());
        while order.len() > self.dedupe_capacity {
            if let Some(oldest) = order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

#[async_trait]
impl EventSink for EventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let idempotency_key = event.idempotency_key();
        if !self.remember(&idempotency_key) {
            debug!(idempotency_key = %idempotency_key, "Duplicate domain event dropped");
            return Ok(());
        }

        let published = PublishedEvent {
            idempotency_key,
            event,
            published_at: chrono::Utc::now(),
        };

        // No subscribers is acceptable for fire-and-forget publishing
        match self.sender.send(published) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::with_config(&EventsConfig::default())
    }
}
