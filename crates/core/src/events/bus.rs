use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::PublisherEvent;

/// In-process event bus backed by `tokio::broadcast`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<PublisherEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(
        &self,
        event: PublisherEvent,
    ) -> Result<usize, broadcast::error::SendError<PublisherEvent>> {
        self.sender.send(event)
    }

    /// Publish and ignore the outcome. Having no subscribers is not an error.
    pub fn notify(&self, event: PublisherEvent) {
        if let Err(err) = self.publish(event) {
            tracing::debug!(event = ?err.0, "event dropped, no subscribers");
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PublisherEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
