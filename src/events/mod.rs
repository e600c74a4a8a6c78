//! Bounded provider-event bus.
//!
//! Producers never block on slow consumers: `publish` is a non-blocking
//! offer, and a full queue hands the event to the dropped-event callback
//! instead. The blocking variant exists only for terminal errors the
//! subscriber must see.


use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::error;
use tracing::warn;

use crate::resolution::ErrorCode;

/// Queue capacity; beyond this, events are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Kind of provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventType {
    /// A change-stream (or polling) event was applied to the cache.
    ConfigChange,
    /// The provider hit an error; fatal when `error_code` says so.
    Error,
}

impl std::fmt::Display for ProviderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProviderEventType::ConfigChange => "PROVIDER_CONFIG_CHANGE",
            ProviderEventType::Error => "PROVIDER_ERROR",
        })
    }
}

/// An event published to the provider's subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub provider_name: &'static str,
    pub event_type: ProviderEventType,
    pub message: String,
    pub error_code: Option<ErrorCode>,
}

/// Invoked with events discarded because the queue was full.
pub type DroppedEventHandler = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Publishing side of the bus. Cloneable; the channel closes once every
/// clone is dropped (the provider drops its handle during shutdown, the
/// watcher's clone unwinds with its task).
#[derive(Clone)]
pub struct EventHandler {
    sender: mpsc::Sender<ProviderEvent>,
    on_dropped: DroppedEventHandler,
}

impl EventHandler {
    /// Creates the bus and hands back the read-only side.
    pub fn new(on_dropped: DroppedEventHandler) -> (Self, mpsc::Receiver<ProviderEvent>) {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { sender, on_dropped }, receiver)
    }

    /// Default dropped-event callback: log and move on.
    pub fn logging_dropped_handler(provider_name: &'static str) -> DroppedEventHandler {
        Arc::new(move |event: &ProviderEvent| {
            error!(provider = provider_name, ?event, "event dropped, channel full");
        })
    }

    /// Non-blocking offer. A full queue routes the event to the
    /// dropped-event callback.
    pub fn publish(&self, event: ProviderEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => (self.on_dropped)(&event),
            Err(TrySendError::Closed(event)) => {
                warn!(?event, "event published after the bus closed");
            }
        }
    }

    /// Waits for queue space. Reserved for terminal events where loss is
    /// unacceptable; not subject to cancellation.
    pub async fn publish_blocking(&self, event: ProviderEvent) {
        if let Err(err) = self.sender.send(event).await {
            warn!(event = ?err.0, "event published after the bus closed");
        }
    }

    /// Releases this handle's slot on the queue.
    pub fn close(self) {}
}
