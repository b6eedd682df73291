//! Event Bus - lifecycle and diagnostic notifications from the router
//!
//! Protocol events go through `cdp::dispatcher`. This bus carries what the
//! router itself observes: sessions coming and going, target tree changes,
//! disconnects, and messages it had to drop.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::cdp::protocol::{RequestId, SessionId, TargetId};

/// Why a session left the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetachReason {
    /// `detach()` called locally
    Client,
    /// `Target.detachedFromTarget` from the browser
    Remote,
    /// Parent session went away
    ParentDetached,
    /// The target it was bound to was destroyed
    TargetDestroyed,
    /// Whole connection closed
    ConnectionClosed,
}

/// Messages the router received but could not route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// Response id with no pending call
    UnknownResponse {
        id: RequestId,
        session_id: Option<SessionId>,
    },
    /// Event for a session the registry does not know
    UnknownSession { session_id: SessionId, method: String },
    /// Frame that could not be decoded
    Malformed { raw: String, reason: String },
    /// Early-event queue for an attaching session overflowed
    EarlyEventDropped { session_id: SessionId, method: String },
}

/// Router events that can be observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterEvent {
    SessionAttached {
        session_id: SessionId,
        target_id: TargetId,
        parent_session_id: Option<SessionId>,
    },
    SessionDetached {
        session_id: SessionId,
        target_id: TargetId,
        reason: DetachReason,
    },
    TargetCreated { target_id: TargetId },
    TargetInfoChanged { target_id: TargetId },
    TargetDestroyed { target_id: TargetId },
    TargetCrashed { session_id: SessionId },
    Disconnected,
    Diagnostic(Diagnostic),
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: RouterEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(RouterEvent::Disconnected);
        bus.publish(RouterEvent::Diagnostic(Diagnostic::UnknownResponse {
            id: 42,
            session_id: None,
        }));

        assert_eq!(rx.recv().await.unwrap(), RouterEvent::Disconnected);
        match rx.recv().await {
            Ok(RouterEvent::Diagnostic(Diagnostic::UnknownResponse { id: 42, .. })) => {}
            other => panic!("Expected diagnostic, got {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::with_capacity(0);
        bus.publish(RouterEvent::Disconnected);
    }
}
