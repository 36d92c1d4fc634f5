//! Session event broadcasting
//!
//! Stores and other dependents subscribe here instead of registering
//! callbacks on the session.

use crate::core_model::Uid;
use tokio::sync::broadcast;

/// Sign-in state change announced to dependents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { uid: Uid, is_anonymous: bool },
    SignedOut,
}

impl SessionEvent {
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { is_anonymous: true, .. } => "signed_in_anonymous",
            SessionEvent::SignedIn { .. } => "signed_in",
            SessionEvent::SignedOut => "signed_out",
        }
    }
}

/// Event broadcaster for session events
///
/// Uses a tokio broadcast channel so several subsystems can follow the
/// session independently.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event, returning how many subscribers received it
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
