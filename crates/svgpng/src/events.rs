//! Session change notifications for presentation layers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::batch::BatchSummary;
use crate::entry::{EntryId, EntrySnapshot};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEventKind {
    EntryAdded {
        entry: EntrySnapshot,
    },
    EntryChanged {
        entry: EntrySnapshot,
    },
    EntryRemoved {
        id: EntryId,
    },
    Cleared {
        removed: usize,
    },
    /// Aggregates behind the "convert all" and "download all" actions.
    #[serde(rename_all = "camelCase")]
    CountsChanged {
        pending: usize,
        downloadable: usize,
    },
    BatchStarted {
        pending: usize,
    },
    BatchFinished {
        summary: BatchSummary,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Receives every session event synchronously, in emission order.
///
/// Called without any session lock held, so implementations may call back
/// into the session.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&self, _event: &SessionEvent) {}
}

/// Fans session events out over a tokio broadcast channel.
#[derive(Clone)]
pub struct SessionBroadcaster {
    sender: Arc<broadcast::Sender<SessionEvent>>,
}

impl SessionBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SessionObserver for SessionBroadcaster {
    fn on_event(&self, event: &SessionEvent) {
        self.send(event.clone());
    }
}
