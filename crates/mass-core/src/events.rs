//! Server-pushed events.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of an unsolicited server event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A player appeared.
    PlayerAdded,
    /// A player's state changed.
    PlayerUpdated,
    /// A player went away.
    PlayerRemoved,
    /// A player's settings changed.
    PlayerSettingsUpdated,
    /// A player's configuration changed.
    PlayerConfigUpdated,
    /// A queue appeared.
    QueueAdded,
    /// A queue's state changed.
    QueueUpdated,
    /// The items of a queue changed.
    QueueItemsUpdated,
    /// Elapsed time of a queue changed.
    QueueTimeUpdated,
    /// A media item was added to the library.
    MediaItemAdded,
    /// A library media item changed.
    MediaItemUpdated,
    /// A media item was removed from the library.
    MediaItemDeleted,
    /// The provider set changed; payload is the full instance snapshot.
    ProvidersUpdated,
    /// Background sync tasks changed.
    SyncTasksUpdated,
    /// The server is shutting down.
    Shutdown,
    /// The server application is shutting down.
    ApplicationShutdown,
    /// An event type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "unknown".to_owned());
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// An event received from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassEvent {
    /// Event kind.
    pub event: EventType,
    /// Id of the object the event is about (player id, queue id, uri), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl MassEvent {
    /// Build an event.
    pub fn new(event: EventType, object_id: Option<String>, data: Value) -> Self {
        Self {
            event,
            object_id,
            data,
        }
    }
}
