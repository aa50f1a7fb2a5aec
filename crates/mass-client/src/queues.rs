//! Player queue commands and the mirrored queue map.

use indexmap::IndexMap;
use mass_core::player::{PlayerQueue, RepeatMode};
use mass_core::{EventType, MassEvent, Result};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::MassClient;
use crate::command::CommandSender;
use crate::router::EventFilter;

/// Queues keyed by queue id, in server order.
#[derive(Default)]
pub(crate) struct QueueStore {
    queues: RwLock<IndexMap<String, PlayerQueue>>,
}

impl QueueStore {
    pub(crate) fn filter() -> EventFilter {
        EventFilter::all().events([EventType::QueueAdded, EventType::QueueUpdated])
    }

    pub(crate) async fn fetch_state(&self, sender: &dyn CommandSender) -> Result<()> {
        let raw = sender
            .send_command("player_queues/all", Value::Null, None)
            .await?;
        let queues: Vec<PlayerQueue> = serde_json::from_value(raw)?;
        let mut map = self.queues.write();
        for queue in queues {
            let _ = map.insert(queue.queue_id.clone(), queue);
        }
        debug!(count = map.len(), "queue state fetched");
        Ok(())
    }

    pub(crate) fn handle_event(&self, event: &MassEvent) {
        let Some(queue_id) = event.object_id.as_deref() else {
            warn!(event = %event.event, "queue event without object id, ignoring");
            return;
        };
        match serde_json::from_value::<PlayerQueue>(event.data.clone()) {
            Ok(queue) => {
                let _ = self.queues.write().insert(queue_id.to_string(), queue);
            }
            Err(e) => warn!(queue_id, error = %e, "undecodable queue payload, ignoring"),
        }
    }

    fn all(&self) -> Vec<PlayerQueue> {
        self.queues.read().values().cloned().collect()
    }

    fn get(&self, queue_id: &str) -> Option<PlayerQueue> {
        self.queues.read().get(queue_id).cloned()
    }
}

/// Queue controls. Obtained from [`MassClient::player_queues`].
pub struct PlayerQueues<'a> {
    client: &'a MassClient,
}

impl<'a> PlayerQueues<'a> {
    pub(crate) fn new(client: &'a MassClient) -> Self {
        Self { client }
    }

    /// All known queues.
    pub fn all(&self) -> Vec<PlayerQueue> {
        self.client.queue_store().all()
    }

    /// Queue by id.
    pub fn get(&self, queue_id: &str) -> Option<PlayerQueue> {
        self.client.queue_store().get(queue_id)
    }

    async fn cmd(&self, command: &str, args: Value) -> Result<()> {
        let _ = self.client.send_command(command, args, None).await?;
        Ok(())
    }

    /// Start or resume the queue.
    pub async fn play(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/play", json!({ "queue_id": queue_id }))
            .await
    }

    /// Pause the queue.
    pub async fn pause(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/pause", json!({ "queue_id": queue_id }))
            .await
    }

    /// Stop the queue.
    pub async fn stop(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/stop", json!({ "queue_id": queue_id }))
            .await
    }

    /// Skip to the next item.
    pub async fn next(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/next", json!({ "queue_id": queue_id }))
            .await
    }

    /// Go back to the previous item.
    pub async fn previous(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/previous", json!({ "queue_id": queue_id }))
            .await
    }

    /// Remove every item.
    pub async fn clear(&self, queue_id: &str) -> Result<()> {
        self.cmd("player_queues/clear", json!({ "queue_id": queue_id }))
            .await
    }

    /// Turn shuffle on or off.
    pub async fn shuffle(&self, queue_id: &str, shuffle_enabled: bool) -> Result<()> {
        self.cmd(
            "player_queues/shuffle",
            json!({ "queue_id": queue_id, "shuffle_enabled": shuffle_enabled }),
        )
        .await
    }

    /// Set the repeat mode.
    pub async fn repeat(&self, queue_id: &str, repeat_mode: RepeatMode) -> Result<()> {
        self.cmd(
            "player_queues/repeat",
            json!({ "queue_id": queue_id, "repeat_mode": repeat_mode }),
        )
        .await
    }
}
