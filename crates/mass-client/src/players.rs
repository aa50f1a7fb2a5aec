//! Player commands and the mirrored player map.

use indexmap::IndexMap;
use mass_core::player::Player;
use mass_core::{EventType, MassEvent, Result};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::MassClient;
use crate::command::CommandSender;
use crate::router::EventFilter;

/// Events that change the player map.
pub(crate) const PLAYER_EVENTS: [EventType; 3] = [
    EventType::PlayerAdded,
    EventType::PlayerUpdated,
    EventType::PlayerRemoved,
];

/// Players keyed by player id, in server order.
#[derive(Default)]
pub(crate) struct PlayerStore {
    players: RwLock<IndexMap<String, Player>>,
}

impl PlayerStore {
    pub(crate) fn filter() -> EventFilter {
        EventFilter::all().events(PLAYER_EVENTS)
    }

    pub(crate) async fn fetch_state(&self, sender: &dyn CommandSender) -> Result<()> {
        let raw = sender.send_command("players/all", Value::Null, None).await?;
        let players: Vec<Player> = serde_json::from_value(raw)?;
        let mut map = self.players.write();
        for player in players {
            let _ = map.insert(player.player_id.clone(), player);
        }
        debug!(count = map.len(), "player state fetched");
        Ok(())
    }

    pub(crate) fn handle_event(&self, event: &MassEvent) {
        let Some(player_id) = event.object_id.as_deref() else {
            warn!(event = %event.event, "player event without object id, ignoring");
            return;
        };
        if event.event == EventType::PlayerRemoved {
            let _ = self.players.write().shift_remove(player_id);
            return;
        }
        match serde_json::from_value::<Player>(event.data.clone()) {
            Ok(player) => {
                let _ = self.players.write().insert(player_id.to_string(), player);
            }
            Err(e) => warn!(player_id, error = %e, "undecodable player payload, ignoring"),
        }
    }

    fn all(&self) -> Vec<Player> {
        self.players.read().values().cloned().collect()
    }

    fn get(&self, player_id: &str) -> Option<Player> {
        self.players.read().get(player_id).cloned()
    }
}

/// Player controls. Obtained from [`MassClient::players`].
///
/// Every command is a plain `send_command`; state changes come back as events.
pub struct Players<'a> {
    client: &'a MassClient,
}

impl<'a> Players<'a> {
    pub(crate) fn new(client: &'a MassClient) -> Self {
        Self { client }
    }

    /// All known players.
    pub fn all(&self) -> Vec<Player> {
        self.client.player_store().all()
    }

    /// Player by id.
    pub fn get(&self, player_id: &str) -> Option<Player> {
        self.client.player_store().get(player_id)
    }

    async fn cmd(&self, command: &str, args: Value) -> Result<()> {
        let _ = self.client.send_command(command, args, None).await?;
        Ok(())
    }

    /// Stop playback.
    pub async fn stop(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/stop", json!({ "player_id": player_id })).await
    }

    /// Start or resume playback.
    pub async fn play(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/play", json!({ "player_id": player_id })).await
    }

    /// Pause playback.
    pub async fn pause(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/pause", json!({ "player_id": player_id })).await
    }

    /// Toggle between play and pause.
    pub async fn play_pause(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/play_pause", json!({ "player_id": player_id }))
            .await
    }

    /// Power on or off.
    pub async fn power(&self, player_id: &str, powered: bool) -> Result<()> {
        self.cmd(
            "players/cmd/power",
            json!({ "player_id": player_id, "powered": powered }),
        )
        .await
    }

    /// Set volume (0..=100).
    pub async fn volume_set(&self, player_id: &str, volume_level: u8) -> Result<()> {
        self.cmd(
            "players/cmd/volume_set",
            json!({ "player_id": player_id, "volume_level": volume_level }),
        )
        .await
    }

    /// Volume up one step.
    pub async fn volume_up(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/volume_up", json!({ "player_id": player_id }))
            .await
    }

    /// Volume down one step.
    pub async fn volume_down(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/volume_down", json!({ "player_id": player_id }))
            .await
    }

    /// Mute or unmute.
    pub async fn volume_mute(&self, player_id: &str, muted: bool) -> Result<()> {
        self.cmd(
            "players/cmd/volume_mute",
            json!({ "player_id": player_id, "muted": muted }),
        )
        .await
    }

    /// Seek to `position` seconds in the current item.
    pub async fn seek(&self, player_id: &str, position: u64) -> Result<()> {
        self.cmd(
            "players/cmd/seek",
            json!({ "player_id": player_id, "position": position }),
        )
        .await
    }

    /// Next track.
    pub async fn next(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/next", json!({ "player_id": player_id })).await
    }

    /// Previous track.
    pub async fn previous(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/previous", json!({ "player_id": player_id }))
            .await
    }

    /// Switch the player to another source.
    pub async fn select_source(&self, player_id: &str, source: &str) -> Result<()> {
        self.cmd(
            "players/cmd/select_source",
            json!({ "player_id": player_id, "source": source }),
        )
        .await
    }

    /// Sync `player_id` to `target_player`.
    pub async fn group(&self, player_id: &str, target_player: &str) -> Result<()> {
        self.cmd(
            "players/cmd/group",
            json!({ "player_id": player_id, "target_player": target_player }),
        )
        .await
    }

    /// Remove `player_id` from its group.
    pub async fn ungroup(&self, player_id: &str) -> Result<()> {
        self.cmd("players/cmd/ungroup", json!({ "player_id": player_id }))
            .await
    }

    /// Join several players to `target_player`.
    pub async fn group_many(&self, target_player: &str, child_player_ids: &[&str]) -> Result<()> {
        self.cmd(
            "players/cmd/group_many",
            json!({ "target_player": target_player, "child_player_ids": child_player_ids }),
        )
        .await
    }

    /// Remove several players from their groups.
    pub async fn ungroup_many(&self, player_ids: &[&str]) -> Result<()> {
        self.cmd(
            "players/cmd/ungroup_many",
            json!({ "player_ids": player_ids }),
        )
        .await
    }

    /// Play an announcement URL, optionally with a pre-announce chime and a
    /// temporary volume.
    pub async fn play_announcement(
        &self,
        player_id: &str,
        url: &str,
        use_pre_announce: Option<bool>,
        volume_level: Option<u8>,
    ) -> Result<()> {
        self.cmd(
            "players/cmd/play_announcement",
            json!({
                "player_id": player_id,
                "url": url,
                "use_pre_announce": use_pre_announce,
                "volume_level": volume_level,
            }),
        )
        .await
    }

    /// Set the volume of a whole group.
    pub async fn group_volume(&self, player_id: &str, volume_level: u8) -> Result<()> {
        self.cmd(
            "players/cmd/group_volume",
            json!({ "player_id": player_id, "volume_level": volume_level }),
        )
        .await
    }

    /// Group volume up one step.
    pub async fn group_volume_up(&self, player_id: &str) -> Result<()> {
        self.cmd(
            "players/cmd/group_volume_up",
            json!({ "player_id": player_id }),
        )
        .await
    }

    /// Group volume down one step.
    pub async fn group_volume_down(&self, player_id: &str) -> Result<()> {
        self.cmd(
            "players/cmd/group_volume_down",
            json!({ "player_id": player_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: EventType, id: Option<&str>, data: Value) -> MassEvent {
        MassEvent::new(kind, id.map(str::to_string), data)
    }

    #[test]
    fn added_updated_removed_cycle() {
        let store = PlayerStore::default();
        store.handle_event(&event(
            EventType::PlayerAdded,
            Some("p1"),
            json!({"player_id": "p1", "name": "Kitchen"}),
        ));
        assert_eq!(store.get("p1").unwrap().name, "Kitchen");

        store.handle_event(&event(
            EventType::PlayerUpdated,
            Some("p1"),
            json!({"player_id": "p1", "name": "Kitchen", "volume_level": 30}),
        ));
        assert_eq!(store.get("p1").unwrap().volume_level, Some(30));

        store.handle_event(&event(EventType::PlayerRemoved, Some("p1"), Value::Null));
        assert!(store.get("p1").is_none());
    }

    #[test]
    fn event_without_object_id_ignored() {
        let store = PlayerStore::default();
        store.handle_event(&event(
            EventType::PlayerAdded,
            None,
            json!({"player_id": "p1"}),
        ));
        assert!(store.all().is_empty());
    }

    #[test]
    fn undecodable_payload_ignored() {
        let store = PlayerStore::default();
        store.handle_event(&event(EventType::PlayerUpdated, Some("p1"), json!("garbage")));
        assert!(store.get("p1").is_none());
    }

    #[test]
    fn filter_covers_player_events_only() {
        let filter = PlayerStore::filter();
        assert!(filter.matches(&event(EventType::PlayerRemoved, Some("p"), Value::Null)));
        assert!(!filter.matches(&event(EventType::QueueUpdated, Some("p"), Value::Null)));
    }
}
