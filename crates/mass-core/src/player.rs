//! Player and queue state snapshots.
//!
//! Only the fields the client itself reads are modelled; everything else is
//! kept in `extra` so callers can still reach it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Playback state of a player or queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing is playing.
    #[default]
    Idle,
    /// Paused.
    Paused,
    /// Playing.
    Playing,
    /// Anything newer than this client.
    #[serde(other)]
    Unknown,
}

/// A player as reported by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player id.
    pub player_id: String,
    /// Provider instance backing the player.
    #[serde(default)]
    pub provider: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether the player is reachable.
    #[serde(default)]
    pub available: bool,
    /// Power state, if the player supports it.
    #[serde(default)]
    pub powered: Option<bool>,
    /// Volume 0..=100, if known.
    #[serde(default)]
    pub volume_level: Option<u8>,
    /// Mute state, if known.
    #[serde(default)]
    pub volume_muted: Option<bool>,
    /// Playback state.
    #[serde(default)]
    pub state: PlaybackState,
    /// Id of the active source (a queue id when the server drives playback).
    #[serde(default)]
    pub active_source: Option<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Queue repeat mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// No repeat.
    #[default]
    Off,
    /// Repeat the current item.
    One,
    /// Repeat the whole queue.
    All,
}

/// A player queue as reported by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerQueue {
    /// Unique queue id (equals the owning player's id).
    pub queue_id: String,
    /// Whether the queue is active on its player.
    #[serde(default)]
    pub active: bool,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Whether shuffle is on.
    #[serde(default)]
    pub shuffle_enabled: bool,
    /// Repeat mode.
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    /// Number of items in the queue.
    #[serde(default)]
    pub items: u64,
    /// Index of the current item.
    #[serde(default)]
    pub current_index: Option<u64>,
    /// Playback state.
    #[serde(default)]
    pub state: PlaybackState,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
