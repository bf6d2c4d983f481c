//! Matchmaking configuration

use crate::types::RoomOptions;
use serde::{Deserialize, Serialize};

/// Default room capacity
pub const DEFAULT_MAX_PLAYERS_PER_ROOM: u8 = 2;

/// Default client version; clients with different versions are never matched
pub const DEFAULT_GAME_VERSION: &str = "0.0.1";

/// Default scene loaded once a room is joined
pub const DEFAULT_ROOM_SCENE_NAME: &str = "Room for 2";

/// Settings consumed by the matchmaking state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Room capacity, enforced only by comparison against the reported count
    pub max_players_per_room: u8,
    /// Version string that segregates incompatible clients at connect time
    pub game_version: String,
    /// Scene requested through `LoadLevel` once in a room
    pub room_scene_name: String,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            max_players_per_room: DEFAULT_MAX_PLAYERS_PER_ROOM,
            game_version: DEFAULT_GAME_VERSION.to_string(),
            room_scene_name: DEFAULT_ROOM_SCENE_NAME.to_string(),
        }
    }
}

impl MatchmakingSettings {
    /// Options sent with `CreateRoom`
    pub fn room_options(&self) -> RoomOptions {
        RoomOptions {
            max_players: self.max_players_per_room,
        }
    }
}
