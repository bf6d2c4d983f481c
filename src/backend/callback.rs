//! Backend callback shapes and their translation into matchmaking events

use crate::error::{MatchmakingError, Result};
use crate::types::{DisconnectCause, MatchmakingEvent, RoomId, RoomSnapshot};
use serde::{Deserialize, Serialize};

/// Return code reported when no open room is available for a random join
pub const NO_RANDOM_MATCH_FOUND: i16 = 32760;

/// Room details as the backend reports them alongside a callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRoom {
    pub name: RoomId,
    pub player_count: u32,
    pub max_players: u8,
}

/// Callbacks as delivered by the realtime backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendCallback {
    ConnectedToMaster,
    Disconnected {
        cause: DisconnectCause,
    },
    JoinRandomFailed {
        return_code: i16,
        message: String,
    },
    JoinedRoom {
        current_room: CurrentRoom,
    },
    PlayerEnteredRoom {
        current_room: CurrentRoom,
    },
    PlayerLeftRoom {
        current_room: CurrentRoom,
    },
}

impl From<CurrentRoom> for RoomSnapshot {
    fn from(room: CurrentRoom) -> Self {
        Self {
            room_id: room.name,
            player_count: room.player_count,
            max_players: room.max_players,
        }
    }
}

impl From<BackendCallback> for MatchmakingEvent {
    fn from(callback: BackendCallback) -> Self {
        match callback {
            BackendCallback::ConnectedToMaster => MatchmakingEvent::ConnectedToMaster,
            BackendCallback::Disconnected { cause } => MatchmakingEvent::Disconnected { cause },
            BackendCallback::JoinRandomFailed {
                return_code,
                message,
            } => MatchmakingEvent::JoinRandomFailed {
                code: return_code,
                message,
            },
            BackendCallback::JoinedRoom { current_room } => MatchmakingEvent::JoinedRoom {
                room: current_room.into(),
            },
            BackendCallback::PlayerEnteredRoom { current_room } => {
                MatchmakingEvent::PlayerEnteredRoom {
                    room: current_room.into(),
                }
            }
            BackendCallback::PlayerLeftRoom { current_room } => MatchmakingEvent::PlayerLeftRoom {
                room: current_room.into(),
            },
        }
    }
}

/// Decode a JSON-encoded backend callback
pub fn decode_callback(bytes: &[u8]) -> Result<BackendCallback> {
    serde_json::from_slice(bytes).map_err(|e| {
        MatchmakingError::InvalidCallback {
            reason: format!("Failed to deserialize callback: {}", e),
        }
        .into()
    })
}
