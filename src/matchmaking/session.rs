//! Session: this client's local view of its matchmaking progress

use crate::types::{DisconnectCause, RoomPhase, RoomSnapshot, SessionId, SessionState};
use crate::utils::{current_timestamp, generate_session_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mutable matchmaking state, owned by the controller
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    game_version: String,
    created_at: DateTime<Utc>,
    state_changed_at: DateTime<Utc>,
    connect_requests: u64,
    last_disconnect_cause: Option<DisconnectCause>,
    room: Option<RoomSnapshot>,
}

/// Read-only copy of a session published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub wants_to_join: bool,
    pub game_version: String,
    pub created_at: DateTime<Utc>,
    pub state_changed_at: DateTime<Utc>,
    pub connect_requests: u64,
    pub last_disconnect_cause: Option<DisconnectCause>,
    pub room: Option<RoomSnapshot>,
}

impl Session {
    /// Create a new idle session; the game version is fixed from here on
    pub fn new(game_version: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: generate_session_id(),
            state: SessionState::Idle,
            game_version: game_version.into(),
            created_at: now,
            state_changed_at: now,
            connect_requests: 0,
            last_disconnect_cause: None,
            room: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    pub fn wants_to_join(&self) -> bool {
        self.state.wants_to_join()
    }

    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.room.as_ref()
    }

    pub fn state_changed_at(&self) -> DateTime<Utc> {
        self.state_changed_at
    }

    /// Move to `next`, returning the previous state
    ///
    /// The recorded room is dropped whenever `next` means the client is no
    /// longer a member: back to idle, or leaving an overfull room.
    pub(crate) fn set_state(&mut self, next: SessionState) -> SessionState {
        let previous = self.state;
        if previous != next {
            self.state = next;
            self.state_changed_at = current_timestamp();
        }
        if matches!(
            next,
            SessionState::Idle | SessionState::InRoom(RoomPhase::Overflow)
        ) {
            self.room = None;
        }
        previous
    }

    pub(crate) fn record_connect_request(&mut self) {
        self.connect_requests += 1;
    }

    pub(crate) fn record_disconnect(&mut self, cause: DisconnectCause) {
        self.last_disconnect_cause = Some(cause);
    }

    pub(crate) fn record_room(&mut self, room: RoomSnapshot) {
        self.room = Some(room);
    }

    /// Take a snapshot for observers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            wants_to_join: self.wants_to_join(),
            game_version: self.game_version.clone(),
            created_at: self.created_at,
            state_changed_at: self.state_changed_at,
            connect_requests: self.connect_requests,
            last_disconnect_cause: self.last_disconnect_cause,
            room: self.room.clone(),
        }
    }
}
