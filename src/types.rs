//! Common types used throughout the matchmaking client

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a client session
pub type SessionId = Uuid;

/// Backend-assigned network identifier of a room
pub type RoomId = String;

/// Phase of a session once the backend has placed it in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Joined, level pre-staged, waiting for the room to fill
    Waiting,
    /// Room reached capacity and the level is loading
    Ready,
    /// Backend reported more players than capacity; room was left
    Overflow,
}

/// Matchmaking state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    SearchingRoom,
    InRoom(RoomPhase),
}

impl SessionState {
    /// Whether the session currently intends to end up in a room
    ///
    /// An overfull room ends matchmaking, so `Overflow` carries no intent.
    pub fn wants_to_join(&self) -> bool {
        !matches!(
            self,
            SessionState::Idle | SessionState::InRoom(RoomPhase::Overflow)
        )
    }

    /// Whether a join or create command may currently be in flight
    pub fn is_mid_flow(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::SearchingRoom)
    }

    /// Stable label for metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::SearchingRoom => "searching_room",
            SessionState::InRoom(RoomPhase::Waiting) => "in_room_waiting",
            SessionState::InRoom(RoomPhase::Ready) => "in_room_ready",
            SessionState::InRoom(RoomPhase::Overflow) => "in_room_overflow",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::SearchingRoom => write!(f, "SearchingRoom"),
            SessionState::InRoom(RoomPhase::Waiting) => write!(f, "InRoom(waiting)"),
            SessionState::InRoom(RoomPhase::Ready) => write!(f, "InRoom(ready)"),
            SessionState::InRoom(RoomPhase::Overflow) => write!(f, "InRoom(overflow)"),
        }
    }
}

/// Reason reported by the backend for a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectCause {
    None,
    ExceptionOnConnect,
    Exception,
    ServerTimeout,
    ClientTimeout,
    DisconnectByServerLogic,
    DisconnectByServerReasonUnknown,
    InvalidAuthentication,
    CustomAuthenticationFailed,
    AuthenticationTicketExpired,
    MaxCcuReached,
    InvalidRegion,
    OperationNotAllowedInCurrentState,
    DisconnectByClientLogic,
}

impl DisconnectCause {
    /// Stable label for metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            DisconnectCause::None => "none",
            DisconnectCause::ExceptionOnConnect => "exception_on_connect",
            DisconnectCause::Exception => "exception",
            DisconnectCause::ServerTimeout => "server_timeout",
            DisconnectCause::ClientTimeout => "client_timeout",
            DisconnectCause::DisconnectByServerLogic => "server_logic",
            DisconnectCause::DisconnectByServerReasonUnknown => "server_unknown",
            DisconnectCause::InvalidAuthentication => "invalid_authentication",
            DisconnectCause::CustomAuthenticationFailed => "custom_authentication_failed",
            DisconnectCause::AuthenticationTicketExpired => "authentication_ticket_expired",
            DisconnectCause::MaxCcuReached => "max_ccu_reached",
            DisconnectCause::InvalidRegion => "invalid_region",
            DisconnectCause::OperationNotAllowedInCurrentState => "operation_not_allowed",
            DisconnectCause::DisconnectByClientLogic => "client_logic",
        }
    }
}

/// Options passed along with a create-room command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOptions {
    pub max_players: u8,
}

/// Backend-reported view of the room this client is in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub player_count: u32,
    pub max_players: u8,
}

/// Lifecycle events delivered by the realtime backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchmakingEvent {
    ConnectedToMaster,
    Disconnected { cause: DisconnectCause },
    JoinRandomFailed { code: i16, message: String },
    JoinedRoom { room: RoomSnapshot },
    PlayerEnteredRoom { room: RoomSnapshot },
    PlayerLeftRoom { room: RoomSnapshot },
}

impl MatchmakingEvent {
    /// Stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            MatchmakingEvent::ConnectedToMaster => "connected_to_master",
            MatchmakingEvent::Disconnected { .. } => "disconnected",
            MatchmakingEvent::JoinRandomFailed { .. } => "join_random_failed",
            MatchmakingEvent::JoinedRoom { .. } => "joined_room",
            MatchmakingEvent::PlayerEnteredRoom { .. } => "player_entered_room",
            MatchmakingEvent::PlayerLeftRoom { .. } => "player_left_room",
        }
    }
}

/// Everything the controller's dispatch loop consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingInput {
    /// Start matchmaking (from the status surface)
    Connect,
    /// Explicitly tear down the backend connection
    Disconnect,
    /// An event from the realtime backend
    Backend(MatchmakingEvent),
}

/// Commands the controller issues to the realtime backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendCommand {
    /// Set the game version, then connect using the backend's settings
    ConnectUsingSettings { game_version: String },
    JoinRandomRoom,
    CreateRoom {
        name: Option<String>,
        options: RoomOptions,
    },
    LeaveRoom,
    LoadLevel { scene: String },
    Disconnect,
}

impl BackendCommand {
    /// Stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            BackendCommand::ConnectUsingSettings { .. } => "connect_using_settings",
            BackendCommand::JoinRandomRoom => "join_random_room",
            BackendCommand::CreateRoom { .. } => "create_room",
            BackendCommand::LeaveRoom => "leave_room",
            BackendCommand::LoadLevel { .. } => "load_level",
            BackendCommand::Disconnect => "disconnect",
        }
    }
}

/// Notifications for the status surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusUpdate {
    ShowProgress(bool),
    ShowControlPanel(bool),
}
