//! Matchmaking state machine
//!
//! A single dispatch function maps (current state, input) to the next state,
//! the backend commands to issue and the status updates to publish. It holds
//! no state of its own, so the same inputs always produce the same output.

use crate::config::MatchmakingSettings;
use crate::types::{BackendCommand, MatchmakingEvent, RoomPhase, SessionState, StatusUpdate};
use tracing::{debug, warn};

/// Input to the dispatch function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stimulus {
    /// `Connect()` with the backend's connectivity at call time
    Connect { already_connected: bool },
    /// Explicit teardown request
    Disconnect,
    /// Event delivered by the backend
    Event(MatchmakingEvent),
}

/// Output of the dispatch function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub commands: Vec<BackendCommand>,
    pub status: Vec<StatusUpdate>,
}

impl Transition {
    /// Stay in `state` and do nothing
    fn stay(state: SessionState) -> Self {
        Self {
            next: state,
            commands: Vec::new(),
            status: Vec::new(),
        }
    }

    fn to(next: SessionState) -> Self {
        Self::stay(next)
    }

    fn issue(mut self, command: BackendCommand) -> Self {
        self.commands.push(command);
        self
    }

    fn notify(mut self, update: StatusUpdate) -> Self {
        self.status.push(update);
        self
    }

    /// Whether this transition changes nothing observable
    pub fn is_noop(&self, from: SessionState) -> bool {
        self.next == from && self.commands.is_empty() && self.status.is_empty()
    }
}

/// Classify a backend-reported player count against room capacity
pub fn room_phase_for(player_count: u32, max_players: u8) -> Option<RoomPhase> {
    let max_players = u32::from(max_players);
    if player_count == 0 {
        None
    } else if player_count > max_players {
        Some(RoomPhase::Overflow)
    } else if player_count == max_players {
        Some(RoomPhase::Ready)
    } else {
        Some(RoomPhase::Waiting)
    }
}

/// Compute the transition for `stimulus` in `state`
pub fn transition(
    state: SessionState,
    stimulus: &Stimulus,
    settings: &MatchmakingSettings,
) -> Transition {
    match stimulus {
        Stimulus::Connect { already_connected } => on_connect(state, *already_connected, settings),
        Stimulus::Disconnect => on_disconnect_requested(state),
        Stimulus::Event(event) => on_event(state, event, settings),
    }
}

fn on_connect(
    state: SessionState,
    already_connected: bool,
    settings: &MatchmakingSettings,
) -> Transition {
    if state != SessionState::Idle {
        debug!("Connect ignored, matchmaking already underway in {}", state);
        return Transition::stay(state);
    }

    let transition = if already_connected {
        Transition::to(SessionState::SearchingRoom).issue(BackendCommand::JoinRandomRoom)
    } else {
        Transition::to(SessionState::Connecting).issue(BackendCommand::ConnectUsingSettings {
            game_version: settings.game_version.clone(),
        })
    };

    transition
        .notify(StatusUpdate::ShowProgress(true))
        .notify(StatusUpdate::ShowControlPanel(false))
}

fn on_disconnect_requested(state: SessionState) -> Transition {
    if state == SessionState::Idle {
        return Transition::stay(state);
    }
    // State resets when the backend confirms with a Disconnected event
    Transition::stay(state).issue(BackendCommand::Disconnect)
}

fn on_event(
    state: SessionState,
    event: &MatchmakingEvent,
    settings: &MatchmakingSettings,
) -> Transition {
    match event {
        MatchmakingEvent::Disconnected { .. } => Transition::to(SessionState::Idle)
            .notify(StatusUpdate::ShowProgress(false))
            .notify(StatusUpdate::ShowControlPanel(true)),

        MatchmakingEvent::ConnectedToMaster => match state {
            SessionState::Connecting => {
                Transition::to(SessionState::SearchingRoom).issue(BackendCommand::JoinRandomRoom)
            }
            _ => Transition::stay(state),
        },

        MatchmakingEvent::JoinRandomFailed { code, message } => match state {
            SessionState::SearchingRoom => {
                Transition::stay(state).issue(BackendCommand::CreateRoom {
                    name: None,
                    options: settings.room_options(),
                })
            }
            _ => {
                warn!(
                    "Stale join-random failure ignored in {} (code {}: {})",
                    state, code, message
                );
                Transition::stay(state)
            }
        },

        MatchmakingEvent::JoinedRoom { room } => {
            if state != SessionState::SearchingRoom {
                warn!("Unexpected room join for {} ignored in {}", room.room_id, state);
                return Transition::stay(state);
            }

            let scene = settings.room_scene_name.clone();
            match room_phase_for(room.player_count, settings.max_players_per_room) {
                Some(RoomPhase::Overflow) => {
                    Transition::to(SessionState::InRoom(RoomPhase::Overflow))
                        .issue(BackendCommand::LeaveRoom)
                }
                Some(phase) => Transition::to(SessionState::InRoom(phase))
                    .issue(BackendCommand::LoadLevel { scene }),
                None => {
                    warn!("Backend reported an empty room {} on join", room.room_id);
                    Transition::stay(state)
                }
            }
        }

        MatchmakingEvent::PlayerEnteredRoom { room } | MatchmakingEvent::PlayerLeftRoom { room } => {
            match state {
                SessionState::InRoom(RoomPhase::Waiting) | SessionState::InRoom(RoomPhase::Ready) => {
                    let max_players = u32::from(settings.max_players_per_room);
                    let phase = if room.player_count >= max_players {
                        RoomPhase::Ready
                    } else {
                        RoomPhase::Waiting
                    };
                    Transition::to(SessionState::InRoom(phase))
                }
                _ => Transition::stay(state),
            }
        }
    }
}
