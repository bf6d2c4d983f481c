//! Matchmaking controller: the single actor that owns a session
//!
//! Inputs (connect requests from the status surface, events from the backend)
//! arrive on one channel and are processed strictly one at a time. For each
//! input the controller asks the state machine for a transition, applies the
//! status updates, and issues the resulting backend commands without waiting
//! for their outcome.

use crate::backend::{BackendCallback, RealtimeBackend};
use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::matchmaking::session::{Session, SessionSnapshot};
use crate::matchmaking::state::{transition, Stimulus, Transition};
use crate::metrics::MetricsCollector;
use crate::status::{apply_update, StatusSurface};
use crate::utils::elapsed_ms;
use crate::types::{
    BackendCommand, MatchmakingEvent, MatchmakingInput, RoomPhase, SessionState, StatusUpdate,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cloneable handle used to feed inputs into a controller
#[derive(Debug, Clone)]
pub struct MatchmakingHandle {
    tx: mpsc::UnboundedSender<MatchmakingInput>,
}

/// Receiving end of a controller's input channel
#[derive(Debug)]
pub struct MatchmakingInbox {
    rx: mpsc::UnboundedReceiver<MatchmakingInput>,
}

impl MatchmakingHandle {
    /// Create a connected handle/inbox pair
    pub fn channel() -> (Self, MatchmakingInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, MatchmakingInbox { rx })
    }

    /// Request matchmaking to start
    pub fn connect(&self) -> Result<()> {
        self.send(MatchmakingInput::Connect)
    }

    /// Request the backend connection to be closed
    pub fn disconnect(&self) -> Result<()> {
        self.send(MatchmakingInput::Disconnect)
    }

    /// Deliver an already translated backend event
    pub fn deliver(&self, event: MatchmakingEvent) -> Result<()> {
        self.send(MatchmakingInput::Backend(event))
    }

    /// Translate and deliver a raw backend callback
    pub fn deliver_callback(&self, callback: BackendCallback) -> Result<()> {
        self.deliver(callback.into())
    }

    fn send(&self, input: MatchmakingInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|_| MatchmakingError::ControllerStopped.into())
    }
}

impl MatchmakingInbox {
    /// Wait for the next input; `None` once every handle is dropped
    pub async fn recv(&mut self) -> Option<MatchmakingInput> {
        self.rx.recv().await
    }

    /// Take the next input if one is already queued
    pub fn try_recv(&mut self) -> Option<MatchmakingInput> {
        self.rx.try_recv().ok()
    }
}

/// Owner of a session and driver of the matchmaking state machine
pub struct MatchmakingController {
    settings: MatchmakingSettings,
    session: Session,
    backend: Arc<dyn RealtimeBackend>,
    status: Arc<dyn StatusSurface>,
    metrics: Arc<MetricsCollector>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    matchmaking_started: Option<Instant>,
}

impl MatchmakingController {
    /// Create the controller and its session, and put the status surface in
    /// its initial state (progress hidden, control panel shown)
    pub fn new(
        settings: MatchmakingSettings,
        backend: Arc<dyn RealtimeBackend>,
        status: Arc<dyn StatusSurface>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let session = Session::new(settings.game_version.clone());
        let (snapshot_tx, _) = watch::channel(session.snapshot());

        info!(
            "Matchmaking session {} created (game version {}, {} players per room)",
            session.id(),
            session.game_version(),
            settings.max_players_per_room
        );

        apply_update(status.as_ref(), StatusUpdate::ShowProgress(false));
        apply_update(status.as_ref(), StatusUpdate::ShowControlPanel(true));
        metrics.record_session_created();

        Self {
            settings,
            session,
            backend,
            status,
            metrics,
            snapshot_tx,
            matchmaking_started: None,
        }
    }

    /// The session owned by this controller
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Subscribe to session snapshots published after every input
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Process one input to completion and return the resulting state
    pub async fn handle(&mut self, input: MatchmakingInput) -> SessionState {
        let from = self.session.state();
        let stimulus = self.observe(&input);

        let Transition {
            next,
            commands,
            status,
        } = transition(from, &stimulus, &self.settings);

        if let Stimulus::Connect { .. } = stimulus {
            self.metrics.record_connect_request(!commands.is_empty());
            if from == SessionState::Idle {
                self.matchmaking_started = Some(Instant::now());
            }
        }

        let time_in_state = elapsed_ms(self.session.state_changed_at());
        self.session.set_state(next);
        if from != next {
            info!(
                "Session {}: {} -> {} after {} ms",
                self.session.id(),
                from,
                next,
                time_in_state
            );
            self.metrics.record_transition(from, next);
            self.record_outcome(next);
        }

        for update in status {
            apply_update(self.status.as_ref(), update);
        }

        for command in &commands {
            self.issue(command).await;
        }

        self.snapshot_tx.send_replace(self.session.snapshot());
        next
    }

    /// Run the dispatch loop until every handle has been dropped
    pub async fn run(mut self, mut inbox: MatchmakingInbox) -> Session {
        while let Some(input) = inbox.recv().await {
            self.handle(input).await;
        }
        debug!("Session {} input channel closed", self.session.id());
        self.session
    }

    /// Spawn the dispatch loop onto the runtime
    pub fn spawn(self, inbox: MatchmakingInbox) -> JoinHandle<Session> {
        tokio::spawn(self.run(inbox))
    }

    /// Log an input, update session bookkeeping and turn it into a stimulus
    fn observe(&mut self, input: &MatchmakingInput) -> Stimulus {
        match input {
            MatchmakingInput::Connect => {
                self.session.record_connect_request();
                let already_connected = self.backend.is_connected();
                debug!(
                    "Connect requested for session {} (already connected: {})",
                    self.session.id(),
                    already_connected
                );
                Stimulus::Connect { already_connected }
            }
            MatchmakingInput::Disconnect => {
                info!("Disconnect requested for session {}", self.session.id());
                Stimulus::Disconnect
            }
            MatchmakingInput::Backend(event) => {
                self.metrics.record_event(event);
                self.observe_event(event);
                Stimulus::Event(event.clone())
            }
        }
    }

    fn observe_event(&mut self, event: &MatchmakingEvent) {
        let id = self.session.id();
        match event {
            MatchmakingEvent::ConnectedToMaster => {
                info!("Session {} connected to master", id);
            }
            MatchmakingEvent::Disconnected { cause } => {
                warn!("Session {} disconnected: {:?}", id, cause);
                self.session.record_disconnect(*cause);
                self.metrics.record_disconnect(*cause);
                self.matchmaking_started = None;
            }
            MatchmakingEvent::JoinRandomFailed { code, message } => {
                info!(
                    "Session {}: no random room available ({}: {}), creating one",
                    id, code, message
                );
            }
            MatchmakingEvent::JoinedRoom { room } => {
                info!(
                    "Session {} joined room {} ({}/{} players)",
                    id, room.room_id, room.player_count, room.max_players
                );
                if self.session.state() == SessionState::SearchingRoom {
                    self.session.record_room(room.clone());
                }
            }
            MatchmakingEvent::PlayerEnteredRoom { room }
            | MatchmakingEvent::PlayerLeftRoom { room } => {
                debug!(
                    "Session {}: room {} now has {} players",
                    id, room.room_id, room.player_count
                );
                if self.session.room().is_some() {
                    self.session.record_room(room.clone());
                }
            }
        }
    }

    fn record_outcome(&mut self, next: SessionState) {
        match next {
            SessionState::InRoom(RoomPhase::Waiting) => {
                info!(
                    "Session {}: first player in the room, waiting for another player",
                    self.session.id()
                );
            }
            SessionState::InRoom(RoomPhase::Ready) => {
                info!(
                    "Session {}: room is full, loading '{}'",
                    self.session.id(),
                    self.settings.room_scene_name
                );
                let elapsed = self.matchmaking_started.take().map(|start| start.elapsed());
                self.metrics.record_room_ready(elapsed);
            }
            SessionState::InRoom(RoomPhase::Overflow) => {
                // TODO: search for another room instead of stopping here
                warn!(
                    "Session {}: too many players in the room, leaving",
                    self.session.id()
                );
                self.metrics.record_room_overflow();
            }
            _ => {}
        }
    }

    /// Issue a command to the backend; failures are logged, never propagated
    async fn issue(&self, command: &BackendCommand) {
        let start = Instant::now();
        let result = self.execute(command).await;
        self.metrics
            .record_command(command, result.is_ok(), start.elapsed());

        match result {
            Ok(()) => debug!(
                "Session {} issued {}",
                self.session.id(),
                command.as_label()
            ),
            Err(e) => error!(
                "Session {} failed to issue {}: {}",
                self.session.id(),
                command.as_label(),
                e
            ),
        }
    }

    /// Run `command` against the backend, tagging any failure with its label
    async fn execute(&self, command: &BackendCommand) -> Result<()> {
        self.dispatch(command).await.map_err(|e| {
            MatchmakingError::BackendCommandFailed {
                command: command.as_label().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn dispatch(&self, command: &BackendCommand) -> Result<()> {
        match command {
            BackendCommand::ConnectUsingSettings { game_version } => {
                self.backend.set_game_version(game_version.clone()).await?;
                self.backend.connect_using_settings().await
            }
            BackendCommand::JoinRandomRoom => self.backend.join_random_room().await,
            BackendCommand::CreateRoom { name, options } => {
                self.backend.create_room(name.clone(), *options).await
            }
            BackendCommand::LeaveRoom => self.backend.leave_room().await,
            BackendCommand::LoadLevel { scene } => self.backend.load_level(scene.clone()).await,
            BackendCommand::Disconnect => self.backend.disconnect().await,
        }
    }
}
