//! Test fixtures and recording implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use duo_match::backend::{LocalBackendClient, LocalRealtimeService, RealtimeBackend};
use duo_match::config::MatchmakingSettings;
use duo_match::error::Result;
use duo_match::matchmaking::{
    MatchmakingController, MatchmakingHandle, MatchmakingInbox, Session, SessionSnapshot,
};
use duo_match::metrics::MetricsCollector;
use duo_match::status::{SharedStatusPanel, StatusSurface};
use duo_match::types::{BackendCommand, RoomOptions, StatusUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long a test waits for a session to reach an expected state
pub const STATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Backend that records every command and never calls back
///
/// Tests feed events in by hand through the controller's handle.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Mutex<Vec<BackendCommand>>,
    game_versions: Mutex<Vec<String>>,
    connected: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that already holds a live connection
    pub fn connected() -> Self {
        let backend = Self::default();
        backend.connected.store(true, Ordering::SeqCst);
        backend
    }

    /// Commands issued so far, in order
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    /// Versions passed to `set_game_version`
    pub fn game_versions(&self) -> Vec<String> {
        self.game_versions
            .lock()
            .map(|versions| versions.clone())
            .unwrap_or_default()
    }

    /// Count commands with the given label
    pub fn count_commands_of_type(&self, label: &str) -> usize {
        self.commands()
            .iter()
            .filter(|command| command.as_label() == label)
            .count()
    }

    fn record(&self, command: BackendCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

#[async_trait]
impl RealtimeBackend for RecordingBackend {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn set_game_version(&self, version: String) -> Result<()> {
        if let Ok(mut versions) = self.game_versions.lock() {
            versions.push(version);
        }
        Ok(())
    }

    async fn connect_using_settings(&self) -> Result<()> {
        let game_version = self.game_versions().last().cloned().unwrap_or_default();
        self.record(BackendCommand::ConnectUsingSettings { game_version });
        Ok(())
    }

    async fn join_random_room(&self) -> Result<()> {
        self.record(BackendCommand::JoinRandomRoom);
        Ok(())
    }

    async fn create_room(&self, name: Option<String>, options: RoomOptions) -> Result<()> {
        self.record(BackendCommand::CreateRoom { name, options });
        Ok(())
    }

    async fn leave_room(&self) -> Result<()> {
        self.record(BackendCommand::LeaveRoom);
        Ok(())
    }

    async fn load_level(&self, scene: String) -> Result<()> {
        self.record(BackendCommand::LoadLevel { scene });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(BackendCommand::Disconnect);
        Ok(())
    }
}

/// Status surface that keeps every update it receives
#[derive(Debug, Default)]
pub struct RecordingStatusSurface {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingStatusSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    fn record(&self, update: StatusUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

impl StatusSurface for RecordingStatusSurface {
    fn show_progress(&self, visible: bool) {
        self.record(StatusUpdate::ShowProgress(visible));
    }

    fn show_control_panel(&self, visible: bool) {
        self.record(StatusUpdate::ShowControlPanel(visible));
    }
}

/// A controller wired to a recording backend, not yet running
pub fn recording_controller(
    backend: Arc<RecordingBackend>,
    status: Arc<RecordingStatusSurface>,
) -> (MatchmakingController, MatchmakingHandle, MatchmakingInbox) {
    let (handle, inbox) = MatchmakingHandle::channel();
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let controller = MatchmakingController::new(
        MatchmakingSettings::default(),
        backend,
        status,
        metrics,
    );
    (controller, handle, inbox)
}

/// A running controller attached to the local service
pub struct LocalClient {
    pub handle: MatchmakingHandle,
    pub backend: LocalBackendClient,
    pub status: SharedStatusPanel,
    pub snapshots: watch::Receiver<SessionSnapshot>,
    pub task: JoinHandle<Session>,
}

impl LocalClient {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Register a client with `service` and spawn its controller
pub fn spawn_local_client(
    service: &LocalRealtimeService,
    settings: MatchmakingSettings,
) -> LocalClient {
    let (handle, inbox) = MatchmakingHandle::channel();
    let backend = service.register_client(handle.clone());
    let status = SharedStatusPanel::new();
    let metrics = Arc::new(MetricsCollector::new().unwrap());

    let controller = MatchmakingController::new(
        settings,
        Arc::new(backend.clone()),
        Arc::new(status.clone()),
        metrics,
    );
    let snapshots = controller.subscribe();
    let task = controller.spawn(inbox);

    LocalClient {
        handle,
        backend,
        status,
        snapshots,
        task,
    }
}

/// Wait until a published snapshot satisfies `condition`
///
/// Panics if the condition does not hold within `STATE_TIMEOUT`.
pub async fn wait_for_snapshot(
    snapshots: &watch::Receiver<SessionSnapshot>,
    condition: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = snapshots.clone();
    let result = tokio::time::timeout(STATE_TIMEOUT, async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if condition(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                let snapshot = rx.borrow().clone();
                assert!(condition(&snapshot), "controller stopped in {}", snapshot.state);
                return snapshot;
            }
        }
    })
    .await;

    match result {
        Ok(snapshot) => snapshot,
        Err(_) => panic!(
            "timed out waiting for snapshot, last state {}",
            snapshots.borrow().state
        ),
    }
}
