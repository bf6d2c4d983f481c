//! Application wiring for the local matchmaking simulation
//!
//! `SimulationApp` builds one in-process realtime service and a matchmaking
//! controller per simulated client, then drives them until every session has
//! settled in a room or the ready timeout expires.

use crate::backend::local::{LocalRoomInfo, LocalServiceStats};
use crate::backend::{LocalBackendClient, LocalRealtimeService, LocalServiceConfig};
use crate::config::{validate_config, AppConfig};
use crate::matchmaking::{MatchmakingController, MatchmakingHandle, Session, SessionSnapshot};
use crate::metrics::MetricsCollector;
use crate::status::SharedStatusPanel;
use crate::types::{RoomPhase, SessionState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// How often settle conditions are re-checked
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Client {label} is no longer accepting input")]
    ClientStopped { label: String },
}

/// One simulated client and everything needed to observe it
pub struct ClientSlot {
    label: String,
    handle: MatchmakingHandle,
    snapshots: watch::Receiver<SessionSnapshot>,
    status: SharedStatusPanel,
    backend: LocalBackendClient,
    task: JoinHandle<Session>,
}

impl ClientSlot {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> &MatchmakingHandle {
        &self.handle
    }

    pub fn status(&self) -> &SharedStatusPanel {
        &self.status
    }

    /// Receiver of this client's session snapshots
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Latest snapshot of this client's session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub sessions: Vec<SessionSnapshot>,
    pub rooms: Vec<LocalRoomInfo>,
    pub stats: LocalServiceStats,
    pub timed_out: bool,
}

impl SimulationReport {
    /// Number of sessions that ended in a ready room
    pub fn ready_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state == SessionState::InRoom(RoomPhase::Ready))
            .count()
    }
}

/// The local service plus one controller per simulated client
pub struct SimulationApp {
    config: AppConfig,
    service: LocalRealtimeService,
    metrics: Arc<MetricsCollector>,
    clients: Vec<ClientSlot>,
}

impl SimulationApp {
    /// Build the service and spawn a controller per configured client
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = MetricsCollector::new().map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create metrics collector: {}", e),
        })?;
        let metrics = Arc::new(metrics);

        let service = LocalRealtimeService::new(LocalServiceConfig {
            enforce_capacity: config.simulation.enforce_capacity,
        });

        let clients = (1..=config.simulation.clients)
            .map(|n| Self::spawn_client(&config, &service, &metrics, format!("client-{}", n)))
            .collect();

        info!(
            "Simulation initialized with {} clients (capacity enforced: {})",
            config.simulation.clients, config.simulation.enforce_capacity
        );

        Ok(Self {
            config,
            service,
            metrics,
            clients,
        })
    }

    fn spawn_client(
        config: &AppConfig,
        service: &LocalRealtimeService,
        metrics: &Arc<MetricsCollector>,
        label: String,
    ) -> ClientSlot {
        let (handle, inbox) = MatchmakingHandle::channel();
        let backend = service.register_client(handle.clone());
        let status = SharedStatusPanel::new();

        let controller = MatchmakingController::new(
            config.matchmaking.clone(),
            Arc::new(backend.clone()),
            Arc::new(status.clone()),
            metrics.clone(),
        );
        let snapshots = controller.subscribe();
        let task = controller.spawn(inbox);

        debug!("Spawned {} as local client {}", label, backend.id());

        ClientSlot {
            label,
            handle,
            snapshots,
            status,
            backend,
            task,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn clients(&self) -> &[ClientSlot] {
        &self.clients
    }

    /// Connect every client, one after another
    ///
    /// Each client is given until `per_client` to leave the connecting and
    /// searching states before the next one starts, so that joins resolve
    /// against rooms created by earlier clients.
    pub async fn connect_staggered(&self, per_client: Duration) -> Result<(), ServiceError> {
        for slot in &self.clients {
            slot.handle
                .connect()
                .map_err(|_| ServiceError::ClientStopped {
                    label: slot.label.clone(),
                })?;

            let settled = wait_for(per_client, || {
                let snapshot = slot.snapshot();
                snapshot.connect_requests > 0 && !snapshot.state.is_mid_flow()
            })
            .await;

            if !settled {
                warn!("{} still in {} after {:?}", slot.label, slot.snapshot().state, per_client);
            }
        }
        Ok(())
    }

    /// Wait until every client is ready or has left an overfull room
    pub async fn wait_until_settled(&self) -> SimulationReport {
        let settled = wait_for(self.config.ready_timeout(), || {
            self.clients.iter().all(|slot| {
                matches!(
                    slot.snapshot().state,
                    SessionState::InRoom(RoomPhase::Ready) | SessionState::InRoom(RoomPhase::Overflow)
                )
            })
        })
        .await;

        if !settled {
            warn!(
                "Not every client settled within {:?}",
                self.config.ready_timeout()
            );
        }

        self.report(!settled)
    }

    /// Snapshot the whole simulation
    pub fn report(&self, timed_out: bool) -> SimulationReport {
        SimulationReport {
            sessions: self.clients.iter().map(ClientSlot::snapshot).collect(),
            rooms: self.service.rooms(),
            stats: self.service.stats(),
            timed_out,
        }
    }

    /// Release every client from the service and stop its controller
    pub fn shutdown(self) {
        for slot in self.clients {
            if let Err(e) = self.service.unregister_client(slot.backend.id()) {
                warn!("Failed to unregister {}: {}", slot.label, e);
            }
            slot.task.abort();
            debug!("Stopped {}", slot.label);
        }
        info!("Simulation stopped");
    }
}

/// Poll `condition` until it holds or `limit` elapses
async fn wait_for(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    timeout(limit, async {
        loop {
            if condition() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(SETTLE_POLL_INTERVAL).await;
        }
    })
    .await
    .unwrap_or_else(|_| condition())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_two_clients_pair_up() {
        let app = SimulationApp::new(AppConfig::default()).unwrap();
        app.connect_staggered(Duration::from_secs(2)).await.unwrap();
        let report = app.wait_until_settled().await;

        assert!(!report.timed_out);
        assert_eq!(report.ready_sessions(), 2);
        assert_eq!(report.rooms.len(), 1);
        assert_eq!(report.rooms[0].loaded_level.as_deref(), Some("Room for 2"));
        assert_eq!(report.stats.rooms_created, 1);
        app.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.matchmaking.max_players_per_room = 0;
        assert!(matches!(
            SimulationApp::new(config),
            Err(ServiceError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        assert!(!wait_for(Duration::from_millis(30), || false).await);
        assert!(wait_for(Duration::from_millis(30), || true).await);
    }
}
