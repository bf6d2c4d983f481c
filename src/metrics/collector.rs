//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the duo-match client using
//! Prometheus metrics. One collector may be shared by several sessions.

use crate::types::{BackendCommand, DisconnectCause, MatchmakingEvent, SessionState};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking client
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,

    /// Backend interaction metrics
    backend_metrics: BackendMetrics,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Connect requests by outcome (issued, ignored)
    pub connect_requests_total: IntCounterVec,

    /// Sessions currently in each state
    pub sessions_by_state: IntGaugeVec,

    /// State transitions
    pub state_transitions_total: IntCounterVec,

    /// Rooms that reached capacity
    pub rooms_ready_total: IntCounter,

    /// Rooms left because the backend reported overflow
    pub room_overflows_total: IntCounter,

    /// Disconnects by cause
    pub disconnects_total: IntCounterVec,

    /// Time from connect request to a ready room
    pub time_to_ready_seconds: Histogram,
}

/// Backend interaction metrics
#[derive(Clone)]
pub struct BackendMetrics {
    /// Events received from the backend
    pub events_received_total: IntCounterVec,

    /// Commands issued to the backend by status (success, error)
    pub commands_issued_total: IntCounterVec,

    /// Time taken to issue a command
    pub command_issue_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let session_metrics = SessionMetrics::new(&registry)?;
        let backend_metrics = BackendMetrics::new(&registry)?;

        Ok(Self {
            registry,
            session_metrics,
            backend_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Get backend metrics
    pub fn backend(&self) -> &BackendMetrics {
        &self.backend_metrics
    }

    /// Record a new session entering the idle state
    pub fn record_session_created(&self) {
        self.session_metrics
            .sessions_by_state
            .with_label_values(&[SessionState::Idle.as_label()])
            .inc();
    }

    /// Record a connect request and whether it issued a command
    pub fn record_connect_request(&self, issued: bool) {
        let outcome = if issued { "issued" } else { "ignored" };
        self.session_metrics
            .connect_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a state change
    pub fn record_transition(&self, from: SessionState, to: SessionState) {
        if from == to {
            return;
        }

        self.session_metrics
            .state_transitions_total
            .with_label_values(&[from.as_label(), to.as_label()])
            .inc();
        self.session_metrics
            .sessions_by_state
            .with_label_values(&[from.as_label()])
            .dec();
        self.session_metrics
            .sessions_by_state
            .with_label_values(&[to.as_label()])
            .inc();
    }

    /// Record a room reaching capacity
    pub fn record_room_ready(&self, time_to_ready: Option<Duration>) {
        self.session_metrics.rooms_ready_total.inc();
        if let Some(duration) = time_to_ready {
            self.session_metrics
                .time_to_ready_seconds
                .observe(duration.as_secs_f64());
        }
    }

    /// Record leaving an overfull room
    pub fn record_room_overflow(&self) {
        self.session_metrics.room_overflows_total.inc();
    }

    /// Record a backend-reported disconnect
    pub fn record_disconnect(&self, cause: DisconnectCause) {
        self.session_metrics
            .disconnects_total
            .with_label_values(&[cause.as_label()])
            .inc();
    }

    /// Record an inbound backend event
    pub fn record_event(&self, event: &MatchmakingEvent) {
        self.backend_metrics
            .events_received_total
            .with_label_values(&[event.as_label()])
            .inc();
    }

    /// Record an outbound backend command
    pub fn record_command(&self, command: &BackendCommand, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.backend_metrics
            .commands_issued_total
            .with_label_values(&[command.as_label(), status])
            .inc();

        self.backend_metrics
            .command_issue_duration
            .with_label_values(&[command.as_label()])
            .observe(duration.as_secs_f64());
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connect_requests_total = IntCounterVec::new(
            Opts::new("duo_match_connect_requests_total", "Connect requests"),
            &["outcome"],
        )?;
        registry.register(Box::new(connect_requests_total.clone()))?;

        let sessions_by_state = IntGaugeVec::new(
            Opts::new("duo_match_sessions", "Sessions currently in each state"),
            &["state"],
        )?;
        registry.register(Box::new(sessions_by_state.clone()))?;

        let state_transitions_total = IntCounterVec::new(
            Opts::new(
                "duo_match_state_transitions_total",
                "Matchmaking state transitions",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(state_transitions_total.clone()))?;

        let rooms_ready_total = IntCounter::new(
            "duo_match_rooms_ready_total",
            "Rooms that reached capacity",
        )?;
        registry.register(Box::new(rooms_ready_total.clone()))?;

        let room_overflows_total = IntCounter::new(
            "duo_match_room_overflows_total",
            "Rooms left because more players than capacity were reported",
        )?;
        registry.register(Box::new(room_overflows_total.clone()))?;

        let disconnects_total = IntCounterVec::new(
            Opts::new("duo_match_disconnects_total", "Disconnects by cause"),
            &["cause"],
        )?;
        registry.register(Box::new(disconnects_total.clone()))?;

        let time_to_ready_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "duo_match_time_to_ready_seconds",
                "Time from connect request to a ready room",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(time_to_ready_seconds.clone()))?;

        Ok(Self {
            connect_requests_total,
            sessions_by_state,
            state_transitions_total,
            rooms_ready_total,
            room_overflows_total,
            disconnects_total,
            time_to_ready_seconds,
        })
    }
}

impl BackendMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let events_received_total = IntCounterVec::new(
            Opts::new(
                "duo_match_backend_events_total",
                "Events received from the realtime backend",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_received_total.clone()))?;

        let commands_issued_total = IntCounterVec::new(
            Opts::new(
                "duo_match_backend_commands_total",
                "Commands issued to the realtime backend",
            ),
            &["command", "status"],
        )?;
        registry.register(Box::new(commands_issued_total.clone()))?;

        let command_issue_duration = HistogramVec::new(
            HistogramOpts::new(
                "duo_match_backend_command_duration_seconds",
                "Time taken to issue a backend command",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_issue_duration.clone()))?;

        Ok(Self {
            events_received_total,
            commands_issued_total,
            command_issue_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
