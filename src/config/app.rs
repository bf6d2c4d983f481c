//! Main application configuration
//!
//! This module defines the primary configuration structures for the duo-match
//! client, including environment variable loading, TOML files and validation.

use crate::config::matchmaking::MatchmakingSettings;
use crate::error::MatchmakingError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub simulation: SimulationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host for the HTTP control surface
    pub http_host: String,
    /// Port for the HTTP control surface
    pub http_port: u16,
}

/// Settings for the in-process realtime service used by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of clients to matchmake against each other
    pub clients: usize,
    /// Reject joins into full rooms
    pub enforce_capacity: bool,
    /// How long to wait for every client to settle in a room
    pub ready_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "duo-match".to_string(),
            log_level: "info".to_string(),
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            clients: 2,
            enforce_capacity: true,
            ready_timeout_seconds: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    ///
    /// Values are not validated here; callers apply their own overrides first
    /// and then run `validate_config` once.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    ///
    /// Like `from_env`, this leaves validation to the caller.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow!("Invalid configuration file: {}", e))
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }

        // Matchmaking settings
        if let Ok(max_players) = env::var("MAX_PLAYERS_PER_ROOM") {
            self.matchmaking.max_players_per_room = max_players
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_PLAYERS_PER_ROOM value: {}", max_players))?;
        }
        if let Ok(version) = env::var("GAME_VERSION") {
            self.matchmaking.game_version = version;
        }
        if let Ok(scene) = env::var("ROOM_SCENE_NAME") {
            self.matchmaking.room_scene_name = scene;
        }

        // Simulation settings
        if let Ok(clients) = env::var("SIMULATED_CLIENTS") {
            self.simulation.clients = clients
                .parse()
                .map_err(|_| anyhow!("Invalid SIMULATED_CLIENTS value: {}", clients))?;
        }
        if let Ok(enforce) = env::var("ENFORCE_ROOM_CAPACITY") {
            self.simulation.enforce_capacity = enforce
                .parse()
                .map_err(|_| anyhow!("Invalid ENFORCE_ROOM_CAPACITY value: {}", enforce))?;
        }
        if let Ok(timeout) = env::var("READY_TIMEOUT_SECONDS") {
            self.simulation.ready_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid READY_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        Ok(())
    }

    /// Get the ready timeout as Duration
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.simulation.ready_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(invalid(format!(
                "Invalid log level: {}",
                config.service.log_level
            )))
        }
    }

    if config.service.http_port == 0 {
        return Err(invalid("HTTP port cannot be 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.max_players_per_room == 0 {
        return Err(invalid("Max players per room must be greater than 0"));
    }
    if config.matchmaking.game_version.trim().is_empty() {
        return Err(invalid("Game version cannot be empty"));
    }
    if config.matchmaking.room_scene_name.trim().is_empty() {
        return Err(invalid("Room scene name cannot be empty"));
    }

    // Validate simulation settings
    if config.simulation.clients == 0 {
        return Err(invalid("At least one simulated client is required"));
    }
    if config.simulation.ready_timeout_seconds == 0 {
        return Err(invalid("Ready timeout must be greater than 0"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    MatchmakingError::ConfigurationError {
        message: message.into(),
    }
    .into()
}
