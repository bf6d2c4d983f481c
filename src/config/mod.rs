//! Configuration management for the duo-match client
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for the matchmaking client.

pub mod app;
pub mod matchmaking;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, SimulationSettings};
pub use matchmaking::MatchmakingSettings;
