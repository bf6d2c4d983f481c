//! Error types for the matchmaking client
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Backend command failed: {command}: {message}")]
    BackendCommandFailed { command: String, message: String },

    #[error("Not connected to the realtime backend")]
    NotConnected,

    #[error("Client is not in a room")]
    NotInRoom,

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Room already exists: {room_id}")]
    RoomAlreadyExists { room_id: String },

    #[error("Invalid backend callback: {reason}")]
    InvalidCallback { reason: String },

    #[error("Matchmaking controller is no longer running")]
    ControllerStopped,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}
