//! duo-match - client-side matchmaking for two-player realtime rooms
//!
//! This crate drives a client from "not connected" to "paired into a room
//! ready to start": it connects to a realtime backend, joins a random room or
//! creates one when none is open, and decides from the backend-reported player
//! count whether the room is ready or overfull.

pub mod backend;
pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod status;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use backend::{BackendCallback, LocalRealtimeService, RealtimeBackend};
pub use matchmaking::{MatchmakingController, MatchmakingHandle, Session, SessionSnapshot};
pub use status::{SharedStatusPanel, StatusSurface};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
