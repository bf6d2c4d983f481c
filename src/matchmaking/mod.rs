//! Matchmaking for a single client
//!
//! This module holds the session model, the state machine that decides what to
//! do for every input, and the controller that owns the session and talks to
//! the realtime backend and the status surface.

pub mod controller;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use controller::{MatchmakingController, MatchmakingHandle, MatchmakingInbox};
pub use session::{Session, SessionSnapshot};
pub use state::{room_phase_for, transition, Stimulus, Transition};
