//! Realtime backend integration
//!
//! This module defines the command interface the matchmaking controller drives,
//! the adapter that turns backend callbacks into matchmaking events, and an
//! in-process realtime service used by the CLI and integration tests.

pub mod callback;
pub mod local;

use crate::error::Result;
use crate::types::RoomOptions;
use async_trait::async_trait;

pub use callback::{decode_callback, BackendCallback, CurrentRoom, NO_RANDOM_MATCH_FOUND};
pub use local::{LocalBackendClient, LocalRealtimeService, LocalServiceConfig};

/// Commands offered by a realtime backend client
///
/// Every command is fire-and-forget: it returns once the request is issued and
/// the outcome arrives later as a callback. An `Err` means the request could
/// not be issued at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    /// Whether a live connection to the backend exists
    fn is_connected(&self) -> bool;

    /// Set the version used to segregate incompatible clients
    async fn set_game_version(&self, version: String) -> Result<()>;

    /// Initiate a connection using the backend's configured settings
    async fn connect_using_settings(&self) -> Result<()>;

    /// Join any open room; resolves to a joined-room or join-random-failed callback
    async fn join_random_room(&self) -> Result<()>;

    /// Create a room; a `None` name lets the backend assign one
    async fn create_room(&self, name: Option<String>, options: RoomOptions) -> Result<()>;

    /// Leave the current room
    async fn leave_room(&self) -> Result<()>;

    /// Request a synchronized scene transition across the room
    async fn load_level(&self, scene: String) -> Result<()>;

    /// Close the connection
    async fn disconnect(&self) -> Result<()>;
}
