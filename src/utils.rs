//! Utility functions for the matchmaking client

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new backend room identifier
pub fn generate_room_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed since `since`, clamped at zero
pub fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (current_timestamp() - since).num_milliseconds().max(0) as u64
}
