use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Socket frames.
pub mod frame;
/// Health check response.
pub mod health;
/// Room payloads.
pub mod room;
pub mod topics;

/// Render a wall-clock timestamp as RFC 3339.
pub fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
