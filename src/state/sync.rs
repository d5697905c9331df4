/// A playback position broadcast by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSyncEvent {
    /// Position in seconds.
    pub current_time: f64,
}

/// Format a position in seconds as zero-padded `HH:MM:SS`.
pub fn format_position(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Text of the transient indicator raised after a sync.
pub fn sync_indicator(seconds: f64) -> String {
    format!("synced to {}", format_position(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_position(125.0), "00:02:05");
        assert_eq!(format_position(3725.9), "01:02:05");
        assert_eq!(format_position(0.0), "00:00:00");
    }

    #[test]
    fn garbage_positions_render_as_zero() {
        assert_eq!(format_position(-4.0), "00:00:00");
        assert_eq!(format_position(f64::NAN), "00:00:00");
    }

    #[test]
    fn indicator_text() {
        assert_eq!(sync_indicator(125.0), "synced to 00:02:05");
    }
}
