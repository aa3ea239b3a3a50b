//! Formatting helpers for lap times and readings
//!
//! The panel is 21 characters wide with the default font, so every string
//! produced here is as short as it can be while staying unambiguous.

/// Placeholder for a lap time the host did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Longest pilot name shown in the standings view
pub const STANDINGS_NAME_CHARS: usize = 6;

/// Format a raw lap time in milliseconds as `m:ss.mmm`
///
/// Returns `None` for zero, negative or non-finite input.
pub fn format_lap_millis(millis: f64) -> Option<String> {
    if !millis.is_finite() || millis <= 0.0 {
        return None;
    }
    let total = millis.round() as u64;
    let minutes = total / 60_000;
    let seconds = (total % 60_000) / 1000;
    let ms = total % 1000;
    Some(format!("{}:{:02}.{:03}", minutes, seconds, ms))
}

/// Drop a leading `0:` minute prefix (`0:24.531` -> `24.531`)
pub fn strip_zero_minutes(lap: &str) -> &str {
    lap.strip_prefix("0:").unwrap_or(lap)
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Format a reading value with a fixed number of decimals followed by its unit
pub fn format_value(value: f64, unit: &str, decimals: usize) -> String {
    format!("{:.*}{}", decimals, value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lap_millis_sub_minute() {
        assert_eq!(format_lap_millis(24531.0).as_deref(), Some("0:24.531"));
    }

    #[test]
    fn test_format_lap_millis_over_a_minute() {
        assert_eq!(format_lap_millis(83_004.4).as_deref(), Some("1:23.004"));
        assert_eq!(format_lap_millis(59_999.6).as_deref(), Some("1:00.000"));
    }

    #[test]
    fn test_format_lap_millis_rejects_non_positive() {
        assert_eq!(format_lap_millis(0.0), None);
        assert_eq!(format_lap_millis(-5.0), None);
        assert_eq!(format_lap_millis(f64::NAN), None);
    }

    #[test]
    fn test_strip_zero_minutes() {
        assert_eq!(strip_zero_minutes("0:24.531"), "24.531");
        assert_eq!(strip_zero_minutes("1:02.000"), "1:02.000");
        assert_eq!(strip_zero_minutes(NOT_AVAILABLE), NOT_AVAILABLE);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("Maverick", STANDINGS_NAME_CHARS), "Maveri");
        assert_eq!(truncate_chars("Red5", STANDINGS_NAME_CHARS), "Red5");
        assert_eq!(truncate_chars("Zoë Ångström", 4), "Zoë ");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(7.4, "V", 2), "7.40V");
        assert_eq!(format_value(7.44, "V", 1), "7.4V");
        assert_eq!(format_value(1.24, "A", 1), "1.2A");
    }
}
