use bundlekit::ActivationStatus;
use chrono::{Local, TimeZone};
use colored::{ColoredString, Colorize};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Activation status colored by health.
pub fn status(status: ActivationStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ActivationStatus::Active => label.green(),
        ActivationStatus::Partial => label.yellow(),
        ActivationStatus::Inactive | ActivationStatus::NotCurrent => label.dimmed(),
        ActivationStatus::NotInstalled => label.red(),
    }
}

// ============================================================================
// Time Formatting
// ============================================================================

/// Format seconds since the epoch as local `YYYY-MM-DD HH:MM`.
pub fn format_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_shape() {
        let formatted = format_time(1_704_067_200);
        assert_eq!(formatted.len(), "2024-01-01 00:00".len());
        assert!(formatted.starts_with("202"));
    }

    #[test]
    fn test_format_time_out_of_range() {
        assert_eq!(format_time(u64::MAX), "-");
    }

    #[test]
    fn test_status_label() {
        colored::control::set_override(false);
        assert_eq!(status(ActivationStatus::Partial).to_string(), "partial");
        assert_eq!(status(ActivationStatus::Active).to_string(), "active");
    }
}
