//! Value formatters shared by all tool reports.
//!
//! Reports are consumed by a language model, so formatting is deterministic:
//! the same value always renders to the same string, and the strings are
//! compact enough to restate in a verification checkpoint.

/// Formats a byte count in IEC units with one decimal (`3.4 MiB`).
/// Values under one KiB render as integer bytes (`512 B`).
#[must_use]
pub fn bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if n < 1024 {
        return format!("{n} B");
    }
    let mut value = n as f64;
    let mut unit = 0;
    value /= 1024.0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats an uptime in seconds as `Nd Nh Nm`, eliding zero segments.
/// Anything under a minute renders as `0m`.
#[must_use]
pub fn uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut segments = Vec::new();
    if days > 0 {
        segments.push(format!("{days}d"));
    }
    if hours > 0 {
        segments.push(format!("{hours}h"));
    }
    if minutes > 0 {
        segments.push(format!("{minutes}m"));
    }
    if segments.is_empty() {
        return "0m".to_string();
    }
    segments.join(" ")
}

/// Formats a ratio or percentage value with one decimal and a trailing `%`.
#[must_use]
pub fn percent(x: f64) -> String {
    format!("{x:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bytes_units() {
        assert_eq!(bytes(0), "0 B");
        assert_eq!(bytes(512), "512 B");
        assert_eq!(bytes(1023), "1023 B");
        assert_eq!(bytes(1024), "1.0 KiB");
        assert_eq!(bytes(1536), "1.5 KiB");
        assert_eq!(bytes(3 * 1024 * 1024 + 400 * 1024), "3.4 MiB");
        assert_eq!(bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
        assert_eq!(bytes(2 * 1024 * 1024 * 1024 * 1024), "2.0 TiB");
    }

    #[test]
    fn test_uptime_segments() {
        assert_eq!(uptime(0), "0m");
        assert_eq!(uptime(59), "0m");
        assert_eq!(uptime(60), "1m");
        assert_eq!(uptime(3_600), "1h");
        assert_eq!(uptime(3_660), "1h 1m");
        assert_eq!(uptime(86_400), "1d");
        assert_eq!(uptime(86_400 + 3_600 + 60), "1d 1h 1m");
        assert_eq!(uptime(2 * 86_400 + 60), "2d 1m");
    }

    #[test]
    fn test_percent_one_decimal() {
        assert_eq!(percent(0.0), "0.0%");
        assert_eq!(percent(99.95), "99.9%");
        assert_eq!(percent(100.0), "100.0%");
        assert_eq!(percent(12.34), "12.3%");
    }

    /// Parses a formatted byte string back to an approximate byte count.
    fn parse_bytes(s: &str) -> f64 {
        let (value, unit) = s.split_once(' ').expect("value and unit");
        let scale = match unit {
            "B" => 1.0,
            "KiB" => 1024.0,
            "MiB" => 1024.0 * 1024.0,
            "GiB" => 1024.0_f64.powi(3),
            "TiB" => 1024.0_f64.powi(4),
            "PiB" => 1024.0_f64.powi(5),
            other => panic!("unexpected unit {other}"),
        };
        value.parse::<f64>().expect("numeric value") * scale
    }

    proptest! {
        #[test]
        fn prop_bytes_is_monotone(a in 0u64..u64::MAX / 2, delta in 0u64..u64::MAX / 2) {
            let b = a + delta;
            // One-decimal rounding can collapse nearby values but never
            // inverts the order beyond the rounding granularity.
            let parsed_a = parse_bytes(&bytes(a));
            let parsed_b = parse_bytes(&bytes(b));
            prop_assert!(parsed_b >= parsed_a * 0.999);
        }

        #[test]
        fn prop_uptime_never_empty(seconds in 0u64..10_000_000u64) {
            let formatted = uptime(seconds);
            prop_assert!(!formatted.is_empty());
            prop_assert!(formatted.ends_with('m') || formatted.ends_with('h') || formatted.ends_with('d'));
        }
    }
}
