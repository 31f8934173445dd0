//! Axis and value label formatting.

use crate::store::Moment;

const TENTHS_PER_MINUTE: i64 = 600;
const TENTHS_PER_HOUR: i64 = 36_000;

/// Formats a time offset (tenths of a second since the window start).
///
/// The unit follows the gridline interval: seconds below one minute,
/// minutes below one hour, hours otherwise. Values are truncated.
pub fn format_time_label(offset: Moment, interval: Moment) -> String {
    let seconds = offset.div_euclid(10);
    if interval < TENTHS_PER_MINUTE {
        format!("{}s", seconds)
    } else if interval < TENTHS_PER_HOUR {
        format!("{}m", seconds / 60)
    } else {
        format!("{}h", seconds / 3600)
    }
}

/// Formats kilobytes as KB, MB, GB or TB with `precision` significant-ish
/// decimals (see [`fixed_precision`]).
pub fn format_kb_label(kb: f64, precision: usize) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    let mut value = kb;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", fixed_precision(value, precision), UNITS[unit])
}

/// Renders `value` with fewer decimals as it grows: `precision` below 10,
/// one less below 100, two less below 1000 and three less above.
pub fn fixed_precision(value: f64, precision: usize) -> String {
    let magnitude = value.abs();
    let drop = if magnitude < 10.0 {
        0
    } else if magnitude < 100.0 {
        1
    } else if magnitude < 1000.0 {
        2
    } else {
        3
    };
    let decimals = precision.saturating_sub(drop);
    format!("{:.*}", decimals, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_label_unit_follows_interval() {
        assert_eq!(format_time_label(300, 100), "30s");
        assert_eq!(format_time_label(3_000, 600), "5m");
        assert_eq!(format_time_label(36_000 * 3, 108_000), "3h");
        assert_eq!(format_time_label(0, 10), "0s");
    }

    #[test]
    fn time_label_truncates() {
        assert_eq!(format_time_label(15, 10), "1s");
        assert_eq!(format_time_label(899, 600), "1m");
    }

    #[test]
    fn kb_label_picks_unit() {
        assert_eq!(format_kb_label(512.0, 1), "512 KB");
        assert_eq!(format_kb_label(1024.0, 1), "1.0 MB");
        assert_eq!(format_kb_label(5.5 * 1024.0 * 1024.0, 1), "5.5 GB");
        assert_eq!(format_kb_label(2.0 * 1024.0 * 1024.0 * 1024.0, 2), "2.00 TB");
    }

    #[test]
    fn precision_shrinks_with_magnitude() {
        assert_eq!(fixed_precision(1.2344, 3), "1.234");
        assert_eq!(fixed_precision(12.346, 3), "12.35");
        assert_eq!(fixed_precision(123.46, 3), "123.5");
        assert_eq!(fixed_precision(1234.4, 3), "1234");
        assert_eq!(fixed_precision(1234.4, 1), "1234");
        assert_eq!(fixed_precision(50.0, 0), "50");
    }
}
