/// Size formatting utilities: human-readable byte counts.
///
/// All internal sizes are `u64` bytes. Floating point is only used
/// at the display-formatting boundary.

const UNIT: u64 = 1024;

/// Binary-prefixed units above plain bytes. Nothing larger than TiB is
/// used; bigger values are shown as thousands of TiB.
const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

/// Format a byte count into a human-readable string.
///
/// Below 1024 bytes the exact integer is shown (`"1023 B"`). From 1024
/// upwards the value is divided by 1024 until it drops below 1024 (or the
/// TiB unit is reached) and printed with two decimals (`"1.50 KiB"`).
pub fn format_size(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / UNIT as f64;
    let mut unit = 0;
    while value >= UNIT as f64 && unit < UNITS.len() - 1 {
        value /= UNIT as f64;
        unit += 1;
    }

    format!("{value:.2} {}", UNITS[unit])
}
