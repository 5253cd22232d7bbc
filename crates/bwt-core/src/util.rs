//! Helpers for keeping published values within platform limits

/// Truncate a string to `max_length` characters, adding an ellipsis if needed.
///
/// Returns an empty string for an absent input. Operates on characters, not
/// bytes: the German alarm translations contain non-ASCII text.
pub fn truncate_value(value: Option<&str>, max_length: usize) -> String {
    let Some(value) = value else {
        return String::new();
    };
    if value.chars().count() <= max_length {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_length.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Format a numeric reading with at most `precision` decimals.
///
/// Trailing zeros are trimmed so a flow of 1500 l/h publishes as "1.5"
/// m3/h, not "1.500". `None` precision formats integers without a decimal
/// point.
pub fn fmt_number(value: f64, precision: Option<u8>) -> String {
    match precision {
        None | Some(0) => format!("{}", value.round() as i64),
        Some(p) => {
            let s = format!("{:.*}", p as usize, value);
            let trimmed = s.trim_end_matches('0').trim_end_matches('.');
            trimmed.to_string()
        }
    }
}
