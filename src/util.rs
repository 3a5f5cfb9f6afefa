/// Convert a duration in minutes to whole seconds, rounding to the nearest second.
/// Missing or non-finite input counts as zero.
pub fn minutes_to_secs(minutes: Option<f64>) -> i64 {
    match minutes {
        Some(m) if m.is_finite() => (m * 60.0).round() as i64,
        _ => 0,
    }
}

/// Parse a user-entered number, rejecting blanks and non-finite values
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Render seconds as `m:ss`, or `h:mm:ss` past the hour
pub fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Render fractional minutes without trailing noise (`8`, `2.5`)
pub fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{minutes:.0}")
    } else {
        let s = format!("{minutes:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
