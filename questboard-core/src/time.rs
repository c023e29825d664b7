//! Time utilities: schedule timestamps from RFC 3339 or local wall-clock input.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a schedule timestamp.
///
/// Accepts RFC 3339 (`2026-02-20T23:59:00Z`, any offset) or a local
/// `YYYY-MM-DD HH:MM` interpreted in `tz`. Returns UTC.
pub fn parse_timestamp(input: &str, tz: Tz) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let ndt = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M").map_err(|_| {
        format!("invalid datetime '{input}' (expected RFC 3339 or 'YYYY-MM-DD HH:MM')")
    })?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| format!("ambiguous or invalid local time (DST?): {input} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

pub fn parse_tz(name: &str) -> anyhow::Result<Tz> {
    name.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
}
