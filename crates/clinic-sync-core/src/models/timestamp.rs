//! Timestamp parsing for the several shapes dates arrive in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Parse a timestamp from any of the shapes upstream documents use:
///
/// - `{"_seconds": n, "_nanoseconds": n}` (exported timestamp)
/// - `{"seconds": n, "nanoseconds": n}` (client timestamp)
/// - a date string (RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `DD.MM.YYYY`)
/// - a native date stored as epoch milliseconds
///
/// Returns `None` for anything else.
pub fn parse_flexible_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let (secs, nanos) = if let Some(secs) = map.get("_seconds") {
                (secs, map.get("_nanoseconds"))
            } else if let Some(secs) = map.get("seconds") {
                (secs, map.get("nanoseconds"))
            } else {
                return None;
            };
            let secs = secs.as_i64().or_else(|| secs.as_f64().map(|f| f as i64))?;
            let nanos = nanos.and_then(Value::as_u64).unwrap_or(0).min(999_999_999) as u32;
            Utc.timestamp_opt(secs, nanos).single()
        }
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}
