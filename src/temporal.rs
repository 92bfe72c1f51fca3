use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// Parse attempts, in order of decreasing strictness. Slash-delimited dates
// are ambiguous; MM/DD/YYYY is assumed because that is what the store
// historically contains.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%d %B %Y",
    "%m/%d/%Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Resolve a raw date value from the store into a usable instant. Total:
/// absent or unparseable input resolves to `now`, because a propagated parse
/// error would silently corrupt every metric derived downstream.
pub fn normalize(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return now;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return now;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Utc);
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return parsed.and_utc();
        }
    }

    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return parsed
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or(now);
        }
    }

    now
}
