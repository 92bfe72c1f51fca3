use chrono::{DateTime, Utc};

use crate::models::{DerivedMetrics, ProjectSnapshot};
use crate::temporal;

/// Substitute window for timelines whose raw duration is a day or less
/// (equal, missing, or inverted dates). Calculation only; the stored dates
/// are never altered.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Compute progress signals for one snapshot against an explicit `now`.
/// Pure: the clock is always passed in so every scenario is reproducible.
pub fn derive(snapshot: &ProjectSnapshot, now: DateTime<Utc>) -> DerivedMetrics {
    let start = temporal::normalize(snapshot.start_date.as_deref(), now);
    let end = temporal::normalize(snapshot.end_date.as_deref(), now);

    let actual_progress_pct = f64::from(snapshot.progress_pct.clamp(0, 100));

    let raw_duration_days = (end - start).num_days();
    let degenerate_timeline = raw_duration_days <= 1;
    let total_duration_days = if degenerate_timeline {
        DEFAULT_WINDOW_DAYS
    } else {
        raw_duration_days
    };

    // A future start yields 0 elapsed, never negative.
    let elapsed_days = (now - start).num_days().max(0);
    let effective_elapsed_days = elapsed_days.min(total_duration_days);
    let expected_progress_pct =
        (effective_elapsed_days as f64 / total_duration_days as f64 * 100.0).min(100.0);

    // Near zero expected progress the ratio is undefined and misleading: any
    // recorded progress counts as ahead of schedule, no progress counts as on
    // track so day-one projects are not flagged.
    let pace_ratio = if expected_progress_pct > 1.0 {
        actual_progress_pct / expected_progress_pct
    } else if actual_progress_pct > 0.0 {
        2.0
    } else {
        1.0
    };

    // A degenerate timeline has no meaningful end instant, so the remaining
    // days come from the substituted window too. Otherwise a missing end
    // date would read as a deadline of today and trip the deadline rule.
    let days_remaining = if degenerate_timeline {
        total_duration_days - effective_elapsed_days
    } else {
        (end - now).num_days()
    };

    DerivedMetrics {
        actual_progress_pct,
        total_duration_days,
        elapsed_days,
        effective_elapsed_days,
        expected_progress_pct,
        pace_ratio,
        is_overdue: now > end && snapshot.progress_pct < 100,
        days_remaining,
        days_since_last_update: (now - snapshot.last_updated_at).num_days().abs(),
    }
}
