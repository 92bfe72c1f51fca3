use crate::models::{Assessment, DerivedMetrics, HealthState};

// Thresholds for the deterministic decision table. This is the only copy of
// the business rules; the enrichment prompt quotes the same numbers.
pub const CRITICAL_PACE: f64 = 0.5;
pub const AT_RISK_PACE: f64 = 0.8;
pub const DEADLINE_WINDOW_DAYS: i64 = 3;
pub const STALE_AFTER_DAYS: i64 = 14;

/// Pace is statistically meaningless in the first week of a timeline, so the
/// pace rules only fire after this many elapsed days.
pub const MIN_ELAPSED_DAYS: i64 = 7;

/// Evaluate the decision table in strict precedence order. The first matching
/// rule wins. `None` means no rule fired and the project is healthy by
/// default.
pub fn classify(metrics: &DerivedMetrics) -> Option<Assessment> {
    let incomplete = metrics.actual_progress_pct < 100.0;

    if metrics.is_overdue
        || (metrics.days_remaining <= DEADLINE_WINDOW_DAYS && incomplete)
    {
        let reason = if metrics.is_overdue {
            "deadline missed with work incomplete".to_string()
        } else {
            format!(
                "deadline imminent with incomplete work ({} day(s) remaining at {:.0}% complete)",
                metrics.days_remaining.max(0),
                metrics.actual_progress_pct
            )
        };
        return Some(Assessment {
            state: HealthState::Critical,
            reason,
            action: "immediate intervention".to_string(),
        });
    }

    let pace_measurable = metrics.elapsed_days > MIN_ELAPSED_DAYS;

    if pace_measurable && metrics.pace_ratio < CRITICAL_PACE {
        return Some(Assessment {
            state: HealthState::Critical,
            reason: format!(
                "velocity critically low: progressing at {:.0}% of expected pace",
                metrics.pace_ratio * 100.0
            ),
            action: "replanning required".to_string(),
        });
    }

    let behind_pace = pace_measurable && metrics.pace_ratio < AT_RISK_PACE;
    let stale = metrics.days_since_last_update > STALE_AFTER_DAYS;

    if behind_pace || stale {
        // Staleness takes the reason when both conditions hold.
        let reason = if stale {
            format!(
                "no recorded activity for {} days",
                metrics.days_since_last_update
            )
        } else {
            format!(
                "progressing at {:.0}% of expected pace",
                metrics.pace_ratio * 100.0
            )
        };
        return Some(Assessment {
            state: HealthState::AtRisk,
            reason,
            action: "review blockers".to_string(),
        });
    }

    None
}

/// The verdict used whenever no rule fires, enrichment is unavailable, or a
/// pipeline fails outright.
pub fn healthy_default() -> Assessment {
    Assessment {
        state: HealthState::Healthy,
        reason: "on track".to_string(),
        action: "continue monitoring".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> DerivedMetrics {
        DerivedMetrics {
            actual_progress_pct: 50.0,
            total_duration_days: 40,
            elapsed_days: 20,
            effective_elapsed_days: 20,
            expected_progress_pct: 50.0,
            pace_ratio: 1.0,
            is_overdue: false,
            days_remaining: 20,
            days_since_last_update: 2,
        }
    }

    #[test]
    fn healthy_when_no_rule_fires() {
        assert!(classify(&metrics()).is_none());
        let fallback = healthy_default();
        assert_eq!(fallback.state, HealthState::Healthy);
        assert!(!fallback.reason.is_empty());
        assert!(!fallback.action.is_empty());
    }

    #[test]
    fn overdue_is_critical() {
        let m = DerivedMetrics {
            is_overdue: true,
            days_remaining: -5,
            actual_progress_pct: 80.0,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::Critical);
        assert_eq!(verdict.action, "immediate intervention");
        assert!(verdict.reason.contains("deadline missed"));
    }

    #[test]
    fn imminent_deadline_with_incomplete_work_is_critical() {
        // 10 days in on a 12-day timeline at 50%: deadline rule outranks pace.
        let m = DerivedMetrics {
            days_remaining: 2,
            actual_progress_pct: 50.0,
            elapsed_days: 10,
            effective_elapsed_days: 10,
            expected_progress_pct: 83.0,
            pace_ratio: 0.6,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::Critical);
        assert!(verdict.reason.contains("deadline imminent"));
    }

    #[test]
    fn imminent_deadline_with_complete_work_passes() {
        let m = DerivedMetrics {
            days_remaining: 1,
            actual_progress_pct: 100.0,
            ..metrics()
        };
        assert!(classify(&m).is_none());
    }

    #[test]
    fn critically_low_pace_is_critical() {
        // 30 days in on a 40-day timeline at 10%: pace ~0.13.
        let m = DerivedMetrics {
            actual_progress_pct: 10.0,
            elapsed_days: 30,
            effective_elapsed_days: 30,
            expected_progress_pct: 75.0,
            pace_ratio: 10.0 / 75.0,
            days_remaining: 10,
            days_since_last_update: 1,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::Critical);
        assert_eq!(verdict.action, "replanning required");
        assert!(verdict.reason.contains("13"));
    }

    #[test]
    fn low_pace_in_first_week_does_not_fire() {
        let m = DerivedMetrics {
            pace_ratio: 0.1,
            elapsed_days: 3,
            effective_elapsed_days: 3,
            ..metrics()
        };
        assert!(classify(&m).is_none());
    }

    #[test]
    fn lagging_pace_is_at_risk() {
        let m = DerivedMetrics {
            pace_ratio: 0.7,
            elapsed_days: 10,
            effective_elapsed_days: 10,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::AtRisk);
        assert_eq!(verdict.action, "review blockers");
        assert!(verdict.reason.contains("70"));
    }

    #[test]
    fn staleness_alone_is_at_risk() {
        let m = DerivedMetrics {
            days_since_last_update: 21,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::AtRisk);
        assert!(verdict.reason.contains("21 days"));
    }

    #[test]
    fn staleness_takes_the_reason_when_both_fire() {
        let m = DerivedMetrics {
            pace_ratio: 0.7,
            elapsed_days: 10,
            effective_elapsed_days: 10,
            days_since_last_update: 30,
            ..metrics()
        };
        let verdict = classify(&m).unwrap();
        assert_eq!(verdict.state, HealthState::AtRisk);
        assert!(verdict.reason.contains("no recorded activity"));
    }
}
