use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{HealthState, HealthVerdict};

pub struct StateCounts {
    pub healthy: usize,
    pub at_risk: usize,
    pub critical: usize,
}

pub fn count_by_state(verdicts: &[HealthVerdict]) -> StateCounts {
    let mut counts = StateCounts {
        healthy: 0,
        at_risk: 0,
        critical: 0,
    };
    for verdict in verdicts {
        match verdict.health {
            HealthState::Healthy => counts.healthy += 1,
            HealthState::AtRisk => counts.at_risk += 1,
            HealthState::Critical => counts.critical += 1,
        }
    }
    counts
}

pub fn build_report(
    scope: Option<&str>,
    now: DateTime<Utc>,
    verdicts: &[HealthVerdict],
) -> String {
    let counts = count_by_state(verdicts);
    let scope_label = scope.unwrap_or("all projects");

    let mut output = String::new();
    let _ = writeln!(output, "# Engagement Health Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label,
        now.format("%Y-%m-%d")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Portfolio Summary");

    if verdicts.is_empty() {
        let _ = writeln!(output, "No projects matched this scope.");
        return output;
    }

    let _ = writeln!(
        output,
        "{} project(s): {} healthy, {} at risk, {} critical",
        verdicts.len(),
        counts.healthy,
        counts.at_risk,
        counts.critical
    );

    for (heading, state) in [
        ("## Critical Projects", HealthState::Critical),
        ("## At Risk Projects", HealthState::AtRisk),
    ] {
        let matching: Vec<&HealthVerdict> = verdicts
            .iter()
            .filter(|verdict| verdict.health == state)
            .collect();
        if matching.is_empty() {
            continue;
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "{heading}");
        for verdict in matching {
            let _ = writeln!(
                output,
                "- **{}**: {} ({:.0}% complete vs {:.0}% expected, last activity {} day(s) ago)",
                verdict.project_name,
                verdict.reason,
                verdict.metrics.actual_progress_pct,
                verdict.metrics.expected_progress_pct,
                verdict.metrics.days_since_last_update
            );
            let _ = writeln!(output, "  - Next step: {}", verdict.action);
        }
    }

    let healthy: Vec<&HealthVerdict> = verdicts
        .iter()
        .filter(|verdict| verdict.health == HealthState::Healthy)
        .collect();
    if !healthy.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Healthy Projects");
        for verdict in healthy {
            let _ = writeln!(
                output,
                "- {} ({:.0}% complete, pace {:.2})",
                verdict.project_name,
                verdict.metrics.actual_progress_pct,
                verdict.metrics.pace_ratio
            );
        }
    }

    output
}
