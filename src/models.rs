use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A project record as read from the store. Dates are kept raw because the
/// store has historically held mixed formats; `temporal::normalize` owns the
/// interpretation.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub progress_pct: i32,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DerivedMetrics {
    pub actual_progress_pct: f64,
    pub total_duration_days: i64,
    pub elapsed_days: i64,
    pub effective_elapsed_days: i64,
    pub expected_progress_pct: f64,
    pub pace_ratio: f64,
    pub is_overdue: bool,
    pub days_remaining: i64,
    pub days_since_last_update: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    #[serde(rename = "Healthy")]
    Healthy,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Critical")]
    Critical,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthState::Healthy => "Healthy",
            HealthState::AtRisk => "At Risk",
            HealthState::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// A verdict before the metrics that produced it are attached.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub state: HealthState,
    pub reason: String,
    pub action: String,
}

/// Final per-project output: the health state plus the derived metrics that
/// produced it, in the shape the API response serializes.
#[derive(Debug, Clone, Serialize)]
pub struct HealthVerdict {
    pub project_id: Uuid,
    pub project_name: String,
    pub health: HealthState,
    pub reason: String,
    pub action: String,
    pub metrics: DerivedMetrics,
}

impl HealthVerdict {
    pub fn from_assessment(
        snapshot: &ProjectSnapshot,
        assessment: Assessment,
        metrics: DerivedMetrics,
    ) -> Self {
        Self {
            project_id: snapshot.id,
            project_name: snapshot.name.clone(),
            health: assessment.state,
            reason: assessment.reason,
            action: assessment.action,
            metrics,
        }
    }
}
