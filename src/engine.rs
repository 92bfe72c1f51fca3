use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::enrich::{EnrichError, Enricher};
use crate::models::{HealthVerdict, ProjectSnapshot};
use crate::{metrics, reconcile, rules};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Wall-clock budget for one enrichment call, on top of the HTTP client's own
/// timeout. One attempt, no retries.
const ENRICH_BUDGET: Duration = Duration::from_secs(4);

/// Assess every snapshot in a bounded-concurrency fan-out. One verdict per
/// input, same order and cardinality. Each pipeline runs in its own task;
/// a panic inside one degrades that project to the safe default and leaves
/// the siblings untouched.
pub async fn assess_portfolio(
    snapshots: Vec<ProjectSnapshot>,
    now: DateTime<Utc>,
    enricher: Arc<dyn Enricher>,
    concurrency: usize,
) -> Vec<HealthVerdict> {
    let concurrency = concurrency.max(1);
    let total = snapshots.len();

    let verdicts: Vec<HealthVerdict> = stream::iter(snapshots)
        .map(|snapshot| {
            let enricher = Arc::clone(&enricher);
            async move {
                let task_snapshot = snapshot.clone();
                let handle =
                    tokio::spawn(async move { assess_one(task_snapshot, now, enricher).await });
                match handle.await {
                    Ok(verdict) => verdict,
                    Err(join_error) => {
                        tracing::warn!(
                            project = %snapshot.name,
                            error = %join_error,
                            "assessment pipeline failed; degrading to default verdict"
                        );
                        degraded_verdict(&snapshot, now)
                    }
                }
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    tracing::info!(projects = total, "portfolio assessment complete");
    verdicts
}

async fn assess_one(
    snapshot: ProjectSnapshot,
    now: DateTime<Utc>,
    enricher: Arc<dyn Enricher>,
) -> HealthVerdict {
    let derived = metrics::derive(&snapshot, now);
    let deterministic = rules::classify(&derived);

    let enriched = match tokio::time::timeout(
        ENRICH_BUDGET,
        enricher.enrich(&snapshot.name, &snapshot.status, &derived),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(EnrichError::Timeout),
    };

    if let Err(error) = &enriched {
        if !matches!(error, EnrichError::Disabled) {
            tracing::warn!(
                project = %snapshot.name,
                error = %error,
                "enrichment unavailable; falling back"
            );
        }
    }

    let assessment = reconcile::reconcile(deterministic, enriched);
    HealthVerdict::from_assessment(&snapshot, assessment, derived)
}

/// Deterministic-or-default verdict for a project whose pipeline failed
/// outright: one malformed record must never blank out the rest of the
/// batch, and a failed enrichment task must never hide a rule verdict.
fn degraded_verdict(snapshot: &ProjectSnapshot, now: DateTime<Utc>) -> HealthVerdict {
    let derived = metrics::derive(snapshot, now);
    let assessment = rules::classify(&derived).unwrap_or_else(rules::healthy_default);
    HealthVerdict::from_assessment(snapshot, assessment, derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::NoopEnricher;
    use crate::models::{Assessment, DerivedMetrics, HealthState};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use uuid::Uuid;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn snapshot(name: &str, start_offset: i64, end_offset: i64, progress: i32) -> ProjectSnapshot {
        ProjectSnapshot {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            status: "active".to_string(),
            start_date: Some((fixed_now() + ChronoDuration::days(start_offset)).to_rfc3339()),
            end_date: Some((fixed_now() + ChronoDuration::days(end_offset)).to_rfc3339()),
            progress_pct: progress,
            last_updated_at: fixed_now() - ChronoDuration::days(1),
        }
    }

    struct FixedEnricher(HealthState);

    #[async_trait]
    impl Enricher for FixedEnricher {
        async fn enrich(
            &self,
            _project_name: &str,
            _status: &str,
            _metrics: &DerivedMetrics,
        ) -> Result<Assessment, EnrichError> {
            Ok(Assessment {
                state: self.0,
                reason: "model narrative".to_string(),
                action: "model suggestion".to_string(),
            })
        }
    }

    struct SleepyEnricher;

    #[async_trait]
    impl Enricher for SleepyEnricher {
        async fn enrich(
            &self,
            _project_name: &str,
            _status: &str,
            _metrics: &DerivedMetrics,
        ) -> Result<Assessment, EnrichError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("enrichment budget should expire first")
        }
    }

    struct PanickyEnricher {
        poison: String,
    }

    #[async_trait]
    impl Enricher for PanickyEnricher {
        async fn enrich(
            &self,
            project_name: &str,
            _status: &str,
            _metrics: &DerivedMetrics,
        ) -> Result<Assessment, EnrichError> {
            if project_name == self.poison {
                panic!("injected pipeline failure");
            }
            Err(EnrichError::Disabled)
        }
    }

    #[tokio::test]
    async fn overdue_project_is_critical_despite_healthy_enrichment() {
        // Strict override: a deterministic Critical can never be downgraded.
        let snapshots = vec![snapshot("Overdue build", -40, -5, 60)];
        let verdicts = assess_portfolio(
            snapshots,
            fixed_now(),
            Arc::new(FixedEnricher(HealthState::Healthy)),
            4,
        )
        .await;
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].health, HealthState::Critical);
    }

    #[tokio::test]
    async fn enriched_verdict_used_when_no_rule_fires() {
        let snapshots = vec![snapshot("Steady delivery", -10, 30, 30)];
        let verdicts = assess_portfolio(
            snapshots,
            fixed_now(),
            Arc::new(FixedEnricher(HealthState::Healthy)),
            4,
        )
        .await;
        assert_eq!(verdicts[0].health, HealthState::Healthy);
        assert_eq!(verdicts[0].reason, "model narrative");
    }

    #[tokio::test(start_paused = true)]
    async fn enrichment_timeout_degrades_to_healthy_default() {
        let snapshots = vec![snapshot("Slow enrichment", -10, 30, 30)];
        let verdicts =
            assess_portfolio(snapshots, fixed_now(), Arc::new(SleepyEnricher), 4).await;
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].health, HealthState::Healthy);
        assert!(!verdicts[0].reason.is_empty());
        assert!(!verdicts[0].action.is_empty());
    }

    #[tokio::test]
    async fn one_failing_pipeline_leaves_siblings_intact() {
        let snapshots = vec![
            snapshot("Alpha", -10, 30, 30),
            snapshot("Poisoned", -10, 30, 30),
            snapshot("Gamma", -40, -5, 60),
        ];
        let verdicts = assess_portfolio(
            snapshots,
            fixed_now(),
            Arc::new(PanickyEnricher {
                poison: "Poisoned".to_string(),
            }),
            4,
        )
        .await;

        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].project_name, "Alpha");
        assert_eq!(verdicts[0].health, HealthState::Healthy);
        assert_eq!(verdicts[1].project_name, "Poisoned");
        assert_eq!(verdicts[1].health, HealthState::Healthy);
        assert_eq!(verdicts[1].action, "continue monitoring");
        assert_eq!(verdicts[2].project_name, "Gamma");
        assert_eq!(verdicts[2].health, HealthState::Critical);
    }

    #[tokio::test]
    async fn panicking_enrichment_cannot_downgrade_deterministic_verdict() {
        // The overdue snapshot is deterministically Critical; a pipeline
        // failure must degrade to that verdict, not to Healthy.
        let snapshots = vec![snapshot("Poisoned overdue", -40, -5, 60)];
        let verdicts = assess_portfolio(
            snapshots,
            fixed_now(),
            Arc::new(PanickyEnricher {
                poison: "Poisoned overdue".to_string(),
            }),
            4,
        )
        .await;

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].health, HealthState::Critical);
        assert_eq!(verdicts[0].action, "immediate intervention");
    }

    #[tokio::test]
    async fn output_preserves_input_order_and_cardinality() {
        let names = ["One", "Two", "Three", "Four", "Five"];
        let snapshots: Vec<ProjectSnapshot> = names
            .iter()
            .map(|name| snapshot(name, -10, 30, 30))
            .collect();
        let verdicts =
            assess_portfolio(snapshots, fixed_now(), Arc::new(NoopEnricher), 2).await;
        let returned: Vec<&str> = verdicts
            .iter()
            .map(|verdict| verdict.project_name.as_str())
            .collect();
        assert_eq!(returned, names);
    }
}
