use crate::enrich::EnrichError;
use crate::models::Assessment;
use crate::rules;

/// Merge the deterministic and enriched verdicts. A deterministic rule
/// verdict always wins: the rules encode business thresholds that a
/// generative reply must never soften. Enrichment only supplies the verdict
/// when no rule fired, and a failed or skipped enrichment degrades to the
/// healthy default.
pub fn reconcile(
    deterministic: Option<Assessment>,
    enriched: Result<Assessment, EnrichError>,
) -> Assessment {
    if let Some(verdict) = deterministic {
        return verdict;
    }
    match enriched {
        Ok(verdict) => verdict,
        Err(_) => rules::healthy_default(),
    }
}
