use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Assessment, DerivedMetrics, HealthState};
use crate::rules;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment disabled")]
    Disabled,
    #[error("enrichment request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("enrichment service returned status {0}")]
    Status(u16),
    #[error("malformed enrichment response: {0}")]
    Malformed(String),
}

/// Best-effort narrative enrichment. Output is advisory text only; the
/// reconciler decides whether it is used.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(
        &self,
        project_name: &str,
        status: &str,
        metrics: &DerivedMetrics,
    ) -> Result<Assessment, EnrichError>;
}

/// Null implementation: always reports enrichment as unavailable, so callers
/// take the deterministic path. Lets the reconciler and orchestrator run with
/// no live service.
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(
        &self,
        _project_name: &str,
        _status: &str,
        _metrics: &DerivedMetrics,
    ) -> Result<Assessment, EnrichError> {
        Err(EnrichError::Disabled)
    }
}

/// Calls a chat-completion endpoint and parses a structured verdict out of
/// the reply. One attempt per project, no retries.
pub struct HttpEnricher {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    health: String,
    reason: String,
    action: String,
}

impl HttpEnricher {
    pub fn new(endpoint: String, api_key: String, model: String) -> Result<Self, EnrichError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn enrich(
        &self,
        project_name: &str,
        status: &str,
        metrics: &DerivedMetrics,
    ) -> Result<Assessment, EnrichError> {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: build_prompt(project_name, status, metrics),
            }],
            temperature: 0.2,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichError::Timeout
                } else {
                    EnrichError::Transport(e.to_string())
                }
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(EnrichError::Status(http_status.as_u16()));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Malformed(e.to_string()))?;

        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| EnrichError::Malformed("empty choices".to_string()))?;

        tracing::debug!(project = %project_name, "enrichment response received");
        parse_verdict(content)
    }
}

/// The prompt quotes the same thresholds the rule classifier enforces, so a
/// well-behaved model should agree with the deterministic verdict.
fn build_prompt(project_name: &str, status: &str, metrics: &DerivedMetrics) -> String {
    format!(
        "You are assessing the delivery health of a client project.\n\
         Project: {name} (status: {status})\n\
         Progress: {actual:.0}% complete vs {expected:.0}% expected at this point.\n\
         Timeline: day {elapsed} of {total}; {remaining} day(s) until the deadline.\n\
         Last recorded activity: {stale} day(s) ago. Overdue: {overdue}.\n\
         Classify as Critical when the project is overdue, the deadline is within \
         {window} days with incomplete work, or pace is below {crit:.0}% of expected. \
         Classify as At Risk when pace is below {risk:.0}% of expected or there has \
         been no activity for over {stale_after} days. Otherwise Healthy.\n\
         Reply with only a JSON object: \
         {{\"health\": \"Healthy\" | \"At Risk\" | \"Critical\", \
         \"reason\": \"one sentence\", \"action\": \"one sentence\"}}",
        name = project_name,
        status = status,
        actual = metrics.actual_progress_pct,
        expected = metrics.expected_progress_pct,
        elapsed = metrics.elapsed_days,
        total = metrics.total_duration_days,
        remaining = metrics.days_remaining.max(0),
        stale = metrics.days_since_last_update,
        overdue = metrics.is_overdue,
        window = rules::DEADLINE_WINDOW_DAYS,
        crit = rules::CRITICAL_PACE * 100.0,
        risk = rules::AT_RISK_PACE * 100.0,
        stale_after = rules::STALE_AFTER_DAYS,
    )
}

/// Extract the verdict object from the reply text. Models frequently wrap
/// JSON in markdown fences or surrounding prose; anything between the first
/// `{` and the last `}` is treated as the candidate object.
fn parse_verdict(content: &str) -> Result<Assessment, EnrichError> {
    let start = content
        .find('{')
        .ok_or_else(|| EnrichError::Malformed("no JSON object in response".to_string()))?;
    let end = content
        .rfind('}')
        .ok_or_else(|| EnrichError::Malformed("no JSON object in response".to_string()))?;
    if end < start {
        return Err(EnrichError::Malformed("no JSON object in response".to_string()));
    }

    let raw: RawVerdict = serde_json::from_str(&content[start..=end])
        .map_err(|e| EnrichError::Malformed(e.to_string()))?;

    let state = parse_health(&raw.health)?;
    if raw.reason.trim().is_empty() || raw.action.trim().is_empty() {
        return Err(EnrichError::Malformed("empty reason or action".to_string()));
    }

    Ok(Assessment {
        state,
        reason: raw.reason,
        action: raw.action,
    })
}

/// Anything outside the three-value enumeration is a parse failure, not a
/// fourth state.
fn parse_health(value: &str) -> Result<HealthState, EnrichError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "healthy" => Ok(HealthState::Healthy),
        "at risk" | "at_risk" | "at-risk" => Ok(HealthState::AtRisk),
        "critical" => Ok(HealthState::Critical),
        other => Err(EnrichError::Malformed(format!(
            "unknown health value: {other}"
        ))),
    }
}
