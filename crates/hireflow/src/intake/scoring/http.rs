//! JSON-over-HTTP adapter for the scoring collaborator.
//!
//! The request body is the [`ScoringRequest`] itself; the collaborator answers with
//! `{"rating": <number|null>, "summary": <string|null>}`.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::warn;

use crate::config::ScoringConfig;

use super::model::{ModelSuggestion, ScoringModel, ScoringModelError, ScoringRequest};

const MIN_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Capped exponential backoff with jitter, giving up after `max_retries` retries.
fn retry_policy(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(MIN_RETRY_DELAY)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(max_retries)
        .with_jitter()
}

pub struct HttpScoringModel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    backoff: ExponentialBuilder,
}

impl HttpScoringModel {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ScoringModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|err| ScoringModelError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            backoff: retry_policy(max_retries),
        })
    }

    /// Returns `None` when no endpoint is configured.
    pub fn from_config(config: &ScoringConfig) -> Result<Option<Self>, ScoringModelError> {
        config
            .endpoint
            .as_ref()
            .map(|endpoint| {
                Self::new(
                    endpoint.clone(),
                    config.api_key.clone(),
                    config.timeout(),
                    config.max_retries,
                )
            })
            .transpose()
    }

    async fn send(&self, request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ScoringModelError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoringModelError::Status(status.as_u16()));
        }

        response
            .json::<ModelSuggestion>()
            .await
            .map_err(|err| ScoringModelError::InvalidResponse(err.to_string()))
    }
}

fn is_retryable(err: &ScoringModelError) -> bool {
    match err {
        ScoringModelError::Transport(_) => true,
        ScoringModelError::Status(code) => {
            *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || *code >= 500
        }
        ScoringModelError::NotConfigured | ScoringModelError::InvalidResponse(_) => false,
    }
}

#[async_trait]
impl ScoringModel for HttpScoringModel {
    async fn score(&self, request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError> {
        let attempt = || async { self.send(request).await };
        attempt
            .retry(self.backoff)
            .sleep(sleep)
            .when(is_retryable)
            .notify(|err: &ScoringModelError, delay: Duration| {
                warn!(
                    application_id = %request.application_id,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "scoring request failed, retrying"
                );
            })
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::scoring::model::{CandidateContext, JobContext};

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&ScoringModelError::Transport("reset".into())));
        assert!(is_retryable(&ScoringModelError::Status(429)));
        assert!(is_retryable(&ScoringModelError::Status(503)));
        assert!(!is_retryable(&ScoringModelError::Status(400)));
        assert!(!is_retryable(&ScoringModelError::InvalidResponse("eof".into())));
    }

    #[test]
    fn retry_delays_are_capped_and_counted() {
        use backon::BackoffBuilder;

        let delays: Vec<Duration> = retry_policy(10).build().collect();
        assert_eq!(delays.len(), 10);
        assert!(delays
            .iter()
            .all(|delay| *delay <= MAX_RETRY_DELAY * 2));

        assert_eq!(retry_policy(0).build().count(), 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let mut model = HttpScoringModel::new(
            "http://127.0.0.1:9/score",
            None,
            Duration::from_millis(200),
            2,
        )
        .expect("client builds");
        model.backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_max_times(2);

        let request = ScoringRequest {
            application_id: "app-1".into(),
            job: JobContext {
                job_id: "job-1".into(),
                title: "Line Cook".to_string(),
                description: String::new(),
            },
            candidate: CandidateContext {
                name: "Ana".to_string(),
                application_status: "submitted".to_string(),
            },
            documents: Vec::new(),
            hints: Default::default(),
        };
        let result = model.score(&request).await;

        assert!(matches!(result, Err(ScoringModelError::Transport(_))));
    }

    #[test]
    fn from_config_requires_an_endpoint() {
        let model = HttpScoringModel::from_config(&ScoringConfig::default()).expect("no error");
        assert!(model.is_none());

        let config = ScoringConfig {
            endpoint: Some("http://127.0.0.1:9/score".to_string()),
            ..ScoringConfig::default()
        };
        let model = HttpScoringModel::from_config(&config)
            .expect("client builds")
            .expect("configured");
        assert_eq!(model.name(), "http");
    }

    #[test]
    fn parses_partial_answers() {
        let parsed: ModelSuggestion =
            serde_json::from_str(r#"{"summary":"no relevant experience"}"#).expect("parses");
        assert_eq!(parsed.rating, None);
        assert_eq!(parsed.summary.as_deref(), Some("no relevant experience"));
    }
}
