//! Rate-limited with a `governor` direct limiter and retried with `backoff`'s
//! exponential-backoff-with-tokio helper around the single HTTP call site.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::mal::IntentClassification;
use crate::domain::ports::inference::InferenceClassifier;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    intent: String,
    confidence: f32,
    #[serde(default)]
    sources_suggested: Vec<String>,
}

/// HTTP-backed [`InferenceClassifier`] with rate limiting and retry.
pub struct HttpInferenceClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    limiter: Arc<DirectRateLimiter>,
}

impl HttpInferenceClassifier {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, max_requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(max_requests_per_second.max(1)).unwrap());
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn post_once(&self, query: &str) -> Result<InferenceResponse, backoff::Error<DomainError>> {
        self.limiter.until_ready().await;

        let body = InferenceRequest {
            model: &self.model,
            prompt: query,
            format: "json",
            options: serde_json::json!({}),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(DomainError::ExternalTool(format!("inference endpoint request failed: {e}"))))?;

        if response.status().is_server_error() {
            return Err(backoff::Error::transient(DomainError::ExternalTool(format!(
                "inference endpoint returned {}",
                response.status()
            ))));
        }
        if !response.status().is_success() {
            return Err(backoff::Error::permanent(DomainError::ExternalTool(format!(
                "inference endpoint returned {}",
                response.status()
            ))));
        }

        response
            .json::<InferenceResponse>()
            .await
            .map_err(|e| backoff::Error::permanent(DomainError::ExternalTool(format!("inference endpoint response malformed: {e}"))))
    }
}

#[async_trait]
impl InferenceClassifier for HttpInferenceClassifier {
    async fn classify(&self, query: &str) -> DomainResult<IntentClassification> {
        let backoff_policy = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(5)))
            .build();

        let parsed = backoff::future::retry(backoff_policy, || self.post_once(query)).await?;

        Ok(IntentClassification {
            intent: crate::domain::models::mal::Intent::parse(&parsed.intent),
            confidence: parsed.confidence,
            sources_suggested: parsed.sources_suggested,
        })
    }
}
