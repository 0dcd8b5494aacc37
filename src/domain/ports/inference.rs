//! Contract for the optional local inference endpoint used by the intent classifier.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::mal::IntentClassification;

#[async_trait]
pub trait InferenceClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> DomainResult<IntentClassification>;
}
