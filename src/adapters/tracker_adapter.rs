//! Wraps an [`IssueTracker`] as a slow, query-only source so the Memory Interface
//! can surface sprint context through the same façade as local sources.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::mal::{AdapterResult, HealthStatus, MemoryItem, SourceFilter};
use crate::domain::ports::{IssueTracker, SourceAdapter};

pub struct TrackerAdapter {
    name: String,
    tracker: std::sync::Arc<dyn IssueTracker>,
}

impl TrackerAdapter {
    pub fn new(name: impl Into<String>, tracker: std::sync::Arc<dyn IssueTracker>) -> Self {
        Self { name: name.into(), tracker }
    }
}

#[async_trait]
impl SourceAdapter for TrackerAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        let sprint = self.tracker.fetch_active_sprint().await?;
        let mut issues = self.tracker.fetch_issues(&sprint.id).await?;

        if !query.is_empty() {
            let needle = query.to_lowercase();
            issues.retain(|issue| issue.title.to_lowercase().contains(&needle) || issue.description.to_lowercase().contains(&needle) || issue.key.to_lowercase() == needle);
        }
        if let Some(limit) = filter.limit {
            issues.truncate(limit);
        }

        let items = issues
            .into_iter()
            .map(|issue| {
                MemoryItem::new(self.name(), "issue", 0.6, format!("{}: {}", issue.key, issue.title), issue.description)
                    .with_metadata("key", serde_json::json!(issue.key))
                    .with_metadata("status", serde_json::json!(issue.jira_status))
            })
            .collect();

        Ok(AdapterResult::ok(self.name(), items))
    }

    async fn search(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        self.query(query, filter).await
    }

    async fn store(&self, _item: &MemoryItem) -> DomainResult<()> {
        Err(DomainError::AdapterCall(format!("adapter '{}' does not support store", self.name())))
    }

    async fn health_check(&self) -> DomainResult<HealthStatus> {
        match self.tracker.fetch_active_sprint().await {
            Ok(_) => Ok(HealthStatus::healthy()),
            Err(e) => Ok(HealthStatus::unhealthy(e.to_string())),
        }
    }
}
