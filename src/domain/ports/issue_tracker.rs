//! Contract for the external issue tracker integration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::sprint::SprintIssue;

#[derive(Debug, Clone)]
pub struct SprintMetadata {
    pub id: String,
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Operations a concrete tracker integration (Jira, GitLab issues, ...) must provide.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch the currently active sprint's id, name, and dates.
    async fn fetch_active_sprint(&self) -> DomainResult<SprintMetadata>;

    /// Fetch every issue assigned to the sprint identified by `sprint_id`.
    async fn fetch_issues(&self, sprint_id: &str) -> DomainResult<Vec<SprintIssue>>;

    async fn set_status(&self, issue_key: &str, status: &str) -> DomainResult<()>;
}
