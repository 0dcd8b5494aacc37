//! Issue tracker integration backed by a subprocess CLI wrapper, since the concrete
//! tracker integration itself is out of scope.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::sprint::SprintIssue;
use crate::domain::ports::issue_tracker::{IssueTracker, SprintMetadata};

const READ_TIMEOUT: Duration = Duration::from_secs(30);
const SET_STATUS_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the CLI binary this tracker shells out to.
#[derive(Debug, Clone)]
pub struct CliTrackerConfig {
    /// Path to the tracker CLI (e.g. a project-specific `jira`-like tool).
    pub binary_path: String,
    pub project: String,
    pub component: Option<String>,
}

/// Raw JSON shapes the tracker CLI is expected to emit on stdout.
#[derive(Debug, Deserialize)]
struct ActiveSprintPayload {
    id: String,
    name: String,
    #[serde(default)]
    start_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    end_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    title: String,
    #[serde(default)]
    description: String,
    status: String,
    #[serde(default)]
    priority: String,
    #[serde(rename = "type", default)]
    issue_type: String,
    #[serde(default)]
    story_points: Option<f32>,
    #[serde(default)]
    assignee: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default = "chrono::Utc::now")]
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Shells out to a configured tracker CLI to implement [`IssueTracker`].
pub struct CliIssueTracker {
    config: CliTrackerConfig,
}

impl CliIssueTracker {
    pub fn new(config: CliTrackerConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: &[&str], deadline: Duration) -> DomainResult<Vec<u8>> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("--project").arg(&self.config.project);
        if let Some(component) = &self.config.component {
            cmd.arg("--component").arg(component);
        }
        cmd.args(args);

        let output = timeout(deadline, cmd.output())
            .await
            .map_err(|_| DomainError::ExternalTool(format!("tracker CLI timed out: {args:?}")))?
            .map_err(|e| DomainError::ExternalTool(format!("failed to spawn tracker CLI: {e}")))?;

        if !output.status.success() {
            return Err(DomainError::ExternalTool(format!(
                "tracker CLI exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl IssueTracker for CliIssueTracker {
    async fn fetch_active_sprint(&self) -> DomainResult<SprintMetadata> {
        let stdout = self.run(&["active-sprint"], READ_TIMEOUT).await?;
        let payload: ActiveSprintPayload = serde_json::from_slice(&stdout).map_err(DomainError::from)?;
        Ok(SprintMetadata {
            id: payload.id,
            name: payload.name,
            start_date: payload.start_date,
            end_date: payload.end_date,
        })
    }

    async fn fetch_issues(&self, sprint_id: &str) -> DomainResult<Vec<SprintIssue>> {
        let stdout = self.run(&["issues", "--sprint", sprint_id], READ_TIMEOUT).await?;
        let payload: IssuesPayload = serde_json::from_slice(&stdout).map_err(DomainError::from)?;
        Ok(payload
            .issues
            .into_iter()
            .map(|raw| {
                let mut issue = SprintIssue::new(raw.key, raw.title, raw.status);
                issue.description = raw.description;
                issue.priority = crate::domain::models::sprint::IssuePriority::parse(&raw.priority);
                issue.issue_type = raw.issue_type;
                issue.story_points = raw.story_points;
                issue.assignee = raw.assignee;
                issue.created_at = raw.created_at;
                issue.updated_at = raw.updated_at;
                issue
            })
            .collect())
    }

    async fn set_status(&self, issue_key: &str, status: &str) -> DomainResult<()> {
        self.run(&["set-status", issue_key, status], SET_STATUS_TIMEOUT).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonexistent_binary_surfaces_external_tool_error() {
        let tracker = CliIssueTracker::new(CliTrackerConfig {
            binary_path: "definitely-not-a-real-tracker-cli".to_string(),
            project: "AAP".to_string(),
            component: None,
        });
        let err = tracker.fetch_active_sprint().await.unwrap_err();
        assert!(matches!(err, DomainError::ExternalTool(_)));
    }
}
