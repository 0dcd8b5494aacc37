//! Refreshes local sprint state from the issue tracker while preserving locally-owned overlay fields, and prioritizes the result.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::models::config::{default_actionable_statuses, default_review_statuses};
use crate::domain::models::sprint::{ApprovalStatus, SprintIssue, SprintState};
use crate::domain::models::trace::WorkflowType;
use crate::domain::ports::IssueTracker;
use crate::services::prioritizer::{self, PrioritizerWeights};

pub struct SprintPlanner {
    tracker: Arc<dyn IssueTracker>,
    local_user: String,
    actionable_statuses: Vec<String>,
    weights: PrioritizerWeights,
}

impl SprintPlanner {
    pub fn new(tracker: Arc<dyn IssueTracker>, local_user: impl Into<String>) -> Self {
        Self {
            tracker,
            local_user: local_user.into(),
            actionable_statuses: default_actionable_statuses(),
            weights: PrioritizerWeights::default(),
        }
    }

    pub fn with_actionable_statuses(mut self, statuses: Vec<String>) -> Self {
        self.actionable_statuses = statuses;
        self
    }

    /// Takes the previous state (if any) so overlay fields can be carried over; returns
    /// the new state for the caller to persist atomically.
    pub async fn refresh_from_tracker(&self, previous: Option<&SprintState>) -> DomainResult<SprintState> {
        let sprint = self.tracker.fetch_active_sprint().await?;
        let mut issues = self.tracker.fetch_issues(&sprint.id).await?;

        // step 3: filter to issues assigned to the configured local user.
        let local_user_lower = self.local_user.to_lowercase();
        issues.retain(|issue| {
            issue
                .assignee
                .as_deref()
                .map(|a| a.to_lowercase() == local_user_lower)
                .unwrap_or(false)
        });

        // step 4: prioritize.
        let ranked = prioritizer::prioritize_issues(&issues, self.weights, Utc::now());
        let rank_of: std::collections::HashMap<&str, usize> = ranked.iter().map(|r| (r.key.as_str(), r.rank)).collect();
        let reasoning_of: std::collections::HashMap<&str, &[String]> =
            ranked.iter().map(|r| (r.key.as_str(), r.reasoning.as_slice())).collect();
        for issue in &mut issues {
            if let Some(reasoning) = reasoning_of.get(issue.key.as_str()) {
                issue.priority_reasoning = reasoning.to_vec();
            }
        }
        issues.sort_by_key(|issue| rank_of.get(issue.key.as_str()).copied().unwrap_or(usize::MAX));

        // step 5: carry overlay fields from the previous state, else default to pending.
        for issue in &mut issues {
            match previous.and_then(|p| p.find_issue(&issue.key)) {
                Some(previous_issue) => issue.carry_overlay_from(previous_issue),
                None => issue.approval_status = ApprovalStatus::Pending,
            }
        }

        let mut state = previous.cloned().unwrap_or_else(|| SprintState::new(&sprint.id, &sprint.name));
        state.sprint_id = sprint.id;
        state.sprint_name = sprint.name;
        state.issues = issues;
        state.last_updated = Utc::now();

        info!(sprint = %state.sprint_id, issue_count = state.issues.len(), "refreshed sprint state from tracker");
        Ok(state)
    }

    pub fn is_actionable(&self, issue: &SprintIssue) -> bool {
        issue.is_actionable(&self.actionable_statuses)
    }

    pub fn build_work_prompt(&self, issue: &SprintIssue, workflow_type: WorkflowType) -> String {
        format!(
            "## {} ({:?})\n\n**{}**\n\n{}\n\nPriority: {:?}\n",
            issue.key, workflow_type, issue.title, issue.description, issue.priority
        )
    }

    pub fn issues_needing_review<'a>(&self, state: &'a SprintState, review_statuses: &[String]) -> Vec<&'a SprintIssue> {
        state
            .issues
            .iter()
            .filter(|issue| review_statuses.iter().any(|s| s.eq_ignore_ascii_case(&issue.jira_status)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::issue_tracker::SprintMetadata;
    use async_trait::async_trait;

    struct StubTracker {
        issues: Vec<SprintIssue>,
    }

    #[async_trait]
    impl IssueTracker for StubTracker {
        async fn fetch_active_sprint(&self) -> DomainResult<SprintMetadata> {
            Ok(SprintMetadata {
                id: "SPR-1".into(),
                name: "Sprint 1".into(),
                start_date: None,
                end_date: None,
            })
        }

        async fn fetch_issues(&self, _sprint_id: &str) -> DomainResult<Vec<SprintIssue>> {
            Ok(self.issues.clone())
        }

        async fn set_status(&self, _issue_key: &str, _status: &str) -> DomainResult<()> {
            Ok(())
        }
    }

    fn issue_for(user: &str, key: &str) -> SprintIssue {
        let mut issue = SprintIssue::new(key, key, "Open");
        issue.assignee = Some(user.to_string());
        issue
    }

    #[tokio::test]
    async fn refresh_filters_by_assignee_case_insensitively() {
        let tracker = Arc::new(StubTracker {
            issues: vec![issue_for("Alice", "ISS-1"), issue_for("bob", "ISS-2")],
        });
        let planner = SprintPlanner::new(tracker, "alice");
        let state = planner.refresh_from_tracker(None).await.unwrap();
        assert_eq!(state.issues.len(), 1);
        assert_eq!(state.issues[0].key, "ISS-1");
    }

    #[tokio::test]
    async fn refresh_preserves_overlay_fields_across_calls() {
        let tracker = Arc::new(StubTracker {
            issues: vec![issue_for("alice", "ISS-1")],
        });
        let planner = SprintPlanner::new(tracker, "alice");
        let mut first = planner.refresh_from_tracker(None).await.unwrap();
        first.issues[0].approval_status = ApprovalStatus::Approved;
        first.issues[0].chat_id = Some("chat-1".to_string());

        let second = planner.refresh_from_tracker(Some(&first)).await.unwrap();
        assert_eq!(second.issues[0].approval_status, ApprovalStatus::Approved);
        assert_eq!(second.issues[0].chat_id.as_deref(), Some("chat-1"));
    }

    #[tokio::test]
    async fn refresh_populates_priority_reasoning() {
        let tracker = Arc::new(StubTracker {
            issues: vec![issue_for("alice", "ISS-1")],
        });
        let planner = SprintPlanner::new(tracker, "alice");
        let state = planner.refresh_from_tracker(None).await.unwrap();
        assert!(!state.issues[0].priority_reasoning.is_empty());
    }

    #[test]
    fn is_actionable_uses_configured_statuses() {
        let planner = SprintPlanner::new(Arc::new(StubTracker { issues: vec![] }), "alice");
        let issue = SprintIssue::new("ISS-1", "t", "To Do");
        assert!(planner.is_actionable(&issue));
        let issue = SprintIssue::new("ISS-2", "t", "Done");
        assert!(!planner.is_actionable(&issue));
    }

    #[test]
    fn build_work_prompt_is_deterministic() {
        let planner = SprintPlanner::new(Arc::new(StubTracker { issues: vec![] }), "alice");
        let issue = SprintIssue::new("ISS-1", "Fix bug", "Open");
        let a = planner.build_work_prompt(&issue, WorkflowType::CodeChange);
        let b = planner.build_work_prompt(&issue, WorkflowType::CodeChange);
        assert_eq!(a, b);
        assert!(a.contains("ISS-1"));
    }
}
