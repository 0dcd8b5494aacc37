//! Periodic pass over in-review issues: queries merge-readiness from the headless agent and auto-merges when clear.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::sprint::{ApprovalStatus, SprintState, TimelineEvent};
use crate::domain::ports::{AgentInvocation, AgentOutcome, HeadlessAgent, IssueTracker, SprintStateStore};
use crate::infrastructure::agent::markers::{self, MergeResult, ReviewStatus};
use crate::infrastructure::logging::audit::AuditLogger;

#[derive(Debug, Clone, Copy)]
pub struct ReviewTimeouts {
    pub status_query: Duration,
    pub merge_close: Duration,
}

impl Default for ReviewTimeouts {
    fn default() -> Self {
        Self {
            status_query: Duration::from_secs(120),
            merge_close: Duration::from_secs(180),
        }
    }
}

/// Outcome of checking one issue, for callers that want a per-issue log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    TimedOut,
    Merged,
    MergeFailed,
    Held,
    NoAction,
}

pub struct ReviewChecker {
    state_store: Arc<dyn SprintStateStore>,
    tracker: Arc<dyn IssueTracker>,
    agent: Arc<dyn HeadlessAgent>,
    audit: AuditLogger,
    timeouts: ReviewTimeouts,
}

impl ReviewChecker {
    pub fn new(state_store: Arc<dyn SprintStateStore>, tracker: Arc<dyn IssueTracker>, agent: Arc<dyn HeadlessAgent>, audit: AuditLogger) -> Self {
        Self {
            state_store,
            tracker,
            agent,
            audit,
            timeouts: ReviewTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ReviewTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub async fn check_review_issues(&self, review_statuses: &[String]) -> DomainResult<Vec<(String, ReviewOutcome)>> {
        let mut state = self.state_store.load().await?.ok_or_else(|| crate::domain::errors::DomainError::Persistence("sprint state not yet initialized".to_string()))?;

        let keys: Vec<String> = state
            .issues
            .iter()
            .filter(|i| review_statuses.iter().any(|s| s.eq_ignore_ascii_case(&i.jira_status)))
            .map(|i| i.key.clone())
            .collect();

        let mut outcomes = Vec::new();
        for key in keys {
            let outcome = self.check_one(&mut state, &key).await?;
            outcomes.push((key, outcome));
        }
        self.state_store.save(&state).await?;
        Ok(outcomes)
    }

    async fn check_one(&self, state: &mut SprintState, key: &str) -> DomainResult<ReviewOutcome> {
        let prompt = format!(
            "Look up the merge request for issue {key} and reply with exactly one of: \
             [READY_TO_MERGE], [APPROVED_WITH_HOLD], [NEEDS_APPROVAL], [CI_FAILING], \
             [CHANGES_REQUESTED], [NO_MR]. Include [MR_ID: <n>] if one exists, and a short reason."
        );
        let invocation = AgentInvocation::new(prompt, self.timeouts.status_query);

        let outcome = match self.agent.run(invocation).await? {
            AgentOutcome::TimedOut { .. } => {
                warn!(issue = %key, "review status query timed out, skipping this issue");
                return Ok(ReviewOutcome::TimedOut);
            }
            AgentOutcome::Finished { stdout, .. } => stdout,
        };

        let Some(status) = markers::parse_review_status(&outcome) else {
            warn!(issue = %key, "review agent returned no recognizable status marker");
            return Ok(ReviewOutcome::NoAction);
        };
        let mr_id = markers::parse_mr_id(&outcome);

        match status {
            ReviewStatus::ReadyToMerge => {
                let Some(mr_id) = mr_id else {
                    warn!(issue = %key, "READY_TO_MERGE with no MR_ID, skipping merge");
                    self.note(state, key, "ready_to_merge_no_mr_id", None);
                    return Ok(ReviewOutcome::NoAction);
                };
                self.merge_and_close(state, key, &mr_id).await
            }
            ReviewStatus::ApprovedWithHold => {
                let hold_reason = if markers::contains_hold_phrase(&outcome) { outcome.clone() } else { "approved, on hold".to_string() };
                self.note(state, key, "approved_with_hold", Some(hold_reason));
                Ok(ReviewOutcome::Held)
            }
            other => {
                self.note(state, key, &format!("{other:?}"), None);
                Ok(ReviewOutcome::NoAction)
            }
        }
    }

    async fn merge_and_close(&self, state: &mut SprintState, key: &str, mr_id: &str) -> DomainResult<ReviewOutcome> {
        let prompt = format!(
            "Merge merge request {mr_id} for issue {key} and close the tracker issue. \
             Reply with exactly one of: [MERGE_RESULT: SUCCESS], [MERGE_RESULT: MERGE_FAILED], [MERGE_RESULT: CLOSE_FAILED]."
        );
        let invocation = AgentInvocation::new(prompt, self.timeouts.merge_close);

        let stdout = match self.agent.run(invocation).await? {
            AgentOutcome::TimedOut { .. } => {
                warn!(issue = %key, "merge-close call timed out");
                return Ok(ReviewOutcome::TimedOut);
            }
            AgentOutcome::Finished { stdout, .. } => stdout,
        };

        match markers::parse_merge_result(&stdout) {
            Some(MergeResult::Success) => {
                self.tracker.set_status(key, "Done").await?;
                if let Some(issue) = state.find_issue_mut(key) {
                    issue.jira_status = "Done".to_string();
                    issue.approval_status = ApprovalStatus::Completed;
                    issue.push_timeline(TimelineEvent::new("merged").with_detail(format!("MR {mr_id}")));
                }
                self.audit
                    .log_operation("merge_mr", "review_checker", Some(key), true, Some(serde_json::json!({ "mr_id": mr_id })))
                    .await
                    .map_err(|e| crate::domain::errors::DomainError::Ipc(e.to_string()))?;
                info!(issue = %key, mr_id = %mr_id, "merged and closed issue");
                Ok(ReviewOutcome::Merged)
            }
            Some(other) => {
                self.note(state, key, &format!("merge_result_{other:?}"), None);
                self.audit
                    .log_operation("merge_mr", "review_checker", Some(key), false, Some(serde_json::json!({ "mr_id": mr_id, "result": format!("{other:?}") })))
                    .await
                    .map_err(|e| crate::domain::errors::DomainError::Ipc(e.to_string()))?;
                Ok(ReviewOutcome::MergeFailed)
            }
            None => {
                warn!(issue = %key, "merge-close call returned no recognizable MERGE_RESULT marker");
                Ok(ReviewOutcome::MergeFailed)
            }
        }
    }

    fn note(&self, state: &mut SprintState, key: &str, event: &str, detail: Option<String>) {
        if let Some(issue) = state.find_issue_mut(key) {
            let mut timeline_event = TimelineEvent::new(event);
            if let Some(detail) = detail {
                timeline_event = timeline_event.with_detail(detail);
            }
            issue.push_timeline(timeline_event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::sprint::SprintIssue;
    use crate::domain::ports::issue_tracker::SprintMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MemStateStore(Mutex<Option<SprintState>>);
    #[async_trait]
    impl SprintStateStore for MemStateStore {
        async fn load(&self) -> DomainResult<Option<SprintState>> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn save(&self, state: &SprintState) -> DomainResult<()> {
            *self.0.lock().unwrap() = Some(state.clone());
            Ok(())
        }
    }

    struct StubTracker;
    #[async_trait]
    impl IssueTracker for StubTracker {
        async fn fetch_active_sprint(&self) -> DomainResult<SprintMetadata> {
            Ok(SprintMetadata { id: "SPR-1".into(), name: "Sprint 1".into(), start_date: None, end_date: None })
        }
        async fn fetch_issues(&self, _sprint_id: &str) -> DomainResult<Vec<SprintIssue>> {
            Ok(vec![])
        }
        async fn set_status(&self, _issue_key: &str, _status: &str) -> DomainResult<()> {
            Ok(())
        }
    }

    struct ScriptedAgent {
        responses: Mutex<Vec<String>>,
    }
    #[async_trait]
    impl HeadlessAgent for ScriptedAgent {
        async fn run(&self, _invocation: AgentInvocation) -> DomainResult<AgentOutcome> {
            let stdout = self.responses.lock().unwrap().remove(0);
            Ok(AgentOutcome::Finished { exit_code: 0, stdout, stderr: String::new() })
        }
    }

    fn review_issue(key: &str) -> SprintIssue {
        SprintIssue::new(key, "title", "In Review")
    }

    async fn build_checker(state: SprintState, responses: Vec<&str>) -> (ReviewChecker, Arc<MemStateStore>) {
        let store = Arc::new(MemStateStore(Mutex::new(Some(state))));
        let tracker: Arc<dyn IssueTracker> = Arc::new(StubTracker);
        let agent: Arc<dyn HeadlessAgent> = Arc::new(ScriptedAgent { responses: Mutex::new(responses.into_iter().map(String::from).collect()) });
        let audit_dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(audit_dir.path().join("audit.log")).await.unwrap();
        let checker = ReviewChecker::new(store.clone(), tracker, agent, audit);
        (checker, store)
    }

    #[tokio::test]
    async fn ready_to_merge_with_success_marks_issue_done() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.issues.push(review_issue("ISS-1"));
        let (checker, store) = build_checker(state, vec!["[READY_TO_MERGE]\n[MR_ID: 42]", "[MERGE_RESULT: SUCCESS]"]).await;

        let outcomes = checker.check_review_issues(&["in review".to_string()]).await.unwrap();
        assert_eq!(outcomes, vec![("ISS-1".to_string(), ReviewOutcome::Merged)]);

        let saved = store.load().await.unwrap().unwrap();
        let issue = saved.find_issue("ISS-1").unwrap();
        assert_eq!(issue.jira_status, "Done");
        assert_eq!(issue.approval_status, ApprovalStatus::Completed);
    }

    #[tokio::test]
    async fn approved_with_hold_does_not_merge() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.issues.push(review_issue("ISS-1"));
        let (checker, store) = build_checker(state, vec!["[APPROVED_WITH_HOLD] please hold off on merging this"]).await;

        let outcomes = checker.check_review_issues(&["in review".to_string()]).await.unwrap();
        assert_eq!(outcomes, vec![("ISS-1".to_string(), ReviewOutcome::Held)]);

        let saved = store.load().await.unwrap().unwrap();
        let issue = saved.find_issue("ISS-1").unwrap();
        assert_eq!(issue.jira_status, "In Review");
        assert!(!issue.timeline.is_empty());
    }

    #[tokio::test]
    async fn other_statuses_log_but_do_not_mutate_external_state() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.issues.push(review_issue("ISS-1"));
        let (checker, store) = build_checker(state, vec!["[CI_FAILING]"]).await;

        let outcomes = checker.check_review_issues(&["in review".to_string()]).await.unwrap();
        assert_eq!(outcomes, vec![("ISS-1".to_string(), ReviewOutcome::NoAction)]);

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.find_issue("ISS-1").unwrap().jira_status, "In Review");
    }

    #[tokio::test]
    async fn issues_not_in_review_status_are_skipped() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.issues.push(SprintIssue::new("ISS-1", "title", "Open"));
        let (checker, _) = build_checker(state, vec![]).await;

        let outcomes = checker.check_review_issues(&["in review".to_string()]).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
