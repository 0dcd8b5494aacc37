//! Per-issue work log value types: actions, outcomes, and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of action a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkLogAction {
    Started,
    StepCompleted,
    Blocked,
    Resumed,
    Completed,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
    Unknown,
}

/// Overall status of the work log as a whole (open vs. closed), distinct
/// from any one entry's [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkLogStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkLogArtifacts {
    #[serde(default)]
    pub commits: Vec<String>,
    #[serde(default)]
    pub merge_requests: Vec<String>,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub branches_created: Vec<String>,
}

impl WorkLogArtifacts {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.merge_requests.is_empty() && self.files_changed.is_empty() && self.branches_created.is_empty()
    }
}

/// One append-only entry in an issue's work log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: WorkLogAction,
    pub detail: String,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub artifacts: WorkLogArtifacts,
}

impl WorkLogEntry {
    pub fn new(action: WorkLogAction, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            detail: detail.into(),
            outcome: None,
            artifacts: WorkLogArtifacts::default(),
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_artifacts(mut self, artifacts: WorkLogArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLog {
    pub issue_id: String,
    pub status: WorkLogStatus,
    pub entries: Vec<WorkLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkLog {
    pub fn new(issue_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            issue_id: issue_id.into(),
            status: WorkLogStatus::Open,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn log(&mut self, entry: WorkLogEntry) {
        self.updated_at = entry.timestamp;
        self.entries.push(entry);
    }

    pub fn close(&mut self) {
        self.status = WorkLogStatus::Closed;
        self.updated_at = Utc::now();
    }

    pub fn build_continuation_prompt(&self) -> String {
        let mut out = format!("## Work log for {}\n\n", self.issue_id);
        if self.entries.is_empty() {
            out.push_str("No prior activity recorded.\n");
            return out;
        }
        for entry in &self.entries {
            let outcome = entry
                .outcome
                .map(|o| format!(" ({o:?})"))
                .unwrap_or_default();
            out.push_str(&format!(
                "- [{}] {:?}{outcome}: {}\n",
                entry.timestamp.to_rfc3339(),
                entry.action,
                entry.detail
            ));
            if !entry.artifacts.is_empty() {
                if !entry.artifacts.commits.is_empty() {
                    out.push_str(&format!("  commits: {}\n", entry.artifacts.commits.join(", ")));
                }
                if !entry.artifacts.merge_requests.is_empty() {
                    out.push_str(&format!("  merge requests: {}\n", entry.artifacts.merge_requests.join(", ")));
                }
                if !entry.artifacts.files_changed.is_empty() {
                    out.push_str(&format!("  files changed: {}\n", entry.artifacts.files_changed.join(", ")));
                }
                if !entry.artifacts.branches_created.is_empty() {
                    out.push_str(&format!("  branches: {}\n", entry.artifacts.branches_created.join(", ")));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_updates_timestamp() {
        let mut log = WorkLog::new("ISS-1");
        let created = log.updated_at;
        let entry = WorkLogEntry::new(WorkLogAction::Started, "kicked off");
        log.log(entry);
        assert!(log.updated_at >= created);
        assert_eq!(log.entries.len(), 1);
    }

    #[test]
    fn close_sets_status_closed() {
        let mut log = WorkLog::new("ISS-1");
        log.close();
        assert_eq!(log.status, WorkLogStatus::Closed);
    }

    #[test]
    fn continuation_prompt_handles_empty_log() {
        let log = WorkLog::new("ISS-1");
        let prompt = log.build_continuation_prompt();
        assert!(prompt.contains("No prior activity"));
    }

    #[test]
    fn continuation_prompt_includes_entries() {
        let mut log = WorkLog::new("ISS-1");
        log.log(WorkLogEntry::new(WorkLogAction::Started, "begin").with_outcome(Outcome::Unknown));
        log.log(WorkLogEntry::new(WorkLogAction::Completed, "done").with_outcome(Outcome::Success));
        let prompt = log.build_continuation_prompt();
        assert!(prompt.contains("begin"));
        assert!(prompt.contains("done"));
    }
}
