//! Per-issue work log storage plus continuation-prompt rendering for interactive resumption.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::DomainResult;
use crate::domain::models::work_log::{WorkLog, WorkLogAction, WorkLogEntry, Outcome};
use crate::domain::ports::WorkLogStore;

const MAX_RENDERED_ACTIONS: usize = 10;

pub struct HistoryTracker {
    store: Arc<dyn WorkLogStore>,
    work_log_dir: PathBuf,
}

impl HistoryTracker {
    pub fn new(store: Arc<dyn WorkLogStore>, work_log_dir: PathBuf) -> Self {
        Self { store, work_log_dir }
    }

    pub fn init(&self, issue_key: &str) -> WorkLog {
        WorkLog::new(issue_key)
    }

    pub async fn load(&self, issue_key: &str) -> DomainResult<Option<WorkLog>> {
        self.store.load(issue_key).await
    }

    pub async fn save(&self, log: &WorkLog) -> DomainResult<()> {
        self.store.save(log).await
    }

    pub async fn log_action(&self, issue_key: &str, action: WorkLogAction, detail: impl Into<String>, outcome: Option<Outcome>) -> DomainResult<WorkLog> {
        let mut log = self.store.load(issue_key).await?.unwrap_or_else(|| WorkLog::new(issue_key));
        let mut entry = WorkLogEntry::new(action, detail);
        if let Some(outcome) = outcome {
            entry = entry.with_outcome(outcome);
        }
        log.log(entry);
        self.store.save(&log).await?;
        Ok(log)
    }

    pub fn get_work_log_path(&self, issue_key: &str) -> PathBuf {
        self.work_log_dir.join(format!("{issue_key}.yaml"))
    }

    pub fn build_continuation_prompt(&self, issue_key: &str, log: &WorkLog) -> String {
        let mut out = format!("# Continuation: {issue_key}\n\n");
        out.push_str(&format!("Status: {:?}\n\n", log.status));

        let recent: Vec<&WorkLogEntry> = log.entries.iter().rev().take(MAX_RENDERED_ACTIONS).collect();
        out.push_str("## Recent actions\n\n");
        if recent.is_empty() {
            out.push_str("No prior activity recorded.\n\n");
        } else {
            for entry in recent.iter().rev() {
                let outcome = entry.outcome.map(|o| format!(" ({o:?})")).unwrap_or_default();
                out.push_str(&format!("- [{}] {:?}{outcome}: {}\n", entry.timestamp.to_rfc3339(), entry.action, entry.detail));
            }
            out.push('\n');
        }

        let mut files = Vec::new();
        let mut commits = Vec::new();
        let mut merge_requests = Vec::new();
        for entry in &log.entries {
            commits.extend(entry.artifacts.commits.iter().cloned());
            merge_requests.extend(entry.artifacts.merge_requests.iter().cloned());
            files.extend(entry.artifacts.files_changed.iter().cloned());
        }

        if !commits.is_empty() || !merge_requests.is_empty() {
            out.push_str("## Artifacts so far\n\n");
            if !commits.is_empty() {
                out.push_str(&format!("- Commits: {}\n", commits.join(", ")));
            }
            if !merge_requests.is_empty() {
                out.push_str(&format!("- Merge requests: {}\n", merge_requests.join(", ")));
            }
            out.push('\n');
        }

        if !files.is_empty() {
            out.push_str("## Files to review\n\n");
            for file in &files {
                out.push_str(&format!("- {file}\n"));
            }
            out.push('\n');
        }

        out.push_str("## Suggested next steps\n\n");
        match log.entries.last().map(|e| e.action) {
            Some(WorkLogAction::Blocked) => out.push_str("Resolve the blocking condition above, then resume implementation.\n"),
            Some(WorkLogAction::Failed) => out.push_str("Investigate the failure above and retry.\n"),
            _ => out.push_str("Continue the work from where it left off.\n"),
        }

        let _ = Utc::now();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MemWorkLogStore {
        logs: Mutex<std::collections::HashMap<String, WorkLog>>,
    }

    impl MemWorkLogStore {
        fn new() -> Self {
            Self { logs: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    #[async_trait]
    impl WorkLogStore for MemWorkLogStore {
        async fn load(&self, issue_key: &str) -> DomainResult<Option<WorkLog>> {
            Ok(self.logs.lock().unwrap().get(issue_key).cloned())
        }

        async fn save(&self, log: &WorkLog) -> DomainResult<()> {
            self.logs.lock().unwrap().insert(log.issue_id.clone(), log.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_action_creates_then_appends() {
        let tracker = HistoryTracker::new(Arc::new(MemWorkLogStore::new()), PathBuf::from("state/sprint_work"));
        tracker.log_action("ISS-1", WorkLogAction::Started, "kicked off", None).await.unwrap();
        let log = tracker.log_action("ISS-1", WorkLogAction::Completed, "done", Some(Outcome::Success)).await.unwrap();
        assert_eq!(log.entries.len(), 2);
    }

    #[test]
    fn get_work_log_path_joins_issue_key() {
        let tracker = HistoryTracker::new(Arc::new(MemWorkLogStore::new()), PathBuf::from("state/sprint_work"));
        assert_eq!(tracker.get_work_log_path("ISS-1"), PathBuf::from("state/sprint_work/ISS-1.yaml"));
    }

    #[tokio::test]
    async fn continuation_prompt_lists_recent_actions_and_files() {
        let tracker = HistoryTracker::new(Arc::new(MemWorkLogStore::new()), PathBuf::from("state/sprint_work"));
        let mut log = WorkLog::new("ISS-1");
        let mut entry = WorkLogEntry::new(WorkLogAction::Completed, "implemented fix").with_outcome(Outcome::Success);
        entry.artifacts.files_changed.push("src/lib.rs".to_string());
        entry.artifacts.commits.push("abc123".to_string());
        log.log(entry);

        let prompt = tracker.build_continuation_prompt("ISS-1", &log);
        assert!(prompt.contains("src/lib.rs"));
        assert!(prompt.contains("abc123"));
        assert!(prompt.contains("implemented fix"));
    }
}
