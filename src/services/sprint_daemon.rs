//! Long-running scheduler loop: working-hours gating, periodic tracker/review refresh, and issue dispatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::config::Config;
use crate::domain::models::sprint::ApprovalStatus;
use crate::domain::ports::{IssueTracker, SprintStateStore};
use crate::services::issue_executor::IssueExecutor;
use crate::services::review_checker::ReviewChecker;
use crate::services::sprint_planner::SprintPlanner;

const IDLE_SLEEP: Duration = Duration::from_secs(60);

/// This crate's stack has no OS suspend-notification API (`nix` exposes signals, not
/// power events), so resume is inferred from sleep drift instead (DESIGN.md Open
/// Question).
const SUSPECTED_SUSPEND_FACTOR: u32 = 3;

#[derive(Debug, Default)]
pub struct DaemonMetrics {
    pub ticks: AtomicU64,
    pub issues_processed: AtomicU64,
    pub review_checks_run: AtomicU64,
    pub last_refresh: RwLock<Option<DateTime<Utc>>>,
    pub last_review_check: RwLock<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone)]
pub struct RuntimeSnapshot {
    pub is_active: bool,
    pub within_working_hours: bool,
    pub ticks: u64,
    pub issues_processed: u64,
    pub review_checks_run: u64,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_review_check: Option<DateTime<Utc>>,
}

pub struct SprintDaemon {
    config: Arc<Config>,
    state_store: Arc<dyn SprintStateStore>,
    tracker: Arc<dyn IssueTracker>,
    planner: Arc<SprintPlanner>,
    executor: Arc<IssueExecutor>,
    review_checker: Arc<ReviewChecker>,
    metrics: Arc<DaemonMetrics>,
    shutdown: Arc<Notify>,
    stop_requested: Arc<AtomicBool>,
    running: AtomicBool,
}

impl SprintDaemon {
    pub fn new(
        config: Arc<Config>,
        state_store: Arc<dyn SprintStateStore>,
        tracker: Arc<dyn IssueTracker>,
        planner: Arc<SprintPlanner>,
        executor: Arc<IssueExecutor>,
        review_checker: Arc<ReviewChecker>,
    ) -> Self {
        Self {
            config,
            state_store,
            tracker,
            planner,
            executor,
            review_checker,
            metrics: Arc::new(DaemonMetrics::default()),
            shutdown: Arc::new(Notify::new()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
        }
    }

    pub fn metrics(&self) -> Arc<DaemonMetrics> {
        self.metrics.clone()
    }

    pub fn request_shutdown(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn runtime_snapshot(&self) -> RuntimeSnapshot {
        let now = Utc::now();
        let state = self.state_store.load().await.ok().flatten();
        let within_working_hours = self.config.working_hours.contains(now);
        let is_active = state.as_ref().map(|s| s.manually_started || (s.automatic_mode && within_working_hours)).unwrap_or(false);
        RuntimeSnapshot {
            is_active,
            within_working_hours,
            ticks: self.metrics.ticks.load(Ordering::Relaxed),
            issues_processed: self.metrics.issues_processed.load(Ordering::Relaxed),
            review_checks_run: self.metrics.review_checks_run.load(Ordering::Relaxed),
            last_refresh: *self.metrics.last_refresh.read().await,
            last_review_check: *self.metrics.last_review_check.read().await,
        }
    }

    pub async fn get_runtime_snapshot(&self) -> RuntimeSnapshot {
        self.runtime_snapshot().await
    }

    /// Sleep for `duration`, interruptible by [`Self::request_shutdown`].
    /// Returns `true` if the sleep was interrupted by a shutdown request,
    /// and separately reports whether the sleep ran suspiciously long
    /// (suspected suspend/resume) via the returned bool's sibling check
    /// performed by the caller.
    async fn interruptible_sleep(&self, duration: Duration) -> (bool, bool) {
        let started = Instant::now();
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.shutdown.notified() => true,
        };
        let elapsed = started.elapsed();
        let suspected_suspend = !interrupted && elapsed > duration.saturating_mul(SUSPECTED_SUSPEND_FACTOR);
        if suspected_suspend {
            warn!(requested_secs = duration.as_secs(), actual_secs = elapsed.as_secs(), "sleep ran far longer than requested; assuming host suspend/resume");
        }
        (interrupted, suspected_suspend)
    }

    async fn refresh_from_tracker(&self) -> DomainResult<()> {
        let previous = self.state_store.load().await?;
        let state = self.planner.refresh_from_tracker(previous.as_ref()).await?;
        self.state_store.save(&state).await?;
        *self.metrics.last_refresh.write().await = Some(Utc::now());
        Ok(())
    }

    async fn check_review_issues(&self) -> DomainResult<()> {
        let outcomes = self.review_checker.check_review_issues(&self.config.tracker.review_statuses).await?;
        self.metrics.review_checks_run.fetch_add(outcomes.len() as u64, Ordering::Relaxed);
        *self.metrics.last_review_check.write().await = Some(Utc::now());
        Ok(())
    }

    /// IPC and the sleep/wake monitor are started by the caller before invoking this
    /// and stopped after it returns.
    pub async fn run(&self) -> DomainResult<()> {
        self.running.store(true, Ordering::Release);
        info!("sprint daemon starting");

        // startup: refresh tracker data and persist before the first tick.
        if let Err(e) = self.refresh_from_tracker().await {
            warn!(error = %e, "initial tracker refresh failed; continuing with whatever state is on disk");
        }

        let mut force_refresh = false;
        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }
            self.metrics.ticks.fetch_add(1, Ordering::Relaxed);

            let Some(mut state) = self.state_store.load().await? else {
                warn!("sprint state missing mid-loop; sleeping and retrying");
                let (interrupted, _) = self.interruptible_sleep(IDLE_SLEEP).await;
                if interrupted {
                    break;
                }
                continue;
            };

            let now = Utc::now();
            let within_hours = self.config.working_hours.contains(now);
            let should_run = state.manually_started || (state.automatic_mode && within_hours);
            if !should_run {
                debug!("outside run window; idling");
                let (interrupted, _) = self.interruptible_sleep(IDLE_SLEEP).await;
                if interrupted {
                    break;
                }
                continue;
            }

            let refresh_due = force_refresh
                || self
                    .metrics
                    .last_refresh
                    .read()
                    .await
                    .map(|t| now - t > chrono::Duration::seconds(self.config.daemon.tracker_refresh_interval_seconds as i64))
                    .unwrap_or(true);
            if refresh_due {
                if let Err(e) = self.refresh_from_tracker().await {
                    warn!(error = %e, "periodic tracker refresh failed");
                }
                force_refresh = false;
                state = self.state_store.load().await?.unwrap_or(state);
            }

            let review_due = self
                .metrics
                .last_review_check
                .read()
                .await
                .map(|t| now - t > chrono::Duration::seconds(self.config.daemon.review_check_interval_seconds as i64))
                .unwrap_or(true);
            if review_due {
                if let Err(e) = self.check_review_issues().await {
                    warn!(error = %e, "periodic review check failed");
                }
            }

            let has_actionable_approved = state.processing_issue.is_none()
                && state
                    .issues
                    .iter()
                    .any(|i| i.approval_status == ApprovalStatus::Approved && self.planner.is_actionable(i));
            if has_actionable_approved {
                match self.executor.process_next(None).await {
                    Ok(outcome) => {
                        if matches!(outcome, crate::services::issue_executor::ProcessOutcome::Processed { .. }) {
                            self.metrics.issues_processed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => warn!(error = %e, "process_next failed"),
                }
            }

            let (interrupted, suspected_suspend) = self.interruptible_sleep(Duration::from_secs(self.config.daemon.check_interval_seconds)).await;
            if suspected_suspend {
                force_refresh = true;
            }
            if interrupted {
                break;
            }
        }

        self.running.store(false, Ordering::Release);
        info!("sprint daemon shut down");
        Ok(())
    }

    pub async fn refresh_now(&self) -> DomainResult<()> {
        self.refresh_from_tracker().await
    }

    pub async fn process_next_issue(&self) -> DomainResult<crate::services::issue_executor::ProcessOutcome> {
        let outcome = self.executor.process_next(None).await?;
        if matches!(outcome, crate::services::issue_executor::ProcessOutcome::Processed { .. }) {
            self.metrics.issues_processed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    pub fn tracker(&self) -> &Arc<dyn IssueTracker> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::sprint::{SprintIssue, SprintState};
    use crate::domain::models::trace::ExecutionTrace;
    use crate::domain::models::work_log::WorkLog;
    use crate::domain::ports::issue_tracker::SprintMetadata;
    use crate::domain::ports::persistence::{TraceStore, WorkLogStore};
    use crate::domain::ports::{AgentInvocation, AgentOutcome, HeadlessAgent, LaunchChatResult, UiChatPeer};
    use crate::infrastructure::logging::audit::AuditLogger;
    use crate::services::execution_tracer::ExecutionTracer;
    use crate::services::history_tracker::HistoryTracker;
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

    struct MemTraceStore(Mutex<std::collections::HashMap<String, ExecutionTrace>>);
    #[async_trait]
    impl TraceStore for MemTraceStore {
        async fn load(&self, key: &str) -> DomainResult<Option<ExecutionTrace>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        async fn save(&self, trace: &ExecutionTrace) -> DomainResult<()> {
            self.0.lock().unwrap().insert(trace.issue_key.clone(), trace.clone());
            Ok(())
        }
        async fn list(&self) -> DomainResult<Vec<String>> {
            Ok(self.0.lock().unwrap().keys().cloned().collect())
        }
    }

    struct MemWorkLogStore(Mutex<std::collections::HashMap<String, WorkLog>>);
    #[async_trait]
    impl WorkLogStore for MemWorkLogStore {
        async fn load(&self, key: &str) -> DomainResult<Option<WorkLog>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        async fn save(&self, log: &WorkLog) -> DomainResult<()> {
            self.0.lock().unwrap().insert(log.issue_id.clone(), log.clone());
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

    struct StubUiPeer;
    #[async_trait]
    impl UiChatPeer for StubUiPeer {
        async fn ping(&self) -> DomainResult<bool> {
            Ok(true)
        }
        async fn launch_issue_chat(&self, _key: &str, _summary: &str, _prompt: &str, _return_to_previous: bool) -> DomainResult<LaunchChatResult> {
            Ok(LaunchChatResult { success: true, chat_id: Some("chat-1".to_string()) })
        }
    }

    struct StubAgent;
    #[async_trait]
    impl HeadlessAgent for StubAgent {
        async fn run(&self, _invocation: AgentInvocation) -> DomainResult<AgentOutcome> {
            Ok(AgentOutcome::Finished { exit_code: 0, stdout: String::new(), stderr: String::new() })
        }
    }

    async fn build_daemon(state: SprintState) -> (SprintDaemon, Arc<MemStateStore>) {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemStateStore(Mutex::new(Some(state))));
        let tracker: Arc<dyn IssueTracker> = Arc::new(StubTracker);
        let ui_peer: Arc<dyn UiChatPeer> = Arc::new(StubUiPeer);
        let agent: Arc<dyn HeadlessAgent> = Arc::new(StubAgent);
        let planner = Arc::new(SprintPlanner::new(tracker.clone(), "alice"));
        let tracer = Arc::new(ExecutionTracer::new(Arc::new(MemTraceStore(Mutex::new(std::collections::HashMap::new())))));
        let history = Arc::new(HistoryTracker::new(Arc::new(MemWorkLogStore(Mutex::new(std::collections::HashMap::new()))), std::path::PathBuf::from("state/sprint_work")));
        let audit_dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(audit_dir.path().join("audit.log")).await.unwrap();
        let executor = Arc::new(IssueExecutor::new(store.clone(), tracker.clone(), ui_peer, agent.clone(), planner.clone(), tracer, history, audit.clone()));
        let review_checker = Arc::new(ReviewChecker::new(store.clone(), tracker.clone(), agent, audit));
        let daemon = SprintDaemon::new(config, store.clone(), tracker, planner, executor, review_checker);
        (daemon, store)
    }

    #[tokio::test]
    async fn runtime_snapshot_reports_inactive_when_neither_flag_set() {
        let state = SprintState::new("SPR-1", "Sprint 1");
        let (daemon, _) = build_daemon(state).await;
        let snapshot = daemon.get_runtime_snapshot().await;
        assert!(!snapshot.is_active);
    }

    #[tokio::test]
    async fn runtime_snapshot_reports_active_when_manually_started() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.manually_started = true;
        let (daemon, _) = build_daemon(state).await;
        let snapshot = daemon.get_runtime_snapshot().await;
        assert!(snapshot.is_active);
    }

    #[tokio::test]
    async fn request_shutdown_interrupts_run_promptly() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        state.manually_started = true;
        let (daemon, _) = build_daemon(state).await;
        let daemon = Arc::new(daemon);

        let runner = {
            let daemon = daemon.clone();
            tokio::spawn(async move { daemon.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        daemon.request_shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), runner).await;
        assert!(result.is_ok(), "daemon did not shut down promptly");
        assert!(!daemon.is_running());
    }

    #[tokio::test]
    async fn process_next_issue_increments_counter_when_issue_processed() {
        let mut state = SprintState::new("SPR-1", "Sprint 1");
        let mut issue = SprintIssue::new("ISS-1", "title", "Open");
        issue.approval_status = ApprovalStatus::Approved;
        state.issues.push(issue);
        let (daemon, _) = build_daemon(state).await;
        daemon.process_next_issue().await.unwrap();
        assert_eq!(daemon.metrics().issues_processed.load(Ordering::Relaxed), 1);
    }
}
