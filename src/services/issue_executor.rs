//! Composes [`SprintPlanner`], [`ExecutionTracer`], [`HistoryTracker`] and the
//! `IssueTracker`/`UiChatPeer`/`HeadlessAgent` ports.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::sprint::{ApprovalStatus, SprintIssue, SprintState, TimelineEvent};
use crate::domain::models::trace::{EndStepArgs, ExecutionMode, ExecutionTrace, StepStatus, TraceState, WorkflowType};
use crate::domain::models::work_log::{Outcome, WorkLogAction};
use crate::domain::ports::{AgentInvocation, AgentOutcome, HeadlessAgent, IssueTracker, SprintStateStore, UiChatPeer};
use crate::infrastructure::agent::markers;
use crate::infrastructure::logging::audit::AuditLogger;
use crate::services::execution_tracer::ExecutionTracer;
use crate::services::history_tracker::HistoryTracker;
use crate::services::sprint_planner::SprintPlanner;

#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// No approved+actionable issue was found; nothing to do.
    Idle,
    Waiting { issue_key: String },
    /// The issue advanced; see `outcome` for the terminal branch reached.
    Processed { issue_key: String, outcome: ProcessedOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedOutcome {
    LaunchedForeground,
    Completed,
    Blocked,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorTimeouts {
    pub ui_peer_ping: Duration,
    pub tracker_transition: Duration,
    pub background_agent: Duration,
}

impl Default for ExecutorTimeouts {
    fn default() -> Self {
        Self {
            ui_peer_ping: Duration::from_secs(5),
            tracker_transition: Duration::from_secs(60),
            background_agent: Duration::from_secs(1800),
        }
    }
}

pub struct IssueExecutor {
    state_store: Arc<dyn SprintStateStore>,
    tracker: Arc<dyn IssueTracker>,
    ui_peer: Arc<dyn UiChatPeer>,
    agent: Arc<dyn HeadlessAgent>,
    planner: Arc<SprintPlanner>,
    tracer: Arc<ExecutionTracer>,
    history: Arc<HistoryTracker>,
    audit: AuditLogger,
    timeouts: ExecutorTimeouts,
}

impl IssueExecutor {
    pub fn new(
        state_store: Arc<dyn SprintStateStore>,
        tracker: Arc<dyn IssueTracker>,
        ui_peer: Arc<dyn UiChatPeer>,
        agent: Arc<dyn HeadlessAgent>,
        planner: Arc<SprintPlanner>,
        tracer: Arc<ExecutionTracer>,
        history: Arc<HistoryTracker>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            state_store,
            tracker,
            ui_peer,
            agent,
            planner,
            tracer,
            history,
            audit,
            timeouts: ExecutorTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ExecutorTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    async fn load(&self) -> DomainResult<SprintState> {
        self.state_store
            .load()
            .await?
            .ok_or_else(|| DomainError::Persistence("sprint state not yet initialized".to_string()))
    }

    async fn save(&self, state: &SprintState) -> DomainResult<()> {
        self.state_store.save(state).await
    }

    /// `on_processed` runs after a terminal branch is reached and the new state has
    /// been persisted.
    pub async fn process_next(&self, on_processed: Option<&(dyn Fn(&SprintIssue) + Send + Sync)>) -> DomainResult<ProcessOutcome> {
        let mut state = self.load().await?;

        // step 1: first approved + actionable issue.
        let Some(key) = state
            .issues
            .iter()
            .find(|i| i.approval_status == ApprovalStatus::Approved && self.planner.is_actionable(i))
            .map(|i| i.key.clone())
        else {
            return Ok(ProcessOutcome::Idle);
        };

        self.run_issue(&mut state, &key, None, on_processed).await
    }

    pub async fn start_issue(&self, issue_key: &str, background: Option<bool>, on_processed: Option<&(dyn Fn(&SprintIssue) + Send + Sync)>) -> DomainResult<ProcessOutcome> {
        let mut state = self.load().await?;
        if !state.issues.iter().any(|i| i.key == issue_key) {
            return Err(DomainError::IssueNotFound(issue_key.to_string()));
        }
        if let Some(background) = background {
            state.background_tasks = background;
        }
        self.audit
            .log_operation("force_start_issue", "ipc", Some(issue_key), true, None)
            .await
            .map_err(|e| DomainError::Ipc(e.to_string()))?;
        self.run_issue(&mut state, issue_key, Some("force_start".to_string()), on_processed).await
    }

    /// Does not kill any in-flight background process.
    pub async fn abort_issue(&self, issue_key: &str) -> DomainResult<()> {
        let mut state = self.load().await?;
        let matched_processing = state.processing_issue.as_deref() == Some(issue_key);
        let issue = state.issues.iter_mut().find(|i| i.key == issue_key).ok_or_else(|| DomainError::IssueNotFound(issue_key.to_string()))?;
        issue.approval_status = ApprovalStatus::Blocked;
        issue.waiting_reason = Some("user took control".to_string());
        issue.push_timeline(TimelineEvent::new("aborted").with_detail("user took control"));
        if matched_processing {
            state.processing_issue = None;
        }
        self.save(&state).await?;
        self.audit
            .log_operation("abort_issue", "ipc", Some(issue_key), true, None)
            .await
            .map_err(|e| DomainError::Ipc(e.to_string()))?;
        Ok(())
    }

    async fn run_issue(
        &self,
        state: &mut SprintState,
        key: &str,
        decision_reason: Option<String>,
        on_processed: Option<&(dyn Fn(&SprintIssue) + Send + Sync)>,
    ) -> DomainResult<ProcessOutcome> {
        // step 2: execution mode follows the global background_tasks flag.
        let mode = if state.background_tasks { ExecutionMode::Background } else { ExecutionMode::Foreground };

        // step 3: obtain/create the tracer, advance idle -> ... -> checking_actionable.
        let mut trace = self.tracer.load_or_create(key, WorkflowType::CodeChange, mode).await?;
        for to in [TraceState::Loading, TraceState::Analyzing, TraceState::Classifying, TraceState::CheckingActionable] {
            self.tracer.transition(&mut trace, to, decision_reason.clone(), None).await?;
        }
        if let Some(reason) = &decision_reason {
            self.tracer
                .log_step(&mut trace, "force_start", StepStatus::Succeeded, EndStepArgs { decision: Some(reason.clone()), ..Default::default() })
                .await?;
        }

        match mode {
            ExecutionMode::Foreground => self.run_foreground(state, key, &mut trace).await,
            ExecutionMode::Background => self.run_background(state, key, &mut trace, on_processed).await,
        }
    }

    async fn run_foreground(&self, state: &mut SprintState, key: &str, trace: &mut ExecutionTrace) -> DomainResult<ProcessOutcome> {
        // Require an available UI chat peer; if unavailable, leave issue
        // state untouched for the daemon to retry later.
        let available = tokio::time::timeout(self.timeouts.ui_peer_ping, self.ui_peer.ping())
            .await
            .map_err(|_| DomainError::Timeout)
            .and_then(|r| r)
            .unwrap_or(false);
        if !available {
            return Ok(ProcessOutcome::Waiting { issue_key: key.to_string() });
        }

        self.tracer.transition(trace, TraceState::TransitioningJira, None, None).await?;
        tokio::time::timeout(self.timeouts.tracker_transition, self.tracker.set_status(key, "In Progress"))
            .await
            .map_err(|_| DomainError::Timeout)??;

        let issue = state.issues.iter_mut().find(|i| i.key == key).ok_or_else(|| DomainError::IssueNotFound(key.to_string()))?;
        issue.approval_status = ApprovalStatus::InProgress;
        issue.jira_status = "In Progress".to_string();
        issue.push_timeline(TimelineEvent::new("transitioned_jira").with_detail("In Progress"));
        state.processing_issue = Some(key.to_string());

        self.tracer.transition(trace, TraceState::StartingWork, None, None).await?;
        self.tracer.transition(trace, TraceState::BuildingPrompt, None, None).await?;
        let prompt = {
            let issue = state.find_issue(key).expect("issue present");
            self.planner.build_work_prompt(issue, WorkflowType::CodeChange)
        };

        self.tracer.transition(trace, TraceState::LaunchingChat, None, None).await?;
        let issue_title = state.find_issue(key).expect("issue present").title.clone();
        let launch = self.ui_peer.launch_issue_chat(key, &issue_title, &prompt, false).await?;
        if !launch.success {
            self.tracer.mark_failed(trace, "UI peer failed to launch chat").await?;
            self.save(state).await?;
            return Ok(ProcessOutcome::Processed { issue_key: key.to_string(), outcome: ProcessedOutcome::Failed });
        }

        let issue = state.issues.iter_mut().find(|i| i.key == key).expect("issue present");
        issue.chat_id = launch.chat_id;

        self.tracer.transition(trace, TraceState::Implementing, None, None).await?;
        self.save(state).await?;
        info!(issue = %key, "foreground chat launched");
        Ok(ProcessOutcome::Processed { issue_key: key.to_string(), outcome: ProcessedOutcome::LaunchedForeground })
    }

    async fn run_background(
        &self,
        state: &mut SprintState,
        key: &str,
        trace: &mut ExecutionTrace,
        on_processed: Option<&(dyn Fn(&SprintIssue) + Send + Sync)>,
    ) -> DomainResult<ProcessOutcome> {
        self.history.log_action(key, WorkLogAction::Started, "background execution started", None).await?;

        self.tracer.transition(trace, TraceState::TransitioningJira, None, None).await?;
        tokio::time::timeout(self.timeouts.tracker_transition, self.tracker.set_status(key, "In Progress"))
            .await
            .map_err(|_| DomainError::Timeout)??;

        let issue = state.issues.iter_mut().find(|i| i.key == key).ok_or_else(|| DomainError::IssueNotFound(key.to_string()))?;
        issue.approval_status = ApprovalStatus::InProgress;
        issue.jira_status = "In Progress".to_string();
        state.processing_issue = Some(key.to_string());
        self.save(state).await?;

        self.tracer.transition(trace, TraceState::StartingWork, None, None).await?;
        self.tracer.transition(trace, TraceState::BuildingPrompt, None, None).await?;
        let prompt = {
            let issue = state.find_issue(key).expect("issue present");
            self.planner.build_work_prompt(issue, WorkflowType::CodeChange)
        };

        self.tracer.transition(trace, TraceState::Implementing, None, None).await?;
        let invocation = AgentInvocation::new(prompt, self.timeouts.background_agent);
        let outcome = self.agent.run(invocation).await?;

        let (processed, result) = match outcome {
            AgentOutcome::TimedOut { partial_stdout } => {
                self.history
                    .log_action(key, WorkLogAction::Failed, "background agent timed out", Some(Outcome::Failure))
                    .await?;
                let log = self.history.load(key).await?.unwrap_or_else(|| self.history.init(key));
                let continuation = self.history.build_continuation_prompt(key, &log);
                self.tracer
                    .log_step(trace, "timeout", StepStatus::Failed, EndStepArgs {
                        outputs: Some(serde_json::json!({ "partial_stdout": partial_stdout, "continuation_prompt": continuation })),
                        ..Default::default()
                    })
                    .await?;
                self.tracer.mark_failed(trace, "background agent timed out").await?;
                let issue = state.issues.iter_mut().find(|i| i.key == key).expect("issue present");
                issue.approval_status = ApprovalStatus::Blocked;
                issue.waiting_reason = Some("background agent timed out".to_string());
                state.processing_issue = None;
                (ProcessedOutcome::TimedOut, None)
            }
            AgentOutcome::Finished { exit_code, stdout, stderr } => {
                let artifacts = markers::extract_artifacts(&stdout);
                match markers::parse_sprint_bot_status(&stdout) {
                    Some((markers::SprintBotStatus::Completed, _)) | None if exit_code == 0 => {
                        self.tracer.transition(trace, TraceState::CreatingMr, None, None).await?;
                        self.tracer.transition(trace, TraceState::AwaitingReview, None, None).await?;
                        tokio::time::timeout(self.timeouts.tracker_transition, self.tracker.set_status(key, "In Review"))
                            .await
                            .map_err(|_| DomainError::Timeout)??;
                        self.history
                            .log_action(key, WorkLogAction::Completed, "background agent reported completion", Some(Outcome::Success))
                            .await?;
                        self.tracer.mark_completed(trace, Some("background execution completed".to_string())).await?;
                        let issue = state.issues.iter_mut().find(|i| i.key == key).expect("issue present");
                        issue.approval_status = ApprovalStatus::Completed;
                        issue.jira_status = "In Review".to_string();
                        issue.push_timeline(TimelineEvent::new("completed").with_detail("moved to In Review"));
                        state.processing_issue = None;
                        (ProcessedOutcome::Completed, Some(artifacts))
                    }
                    Some((markers::SprintBotStatus::Blocked, reason)) => {
                        let reason = reason.unwrap_or_else(|| "blocked by background agent".to_string());
                        self.history.log_action(key, WorkLogAction::Blocked, reason.clone(), Some(Outcome::Partial)).await?;
                        self.tracer.mark_blocked(trace, reason.clone(), None).await?;
                        let issue = state.issues.iter_mut().find(|i| i.key == key).expect("issue present");
                        issue.approval_status = ApprovalStatus::Blocked;
                        issue.waiting_reason = Some(reason);
                        state.processing_issue = None;
                        (ProcessedOutcome::Blocked, Some(artifacts))
                    }
                    _ => {
                        let reason = markers::parse_sprint_bot_status(&stdout)
                            .and_then(|(_, detail)| detail)
                            .unwrap_or_else(|| if stderr.is_empty() { format!("exit code {exit_code}") } else { stderr.clone() });
                        self.history.log_action(key, WorkLogAction::Failed, reason.clone(), Some(Outcome::Failure)).await?;
                        self.tracer.mark_blocked(trace, reason.clone(), None).await?;
                        let issue = state.issues.iter_mut().find(|i| i.key == key).expect("issue present");
                        issue.approval_status = ApprovalStatus::Blocked;
                        issue.waiting_reason = Some(reason);
                        state.processing_issue = None;
                        (ProcessedOutcome::Failed, Some(artifacts))
                    }
                }
            }
        };

        if let Some(artifacts) = result {
            if let Some(mut log) = self.history.load(key).await? {
                if let Some(last) = log.entries.last_mut() {
                    last.artifacts = artifacts;
                }
                self.history.save(&log).await?;
            }
        }

        self.save(state).await?;
        if let Some(callback) = on_processed {
            if let Some(issue) = state.find_issue(key) {
                callback(issue);
            }
        }
        Ok(ProcessOutcome::Processed { issue_key: key.to_string(), outcome: processed })
    }
}
