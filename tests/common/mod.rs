//! Shared in-memory test doubles for the top-level integration tests.
//!
//! Each port trait gets a minimal `Mutex`-backed implementation here so
//! integration tests can assemble real services (`SprintDaemon`,
//! `IssueExecutor`, `MemoryInterface`, ...) without touching disk or a
//! real tracker/agent/UI peer, mirroring the per-file `Stub*` doubles
//! already used by the unit tests in `src/services/*.rs`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use backplane::domain::errors::DomainResult;
use backplane::domain::models::sprint::SprintState;
use backplane::domain::models::trace::ExecutionTrace;
use backplane::domain::models::work_log::WorkLog;
use backplane::domain::ports::issue_tracker::SprintMetadata;
use backplane::domain::ports::{
    AgentInvocation, AgentOutcome, HeadlessAgent, IssueTracker, LaunchChatResult, SprintStateStore, TraceStore, UiChatPeer, WorkLogStore,
};

pub struct MemStateStore(pub Mutex<Option<SprintState>>);

impl MemStateStore {
    pub fn new(state: SprintState) -> Self {
        Self(Mutex::new(Some(state)))
    }
}

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

#[derive(Default)]
pub struct MemTraceStore(pub Mutex<HashMap<String, ExecutionTrace>>);

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

#[derive(Default)]
pub struct MemWorkLogStore(pub Mutex<HashMap<String, WorkLog>>);

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

/// A tracker double that never contributes new issues on refresh; tests
/// seed the sprint state directly and exercise the rest of the pipeline
/// against it.
pub struct StubTracker;

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
    async fn fetch_issues(&self, _sprint_id: &str) -> DomainResult<Vec<backplane::domain::models::sprint::SprintIssue>> {
        Ok(vec![])
    }
    async fn set_status(&self, _issue_key: &str, _status: &str) -> DomainResult<()> {
        Ok(())
    }
}

pub struct StubUiPeer {
    pub available: bool,
}

#[async_trait]
impl UiChatPeer for StubUiPeer {
    async fn ping(&self) -> DomainResult<bool> {
        Ok(self.available)
    }
    async fn launch_issue_chat(&self, _key: &str, _summary: &str, _prompt: &str, _return_to_previous: bool) -> DomainResult<LaunchChatResult> {
        Ok(LaunchChatResult {
            success: true,
            chat_id: Some("chat-1".to_string()),
        })
    }
}

pub struct StubAgent {
    pub outcome: AgentOutcome,
}

#[async_trait]
impl HeadlessAgent for StubAgent {
    async fn run(&self, _invocation: AgentInvocation) -> DomainResult<AgentOutcome> {
        Ok(self.outcome.clone())
    }
}

pub fn finished(stdout: impl Into<String>) -> AgentOutcome {
    AgentOutcome::Finished {
        exit_code: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}
