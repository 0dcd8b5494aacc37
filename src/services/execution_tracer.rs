//! Validates and records state-machine transitions and step execution for one
//! issue, following the same load-mutate-save discipline as `sprint_planner` and
//! `history_tracker`, backed by the `TraceStore` port rather than direct file access.

use std::sync::Arc;

use tracing::warn;

use crate::domain::errors::DomainResult;
use crate::domain::models::trace::{EndStepArgs, ExecutionMode, ExecutionTrace, StepStatus, TraceState, WorkflowType};
use crate::domain::ports::TraceStore;

pub struct ExecutionTracer {
    store: Arc<dyn TraceStore>,
}

impl ExecutionTracer {
    pub fn new(store: Arc<dyn TraceStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, issue_key: &str) -> DomainResult<Option<ExecutionTrace>> {
        self.store.load(issue_key).await
    }

    /// Loads the existing trace for `issue_key`, or creates a fresh one in
    /// `idle` if none exists yet.
    pub async fn load_or_create(&self, issue_key: &str, workflow_type: WorkflowType, mode: ExecutionMode) -> DomainResult<ExecutionTrace> {
        match self.store.load(issue_key).await? {
            Some(trace) => Ok(trace),
            None => Ok(ExecutionTrace::new(issue_key, workflow_type, mode)),
        }
    }

    pub async fn save(&self, trace: &ExecutionTrace) -> DomainResult<()> {
        self.store.save(trace).await
    }

    pub async fn transition(&self, trace: &mut ExecutionTrace, to: TraceState, trigger: Option<String>, data: Option<serde_json::Value>) -> DomainResult<bool> {
        let from = trace.current_state;
        let allowed = trace.transition(to, trigger, data);
        if !allowed {
            warn!(issue_key = %trace.issue_key, ?from, ?to, "invalid trace transition recorded");
        }
        self.save(trace).await?;
        Ok(allowed)
    }

    pub async fn start_step(&self, trace: &mut ExecutionTrace, name: impl Into<String>) -> DomainResult<String> {
        let id = trace.start_step(name);
        self.save(trace).await?;
        Ok(id)
    }

    pub async fn end_step(&self, trace: &mut ExecutionTrace, step_id: Option<&str>, status: StepStatus, args: EndStepArgs) -> DomainResult<()> {
        trace.end_step(step_id, status, args);
        self.save(trace).await
    }

    pub async fn log_step(&self, trace: &mut ExecutionTrace, name: impl Into<String>, status: StepStatus, args: EndStepArgs) -> DomainResult<()> {
        trace.log_step(name, status, args);
        self.save(trace).await
    }

    pub async fn mark_blocked(&self, trace: &mut ExecutionTrace, reason: impl Into<String>, waiting_for: Option<String>) -> DomainResult<bool> {
        let allowed = trace.mark_blocked(reason, waiting_for);
        self.save(trace).await?;
        Ok(allowed)
    }

    pub async fn mark_completed(&self, trace: &mut ExecutionTrace, summary: Option<String>) -> DomainResult<bool> {
        let allowed = trace.mark_completed(summary);
        self.save(trace).await?;
        Ok(allowed)
    }

    pub async fn mark_failed(&self, trace: &mut ExecutionTrace, error: impl Into<String>) -> DomainResult<bool> {
        let allowed = trace.mark_failed(error);
        self.save(trace).await?;
        Ok(allowed)
    }

    pub fn render_state_diagram(trace: &ExecutionTrace) -> String {
        trace.render_state_diagram()
    }

    pub fn render_step_timeline(trace: &ExecutionTrace) -> String {
        trace.render_step_timeline()
    }

    pub async fn list(&self) -> DomainResult<Vec<String>> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MemTraceStore {
        traces: Mutex<std::collections::HashMap<String, ExecutionTrace>>,
    }

    impl MemTraceStore {
        fn new() -> Self {
            Self {
                traces: Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl TraceStore for MemTraceStore {
        async fn load(&self, issue_key: &str) -> DomainResult<Option<ExecutionTrace>> {
            Ok(self.traces.lock().unwrap().get(issue_key).cloned())
        }

        async fn save(&self, trace: &ExecutionTrace) -> DomainResult<()> {
            self.traces.lock().unwrap().insert(trace.issue_key.clone(), trace.clone());
            Ok(())
        }

        async fn list(&self) -> DomainResult<Vec<String>> {
            let mut keys: Vec<String> = self.traces.lock().unwrap().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }
    }

    #[tokio::test]
    async fn load_or_create_starts_idle() {
        let tracer = ExecutionTracer::new(Arc::new(MemTraceStore::new()));
        let trace = tracer.load_or_create("ISS-1", WorkflowType::CodeChange, ExecutionMode::Foreground).await.unwrap();
        assert_eq!(trace.current_state, TraceState::Idle);
    }

    #[tokio::test]
    async fn transition_persists_after_each_call() {
        let tracer = ExecutionTracer::new(Arc::new(MemTraceStore::new()));
        let mut trace = tracer.load_or_create("ISS-1", WorkflowType::CodeChange, ExecutionMode::Foreground).await.unwrap();
        assert!(tracer.transition(&mut trace, TraceState::Loading, None, None).await.unwrap());

        let reloaded = tracer.load("ISS-1").await.unwrap().unwrap();
        assert_eq!(reloaded.current_state, TraceState::Loading);
    }

    #[tokio::test]
    async fn invalid_transition_still_persists_record() {
        let tracer = ExecutionTracer::new(Arc::new(MemTraceStore::new()));
        let mut trace = tracer.load_or_create("ISS-1", WorkflowType::CodeChange, ExecutionMode::Foreground).await.unwrap();
        let allowed = tracer.transition(&mut trace, TraceState::Completed, None, None).await.unwrap();
        assert!(!allowed);

        let reloaded = tracer.load("ISS-1").await.unwrap().unwrap();
        assert_eq!(reloaded.transitions.len(), 1);
        assert!(!reloaded.transitions[0].allowed);
    }
}
