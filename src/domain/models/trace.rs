//! Unlike the simpler per-variant state enums elsewhere in this crate, [`TraceState`]
//! transitions are validated against an explicit table (see [`is_allowed_transition`])
//! because an *invalid* transition must still be recorded, not merely rejected — an
//! algebraic enum with no escape hatch cannot represent "this happened, and it was
//! illegal."

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Foreground,
    Background,
}

/// Which workflow shape is driving the issue; shapes both the state-machine
/// path taken and the generated work prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    CodeChange,
    Spike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceState {
    Idle,
    Loading,
    Analyzing,
    Classifying,
    CheckingActionable,
    TransitioningJira,
    StartingWork,
    Researching,
    BuildingPrompt,
    LaunchingChat,
    Implementing,
    Documenting,
    CreatingMr,
    AwaitingReview,
    Merging,
    Closing,
    Blocked,
    Completed,
    Failed,
}

impl TraceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

const ALLOWED_TRANSITIONS: &[(TraceState, TraceState)] = {
    use TraceState::*;
    &[
        (Idle, Loading),
        (Loading, Analyzing),
        (Loading, Failed),
        (Analyzing, Classifying),
        (Analyzing, Blocked),
        (Analyzing, Failed),
        (Classifying, CheckingActionable),
        (Classifying, Failed),
        (CheckingActionable, TransitioningJira),
        (CheckingActionable, Blocked),
        (CheckingActionable, Failed),
        (TransitioningJira, StartingWork),
        (TransitioningJira, Researching),
        (TransitioningJira, Failed),
        (StartingWork, BuildingPrompt),
        (StartingWork, Blocked),
        (StartingWork, Failed),
        (Researching, Documenting),
        (Researching, BuildingPrompt),
        (Researching, Blocked),
        (Researching, Failed),
        (BuildingPrompt, LaunchingChat),
        (BuildingPrompt, Implementing),
        (BuildingPrompt, Failed),
        (LaunchingChat, Implementing),
        (LaunchingChat, Failed),
        (Implementing, CreatingMr),
        (Implementing, Blocked),
        (Implementing, Completed),
        (Implementing, Failed),
        (Documenting, Closing),
        (Documenting, Blocked),
        (Documenting, Failed),
        (CreatingMr, AwaitingReview),
        (CreatingMr, Blocked),
        (CreatingMr, Failed),
        (AwaitingReview, Merging),
        (AwaitingReview, Blocked),
        (AwaitingReview, Implementing),
        (Merging, Closing),
        (Merging, Failed),
        (Closing, Completed),
        (Closing, Failed),
        (Blocked, Analyzing),
        (Blocked, Implementing),
        (Blocked, Completed),
        (Failed, Idle),
    ]
};

/// Look up whether `from -> to` is a legal edge in the state diagram.
pub fn is_allowed_transition(from: TraceState, to: TraceState) -> bool {
    ALLOWED_TRANSITIONS.contains(&(from, to))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub from: TraceState,
    pub to: TraceState,
    pub allowed: bool,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl StateTransition {
    pub fn record(from: TraceState, to: TraceState, trigger: Option<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            from,
            to,
            allowed: is_allowed_transition(from, to),
            trigger,
            data,
        }
    }
}

/// `status ∈ {pending, running, success, failed, skipped}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    #[serde(rename = "success")]
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTrace {
    pub step_id: String,
    pub name: String,
    #[serde(default)]
    pub skill_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub inputs: Option<serde_json::Value>,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl StepTrace {
    pub fn start(step_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            skill_name: None,
            tool_name: None,
            inputs: None,
            status: StepStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            outputs: None,
            decision: None,
            reason: None,
            error: None,
            chat_id: None,
        }
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_skill(mut self, skill_name: impl Into<String>) -> Self {
        self.skill_name = Some(skill_name.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    /// Duration from `started_at` to `ended_at`, if finalized.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndStepArgs {
    pub outputs: Option<serde_json::Value>,
    pub decision: Option<String>,
    pub reason: Option<String>,
    pub error: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub issue_key: String,
    pub workflow_type: WorkflowType,
    pub mode: ExecutionMode,
    pub current_state: TraceState,
    pub transitions: Vec<StateTransition>,
    pub steps: Vec<StepTrace>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    next_step_seq: u64,
}

impl ExecutionTrace {
    pub fn new(issue_key: impl Into<String>, workflow_type: WorkflowType, mode: ExecutionMode) -> Self {
        Self {
            issue_key: issue_key.into(),
            workflow_type,
            mode,
            current_state: TraceState::Idle,
            transitions: Vec::new(),
            steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            next_step_seq: 0,
        }
    }

    /// Attempt a transition. Always records the attempt (legal or not);
    /// `current_state` only advances if the edge is in
    /// [`ALLOWED_TRANSITIONS`]. Stamps `completed_at` on entering a
    /// terminal state. Returns whether the transition was legal.
    pub fn transition(&mut self, to: TraceState, trigger: Option<String>, data: Option<serde_json::Value>) -> bool {
        let record = StateTransition::record(self.current_state, to, trigger, data);
        let allowed = record.allowed;
        self.transitions.push(record);
        if allowed {
            self.current_state = to;
            if to.is_terminal() {
                self.completed_at = Some(Utc::now());
            } else {
                self.completed_at = None;
            }
        }
        allowed
    }

    pub fn start_step(&mut self, name: impl Into<String>) -> String {
        self.next_step_seq += 1;
        let step_id = format!("{}-step-{}", self.issue_key, self.next_step_seq);
        self.steps.push(StepTrace::start(step_id.clone(), name));
        step_id
    }

    pub fn end_step(&mut self, step_id: Option<&str>, status: StepStatus, args: EndStepArgs) {
        let step = match step_id {
            Some(id) => self.steps.iter_mut().find(|s| s.step_id == id),
            None => self.steps.iter_mut().rev().find(|s| s.status == StepStatus::Running),
        };
        if let Some(step) = step {
            step.status = status;
            step.ended_at = Some(Utc::now());
            step.outputs = args.outputs;
            step.decision = args.decision;
            step.reason = args.reason;
            step.error = args.error;
            step.chat_id = args.chat_id;
        }
    }

    pub fn log_step(&mut self, name: impl Into<String>, status: StepStatus, args: EndStepArgs) {
        let id = self.start_step(name);
        self.end_step(Some(&id), status, args);
    }

    pub fn mark_blocked(&mut self, reason: impl Into<String>, waiting_for: Option<String>) -> bool {
        let reason = reason.into();
        self.log_step(
            "blocked",
            StepStatus::Failed,
            EndStepArgs {
                reason: Some(reason.clone()),
                outputs: waiting_for.map(|w| serde_json::json!({ "waiting_for": w })),
                ..Default::default()
            },
        );
        self.transition(TraceState::Blocked, Some("mark_blocked".to_string()), Some(serde_json::json!({ "reason": reason })))
    }

    pub fn mark_completed(&mut self, summary: Option<String>) -> bool {
        self.transition(
            TraceState::Completed,
            Some("mark_completed".to_string()),
            summary.map(|s| serde_json::json!({ "summary": s })),
        )
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        let error = error.into();
        self.transition(TraceState::Failed, Some("mark_failed".to_string()), Some(serde_json::json!({ "error": error })))
    }

    pub fn render_state_diagram(&self) -> String {
        let mut out = format!("{} [{:?}]\n", self.issue_key, self.current_state);
        for t in &self.transitions {
            let marker = if t.allowed { "->" } else { "-x>" };
            out.push_str(&format!("  {:?} {marker} {:?}\n", t.from, t.to));
        }
        out
    }

    pub fn render_step_timeline(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let dur = step
                .duration()
                .map(|d| format!("{}ms", d.num_milliseconds()))
                .unwrap_or_else(|| "running".to_string());
            out.push_str(&format!("- {} [{:?}] {dur}\n", step.name, step.status));
        }
        out
    }
}
