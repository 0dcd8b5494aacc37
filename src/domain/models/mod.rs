//! Domain entities and value objects.

pub mod config;
pub mod mal;
pub mod sprint;
pub mod trace;
pub mod work_log;

pub use config::{Config, DaemonConfig, IpcConfig, TrackerConfig, WorkingHoursConfig};
pub use mal::{
    AdapterInfo, AdapterResult, Capability, HealthStatus, Intent, IntentClassification,
    LatencyClass, MemoryItem, QueryResult, SourceFilter,
};
pub use sprint::{ApprovalStatus, IssuePriority, SprintIssue, SprintState, TimelineEvent};
pub use trace::{
    is_allowed_transition, EndStepArgs, ExecutionMode, ExecutionTrace, StateTransition, StepStatus,
    StepTrace, TraceState, WorkflowType,
};
pub use work_log::{Outcome, WorkLog, WorkLogAction, WorkLogArtifacts, WorkLogEntry, WorkLogStatus};
