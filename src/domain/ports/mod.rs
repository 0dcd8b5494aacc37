//! Port traits the services depend on and the infrastructure layer implements.

pub mod adapter;
pub mod headless_agent;
pub mod inference;
pub mod issue_tracker;
pub mod persistence;
pub mod ui_chat_peer;

pub use adapter::SourceAdapter;
pub use headless_agent::{AgentInvocation, AgentOutcome, HeadlessAgent};
pub use inference::InferenceClassifier;
pub use issue_tracker::{IssueTracker, SprintMetadata};
pub use persistence::{SprintStateStore, TraceStore, WorkLogStore};
pub use ui_chat_peer::{LaunchChatResult, UiChatPeer};
