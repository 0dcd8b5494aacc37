//! Contract for invoking the out-of-process headless coding agent.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;

/// One invocation request.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub prompt: String,
    pub deadline: Duration,
}

impl AgentInvocation {
    pub fn new(prompt: impl Into<String>, deadline: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            deadline,
        }
    }
}

/// Raw result of running the agent to completion, or a timeout.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    /// The process exited; stdout/stderr are captured for marker parsing.
    Finished {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The wall-clock deadline elapsed; the process was killed.
    TimedOut { partial_stdout: String },
}

#[async_trait]
pub trait HeadlessAgent: Send + Sync {
    async fn run(&self, invocation: AgentInvocation) -> DomainResult<AgentOutcome>;
}
