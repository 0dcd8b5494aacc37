//! Subprocess invocation of the headless coding agent with a wall-clock deadline and process-group kill on timeout.

use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::headless_agent::{AgentInvocation, AgentOutcome, HeadlessAgent};

/// Configuration for the concrete headless-agent binary invocation.
#[derive(Debug, Clone)]
pub struct HeadlessAgentConfig {
    /// Path to the agent binary (e.g. a `claude`-like CLI).
    pub binary_path: String,
    /// Extra flags prepended before the prompt argument.
    pub extra_flags: Vec<String>,
    /// Working directory the agent is invoked from.
    pub working_dir: std::path::PathBuf,
}

impl Default for HeadlessAgentConfig {
    fn default() -> Self {
        Self {
            binary_path: "claude".to_string(),
            extra_flags: vec!["--print".to_string()],
            working_dir: std::path::PathBuf::from("."),
        }
    }
}

/// Subprocess-backed [`HeadlessAgent`].
pub struct CliHeadlessAgent {
    config: HeadlessAgentConfig,
}

impl CliHeadlessAgent {
    pub fn new(config: HeadlessAgentConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.args(&self.config.extra_flags)
            .arg("-p")
            .arg(prompt)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl HeadlessAgent for CliHeadlessAgent {
    async fn run(&self, invocation: AgentInvocation) -> DomainResult<AgentOutcome> {
        let mut child = self
            .build_command(&invocation.prompt)
            .spawn()
            .map_err(|e| DomainError::ExternalTool(format!("failed to spawn headless agent: {e}")))?;

        let pid = child.id();
        let mut stdout = child.stdout.take().ok_or_else(|| DomainError::ExternalTool("failed to capture agent stdout".to_string()))?;
        let mut stderr = child.stderr.take().ok_or_else(|| DomainError::ExternalTool("failed to capture agent stderr".to_string()))?;

        let run_to_completion = async {
            let mut out = String::new();
            let mut err = String::new();
            let (out_res, err_res, status) =
                tokio::join!(stdout.read_to_string(&mut out), stderr.read_to_string(&mut err), child.wait());
            out_res.map_err(|e| DomainError::ExternalTool(format!("reading agent stdout: {e}")))?;
            err_res.map_err(|e| DomainError::ExternalTool(format!("reading agent stderr: {e}")))?;
            let status = status.map_err(|e| DomainError::ExternalTool(format!("waiting on agent process: {e}")))?;
            Ok::<_, DomainError>((out, err, status.code().unwrap_or(-1)))
        };

        match tokio::time::timeout(invocation.deadline, run_to_completion).await {
            Ok(Ok((stdout, stderr, exit_code))) => {
                debug!(exit_code, "headless agent exited");
                Ok(AgentOutcome::Finished { exit_code, stdout, stderr })
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(?pid, deadline = ?invocation.deadline, "headless agent exceeded deadline, killing");
                let partial_stdout = drain_best_effort(&mut stdout).await;
                if let Some(pid) = pid {
                    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                        warn!(error = %e, pid, "failed to kill timed-out headless agent");
                    }
                }
                Ok(AgentOutcome::TimedOut { partial_stdout })
            }
        }
    }
}

async fn drain_best_effort(stdout: &mut tokio::process::ChildStdout) -> String {
    let mut buf = String::new();
    let _ = tokio::time::timeout(std::time::Duration::from_millis(200), stdout.read_to_string(&mut buf)).await;
    buf
}
