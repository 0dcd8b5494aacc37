//! Loopback HTTP+JSON control surface exposing daemon operations to an external UI peer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::Config;
use crate::domain::models::sprint::{ApprovalStatus, SprintState, TimelineEvent};
use crate::domain::models::work_log::WorkLog;
use crate::domain::ports::persistence::SprintStateStore;
use crate::domain::ports::UiChatPeer;
use crate::infrastructure::config::ConfigLoader;
use crate::services::execution_tracer::ExecutionTracer;
use crate::services::history_tracker::HistoryTracker;
use crate::services::issue_executor::{IssueExecutor, ProcessOutcome};
use crate::services::sprint_daemon::SprintDaemon;
use crate::services::sprint_planner::SprintPlanner;

/// Shared state behind every IPC route.
#[derive(Clone)]
pub struct IpcContext {
    pub daemon: Arc<SprintDaemon>,
    pub state_store: Arc<dyn SprintStateStore>,
    pub planner: Arc<SprintPlanner>,
    pub executor: Arc<IssueExecutor>,
    pub tracer: Arc<ExecutionTracer>,
    pub history: Arc<HistoryTracker>,
    pub ui_peer: Arc<dyn UiChatPeer>,
    pub config: Arc<RwLock<Config>>,
}

#[derive(Debug, Deserialize)]
struct IpcRequest {
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct IpcResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IpcResponse {
    fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

impl IntoResponse for IpcResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

fn require_str<'a>(params: &'a Value, key: &str) -> DomainResult<&'a str> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| DomainError::Ipc(format!("missing or non-string parameter: {key}")))
}

async fn load_state(ctx: &IpcContext) -> DomainResult<SprintState> {
    ctx.state_store.load().await?.ok_or_else(|| DomainError::Persistence("sprint state not initialized".to_string()))
}

async fn list_issues(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let status_filter = params.get("status").and_then(Value::as_str).map(str::to_lowercase);
    let actionable_filter = params.get("actionable").and_then(Value::as_bool);
    let state = load_state(ctx).await?;

    let mut by_classification: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut issues = Vec::new();
    for issue in &state.issues {
        let is_actionable = ctx.planner.is_actionable(issue);
        if let Some(ref want) = status_filter {
            if issue.jira_status.to_lowercase() != *want {
                continue;
            }
        }
        if let Some(want_actionable) = actionable_filter {
            if is_actionable != want_actionable {
                continue;
            }
        }
        *by_classification.entry(format!("{:?}", issue.approval_status)).or_insert(0) += 1;
        issues.push(json!({
            "key": issue.key,
            "title": issue.title,
            "jira_status": issue.jira_status,
            "priority": issue.priority,
            "approval_status": issue.approval_status,
            "is_actionable": is_actionable,
            "waiting_reason": issue.waiting_reason,
            "chat_id": issue.chat_id,
        }));
    }

    Ok(json!({
        "total": issues.len(),
        "by_classification": by_classification,
        "issues": issues,
    }))
}

async fn approve_issue(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    let mut state = load_state(ctx).await?;
    let actionable = {
        let issue = state.find_issue(&key).ok_or_else(|| DomainError::IssueNotFound(key.clone()))?;
        ctx.planner.is_actionable(issue)
    };
    if !actionable {
        return Err(DomainError::NotActionable(key));
    }
    let issue = state.find_issue_mut(&key).expect("checked above");
    issue.approval_status = ApprovalStatus::Approved;
    issue.push_timeline(TimelineEvent::new("approved"));
    ctx.state_store.save(&state).await?;
    Ok(json!({ "issue_key": key }))
}

async fn reject_issue(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    let mut state = load_state(ctx).await?;
    let issue = state.find_issue_mut(&key).ok_or_else(|| DomainError::IssueNotFound(key.clone()))?;
    issue.approval_status = ApprovalStatus::Pending;
    issue.push_timeline(TimelineEvent::new("rejected"));
    ctx.state_store.save(&state).await?;
    Ok(json!({ "issue_key": key }))
}

async fn abort_issue(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    ctx.executor.abort_issue(&key).await?;
    Ok(json!({ "issue_key": key }))
}

async fn skip_issue(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    let reason = params.get("reason").and_then(Value::as_str).unwrap_or("skipped via IPC").to_string();
    let mut state = load_state(ctx).await?;
    let issue = state.find_issue_mut(&key).ok_or_else(|| DomainError::IssueNotFound(key.clone()))?;
    issue.approval_status = ApprovalStatus::Blocked;
    issue.waiting_reason = Some(reason.clone());
    issue.push_timeline(TimelineEvent::new("blocked").with_detail(reason));
    ctx.state_store.save(&state).await?;
    Ok(json!({ "issue_key": key }))
}

async fn approve_all(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    let mut approved = 0usize;
    let mut auto_completed = 0usize;
    for issue in state.issues.iter_mut() {
        if issue.approval_status != ApprovalStatus::Pending {
            continue;
        }
        if ctx.planner.is_actionable(issue) {
            issue.approval_status = ApprovalStatus::Approved;
            issue.push_timeline(TimelineEvent::new("approved").with_detail("bulk approve_all"));
            approved += 1;
        } else {
            issue.approval_status = ApprovalStatus::Completed;
            issue.push_timeline(TimelineEvent::new("auto_completed").with_detail("not actionable during bulk approve_all"));
            auto_completed += 1;
        }
    }
    ctx.state_store.save(&state).await?;
    Ok(json!({ "approved": approved, "auto_completed": auto_completed }))
}

async fn reject_all(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    let mut rejected = 0usize;
    for issue in state.issues.iter_mut() {
        if issue.approval_status == ApprovalStatus::Approved {
            issue.approval_status = ApprovalStatus::Pending;
            issue.push_timeline(TimelineEvent::new("rejected").with_detail("bulk reject_all"));
            rejected += 1;
        }
    }
    ctx.state_store.save(&state).await?;
    Ok(json!({ "rejected": rejected }))
}

async fn refresh(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    ctx.daemon.refresh_now().await?;
    Ok(json!({}))
}

async fn enable(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    state.automatic_mode = true;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "automatic_mode": true }))
}

async fn disable(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    state.automatic_mode = false;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "automatic_mode": false }))
}

async fn start(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    state.manually_started = true;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "manually_started": true }))
}

async fn stop(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    state.manually_started = false;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "manually_started": false }))
}

async fn toggle_background(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let mut state = load_state(ctx).await?;
    let new_value = params.get("enabled").and_then(Value::as_bool).unwrap_or(!state.background_tasks);
    state.background_tasks = new_value;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "background_tasks": new_value }))
}

async fn get_config(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    Ok(serde_json::to_value(&*ctx.config.read().await)?)
}

/// Shallow-recursive merge of `patch` into `base` (objects merge key by
/// key, everything else is replaced outright).
fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                merge_json(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

async fn set_config(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let mut current = serde_json::to_value(&*ctx.config.read().await)?;
    merge_json(&mut current, &params);
    let updated: Config = serde_json::from_value(current)?;
    ConfigLoader::validate(&updated).map_err(|e| DomainError::Validation(e.to_string()))?;
    let value = serde_json::to_value(&updated)?;
    *ctx.config.write().await = updated;
    Ok(value)
}

async fn get_state(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let state = load_state(ctx).await?;
    let runtime = ctx.daemon.get_runtime_snapshot().await;
    let mut value = serde_json::to_value(&state)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "runtime".to_string(),
            json!({
                "is_active": runtime.is_active,
                "within_working_hours": runtime.within_working_hours,
                "ticks": runtime.ticks,
                "issues_processed": runtime.issues_processed,
                "review_checks_run": runtime.review_checks_run,
                "last_refresh": runtime.last_refresh,
                "last_review_check": runtime.last_review_check,
            }),
        );
    }
    Ok(value)
}

async fn get_history(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let keys = ctx.tracer.list().await?;
    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(trace) = ctx.tracer.load(&key).await? {
            entries.push(json!({
                "issue_key": trace.issue_key,
                "workflow_type": trace.workflow_type,
                "mode": trace.mode,
                "current_state": trace.current_state,
                "started_at": trace.started_at,
                "completed_at": trace.completed_at,
                "step_count": trace.steps.len(),
                "transition_count": trace.transitions.len(),
            }));
        }
    }
    Ok(json!({ "entries": entries }))
}

async fn get_trace(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?;
    let trace = ctx.tracer.load(key).await?.ok_or_else(|| DomainError::IssueNotFound(key.to_string()))?;
    Ok(serde_json::to_value(&trace)?)
}

async fn list_traces(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let keys = ctx.tracer.list().await?;
    Ok(json!({ "issue_keys": keys }))
}

async fn get_work_log(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?;
    let log = ctx.history.load(key).await?.ok_or_else(|| DomainError::IssueNotFound(key.to_string()))?;
    Ok(serde_json::to_value(&log)?)
}

async fn open_in_cursor(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    let log = ctx.history.load(&key).await?.unwrap_or_else(|| WorkLog::new(&key));
    let prompt = ctx.history.build_continuation_prompt(&key, &log);
    let state = load_state(ctx).await?;
    let summary = state.find_issue(&key).map(|i| i.title.clone()).unwrap_or_default();
    let result = ctx.ui_peer.launch_issue_chat(&key, &summary, &prompt, true).await?;
    Ok(json!({ "launched": result.success, "chat_id": result.chat_id }))
}

async fn start_issue(ctx: &IpcContext, params: Value) -> DomainResult<Value> {
    let key = require_str(&params, "issue_key")?.to_string();
    let background = params.get("background").and_then(Value::as_bool);
    let outcome = ctx.executor.start_issue(&key, background, None).await?;
    Ok(process_outcome_json(&outcome))
}

async fn process_next(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let outcome = ctx.daemon.process_next_issue().await?;
    Ok(process_outcome_json(&outcome))
}

async fn write_state(ctx: &IpcContext, _params: Value) -> DomainResult<Value> {
    let state = load_state(ctx).await?;
    ctx.state_store.save(&state).await?;
    Ok(json!({ "last_updated": state.last_updated }))
}

fn process_outcome_json(outcome: &ProcessOutcome) -> Value {
    match outcome {
        ProcessOutcome::Idle => json!({ "status": "idle" }),
        ProcessOutcome::Waiting { issue_key } => json!({ "status": "waiting", "issue_key": issue_key }),
        ProcessOutcome::Processed { issue_key, outcome } => json!({
            "status": "processed",
            "issue_key": issue_key,
            "outcome": format!("{outcome:?}"),
        }),
    }
}

async fn dispatch(ctx: &IpcContext, method: &str, params: Value) -> DomainResult<Value> {
    match method {
        "list_issues" => list_issues(ctx, params).await,
        "approve_issue" => approve_issue(ctx, params).await,
        "reject_issue" => reject_issue(ctx, params).await,
        "abort_issue" => abort_issue(ctx, params).await,
        "skip_issue" => skip_issue(ctx, params).await,
        "approve_all" => approve_all(ctx, params).await,
        "reject_all" => reject_all(ctx, params).await,
        "refresh" => refresh(ctx, params).await,
        "enable" => enable(ctx, params).await,
        "disable" => disable(ctx, params).await,
        "start" => start(ctx, params).await,
        "stop" => stop(ctx, params).await,
        "toggle_background" => toggle_background(ctx, params).await,
        "get_config" => get_config(ctx, params).await,
        "set_config" => set_config(ctx, params).await,
        "get_state" => get_state(ctx, params).await,
        "get_history" => get_history(ctx, params).await,
        "get_trace" => get_trace(ctx, params).await,
        "list_traces" => list_traces(ctx, params).await,
        "get_work_log" => get_work_log(ctx, params).await,
        "open_in_cursor" => open_in_cursor(ctx, params).await,
        "start_issue" => start_issue(ctx, params).await,
        "process_next" => process_next(ctx, params).await,
        "write_state" => write_state(ctx, params).await,
        other => Err(DomainError::Ipc(format!("unknown method: {other}"))),
    }
}

async fn handle_request(State(ctx): State<IpcContext>, Json(request): Json<IpcRequest>) -> IpcResponse {
    debug!(method = %request.method, "ipc request");
    match dispatch(&ctx, &request.method, request.params).await {
        Ok(data) => IpcResponse::ok(data),
        Err(e) => {
            warn!(method = %request.method, error = %e, "ipc request failed");
            IpcResponse::err(e.to_string())
        }
    }
}

/// Owns the bound listener task for the lifetime it's `run`.
pub struct IpcServer {
    router: Router,
    bind_address: String,
}

impl IpcServer {
    pub fn new(ctx: IpcContext, bind_address: impl Into<String>) -> Self {
        let router = Router::new().route("/ipc", post(handle_request)).with_state(ctx);
        Self { router, bind_address: bind_address.into() }
    }

    pub async fn serve_until(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        tracing::info!(bind_address = %self.bind_address, "ipc listener bound");
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await
    }
}
