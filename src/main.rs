
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::RwLock;
use tracing::{info, warn};

use backplane::adapters::{TrackerAdapter, VectorAdapter, YamlAdapter};
use backplane::cli::output::{create_spinner, IssueTableFormatter, ProgressBarExt};
use backplane::cli::{Cli, Commands, MemoryCommand};
use backplane::domain::models::mal::{AdapterInfo, Capability, LatencyClass, SourceSpec};
use backplane::domain::ports::InferenceClassifier;
use backplane::infrastructure::agent::headless_agent::{CliHeadlessAgent, HeadlessAgentConfig};
use backplane::infrastructure::config::ConfigLoader;
use backplane::infrastructure::inference::http_classifier::HttpInferenceClassifier;
use backplane::infrastructure::ipc::http_server::{IpcContext, IpcServer};
use backplane::infrastructure::logging::{AuditLogger, LoggerImpl};
use backplane::infrastructure::persistence::sprint_state_store::FileSprintStateStore;
use backplane::infrastructure::persistence::trace_store::FileTraceStore;
use backplane::infrastructure::persistence::work_log_store::FileWorkLogStore;
use backplane::infrastructure::tracker::cli_tracker::{CliIssueTracker, CliTrackerConfig};
use backplane::infrastructure::ui_peer::http_peer::HttpUiChatPeer;
use backplane::services::adapter_registry::AdapterRegistry;
use backplane::services::execution_tracer::ExecutionTracer;
use backplane::services::history_tracker::HistoryTracker;
use backplane::services::intent_classifier::IntentClassifier;
use backplane::services::issue_executor::IssueExecutor;
use backplane::services::memory_interface::MemoryInterface;
use backplane::services::query_router::QueryRouter;
use backplane::services::review_checker::ReviewChecker;
use backplane::services::sprint_daemon::SprintDaemon;
use backplane::services::sprint_planner::SprintPlanner;

fn register_builtin_adapters(registry: &AdapterRegistry, vector_pool: sqlx::SqlitePool, tracker: Arc<dyn backplane::domain::ports::IssueTracker>, state_root: std::path::PathBuf) -> Result<()> {
    let yaml_root = state_root.clone();
    registry
        .register(
            AdapterInfo::new("yaml", "Local YAML State")
                .with_capabilities([Capability::Query, Capability::Search, Capability::Store])
                .with_priority(100)
                .with_latency_class(LatencyClass::Fast)
                .with_keywords(["working on", "current", "active issue"]),
            move || Arc::new(YamlAdapter::new(yaml_root.clone())),
        )
        .context("failed to register yaml adapter")?;

    registry
        .register(
            AdapterInfo::new("vector", "Local Semantic Memory")
                .with_capabilities([Capability::Query, Capability::Search, Capability::Store])
                .with_priority(80)
                .with_latency_class(LatencyClass::Fast)
                .with_keywords(["pattern for", "similar to", "example of"]),
            move || Arc::new(VectorAdapter::new(vector_pool.clone())),
        )
        .context("failed to register vector adapter")?;

    registry
        .register(
            AdapterInfo::new("jira", "Issue Tracker")
                .with_capabilities([Capability::Query, Capability::Search])
                .with_priority(50)
                .with_latency_class(LatencyClass::Slow)
                .with_keywords(["issue ", "ticket "]),
            move || Arc::new(TrackerAdapter::new("jira", tracker.clone())),
        )
        .context("failed to register jira adapter")?;

    registry.freeze();
    Ok(())
}

/// Assembles every Sprint Automation Daemon service from one loaded
/// [`Config`](backplane::domain::models::config::Config).
struct Backplane {
    config: Arc<backplane::domain::models::config::Config>,
    memory: Arc<MemoryInterface>,
    daemon: Arc<SprintDaemon>,
    ipc_ctx: IpcContext,
    inference: Option<HttpInferenceClassifier>,
}

async fn assemble(config: backplane::domain::models::config::Config) -> Result<Backplane> {
    let config = Arc::new(config);

    std::fs::create_dir_all(&config.state_root).context("failed to create state root directory")?;
    std::fs::create_dir_all(config.state_root.join("sprint_traces")).ok();
    std::fs::create_dir_all(config.state_root.join("sprint_work")).ok();
    std::fs::create_dir_all(config.state_root.join("classifiers")).ok();

    let vector_db_path = config.state_root.join("vector_memory.sqlite3");
    let vector_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", vector_db_path.display()))
        .await
        .context("failed to open vector memory database")?;
    let vector_adapter_probe = VectorAdapter::new(vector_pool.clone());
    vector_adapter_probe.migrate().await.context("failed to migrate vector memory schema")?;

    let tracker: Arc<dyn backplane::domain::ports::IssueTracker> = Arc::new(CliIssueTracker::new(CliTrackerConfig {
        binary_path: std::env::var("BACKPLANE_TRACKER_CLI").unwrap_or_else(|_| "tracker-cli".to_string()),
        project: config.tracker.project.clone(),
        component: config.tracker.component.clone(),
    }));

    let registry = Arc::new(AdapterRegistry::new());
    register_builtin_adapters(&registry, vector_pool, tracker.clone(), config.state_root.clone())?;

    let classifier = Arc::new(IntentClassifier::new());
    let router = QueryRouter::new(registry.clone(), classifier.clone());
    let memory = Arc::new(MemoryInterface::new(registry.clone(), router));

    let audit_log_path = config.state_root.join("audit.jsonl");
    let audit = AuditLogger::new(&audit_log_path).await.context("failed to open audit log")?;

    let state_store: Arc<dyn backplane::domain::ports::SprintStateStore> = Arc::new(FileSprintStateStore::new(config.sprint_state_path()));
    let trace_store: Arc<dyn backplane::domain::ports::TraceStore> = Arc::new(FileTraceStore::new(config.state_root.join("sprint_traces")));
    let work_log_store: Arc<dyn backplane::domain::ports::WorkLogStore> = Arc::new(FileWorkLogStore::new(config.state_root.join("sprint_work")));

    let ui_peer: Arc<dyn backplane::domain::ports::UiChatPeer> = Arc::new(HttpUiChatPeer::new(
        std::env::var("BACKPLANE_UI_PEER_URL").unwrap_or_else(|_| "http://127.0.0.1:8765".to_string()),
    ));
    let agent: Arc<dyn backplane::domain::ports::HeadlessAgent> = Arc::new(CliHeadlessAgent::new(HeadlessAgentConfig {
        binary_path: std::env::var("BACKPLANE_AGENT_CLI").unwrap_or_else(|_| "claude".to_string()),
        ..HeadlessAgentConfig::default()
    }));

    let planner = Arc::new(SprintPlanner::new(tracker.clone(), config.tracker.local_user.clone()).with_actionable_statuses(config.tracker.actionable_statuses.clone()));
    let tracer = Arc::new(ExecutionTracer::new(trace_store));
    let history = Arc::new(HistoryTracker::new(work_log_store, config.state_root.join("sprint_work")));
    let executor = Arc::new(IssueExecutor::new(
        state_store.clone(),
        tracker.clone(),
        ui_peer.clone(),
        agent.clone(),
        planner.clone(),
        tracer.clone(),
        history.clone(),
        audit.clone(),
    ));
    let review_checker = Arc::new(ReviewChecker::new(state_store.clone(), tracker.clone(), agent.clone(), audit.clone()));

    let daemon = Arc::new(SprintDaemon::new(config.clone(), state_store.clone(), tracker.clone(), planner.clone(), executor.clone(), review_checker.clone()));

    let ipc_ctx = IpcContext {
        daemon: daemon.clone(),
        state_store,
        planner,
        executor,
        tracer,
        history,
        ui_peer,
        config: Arc::new(RwLock::new((*config).clone())),
    };

    let inference = config.inference_endpoint.as_ref().map(|endpoint| HttpInferenceClassifier::new(endpoint.clone(), "intent-classifier", 5));

    Ok(Backplane { config, memory, daemon, ipc_ctx, inference })
}

async fn run_daemon(config: backplane::domain::models::config::Config) -> Result<()> {
    let backplane = assemble(config).await?;
    let ipc_enabled = backplane.config.ipc.enabled;
    let bind_address = backplane.config.ipc.bind_address.clone();
    let daemon = backplane.daemon.clone();

    // The IPC listener's graceful-shutdown future and the daemon's own
    // ctrl-c handling share one shutdown notification so both stop together.
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let ipc_task = if ipc_enabled {
        let server = IpcServer::new(backplane.ipc_ctx.clone(), bind_address.clone());
        let shutdown_wait = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve_until(async move { shutdown_wait.notified().await }).await {
                warn!(error = %e, "ipc listener exited with error");
            }
        }))
    } else {
        None
    };

    let shutdown_signal = daemon.clone();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, requesting daemon shutdown");
            shutdown_signal.request_shutdown();
            ctrl_c_shutdown.notify_waiters();
        }
    });

    info!(bind_address = %bind_address, ipc_enabled, "backplane daemon starting");
    let result = daemon.run().await;
    shutdown.notify_waiters();

    if let Some(task) = ipc_task {
        let _ = task.await;
    }

    result.map_err(|e| anyhow::anyhow!("daemon loop failed: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.logging).context("failed to initialize logging")?;

    match cli.command.unwrap_or(Commands::Run(Default::default())) {
        Commands::Run(_args) => {
            run_daemon(config).await?;
        }
        Commands::Status => {
            let backplane = assemble(config).await?;
            let snapshot = backplane.daemon.get_runtime_snapshot().await;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "is_active": snapshot.is_active,
                "within_working_hours": snapshot.within_working_hours,
                "ticks": snapshot.ticks,
                "issues_processed": snapshot.issues_processed,
                "review_checks_run": snapshot.review_checks_run,
                "last_refresh": snapshot.last_refresh,
                "last_review_check": snapshot.last_review_check,
            }))?);
        }
        Commands::Stop => {
            let backplane = assemble(config).await?;
            backplane.daemon.request_shutdown();
            println!("shutdown requested");
        }
        Commands::List(args) => {
            let backplane = assemble(config).await?;
            let state = backplane
                .ipc_ctx
                .state_store
                .load()
                .await
                .context("failed to load sprint state")?
                .unwrap_or_else(|| backplane::domain::models::sprint::SprintState::new("", ""));
            let issues: Vec<_> = state
                .issues
                .iter()
                .filter(|issue| args.status.as_deref().is_none_or(|s| issue.jira_status.eq_ignore_ascii_case(s)))
                .map(|issue| (issue, backplane.ipc_ctx.planner.is_actionable(issue)))
                .filter(|(_, actionable)| args.actionable.is_none_or(|want_actionable| *actionable == want_actionable))
                .collect();
            println!("{}", IssueTableFormatter::new().format(&issues));
        }
        Commands::Memory(mem_args) => {
            let backplane = assemble(config).await?;
            run_memory_command(&backplane, mem_args.command).await?;
        }
    }

    Ok(())
}

async fn run_memory_command(backplane: &Backplane, command: MemoryCommand) -> Result<()> {
    match command {
        MemoryCommand::Query { text, sources, include_slow } => {
            let sources = (!sources.is_empty()).then(|| sources.into_iter().map(SourceSpec::Name).collect());
            let inference = backplane.inference.as_ref().map(|c| c as &dyn InferenceClassifier);
            let spinner = create_spinner(format!("querying: {text}"));
            let result = backplane.memory.query(&text, sources, include_slow, inference).await;
            if result.errors.is_empty() {
                spinner.finish_success(format!("{} result(s)", result.items.len()));
            } else {
                spinner.finish_error(format!("{} result(s), {} adapter error(s)", result.items.len(), result.errors.len()));
            }
            println!("{}", backplane.memory.format(&result));
        }
        MemoryCommand::Search { text, limit, sources, include_slow } => {
            let sources = (!sources.is_empty()).then(|| sources.into_iter().map(SourceSpec::Name).collect());
            let inference = backplane.inference.as_ref().map(|c| c as &dyn InferenceClassifier);
            let spinner = create_spinner(format!("searching: {text}"));
            let result = backplane.memory.search(&text, sources, limit, include_slow, inference).await;
            if result.errors.is_empty() {
                spinner.finish_success(format!("{} result(s)", result.items.len()));
            } else {
                spinner.finish_error(format!("{} result(s), {} adapter error(s)", result.items.len(), result.errors.len()));
            }
            println!("{}", backplane.memory.format(&result));
        }
        MemoryCommand::Store { key, value, source } => {
            let result = backplane.memory.store(&key, &value, source.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "source": result.source,
                "found": result.found(),
                "error": result.error,
            }))?);
        }
        MemoryCommand::Learn { text, category, context } => {
            let ok = backplane.memory.learn(&text, &category, context.as_deref()).await;
            println!("{}", serde_json::json!({ "success": ok }));
        }
        MemoryCommand::LearnIntent { query, correct_intent, correct_sources } => {
            let path = backplane.config.intent_training_log_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let record = serde_json::json!({
                "query": query,
                "correct_intent": correct_intent,
                "correct_sources": correct_sources,
            });
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{record}")?;
            println!("recorded learning entry");
        }
    }
    Ok(())
}
