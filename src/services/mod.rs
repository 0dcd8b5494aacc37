//! Business logic implementing the domain's port traits.

pub mod adapter_registry;
pub mod execution_tracer;
pub mod history_tracker;
pub mod intent_classifier;
pub mod issue_executor;
pub mod memory_interface;
pub mod parallel_executor;
pub mod prioritizer;
pub mod query_router;
pub mod result_merger;
pub mod review_checker;
pub mod sprint_daemon;
pub mod sprint_planner;

pub use adapter_registry::AdapterRegistry;
pub use intent_classifier::IntentClassifier;
pub use issue_executor::IssueExecutor;
pub use memory_interface::MemoryInterface;
pub use query_router::QueryRouter;
pub use review_checker::ReviewChecker;
pub use sprint_daemon::SprintDaemon;
