//! Kept as port traits, distinct from `infrastructure::persistence`'s concrete
//! atomic-file implementations, so `services` depends only on the abstraction per this
//! crate's hexagonal layout.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::sprint::SprintState;
use crate::domain::models::trace::ExecutionTrace;
use crate::domain::models::work_log::WorkLog;

#[async_trait]
pub trait SprintStateStore: Send + Sync {
    async fn load(&self) -> DomainResult<Option<SprintState>>;
    async fn save(&self, state: &SprintState) -> DomainResult<()>;
}

#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn load(&self, issue_key: &str) -> DomainResult<Option<ExecutionTrace>>;
    async fn save(&self, trace: &ExecutionTrace) -> DomainResult<()>;
    async fn list(&self) -> DomainResult<Vec<String>>;
}

#[async_trait]
pub trait WorkLogStore: Send + Sync {
    async fn load(&self, issue_key: &str) -> DomainResult<Option<WorkLog>>;
    async fn save(&self, log: &WorkLog) -> DomainResult<()>;
}
