//! The contract every memory source adapter implements.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::mal::{AdapterResult, HealthStatus, SourceFilter};

/// A registered source of memory. Every adapter declares, via
/// `AdapterInfo::capabilities`, which of `query`/`search`/`store` it
/// supports; callers must only invoke the methods it claims.
///
/// Implementors must be safe to call concurrently: the parallel executor
/// fans calls across adapters out into separate tasks against the same
/// event loop.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable registry name, e.g. `"yaml"`, `"vector"`, `"jira"`.
    fn name(&self) -> &str;

    async fn query(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult>;

    async fn search(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult>;

    async fn store(&self, item: &crate::domain::models::mal::MemoryItem) -> DomainResult<()>;

    async fn health_check(&self) -> DomainResult<HealthStatus>;
}
