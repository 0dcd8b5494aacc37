//! Fans an adapter call out to every selected adapter concurrently under one wall-clock deadline.

use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::domain::models::mal::{AdapterResult, SourceFilter};
use crate::services::query_router::RoutedAdapter;

pub const DEFAULT_GLOBAL_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AdapterMethod {
    Query,
    Search,
    Store,
}

/// Invoke `method` on every adapter in `adapters` concurrently, enforcing both a global
/// deadline across the whole batch and (implicitly, via the adapter's own
/// implementation) per-call timing.
pub async fn execute(
    query: &str,
    adapters: Vec<RoutedAdapter>,
    method: AdapterMethod,
    global_deadline: Duration,
) -> Vec<(String, AdapterResult)> {
    let query = query.to_string();
    let futures = adapters.into_iter().map(|routed| {
        let query = query.clone();
        async move {
            let name = routed.info.name.clone();
            let started = Instant::now();
            let call = invoke(&routed.instance, method, &query, &routed.filter);
            match tokio::time::timeout(global_deadline, call).await {
                Ok(Ok(mut result)) => {
                    if result.latency_ms == 0.0 {
                        result.latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    }
                    (name, result)
                }
                Ok(Err(err)) => (name.clone(), AdapterResult::err(name, err.to_string())),
                Err(_) => (name.clone(), AdapterResult::err(name, "adapter deadline exceeded")),
            }
        }
    });
    join_all(futures).await
}

async fn invoke(
    instance: &std::sync::Arc<dyn crate::domain::ports::SourceAdapter>,
    method: AdapterMethod,
    query: &str,
    filter: &SourceFilter,
) -> crate::domain::errors::DomainResult<AdapterResult> {
    match method {
        AdapterMethod::Query => instance.query(query, filter).await,
        AdapterMethod::Search => instance.search(query, filter).await,
        AdapterMethod::Store => {
            let item = crate::domain::models::mal::MemoryItem::new(instance.name(), "store_request", 1.0, query, query);
            instance.store(&item).await.map(|_| AdapterResult::ok(instance.name(), vec![]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::mal::{AdapterInfo, Capability, HealthStatus, MemoryItem};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct SlowAdapter {
        name: String,
        delay: Duration,
    }

    #[async_trait]
    impl crate::domain::ports::SourceAdapter for SlowAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn query(&self, _query: &str, _filter: &SourceFilter) -> DomainResult<AdapterResult> {
            tokio::time::sleep(self.delay).await;
            Ok(AdapterResult::ok(&self.name, vec![MemoryItem::new(&self.name, "state", 1.0, "s", "c")]))
        }

        async fn search(&self, q: &str, f: &SourceFilter) -> DomainResult<AdapterResult> {
            self.query(q, f).await
        }

        async fn store(&self, _item: &MemoryItem) -> DomainResult<()> {
            Ok(())
        }

        async fn health_check(&self) -> DomainResult<HealthStatus> {
            Ok(HealthStatus::healthy())
        }
    }

    fn routed(name: &str, delay: Duration) -> RoutedAdapter {
        RoutedAdapter {
            info: AdapterInfo::new(name, name).with_capability(Capability::Query),
            filter: SourceFilter::named(name),
            instance: Arc::new(SlowAdapter { name: name.to_string(), delay }),
        }
    }

    #[tokio::test]
    async fn fast_adapter_succeeds_within_deadline() {
        let results = execute("q", vec![routed("yaml", Duration::from_millis(1))], AdapterMethod::Query, Duration::from_millis(200)).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.found());
    }

    #[tokio::test]
    async fn slow_adapter_yields_timeout_result_not_panic() {
        let results = execute("q", vec![routed("slow", Duration::from_millis(200))], AdapterMethod::Query, Duration::from_millis(20)).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].1.found());
        assert!(results[0].1.error.as_deref().unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let adapters = vec![routed("a", Duration::from_millis(5)), routed("b", Duration::from_millis(1))];
        let results = execute("q", adapters, AdapterMethod::Query, Duration::from_millis(200)).await;
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
    }
}
