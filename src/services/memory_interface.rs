//! Public facade over the memory abstraction layer: composes the classifier, router, executor and merger behind `query`/`search`/`store`/`learn`/`format`.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::mal::{AdapterResult, Capability, HealthStatus, Intent, MemoryItem, QueryResult, SourceSpec};
use crate::domain::ports::InferenceClassifier;
use crate::services::adapter_registry::AdapterRegistry;
use crate::services::parallel_executor::{self, AdapterMethod};
use crate::services::query_router::QueryRouter;
use crate::services::result_merger::{self, MergeStrategy};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const FORMAT_CHAR_BUDGET: usize = 4000;

#[derive(Debug, Clone)]
pub enum MemoryEvent {
    QueryStarted {
        query_id: Uuid,
        query: String,
    },
    QueryCompleted {
        query_id: Uuid,
        adapter_names: Vec<String>,
        result_count: usize,
        latency_ms: f64,
    },
}

pub struct MemoryInterface {
    registry: Arc<AdapterRegistry>,
    router: QueryRouter,
    events: broadcast::Sender<MemoryEvent>,
}

impl MemoryInterface {
    pub fn new(registry: Arc<AdapterRegistry>, router: QueryRouter) -> Self {
        let (events, _) = broadcast::channel(128);
        Self { registry, router, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Never raises: catastrophic failures produce a `QueryResult` with
    /// `errors["query"]=msg`.
    pub async fn query(
        &self,
        question: &str,
        sources: Option<Vec<SourceSpec>>,
        include_slow: bool,
        inference: Option<&dyn InferenceClassifier>,
    ) -> QueryResult {
        let query_id = Uuid::new_v4();
        let _ = self.events.send(MemoryEvent::QueryStarted {
            query_id,
            query: question.to_string(),
        });

        let routing = self.router.route(question, sources, Capability::Query, include_slow, inference).await;
        let adapter_names: Vec<String> = routing.adapters.iter().map(|a| a.info.name.clone()).collect();
        let outcomes = parallel_executor::execute(
            question,
            routing.adapters,
            AdapterMethod::Query,
            parallel_executor::DEFAULT_GLOBAL_DEADLINE,
        )
        .await;
        let result = result_merger::merge(
            question,
            &routing.intent,
            outcomes,
            MergeStrategy::Relevance,
            result_merger::DEFAULT_MAX_ITEMS,
            result_merger::DEFAULT_DEDUP_THRESHOLD,
        );

        let _ = self.events.send(MemoryEvent::QueryCompleted {
            query_id,
            adapter_names,
            result_count: result.items.len(),
            latency_ms: result.latency_ms,
        });

        result
    }

    pub async fn search(
        &self,
        query: &str,
        sources: Option<Vec<SourceSpec>>,
        limit: Option<usize>,
        include_slow: bool,
        inference: Option<&dyn InferenceClassifier>,
    ) -> QueryResult {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let routing = self.router.route(query, sources, Capability::Search, include_slow, inference).await;
        let adapters: Vec<_> = routing
            .adapters
            .into_iter()
            .map(|mut a| {
                a.filter.limit = a.filter.limit.or(Some(limit));
                a
            })
            .collect();
        let outcomes = parallel_executor::execute(query, adapters, AdapterMethod::Search, parallel_executor::DEFAULT_GLOBAL_DEADLINE).await;
        result_merger::merge(
            query,
            &routing.intent,
            outcomes,
            MergeStrategy::Relevance,
            result_merger::DEFAULT_MAX_ITEMS,
            result_merger::DEFAULT_DEDUP_THRESHOLD,
        )
    }

    pub async fn store(&self, key: &str, value: &str, source: Option<&str>) -> AdapterResult {
        let name = source.unwrap_or("yaml");
        let Some(info) = self.registry.get(name) else {
            return AdapterResult::err(name, "adapter not found");
        };
        if !info.capabilities.contains(&Capability::Store) {
            return AdapterResult::err(name, "store not supported");
        }
        let Some(instance) = self.registry.get_instance(name) else {
            return AdapterResult::err(name, "adapter not found");
        };
        let item = MemoryItem::new(name, "state", 1.0, key, value);
        match instance.store(&item).await {
            Ok(()) => AdapterResult::ok(name, vec![item]),
            Err(err) => AdapterResult::err(name, err.to_string()),
        }
    }

    pub async fn learn(&self, learning: &str, category: &str, context: Option<&str>) -> bool {
        let value = serde_json::json!({
            "learning": learning,
            "category": category,
            "context": context,
        })
        .to_string();
        self.store("learned/patterns", &value, Some("yaml")).await.found()
    }

    /// Markdown intended for an LLM, grouped by source, within a fixed character
    /// budget.
    pub fn format(&self, result: &QueryResult) -> String {
        self.render(result, FORMAT_CHAR_BUDGET)
    }

    pub fn format_compact(&self, result: &QueryResult) -> String {
        self.render(result, FORMAT_CHAR_BUDGET / 4)
    }

    fn render(&self, result: &QueryResult, budget: usize) -> String {
        let mut out = format!("## Intent: {}\n\n", result.intent.as_str());
        let mut by_source: std::collections::BTreeMap<&str, Vec<&MemoryItem>> = std::collections::BTreeMap::new();
        for item in &result.items {
            by_source.entry(&item.source).or_default().push(item);
        }
        'sections: for (source, items) in by_source {
            out.push_str(&format!("### {source}\n"));
            for item in items {
                let fence = if item.item_type == "code_snippet" { "```\n" } else { "" };
                let close_fence = if fence.is_empty() { "" } else { "```\n" };
                let line = format!("- {}\n{fence}{}\n{close_fence}", item.summary, item.content);
                if out.len() + line.len() > budget {
                    out.push_str("...\n");
                    break 'sections;
                }
                out.push_str(&line);
            }
        }
        out
    }

    pub async fn health_check(&self) -> std::collections::HashMap<String, HealthStatus> {
        let mut out = std::collections::HashMap::new();
        for info in self.registry.list() {
            let status = match self.registry.get_instance(&info.name) {
                Some(instance) => instance.health_check().await.unwrap_or_else(|e| HealthStatus::unhealthy(e.to_string())),
                None => HealthStatus::unhealthy("instance construction failed"),
            };
            out.insert(info.name, status);
        }
        out
    }
}

/// Intent formatting helper retained for callers that only have a bare
/// `Intent`, not a full `QueryResult` (e.g. IPC DTO mapping).
pub fn intent_header(intent: Intent) -> String {
    format!("## Intent: {}", intent.as_str())
}
