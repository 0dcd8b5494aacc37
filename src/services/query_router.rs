//! Combines explicit filters or classifier suggestions with registry capability and health checks to select the adapters a query runs against.

use std::sync::Arc;

use tracing::warn;

use crate::domain::models::mal::{AdapterInfo, Capability, IntentClassification, LatencyClass, SourceFilter, SourceSpec};
use crate::domain::ports::{InferenceClassifier, SourceAdapter};
use crate::services::adapter_registry::AdapterRegistry;
use crate::services::intent_classifier::IntentClassifier;

/// One adapter selected to serve a query, paired with the filter to pass
/// it and its live instance.
pub struct RoutedAdapter {
    pub info: AdapterInfo,
    pub filter: SourceFilter,
    pub instance: Arc<dyn SourceAdapter>,
}

pub struct RoutingResult {
    pub intent: IntentClassification,
    pub adapters: Vec<RoutedAdapter>,
}

pub struct QueryRouter {
    registry: Arc<AdapterRegistry>,
    classifier: Arc<IntentClassifier>,
}

impl QueryRouter {
    pub fn new(registry: Arc<AdapterRegistry>, classifier: Arc<IntentClassifier>) -> Self {
        Self { registry, classifier }
    }

    pub async fn route(
        &self,
        query: &str,
        explicit_sources: Option<Vec<SourceSpec>>,
        capability: Capability,
        include_slow: bool,
        inference: Option<&dyn InferenceClassifier>,
    ) -> RoutingResult {
        let intent = self.classifier.classify(query, &self.registry, inference).await;

        let mut adapters = Vec::new();
        match explicit_sources {
            Some(sources) => {
                for spec in sources {
                    let Some(filter) = SourceFilter::from_spec(spec) else {
                        continue;
                    };
                    self.try_add(&filter.name, filter, capability, true, &mut adapters).await;
                }
            }
            None => {
                let mut names = intent.sources_suggested.clone();
                if names.is_empty() {
                    names = self.registry.list_by_capability(capability).into_iter().map(|i| i.name).collect();
                }
                for name in names {
                    self.try_add(&name, SourceFilter::named(&name), capability, include_slow, &mut adapters).await;
                }
            }
        }

        adapters.sort_by(|a, b| b.info.priority.cmp(&a.info.priority));

        RoutingResult { intent, adapters }
    }

    async fn try_add(&self, name: &str, filter: SourceFilter, capability: Capability, allow_slow: bool, out: &mut Vec<RoutedAdapter>) {
        let Some(info) = self.registry.get(name) else {
            warn!(adapter = name, "unknown source name, dropping");
            return;
        };
        if !info.capabilities.contains(&capability) {
            warn!(adapter = name, ?capability, "adapter lacks required capability, dropping");
            return;
        }
        if !allow_slow && info.latency_class == LatencyClass::Slow {
            warn!(adapter = name, "slow adapter not opted into, dropping");
            return;
        }
        if !self.registry.health_check_cached(name).await {
            warn!(adapter = name, "adapter failed cached health check, dropping");
            return;
        }
        let Some(instance) = self.registry.get_instance(name) else {
            warn!(adapter = name, "adapter instance construction failed, dropping");
            return;
        };
        out.push(RoutedAdapter { info, filter, instance });
    }
}

pub fn default_query_sources(registry: &AdapterRegistry) -> Vec<String> {
    let mut fast: Vec<_> = registry
        .list_fast()
        .into_iter()
        .filter(|i| i.capabilities.contains(&Capability::Query))
        .map(|i| i.name)
        .collect();
    let slow: Vec<_> = registry
        .list_slow()
        .into_iter()
        .filter(|i| i.capabilities.contains(&Capability::Query))
        .map(|i| i.name)
        .collect();
    fast.extend(slow);
    fast
}
