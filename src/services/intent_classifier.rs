//! Maps a free-text query to an intent and suggested adapters via ordered keyword/regex scoring, with an optional external-model path tried first.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use crate::domain::models::mal::{Capability, Intent, IntentClassification};
use crate::domain::ports::InferenceClassifier;
use crate::services::adapter_registry::AdapterRegistry;

pub const CONFIDENCE_WIN_THRESHOLD: f32 = 0.7;

const ENDPOINT_HEALTH_TTL: Duration = Duration::from_secs(30);

pub struct IntentPattern {
    pub intent: Intent,
    pub patterns: Vec<Regex>,
    pub suggested_sources: Vec<String>,
    pub weight: f32,
}

impl IntentPattern {
    fn new(intent: Intent, patterns: &[&str], suggested_sources: &[&str], weight: f32) -> Self {
        Self {
            intent,
            patterns: patterns.iter().map(|p| Regex::new(p).expect("static pattern is valid regex")).collect(),
            suggested_sources: suggested_sources.iter().map(|s| s.to_string()).collect(),
            weight,
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(query_lower))
    }
}

/// Declaration order breaks ties between equal-scoring intents.
fn default_patterns() -> Vec<IntentPattern> {
    vec![
        IntentPattern::new(Intent::StatusCheck, &["what am i working on", "current (status|work)", "in progress"], &["yaml"], 1.0),
        IntentPattern::new(Intent::CodeLookup, &["how (does|do) .* work", "where is .* (defined|implemented)", "find (the )?function"], &["vector"], 1.0),
        IntentPattern::new(Intent::Troubleshooting, &["error", "exception", "stack ?trace", "why (is|does) .* fail"], &["vector", "yaml"], 1.0),
        IntentPattern::new(Intent::Documentation, &["how do i", "docs? for", "documentation"], &["vector"], 1.0),
        IntentPattern::new(Intent::History, &["what happened", "history of", "previously"], &["yaml"], 0.8),
        IntentPattern::new(Intent::PatternLookup, &["pattern for", "similar to", "example of"], &["vector"], 0.8),
        IntentPattern::new(Intent::IssueContext, &["issue ", "ticket ", "\\b[A-Z]{2,}-\\d+\\b"], &["jira"], 1.0),
        IntentPattern::new(Intent::Gitlab, &["merge request", "\\bmr\\b", "gitlab"], &["gitlab"], 1.0),
        IntentPattern::new(Intent::Github, &["pull request", "\\bpr\\b", "github"], &["github"], 1.0),
        IntentPattern::new(Intent::Calendar, &["meeting", "calendar", "schedule"], &["calendar"], 1.0),
        IntentPattern::new(Intent::Email, &["email", "inbox", "message from"], &["email"], 1.0),
        IntentPattern::new(Intent::Files, &["file named", "find file", "directory"], &["files"], 0.8),
    ]
}

struct EndpointHealth {
    healthy: bool,
    checked_at: Instant,
}

pub struct IntentClassifier {
    patterns: Vec<IntentPattern>,
    endpoint_health: Mutex<Option<EndpointHealth>>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            patterns: default_patterns(),
            endpoint_health: Mutex::new(None),
        }
    }

    pub fn with_patterns(patterns: Vec<IntentPattern>) -> Self {
        Self {
            patterns,
            endpoint_health: Mutex::new(None),
        }
    }

    /// Tries the external inference endpoint first when available and healthy;
    /// falls back to keyword/regex scoring when it is absent, unhealthy, or
    /// returns confidence below 0.7.
    pub async fn classify(
        &self,
        query: &str,
        registry: &AdapterRegistry,
        inference: Option<&dyn InferenceClassifier>,
    ) -> IntentClassification {
        if let Some(inference) = inference {
            if self.endpoint_known_available() {
                match inference.classify(query).await {
                    Ok(mut result) if result.confidence >= CONFIDENCE_WIN_THRESHOLD => {
                        self.mark_endpoint_healthy(true);
                        result.dedup_sources();
                        return self.finalize_sources(result, registry);
                    }
                    Ok(_) => debug!("external classifier confidence below threshold, falling through"),
                    Err(err) => {
                        debug!(error = %err, "external classifier call failed, falling through");
                        self.mark_endpoint_healthy(false);
                    }
                }
            }
        }
        self.finalize_sources(self.classify_keyword(query), registry)
    }

    pub fn classify_keyword(&self, query: &str) -> IntentClassification {
        let lowered = query.to_lowercase();
        let mut best: Option<(&IntentPattern, f32)> = None;
        let mut scores: std::collections::HashMap<Intent, (f32, usize)> = std::collections::HashMap::new();

        for (idx, pattern) in self.patterns.iter().enumerate() {
            if pattern.matches(&lowered) {
                let entry = scores.entry(pattern.intent).or_insert((0.0, idx));
                entry.0 += pattern.weight;
            }
        }

        for pattern in &self.patterns {
            if let Some((score, _)) = scores.get(&pattern.intent) {
                let is_better = match best {
                    None => true,
                    Some((_, best_score)) => *score > best_score,
                };
                if is_better {
                    best = Some((pattern, *score));
                }
            }
        }

        match best {
            Some((pattern, score)) => IntentClassification {
                intent: pattern.intent,
                confidence: (0.5 + score * 0.15).min(1.0),
                sources_suggested: pattern.suggested_sources.clone(),
            },
            None => IntentClassification::general(Vec::new()),
        }
    }

    fn finalize_sources(&self, mut classification: IntentClassification, registry: &AdapterRegistry) -> IntentClassification {
        let known: std::collections::HashSet<String> = registry.list().into_iter().map(|i| i.name).collect();
        classification.sources_suggested.retain(|s| known.contains(s));
        classification.dedup_sources();
        if classification.sources_suggested.is_empty() {
            let mut fast = registry.list_fast();
            let mut slow = registry.list_slow();
            fast.retain(|i| i.capabilities.contains(&Capability::Query));
            slow.retain(|i| i.capabilities.contains(&Capability::Query));
            fast.extend(slow);
            classification.sources_suggested = fast.into_iter().map(|i| i.name).collect();
        }
        classification
    }

    fn endpoint_known_available(&self) -> bool {
        match self.endpoint_health.lock().expect("lock poisoned").as_ref() {
            Some(health) if health.checked_at.elapsed() < ENDPOINT_HEALTH_TTL => health.healthy,
            _ => true,
        }
    }

    fn mark_endpoint_healthy(&self, healthy: bool) {
        *self.endpoint_health.lock().expect("lock poisoned") = Some(EndpointHealth {
            healthy,
            checked_at: Instant::now(),
        });
    }

    pub fn build_learning_record(query: &str, correct_intent: Intent, correct_sources: &[String]) -> serde_json::Value {
        serde_json::json!({
            "query": query,
            "intent": correct_intent.as_str(),
            "sources": correct_sources,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
