//! Value types for the memory abstraction layer: filters, items, classifications, results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One of the three operations a source adapter may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Query,
    Search,
    Store,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Search => "search",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Local filesystem / local vector DB; expected under ~2s.
    Fast,
    /// External SaaS; expected over ~2s, opt-in only.
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    StatusCheck,
    CodeLookup,
    Troubleshooting,
    Documentation,
    History,
    PatternLookup,
    IssueContext,
    Gitlab,
    Github,
    Calendar,
    Email,
    Files,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusCheck => "status_check",
            Self::CodeLookup => "code_lookup",
            Self::Troubleshooting => "troubleshooting",
            Self::Documentation => "documentation",
            Self::History => "history",
            Self::PatternLookup => "pattern_lookup",
            Self::IssueContext => "issue_context",
            Self::Gitlab => "gitlab",
            Self::Github => "github",
            Self::Calendar => "calendar",
            Self::Email => "email",
            Self::Files => "files",
            Self::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "status_check" => Self::StatusCheck,
            "code_lookup" => Self::CodeLookup,
            "troubleshooting" => Self::Troubleshooting,
            "documentation" => Self::Documentation,
            "history" => Self::History,
            "pattern_lookup" => Self::PatternLookup,
            "issue_context" => Self::IssueContext,
            "gitlab" => Self::Gitlab,
            "github" => Self::Github,
            "calendar" => Self::Calendar,
            "email" => Self::Email,
            "files" => Self::Files,
            _ => Self::General,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFilter {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SourceFilter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Normalize a caller-supplied source into a [`SourceFilter`].
    pub fn from_spec(spec: SourceSpec) -> Option<Self> {
        match spec {
            SourceSpec::Name(name) => Some(Self::named(name)),
            SourceSpec::Filter(filter) => Some(filter),
        }
    }
}

/// A source identified by name alone, or by a fully-specified filter. Callers may
/// pass either; normalization always produces a [`SourceFilter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Name(String),
    Filter(SourceFilter),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub source: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub relevance: f32,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MemoryItem {
    pub fn new(
        source: impl Into<String>,
        item_type: impl Into<String>,
        relevance: f32,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item_type: item_type.into(),
            relevance: relevance.clamp(0.0, 1.0),
            summary: summary.into(),
            content: content.into(),
            metadata: HashMap::new(),
            timestamp: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Returns an error if `relevance` is outside `[0,1]` or `summary` is empty.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.relevance) {
            return Err(format!("relevance {} out of [0,1]", self.relevance));
        }
        if self.summary.is_empty() {
            return Err("summary must be nonempty".to_string());
        }
        Ok(())
    }

    pub fn content_prefix_lower(&self) -> String {
        self.content
            .to_lowercase()
            .chars()
            .take(200)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
    pub sources_suggested: Vec<String>,
}

impl IntentClassification {
    pub fn general(sources: Vec<String>) -> Self {
        Self {
            intent: Intent::General,
            confidence: 0.5,
            sources_suggested: sources,
        }
    }

    /// Remove duplicate suggested source names, preserving first-occurrence order.
    pub fn dedup_sources(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.sources_suggested.retain(|s| seen.insert(s.clone()));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResult {
    pub source: String,
    pub items: Vec<MemoryItem>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    found: Option<bool>,
}

impl AdapterResult {
    pub fn ok(source: impl Into<String>, items: Vec<MemoryItem>) -> Self {
        Self {
            source: source.into(),
            items,
            error: None,
            latency_ms: 0.0,
            found: None,
        }
    }

    pub fn err(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            items: Vec::new(),
            error: Some(error.into()),
            latency_ms: 0.0,
            found: Some(false),
        }
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn found(&self) -> bool {
        self.found.unwrap_or_else(|| !self.items.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub intent: Intent,
    pub sources_queried: Vec<String>,
    pub items: Vec<MemoryItem>,
    pub total_count: usize,
    pub latency_ms: f64,
    pub errors: HashMap<String, String>,
}

impl QueryResult {
    pub fn empty(query: impl Into<String>, intent: Intent) -> Self {
        Self {
            query: query.into(),
            intent,
            sources_queried: Vec::new(),
            items: Vec::new(),
            total_count: 0,
            latency_ms: 0.0,
            errors: HashMap::new(),
        }
    }

    pub fn failed(query: impl Into<String>, key: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(key.to_string(), message.into());
        Self {
            query: query.into(),
            intent: Intent::General,
            sources_queried: Vec::new(),
            items: Vec::new(),
            total_count: 0,
            latency_ms: 0.0,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
            details: HashMap::new(),
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
            details: HashMap::new(),
        }
    }
}

/// Does not hold the adapter instance itself (that lives behind
/// [`crate::services::adapter_registry::AdapterRegistry`]'s lazily constructed
/// singleton map) — only the declarative metadata used for routing decisions.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub display_name: String,
    pub capabilities: std::collections::HashSet<Capability>,
    pub intent_keywords: Vec<String>,
    pub priority: i32,
    pub latency_class: LatencyClass,
}

impl AdapterInfo {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            capabilities: std::collections::HashSet::new(),
            intent_keywords: Vec::new(),
            priority: 0,
            latency_class: LatencyClass::Fast,
        }
    }

    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.insert(cap);
        self
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(caps);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_latency_class(mut self, class: LatencyClass) -> Self {
        self.latency_class = class;
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.intent_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Returns an error if `capabilities` is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.capabilities.is_empty() {
            return Err(format!("adapter '{}' declares no capabilities", self.name));
        }
        Ok(())
    }
}
