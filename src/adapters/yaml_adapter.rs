//! Each namespace is a directory of per-key YAML files under a plugin-data root,
//! mirroring the flat-file persistence idiom used throughout
//! `infrastructure::persistence`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::mal::{AdapterResult, HealthStatus, MemoryItem, SourceFilter};
use crate::domain::ports::SourceAdapter;

pub struct YamlAdapter {
    root: PathBuf,
}

impl YamlAdapter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn namespace_dir(&self, filter: &SourceFilter) -> PathBuf {
        match &filter.namespace {
            Some(namespace) => self.root.join(namespace),
            None => self.root.clone(),
        }
    }

    async fn read_all_items(&self, dir: &PathBuf) -> DomainResult<Vec<MemoryItem>> {
        let mut items = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
            Err(e) => return Err(DomainError::from(e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(DomainError::from)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let bytes = fs::read(&path).await.map_err(DomainError::from)?;
            if let Ok(item) = serde_yaml::from_slice::<MemoryItem>(&bytes) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn matches_query(item: &MemoryItem, query: &str) -> bool {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();
        if words.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", item.summary.to_lowercase(), item.content_prefix_lower());
        words.iter().any(|w| haystack.contains(w))
    }

    fn key_for(item: &MemoryItem) -> String {
        item.metadata.get("key").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| item.summary.clone())
    }
}

#[async_trait]
impl SourceAdapter for YamlAdapter {
    fn name(&self) -> &str {
        "yaml"
    }

    async fn query(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        let dir = self.namespace_dir(filter);
        let mut items: Vec<MemoryItem> = self.read_all_items(&dir).await?.into_iter().filter(|item| Self::matches_query(item, query)).collect();

        if let Some(limit) = filter.limit {
            items.truncate(limit);
        }
        Ok(AdapterResult::ok(self.name(), items))
    }

    async fn search(&self, query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        let dir = self.namespace_dir(filter);
        let mut items: Vec<MemoryItem> = self.read_all_items(&dir).await?.into_iter().filter(|item| Self::matches_query(item, query)).collect();

        if let Some(key) = &filter.key {
            items.retain(|item| Self::key_for(item) == *key);
        }
        if let Some(limit) = filter.limit {
            items.truncate(limit);
        }
        Ok(AdapterResult::ok(self.name(), items))
    }

    async fn store(&self, item: &MemoryItem) -> DomainResult<()> {
        item.validate().map_err(DomainError::Validation)?;
        let namespace = item.metadata.get("namespace").and_then(|v| v.as_str()).unwrap_or("default");
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).await.map_err(DomainError::from)?;

        let key = Self::key_for(item);
        let safe_key: String = key.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
        let path = dir.join(format!("{safe_key}.yaml"));
        let bytes = serde_yaml::to_vec(item).map_err(DomainError::from)?;
        tokio::task::spawn_blocking(move || crate::infrastructure::persistence::atomic::write_atomic(&path, &bytes))
            .await
            .map_err(|err| DomainError::Persistence(err.to_string()))?
    }

    async fn health_check(&self) -> DomainResult<HealthStatus> {
        match fs::metadata(&self.root).await {
            Ok(_) => Ok(HealthStatus::healthy()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HealthStatus::healthy()),
            Err(e) => Ok(HealthStatus::unhealthy(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(summary: &str, content: &str) -> MemoryItem {
        MemoryItem::new("yaml", "state", 1.0, summary, content)
    }

    #[tokio::test]
    async fn store_then_query_round_trips() {
        let dir = tempdir().unwrap();
        let adapter = YamlAdapter::new(dir.path().to_path_buf());
        let mut entry = item("current status", "working on ISS-1");
        entry.metadata.insert("namespace".to_string(), serde_json::json!("default"));
        adapter.store(&entry).await.unwrap();

        let filter = SourceFilter::named("yaml").with_limit(10);
        let result = adapter.query("status", &filter).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.found());
    }

    #[tokio::test]
    async fn query_on_absent_namespace_returns_empty_not_error() {
        let dir = tempdir().unwrap();
        let adapter = YamlAdapter::new(dir.path().to_path_buf());
        let mut filter = SourceFilter::named("yaml");
        filter.namespace = Some("missing".to_string());
        let result = adapter.query("anything", &filter).await.unwrap();
        assert!(result.items.is_empty());
        assert!(!result.found());
    }

    #[tokio::test]
    async fn health_check_is_healthy_even_if_root_absent() {
        let dir = tempdir().unwrap();
        let adapter = YamlAdapter::new(dir.path().join("not-created-yet"));
        let status = adapter.health_check().await.unwrap();
        assert!(status.healthy);
    }
}
