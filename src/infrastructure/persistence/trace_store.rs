//! One YAML `ExecutionTrace` file per issue key.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::trace::ExecutionTrace;
use crate::domain::ports::TraceStore;

use super::atomic;

pub struct FileTraceStore {
    dir: PathBuf,
}

impl FileTraceStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, issue_key: &str) -> PathBuf {
        self.dir.join(format!("{issue_key}.yaml"))
    }
}

#[async_trait]
impl TraceStore for FileTraceStore {
    async fn load(&self, issue_key: &str) -> DomainResult<Option<ExecutionTrace>> {
        let path = self.path_for(issue_key);
        tokio::task::spawn_blocking(move || {
            let Some(bytes) = atomic::read_if_exists(&path)? else {
                return Ok(None);
            };
            let trace: ExecutionTrace = serde_yaml::from_slice(&bytes).map_err(DomainError::from)?;
            Ok(Some(trace))
        })
        .await
        .map_err(|err| DomainError::Persistence(err.to_string()))?
    }

    async fn save(&self, trace: &ExecutionTrace) -> DomainResult<()> {
        let path = self.path_for(&trace.issue_key);
        let bytes = serde_yaml::to_string(trace).map_err(DomainError::from)?;
        tokio::task::spawn_blocking(move || atomic::write_atomic(&path, bytes.as_bytes()))
            .await
            .map_err(|err| DomainError::Persistence(err.to_string()))?
    }

    async fn list(&self) -> DomainResult<Vec<String>> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || {
            if !dir.exists() {
                return Ok(Vec::new());
            }
            let mut keys = Vec::new();
            for entry in std::fs::read_dir(&dir).map_err(DomainError::from)? {
                let entry = entry.map_err(DomainError::from)?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if !stem.starts_with('.') {
                            keys.push(stem.to_string());
                        }
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|err| DomainError::Persistence(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::trace::{ExecutionMode, WorkflowType};
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_trace_by_issue_key() {
        let dir = tempdir().unwrap();
        let store = FileTraceStore::new(dir.path().to_path_buf());
        assert!(store.load("ISS-1").await.unwrap().is_none());

        let trace = ExecutionTrace::new("ISS-1", WorkflowType::CodeChange, ExecutionMode::Foreground);
        store.save(&trace).await.unwrap();

        let loaded = store.load("ISS-1").await.unwrap().unwrap();
        assert_eq!(loaded.issue_key, "ISS-1");
    }

    #[tokio::test]
    async fn list_returns_saved_issue_keys_sorted() {
        let dir = tempdir().unwrap();
        let store = FileTraceStore::new(dir.path().to_path_buf());
        store
            .save(&ExecutionTrace::new("ISS-2", WorkflowType::CodeChange, ExecutionMode::Foreground))
            .await
            .unwrap();
        store
            .save(&ExecutionTrace::new("ISS-1", WorkflowType::Spike, ExecutionMode::Background))
            .await
            .unwrap();

        let keys = store.list().await.unwrap();
        assert_eq!(keys, vec!["ISS-1".to_string(), "ISS-2".to_string()]);
    }

    #[tokio::test]
    async fn list_is_empty_when_directory_absent() {
        let dir = tempdir().unwrap();
        let store = FileTraceStore::new(dir.path().join("does-not-exist"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
