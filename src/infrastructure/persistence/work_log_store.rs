//! One YAML `WorkLog` file per issue key.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::work_log::WorkLog;
use crate::domain::ports::WorkLogStore;

use super::atomic;

pub struct FileWorkLogStore {
    dir: PathBuf,
}

impl FileWorkLogStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, issue_key: &str) -> PathBuf {
        self.dir.join(format!("{issue_key}.yaml"))
    }
}

#[async_trait]
impl WorkLogStore for FileWorkLogStore {
    async fn load(&self, issue_key: &str) -> DomainResult<Option<WorkLog>> {
        let path = self.path_for(issue_key);
        tokio::task::spawn_blocking(move || {
            let Some(bytes) = atomic::read_if_exists(&path)? else {
                return Ok(None);
            };
            let log: WorkLog = serde_yaml::from_slice(&bytes).map_err(DomainError::from)?;
            Ok(Some(log))
        })
        .await
        .map_err(|err| DomainError::Persistence(err.to_string()))?
    }

    async fn save(&self, log: &WorkLog) -> DomainResult<()> {
        let path = self.path_for(&log.issue_id);
        let bytes = serde_yaml::to_string(log).map_err(DomainError::from)?;
        tokio::task::spawn_blocking(move || atomic::write_atomic(&path, bytes.as_bytes()))
            .await
            .map_err(|err| DomainError::Persistence(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_work_log_by_issue_id() {
        let dir = tempdir().unwrap();
        let store = FileWorkLogStore::new(dir.path().to_path_buf());
        assert!(store.load("ISS-1").await.unwrap().is_none());

        let log = WorkLog::new("ISS-1");
        store.save(&log).await.unwrap();

        let loaded = store.load("ISS-1").await.unwrap().unwrap();
        assert_eq!(loaded.issue_id, "ISS-1");
    }
}
