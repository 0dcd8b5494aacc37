//! Flat-file `SprintState` persistence, including the legacy `botEnabled` field migration.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::sprint::SprintState;
use crate::domain::ports::SprintStateStore;

use super::atomic;

pub struct FileSprintStateStore {
    path: PathBuf,
}

impl FileSprintStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SprintStateStore for FileSprintStateStore {
    async fn load(&self) -> DomainResult<Option<SprintState>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let Some(bytes) = atomic::read_if_exists(&path)? else {
                return Ok(None);
            };
            let mut value: serde_json::Value = serde_json::from_slice(&bytes).map_err(DomainError::from)?;
            SprintState::migrate_legacy_bot_enabled(&mut value);
            let state: SprintState = serde_json::from_value(value).map_err(DomainError::from)?;
            Ok(Some(state))
        })
        .await
        .map_err(|err| DomainError::Persistence(err.to_string()))?
    }

    async fn save(&self, state: &SprintState) -> DomainResult<()> {
        let path = self.path.clone();
        let bytes = serde_json::to_vec_pretty(state).map_err(DomainError::from)?;
        tokio::task::spawn_blocking(move || atomic::write_atomic(&path, &bytes))
            .await
            .map_err(|err| DomainError::Persistence(err.to_string()))?
    }
}
