//! Local semantic-memory adapter backed by SQLite, comparing caller-supplied embeddings by cosine similarity.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::mal::{AdapterResult, HealthStatus, MemoryItem, SourceFilter};
use crate::domain::ports::SourceAdapter;

/// `embedding` column is stored as a little-endian `f32` byte blob.
fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Fast, query+search+store capable adapter over a local SQLite table of
/// precomputed-embedding rows.
pub struct VectorAdapter {
    pool: SqlitePool,
}

impl VectorAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensures the backing table exists; safe to call repeatedly.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_type TEXT NOT NULL,
                summary TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(DomainError::from)?;
        Ok(())
    }

    fn extract_embedding(filter: &SourceFilter) -> Option<Vec<f32>> {
        let raw = filter.extra.get("embedding")?.as_array()?;
        Some(raw.iter().filter_map(serde_json::Value::as_f64).map(|v| v as f32).collect())
    }

    async fn ranked_items(&self, filter: &SourceFilter) -> DomainResult<Vec<MemoryItem>> {
        let rows = sqlx::query("SELECT item_type, summary, content, embedding, metadata, created_at FROM vector_memory")
            .fetch_all(&self.pool)
            .await
            .map_err(DomainError::from)?;

        let query_embedding = Self::extract_embedding(filter);

        let mut scored: Vec<(f32, MemoryItem)> = rows
            .into_iter()
            .map(|row| {
                let item_type: String = row.get("item_type");
                let summary: String = row.get("summary");
                let content: String = row.get("content");
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata");
                let created_at: String = row.get("created_at");

                let embedding = decode_embedding(&embedding_bytes);
                let relevance = match &query_embedding {
                    Some(query) => cosine_similarity(query, &embedding).clamp(0.0, 1.0),
                    None => 0.5,
                };

                let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
                let timestamp = created_at.parse().ok();

                let mut item = MemoryItem::new(self.name(), item_type, relevance, summary, content);
                item.metadata = metadata;
                item.timestamp = timestamp;
                (relevance, item)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut items: Vec<MemoryItem> = scored.into_iter().map(|(_, item)| item).collect();
        if let Some(limit) = filter.limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for VectorAdapter {
    fn name(&self) -> &str {
        "vector"
    }

    async fn query(&self, _query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        let items = self.ranked_items(filter).await?;
        Ok(AdapterResult::ok(self.name(), items))
    }

    async fn search(&self, _query: &str, filter: &SourceFilter) -> DomainResult<AdapterResult> {
        let items = self.ranked_items(filter).await?;
        Ok(AdapterResult::ok(self.name(), items))
    }

    async fn store(&self, item: &MemoryItem) -> DomainResult<()> {
        item.validate().map_err(DomainError::Validation)?;
        let embedding = item
            .metadata
            .get("embedding")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(serde_json::Value::as_f64).map(|v| v as f32).collect::<Vec<f32>>())
            .unwrap_or_default();

        let metadata_json = serde_json::to_string(&item.metadata).map_err(DomainError::from)?;
        let created_at = item.timestamp.unwrap_or_else(chrono::Utc::now).to_rfc3339();

        sqlx::query("INSERT INTO vector_memory (item_type, summary, content, embedding, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&item.item_type)
            .bind(&item.summary)
            .bind(&item.content)
            .bind(encode_embedding(&embedding))
            .bind(metadata_json)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(DomainError::from)?;
        Ok(())
    }

    async fn health_check(&self) -> DomainResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus::healthy()),
            Err(e) => Ok(HealthStatus::unhealthy(e.to_string())),
        }
    }
}
