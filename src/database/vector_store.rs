use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::vector_db::{JsonPayload, VectorDB, VectorHit, VectorRecord};
use crate::document::{Chunk, Metadata, ScoredChunk};
use crate::providers::traits::EmbeddingProvider;

/// Payload property holding the chunk text.
pub const TEXT_KEY: &str = "content";

const UPSERT_BATCH_SIZE: usize = 100;

/// Text-in, chunks-out view of a vector database. Implementations own the
/// vectorization of both stored texts and queries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops and recreates the schema so the store starts empty.
    async fn reset(&self) -> Result<()>;

    /// Stores each text with its metadata; returns the new record ids.
    async fn add_texts(&self, texts: &[String], metadatas: &[Metadata]) -> Result<Vec<String>>;

    /// Up to `k` stored chunks most similar to `query`, best first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}

pub struct QdrantVectorStore {
    db: VectorDB,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
    score_threshold: Option<f32>,
}

impl QdrantVectorStore {
    pub fn new(db: VectorDB, embedder: Arc<dyn EmbeddingProvider>, collection: impl Into<String>) -> Self {
        Self {
            db,
            embedder,
            collection: collection.into(),
            score_threshold: None,
        }
    }

    /// Hits scoring below `threshold` are not returned by searches.
    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn reset(&self) -> Result<()> {
        self.db.verify_connection().await?;
        self.db
            .recreate_collection(&self.collection, self.embedder.dimensions())
            .await
            .with_context(|| format!("Failed to reset collection {}", self.collection))?;
        Ok(())
    }

    async fn add_texts(&self, texts: &[String], metadatas: &[Metadata]) -> Result<Vec<String>> {
        if texts.len() != metadatas.len() {
            bail!(
                "Got {} texts but {} metadata entries",
                texts.len(),
                metadatas.len()
            );
        }

        let vectors = self.embedder.embed_documents(texts).await?;
        if vectors.len() != texts.len() {
            bail!("Embedder returned {} vectors for {} texts", vectors.len(), texts.len());
        }

        let records: Vec<VectorRecord> = texts
            .iter()
            .zip(metadatas)
            .zip(vectors)
            .map(|((text, metadata), vector)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: build_payload(text, metadata),
            })
            .collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let mut stored = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            stored += self
                .db
                .upsert(&self.collection, batch.to_vec())
                .await
                .with_context(|| format!("Failed to store texts in {}", self.collection))?;
            log::debug!("Upserted {}/{} record(s)", stored, ids.len());
        }

        log::info!("Stored {} record(s) in {}", stored, self.collection);
        Ok(ids)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self
            .db
            .search(&self.collection, vector, k as u64, self.score_threshold)
            .await
            .with_context(|| format!("Failed to search {}", self.collection))?;

        let chunks: Vec<ScoredChunk> = hits.into_iter().filter_map(hit_to_chunk).collect();
        log::info!("Retrieved {} chunk(s) for the query", chunks.len());
        Ok(chunks)
    }
}

fn build_payload(text: &str, metadata: &Metadata) -> JsonPayload {
    let mut payload: JsonPayload = metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    payload.insert(TEXT_KEY.to_string(), serde_json::Value::String(text.to_string()));
    payload
}

/// Hits without a text property are dropped.
fn hit_to_chunk(hit: VectorHit) -> Option<ScoredChunk> {
    let mut payload = hit.payload;
    let content = match payload.remove(TEXT_KEY)? {
        serde_json::Value::String(s) => s,
        _ => return None,
    };

    let metadata = payload
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect();

    Some(ScoredChunk {
        chunk: Chunk { content, metadata },
        score: hit.score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SOURCE_KEY;
    use serde_json::json;

    #[test]
    fn test_payload_carries_text_and_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), "docs/guide.pdf".to_string());

        let payload = build_payload("chunk text", &metadata);
        assert_eq!(payload.get(TEXT_KEY), Some(&json!("chunk text")));
        assert_eq!(payload.get(SOURCE_KEY), Some(&json!("docs/guide.pdf")));
    }

    #[test]
    fn test_hit_to_chunk() {
        let mut payload = JsonPayload::new();
        payload.insert(TEXT_KEY.to_string(), json!("chunk text"));
        payload.insert(SOURCE_KEY.to_string(), json!("docs/guide.pdf"));
        payload.insert("page".to_string(), json!(2));

        let scored = hit_to_chunk(VectorHit {
            id: "id-1".to_string(),
            score: 0.87,
            payload,
        })
        .unwrap();

        assert_eq!(scored.chunk.content, "chunk text");
        assert_eq!(scored.chunk.source(), Some("docs/guide.pdf"));
        assert_eq!(scored.chunk.metadata.get("page").map(String::as_str), Some("2"));
        assert!(!scored.chunk.metadata.contains_key(TEXT_KEY));
        assert_eq!(scored.score, 0.87);
    }

    #[test]
    fn test_hit_without_text_is_dropped() {
        let mut payload = JsonPayload::new();
        payload.insert(SOURCE_KEY.to_string(), json!("docs/guide.pdf"));
        let hit = VectorHit {
            id: "id-2".to_string(),
            score: 0.5,
            payload,
        };
        assert!(hit_to_chunk(hit).is_none());
    }
}
