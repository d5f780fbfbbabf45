use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, CollectionExistsRequest, CreateCollectionBuilder,
        DeleteCollectionBuilder, Distance, PointId, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, Value, VectorParamsBuilder,
    },
    Payload, Qdrant,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::qdrant_config::{create_qdrant_client, verify_connection};
use crate::config::QdrantSettings;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type JsonPayload = HashMap<String, serde_json::Value>;

/// A point ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: JsonPayload,
}

/// A search hit: point id, similarity score and payload.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: JsonPayload,
}

#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
}

impl VectorDB {
    pub fn new(settings: &QdrantSettings) -> Result<Self, VectorDBError> {
        let client = create_qdrant_client(settings)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub async fn verify_connection(&self) -> Result<(), VectorDBError> {
        verify_connection(&self.client).await
    }

    /// Drops `name` if it exists and creates it empty with cosine distance.
    pub async fn recreate_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDBError> {
        let exists = self
            .client
            .collection_exists(CollectionExistsRequest {
                collection_name: name.to_string(),
            })
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        if exists {
            log::info!("Dropping existing collection {}", name);
            self.client
                .delete_collection(DeleteCollectionBuilder::new(name))
                .await
                .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        log::info!("Created collection {} ({} dimensions)", name, vector_size);
        Ok(())
    }

    pub async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize, VectorDBError> {
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| PointStruct::new(record.id, record.vector, to_payload(record.payload)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        Ok(count)
    }

    pub async fn search(
        &self,
        collection: &str,
        query_vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, VectorDBError> {
        let mut request = SearchPointsBuilder::new(collection, query_vector, limit).with_payload(true);
        if let Some(threshold) = score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| VectorHit {
                id: point.id.map(point_id_to_string).unwrap_or_default(),
                score: point.score,
                payload: point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, value_to_json(v)))
                    .collect(),
            })
            .collect();

        Ok(hits)
    }
}

fn to_payload(fields: JsonPayload) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in fields {
        payload.insert(key, Value::from(value));
    }
    payload
}

fn point_id_to_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

pub(crate) fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}
