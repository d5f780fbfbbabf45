use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;

use super::vector_db::VectorDBError;
use crate::config::QdrantSettings;

/// Normalizes a cluster URL for the gRPC client: a missing scheme becomes
/// `http`, and the REST port 6333 is swapped for the gRPC port 6334.
pub fn grpc_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };

    let rest = match rest.strip_suffix(":6333") {
        Some(host) => format!("{}:6334", host),
        None => rest.to_string(),
    };

    format!("{}://{}", scheme, rest)
}

/// Builds the client without touching the network.
pub fn create_qdrant_client(settings: &QdrantSettings) -> Result<Qdrant, VectorDBError> {
    let url = grpc_url(&settings.url);
    log::info!("Configuring Qdrant client for {}", url);

    let mut config = QdrantConfig::from_url(&url);
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);
    config.api_key = settings.api_key.clone();

    Qdrant::new(config).map_err(|e| VectorDBError::Connection(e.to_string()))
}

pub async fn verify_connection(client: &Qdrant) -> Result<(), VectorDBError> {
    match client.list_collections().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(())
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(VectorDBError::Connection(e.to_string()))
        }
    }
}
