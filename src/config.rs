use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use validator::{Validate, ValidationError};

pub const DEFAULT_COLLECTION: &str = "Chatbot";
pub const DEFAULT_CHUNK_SIZE: usize = 4000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_openai_limits"))]
pub struct OpenAISettings {
    #[validate(length(min = 1))]
    pub api_key: String,
    pub api_base: Option<String>,
    #[validate(length(min = 1))]
    pub chat_model: String,
    #[validate(length(min = 1))]
    pub embedding_model: String,
    pub embedding_dimensions: u64,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Validate)]
pub struct QdrantSettings {
    #[validate(url)]
    pub url: String,
    pub api_key: Option<String>,
}

/// Everything a single run needs: provider credentials, the vector
/// database location, and the ingest/retrieval knobs.
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_chunking", skip_on_field_errors = false))]
pub struct AppConfig {
    #[validate]
    pub openai: OpenAISettings,
    #[validate]
    pub qdrant: QdrantSettings,
    pub docs_dir: PathBuf,
    #[validate(length(min = 1))]
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
}

fn validate_openai_limits(settings: &OpenAISettings) -> Result<(), ValidationError> {
    if settings.embedding_dimensions == 0 {
        return Err(ValidationError::new("embedding_dimensions_zero"));
    }
    if settings.timeout_secs == 0 {
        return Err(ValidationError::new("timeout_zero"));
    }
    Ok(())
}

fn validate_chunking(config: &AppConfig) -> Result<(), ValidationError> {
    if config.chunk_size == 0 {
        return Err(ValidationError::new("chunk_size_zero"));
    }
    if config.top_k == 0 {
        return Err(ValidationError::new("top_k_zero"));
    }
    // Overlap must leave room for new text in every chunk.
    if config.chunk_overlap >= config.chunk_size {
        return Err(ValidationError::new("chunk_overlap_exceeds_chunk_size"));
    }
    Ok(())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env`
    /// passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let openai = OpenAISettings {
            api_key,
            api_base: get("OPENAI_API_BASE"),
            chat_model: get("OPENAI_CHAT_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            embedding_model: get("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            embedding_dimensions: parse_or(&get, "OPENAI_EMBEDDING_DIMENSIONS", 1536)?,
            temperature: parse_or(&get, "OPENAI_TEMPERATURE", 0.0)?,
            timeout_secs: parse_or(&get, "OPENAI_TIMEOUT_SECS", 60)?,
        };

        let qdrant = QdrantSettings {
            url: get("QDRANT_URL").unwrap_or_else(|| "http://localhost:6334".to_string()),
            api_key: get("QDRANT_API_KEY"),
        };

        Ok(Self {
            openai,
            qdrant,
            docs_dir: PathBuf::from("./docs"),
            collection: DEFAULT_COLLECTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            score_threshold: None,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.openai.embedding_dimensions, 1536);
        assert_eq!(config.openai.temperature, 0.0);
        assert_eq!(config.qdrant.url, "http://localhost:6334");
        assert_eq!(config.collection, "Chatbot");
        assert_eq!(config.chunk_size, 4000);
        assert_eq!(config.chunk_overlap, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key() {
        let err = AppConfig::from_lookup(lookup(&[("QDRANT_URL", "http://db:6334")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("OPENAI_API_KEY")));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let err = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn test_unparsable_number() {
        let err = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_TEMPERATURE", "warm"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "OPENAI_TEMPERATURE", .. }));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_URL", "not a url"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());

        config.qdrant.url = "https://cluster.example.com:6333".to_string();
        assert!(config.validate().is_ok());

        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());

        config.chunk_overlap = 0;
        config.openai.temperature = 3.5;
        assert!(config.validate().is_err());

        config.openai.temperature = 0.0;
        config.top_k = 0;
        assert!(config.validate().is_err());
    }
}
