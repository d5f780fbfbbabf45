use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, Embedding,
    },
    Client,
};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::config::OpenAISettings;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

/// Texts sent per embeddings request.
pub const EMBEDDING_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    dimensions: u64,
    temperature: f32,
    batch_size: usize,
}

impl OpenAIProvider {
    pub fn new(settings: &OpenAISettings) -> Result<Self> {
        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(api_base) = &settings.api_base {
            config = config.with_api_base(api_base.trim_end_matches('/'));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let client = Client::with_config(config).with_http_client(http_client);

        Ok(Self {
            client,
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            dimensions: settings.embedding_dimensions,
            temperature: settings.temperature,
            batch_size: EMBEDDING_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(texts.to_vec())
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        let vectors = order_by_index(response.data);

        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "Embedding response has {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            ));
        }
        for vector in &vectors {
            check_dimensions(vector, self.dimensions)?;
        }
        Ok(vectors)
    }
}

fn order_by_index(mut data: Vec<Embedding>) -> Vec<Vec<f32>> {
    data.sort_by_key(|e| e.index);
    data.into_iter().map(|e| e.embedding).collect()
}

fn check_dimensions(vector: &[f32], expected: u64) -> Result<()> {
    if vector.len() as u64 != expected {
        return Err(anyhow!(
            "Generated embedding has wrong size: {} (expected {})",
            vector.len(),
            expected
        ));
    }
    Ok(())
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message("Embedding chunks");
    bar
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let bar = progress_bar(texts.len());
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            log::debug!(
                "Requesting {} embedding(s) from {}",
                batch.len(),
                self.embedding_model
            );
            embeddings.extend(self.embed_batch(batch).await?);
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned from OpenAI"))
    }

    fn dimensions(&self) -> u64 {
        self.dimensions
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(self.temperature)
            .messages(vec![message])
            .build()?;

        log::debug!("Requesting completion from {}", self.chat_model);
        let response = self.client.chat().create(request).await?;

        // An empty answer is the caller's call to make, so no content maps to "".
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn get_model_info(&self) -> String {
        format!("{} (embeddings: {})", self.chat_model, self.embedding_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OpenAISettings {
        OpenAISettings {
            api_key: "sk-test".to_string(),
            api_base: Some("http://127.0.0.1:9/v1/".to_string()),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimensions: 3,
            temperature: 0.0,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_model_info() {
        let provider = OpenAIProvider::new(&settings()).unwrap();
        assert_eq!(
            provider.get_model_info(),
            "gpt-3.5-turbo (embeddings: text-embedding-ada-002)"
        );
        assert_eq!(provider.dimensions(), 3);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let provider = OpenAIProvider::new(&settings()).unwrap().with_batch_size(0);
        assert_eq!(provider.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_no_texts_no_request() {
        // The api base points at a closed port, so any request would fail.
        let provider = OpenAIProvider::new(&settings()).unwrap();
        let embeddings = provider.embed_documents(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[0.1, 0.2, 0.3], 3).is_ok());
        assert!(check_dimensions(&[0.1, 0.2], 3).is_err());
    }
}
