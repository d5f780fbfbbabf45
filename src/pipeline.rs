use std::sync::Arc;
use thiserror::Error;

use crate::config::{AppConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_TOP_K};
use crate::database::VectorStore;
use crate::document::{
    Chunk, DirectoryLoader, Document, DocumentError, Metadata, RecursiveCharacterSplitter,
    SplitterError,
};
use crate::llm::StuffQaChain;

/// The first five variants are the pipeline's empty-result stops; their
/// messages are printed verbatim to the user.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No documents loaded from directory.")]
    NoDocuments,
    #[error("Failed to split documents.")]
    SplitFailed,
    #[error("No document content and metadata pairs found.")]
    NoTextMetaPairs,
    #[error("No similar documents found for the query.")]
    NoSimilarDocuments,
    #[error("Could not generate a response for the given query.")]
    NoResponse,
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Splitter(#[from] SplitterError),
    #[error("Vector store error: {0:#}")]
    Store(anyhow::Error),
    #[error("Language model error: {0:#}")]
    Llm(anyhow::Error),
}

impl PipelineError {
    /// True for the empty-result stops, which end the run normally.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            PipelineError::NoDocuments
                | PipelineError::SplitFailed
                | PipelineError::NoTextMetaPairs
                | PipelineError::NoSimilarDocuments
                | PipelineError::NoResponse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k,
        }
    }
}

/// Load, split, store, retrieve, answer. Each stage runs only if the one
/// before it produced something.
pub struct RagPipeline {
    store: Arc<dyn VectorStore>,
    qa_chain: StuffQaChain,
    splitter: RecursiveCharacterSplitter,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        qa_chain: StuffQaChain,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let splitter = RecursiveCharacterSplitter::new(options.chunk_size, options.chunk_overlap)?;
        Ok(Self {
            store,
            qa_chain,
            splitter,
            top_k: options.top_k.max(1),
        })
    }

    pub async fn ingest_directory(&self, loader: &DirectoryLoader) -> Result<usize, PipelineError> {
        let chunks = load_and_split(loader, &self.splitter).await?;
        self.ingest_chunks(&chunks).await
    }

    /// Replaces the store's contents with the chunks of `documents`. Returns
    /// the number of records stored.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<usize, PipelineError> {
        let chunks = split_documents(documents, &self.splitter)?;
        self.ingest_chunks(&chunks).await
    }

    /// Resets the store and adds `chunks` to it. The first stage that talks
    /// to a service.
    pub async fn ingest_chunks(&self, chunks: &[Chunk]) -> Result<usize, PipelineError> {
        self.store.reset().await.map_err(PipelineError::Store)?;

        let pairs = text_meta_pairs(chunks);
        if pairs.is_empty() {
            return Err(PipelineError::NoTextMetaPairs);
        }

        let (texts, metadatas): (Vec<String>, Vec<Metadata>) = pairs.into_iter().unzip();
        let ids = self
            .store
            .add_texts(&texts, &metadatas)
            .await
            .map_err(PipelineError::Store)?;

        log::info!("Stored {} record(s)", ids.len());
        Ok(ids.len())
    }

    pub async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let results = self
            .store
            .similarity_search(query, self.top_k)
            .await
            .map_err(PipelineError::Store)?;
        if results.is_empty() {
            return Err(PipelineError::NoSimilarDocuments);
        }

        let chunks: Vec<Chunk> = results.into_iter().map(|r| r.chunk).collect();
        let response = self
            .qa_chain
            .run(&chunks, query)
            .await
            .map_err(PipelineError::Llm)?;
        if response.trim().is_empty() {
            return Err(PipelineError::NoResponse);
        }

        Ok(response)
    }
}

/// Loads and splits without touching any service, so the first two
/// empty-result stops never need credentials.
pub async fn load_and_split(
    loader: &DirectoryLoader,
    splitter: &RecursiveCharacterSplitter,
) -> Result<Vec<Chunk>, PipelineError> {
    let documents = loader.load().await?;
    split_documents(&documents, splitter)
}

pub fn split_documents(
    documents: &[Document],
    splitter: &RecursiveCharacterSplitter,
) -> Result<Vec<Chunk>, PipelineError> {
    if documents.is_empty() {
        return Err(PipelineError::NoDocuments);
    }

    let chunks = splitter.split_documents(documents);
    if chunks.is_empty() {
        return Err(PipelineError::SplitFailed);
    }
    Ok(chunks)
}

/// (text, metadata) for every chunk with non-blank text.
pub fn text_meta_pairs(chunks: &[Chunk]) -> Vec<(String, Metadata)> {
    chunks
        .iter()
        .filter(|chunk| !chunk.content.trim().is_empty())
        .map(|chunk| (chunk.content.clone(), chunk.metadata.clone()))
        .collect()
}
