use text_splitter::{ChunkConfig, ChunkConfigError, Characters, TextSplitter};
use thiserror::Error;

use super::{Chunk, Document};

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("Invalid chunk configuration: {0}")]
    Config(#[from] ChunkConfigError),
}

/// Splits text into chunks of at most `chunk_size` characters, preferring the
/// largest semantic boundary (paragraph, line, sentence, word) that fits.
pub struct RecursiveCharacterSplitter {
    splitter: TextSplitter<Characters>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        let config = ChunkConfig::new(chunk_size).with_overlap(chunk_overlap)?;
        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.page_content)
                    .into_iter()
                    .map(move |content| Chunk {
                        content,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect();

        log::info!(
            "Split {} document(s) into {} chunk(s) (size {}, overlap {})",
            documents.len(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }
}
