pub mod config;
pub mod database;
pub mod document;
pub mod llm;
pub mod pipeline;
pub mod providers;

// Re-export commonly used items
pub use config::AppConfig;
pub use database::{QdrantVectorStore, VectorStore};
pub use document::{Chunk, DirectoryLoader, Document, RecursiveCharacterSplitter};
pub use llm::StuffQaChain;
pub use pipeline::{load_and_split, PipelineError, PipelineOptions, RagPipeline};
