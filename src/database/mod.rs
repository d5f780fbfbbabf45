pub mod qdrant_config;
pub mod vector_db;
pub mod vector_store;

pub use vector_db::{VectorDB, VectorDBError};
pub use vector_store::{QdrantVectorStore, VectorStore};
