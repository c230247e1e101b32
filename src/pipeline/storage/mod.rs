pub mod chunker;
pub mod embedder;
pub mod orchestrator;
pub mod types;
pub mod vectordb;

pub use chunker::*;
pub use embedder::*;
pub use orchestrator::*;
pub use types::*;
pub use vectordb::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Vector store error: {0}")]
    VectorDb(String),

    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Chunk store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Transient failures worth another embedding attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Embedding(_) | StorageError::EmbeddingUnavailable(_)
        )
    }
}
