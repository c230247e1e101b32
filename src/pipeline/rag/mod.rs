pub mod citation;
pub mod context;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod types;

pub use citation::*;
pub use context::*;
pub use orchestrator::*;
pub use prompt::*;
pub use retrieval::*;
pub use types::*;

use thiserror::Error;

use crate::pipeline::storage::StorageError;
use crate::pipeline::structuring::StructuringError;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Query dimension {actual} does not match stored chunks ({expected})")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Chunk store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Generation(#[from] StructuringError),
}

impl RagError {
    /// Capability failures a caller may retry later.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::EmbeddingFailed(_) => true,
            RagError::Generation(e) => e.is_capability_failure(),
            RagError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}
