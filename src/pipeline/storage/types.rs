use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StorageError;
use crate::db::StoredSetInfo;
use crate::models::{Chunk, ChunkDraft, ChunkSet, StructuredNote, Turn};

/// Outcome of one indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub conversation_id: Uuid,
    pub epoch: u32,
    pub chunks_indexed: usize,
    /// The stored set already matched this epoch and content.
    pub unchanged: bool,
}

/// Decomposes a note and its conversation into chunk texts.
pub trait Chunker {
    fn chunk(&self, note: &StructuredNote, turns: &[Turn]) -> Vec<ChunkDraft>;
}

/// Embedding model abstraction
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError>;
    fn dimension(&self) -> usize;
}

impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Box<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StorageError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StorageError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Chunk persistence. Reads are only ever scoped to one patient, and a
/// conversation's set is replaced as a unit.
pub trait ChunkStore {
    /// Swap in `set` for its conversation. Readers see either the old set or
    /// the complete new one.
    fn replace_set(&self, set: &ChunkSet) -> Result<Vec<Chunk>, StorageError>;

    fn set_info(&self, conversation_id: &Uuid) -> Result<Option<StoredSetInfo>, StorageError>;

    /// All chunks belonging to `patient_id`, in ascending id order.
    fn chunks_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Chunk>, StorageError>;
}

impl<T: ChunkStore + ?Sized> ChunkStore for Arc<T> {
    fn replace_set(&self, set: &ChunkSet) -> Result<Vec<Chunk>, StorageError> {
        (**self).replace_set(set)
    }

    fn set_info(&self, conversation_id: &Uuid) -> Result<Option<StoredSetInfo>, StorageError> {
        (**self).set_info(conversation_id)
    }

    fn chunks_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Chunk>, StorageError> {
        (**self).chunks_for_patient(patient_id)
    }
}

impl<T: ChunkStore + ?Sized> ChunkStore for &T {
    fn replace_set(&self, set: &ChunkSet) -> Result<Vec<Chunk>, StorageError> {
        (**self).replace_set(set)
    }

    fn set_info(&self, conversation_id: &Uuid) -> Result<Option<StoredSetInfo>, StorageError> {
        (**self).set_info(conversation_id)
    }

    fn chunks_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Chunk>, StorageError> {
        (**self).chunks_for_patient(patient_id)
    }
}
