use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ChunkSource, FieldGroup};

/// A retrievable unit of text with its embedding.
///
/// `epoch` is the note version the chunk set was derived from; every chunk of
/// one conversation shares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub conversation_id: Uuid,
    pub patient_id: Uuid,
    pub source: ChunkSource,
    pub field_group: Option<FieldGroup>,
    pub ordinal: u32,
    pub text: String,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub epoch: u32,
}

/// A chunk with its similarity to a query. Ordering is computed, not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// A chunk before it has been embedded or stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub source: ChunkSource,
    pub field_group: Option<FieldGroup>,
    pub text: String,
}

/// A fully embedded chunk set for one conversation, ready to be swapped in.
///
/// `fingerprint` identifies the ordered (source, text) content so a re-run on
/// unchanged input can be recognised.
#[derive(Debug, Clone)]
pub struct ChunkSet {
    pub conversation_id: Uuid,
    pub patient_id: Uuid,
    pub epoch: u32,
    pub fingerprint: String,
    pub entries: Vec<EmbeddedChunk>,
}

#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub draft: ChunkDraft,
    pub embedding: Vec<f32>,
}

impl ChunkSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared embedding dimension, or `None` when the set is empty or mixed.
    pub fn dimension(&self) -> Option<usize> {
        let first = self.entries.first()?.embedding.len();
        self.entries
            .iter()
            .all(|e| e.embedding.len() == first)
            .then_some(first)
    }
}
