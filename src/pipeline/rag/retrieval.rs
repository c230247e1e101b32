use uuid::Uuid;

use super::RagError;
use crate::models::RetrievalResult;
use crate::pipeline::storage::types::{ChunkStore, EmbeddingModel};

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 10;

/// Requested k, defaulted and clamped to `1..=MAX_TOP_K`.
pub fn clamp_top_k(k: Option<usize>) -> usize {
    k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K)
}

/// Patient-scoped nearest-neighbour search over stored chunks.
pub struct Retriever<S: ChunkStore> {
    store: S,
}

impl<S: ChunkStore> Retriever<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Top-k chunks of `patient_id` by cosine similarity to `query`.
    ///
    /// Highest score first, equal scores by ascending chunk id. A patient
    /// with no chunks yields an empty list.
    pub fn retrieve(
        &self,
        patient_id: &Uuid,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RagError> {
        let k = k.clamp(1, MAX_TOP_K);
        let chunks = self.store.chunks_for_patient(patient_id)?;

        let mut scored = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.len() != query.len() {
                return Err(RagError::DimensionMismatch {
                    expected: chunk.embedding.len(),
                    actual: query.len(),
                });
            }
            let score = cosine_similarity(query, &chunk.embedding);
            scored.push(RetrievalResult { chunk, score });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Embed the question, then retrieve.
    pub fn search<E: EmbeddingModel + ?Sized>(
        &self,
        embedder: &E,
        patient_id: &Uuid,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RagError> {
        let query = embedder
            .embed(question)
            .map_err(|e| RagError::EmbeddingFailed(e.to_string()))?;
        self.retrieve(patient_id, &query, k)
    }
}

/// Cosine similarity in [-1, 1]. A zero vector scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
