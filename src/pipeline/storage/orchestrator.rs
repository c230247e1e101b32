use std::time::Duration;

use sha2::{Digest, Sha256};

use super::types::{ChunkStore, Chunker, EmbeddingModel, IndexReport};
use super::StorageError;
use crate::models::{ChunkDraft, ChunkSet, Conversation, EmbeddedChunk, StoredNote};

/// Backoff schedule for embedding calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts (tests).
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Orchestrates indexing of one conversation:
/// chunk → fingerprint → embed (with retry) → atomic swap.
///
/// Everything is computed before the store is touched, so any failure
/// leaves the previously stored set in place.
pub struct ChunkIndexer<C: Chunker, E: EmbeddingModel, S: ChunkStore> {
    chunker: C,
    embedder: E,
    store: S,
    expected_dimension: usize,
    retry: RetryPolicy,
}

impl<C: Chunker, E: EmbeddingModel, S: ChunkStore> ChunkIndexer<C, E, S> {
    pub fn new(chunker: C, embedder: E, store: S, expected_dimension: usize) -> Self {
        Self {
            chunker,
            embedder,
            store,
            expected_dimension,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn index(
        &self,
        conversation: &Conversation,
        note: &StoredNote,
    ) -> Result<IndexReport, StorageError> {
        let epoch = note.version;
        let _span = tracing::info_span!(
            "index_conversation",
            conversation_id = %conversation.id,
            epoch
        )
        .entered();

        let drafts = self.chunker.chunk(&note.note, &conversation.turns);
        let fingerprint = fingerprint(&drafts);

        if let Some(stored) = self.store.set_info(&conversation.id)? {
            if stored.epoch == epoch && stored.fingerprint == fingerprint {
                tracing::info!(chunks = stored.count, "Chunk set unchanged, skipping re-index");
                return Ok(IndexReport {
                    conversation_id: conversation.id,
                    epoch,
                    chunks_indexed: stored.count,
                    unchanged: true,
                });
            }
            if stored.epoch > epoch {
                tracing::warn!(stored_epoch = stored.epoch, "Stored chunk set is newer, not replacing");
                return Ok(IndexReport {
                    conversation_id: conversation.id,
                    epoch: stored.epoch,
                    chunks_indexed: stored.count,
                    unchanged: true,
                });
            }
        }

        let embeddings = self.embed_all(&drafts)?;
        let set = ChunkSet {
            conversation_id: conversation.id,
            patient_id: conversation.patient_id,
            epoch,
            fingerprint,
            entries: drafts
                .into_iter()
                .zip(embeddings)
                .map(|(draft, embedding)| EmbeddedChunk { draft, embedding })
                .collect(),
        };

        let stored = self.store.replace_set(&set)?;
        tracing::info!(chunks = stored.len(), "Chunk set indexed");

        Ok(IndexReport {
            conversation_id: conversation.id,
            epoch,
            chunks_indexed: stored.len(),
            unchanged: false,
        })
    }

    fn embed_all(&self, drafts: &[ChunkDraft]) -> Result<Vec<Vec<f32>>, StorageError> {
        if self.embedder.dimension() != self.expected_dimension {
            return Err(StorageError::DimensionMismatch {
                expected: self.expected_dimension,
                actual: self.embedder.dimension(),
            });
        }
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = drafts.iter().map(|d| d.text.as_str()).collect();
        let embeddings = embed_with_retry(&self.embedder, &texts, self.retry)?;

        if embeddings.len() != drafts.len() {
            return Err(StorageError::Embedding(format!(
                "expected {} embeddings, got {}",
                drafts.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.expected_dimension) {
            return Err(StorageError::DimensionMismatch {
                expected: self.expected_dimension,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }
}

/// Call `embed_batch`, retrying transient failures with doubling delay.
pub fn embed_with_retry<E: EmbeddingModel + ?Sized>(
    embedder: &E,
    texts: &[&str],
    retry: RetryPolicy,
) -> Result<Vec<Vec<f32>>, StorageError> {
    let mut delay = retry.initial_delay;
    let mut attempt = 1;
    loop {
        match embedder.embed_batch(texts) {
            Ok(embeddings) => return Ok(embeddings),
            Err(e) if e.is_retryable() && attempt < retry.attempts => {
                tracing::warn!(attempt, error = %e, "Embedding failed, retrying");
                std::thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// SHA-256 over the ordered (source, text) pairs, hex encoded.
pub fn fingerprint(drafts: &[ChunkDraft]) -> String {
    let mut hasher = Sha256::new();
    for draft in drafts {
        hasher.update(draft.source.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(draft.text.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
