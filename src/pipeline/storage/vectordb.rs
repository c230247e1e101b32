use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::types::ChunkStore;
use super::StorageError;
use crate::db::{self, StoredSetInfo};
use crate::models::{Chunk, ChunkSet};

/// Reject sets whose embeddings do not share one dimension.
fn check_uniform(set: &ChunkSet) -> Result<(), StorageError> {
    if !set.is_empty() && set.dimension().is_none() {
        return Err(StorageError::VectorDb(format!(
            "chunk set for conversation {} mixes embedding dimensions",
            set.conversation_id
        )));
    }
    Ok(())
}

/// In-memory chunk store. A set swap happens under one write lock.
pub struct InMemoryChunkStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    sets: HashMap<Uuid, MemorySet>,
}

struct MemorySet {
    patient_id: Uuid,
    info: StoredSetInfo,
    chunks: Arc<Vec<Chunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                next_id: 1,
                sets: HashMap::new(),
            }),
        }
    }

    pub fn count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.sets.values().map(|s| s.chunks.len()).sum())
            .unwrap_or(0)
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn replace_set(&self, set: &ChunkSet) -> Result<Vec<Chunk>, StorageError> {
        check_uniform(set)?;
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        let mut chunks = Vec::with_capacity(set.len());
        for (ordinal, entry) in set.entries.iter().enumerate() {
            chunks.push(Chunk {
                id: inner.next_id,
                conversation_id: set.conversation_id,
                patient_id: set.patient_id,
                source: entry.draft.source,
                field_group: entry.draft.field_group,
                ordinal: ordinal as u32,
                text: entry.draft.text.clone(),
                embedding: entry.embedding.clone(),
                epoch: set.epoch,
            });
            inner.next_id += 1;
        }

        let stored = chunks.clone();
        if chunks.is_empty() {
            inner.sets.remove(&set.conversation_id);
        } else {
            inner.sets.insert(
                set.conversation_id,
                MemorySet {
                    patient_id: set.patient_id,
                    info: StoredSetInfo {
                        epoch: set.epoch,
                        fingerprint: set.fingerprint.clone(),
                        count: chunks.len(),
                    },
                    chunks: Arc::new(chunks),
                },
            );
        }
        Ok(stored)
    }

    fn set_info(&self, conversation_id: &Uuid) -> Result<Option<StoredSetInfo>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner.sets.get(conversation_id).map(|s| s.info.clone()))
    }

    fn chunks_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Chunk>, StorageError> {
        let sets: Vec<Arc<Vec<Chunk>>> = {
            let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
            inner
                .sets
                .values()
                .filter(|s| s.patient_id == *patient_id)
                .map(|s| Arc::clone(&s.chunks))
                .collect()
        };
        let mut chunks: Vec<Chunk> = sets.iter().flat_map(|s| s.iter().cloned()).collect();
        chunks.sort_by_key(|c| c.id);
        Ok(chunks)
    }
}

/// SQLite-backed chunk store. Opens a connection per call; the swap runs in
/// one transaction.
pub struct SqliteChunkStore {
    db_path: PathBuf,
}

impl SqliteChunkStore {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    fn open(&self) -> Result<rusqlite::Connection, StorageError> {
        Ok(db::open_database(&self.db_path)?)
    }
}

impl ChunkStore for SqliteChunkStore {
    fn replace_set(&self, set: &ChunkSet) -> Result<Vec<Chunk>, StorageError> {
        check_uniform(set)?;
        let conn = self.open()?;
        Ok(db::replace_chunk_set(&conn, set)?)
    }

    fn set_info(&self, conversation_id: &Uuid) -> Result<Option<StoredSetInfo>, StorageError> {
        let conn = self.open()?;
        Ok(db::get_chunk_set_info(&conn, conversation_id)?)
    }

    fn chunks_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Chunk>, StorageError> {
        let conn = self.open()?;
        Ok(db::get_chunks_for_patient(&conn, patient_id)?)
    }
}
