//! Shared application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc` and handed to every
//! service call. It owns the capability clients, the chunk store and the
//! per-conversation lock registry; database connections are opened per call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, EmbeddingBackend};
use crate::db::{self, DatabaseError};
use crate::pipeline::intake::{IntakeError, TemplatePolicy};
use crate::pipeline::rag::RagError;
use crate::pipeline::storage::{
    ChunkStore, EmbeddingModel, HashingEmbedder, OllamaEmbedder, RetryPolicy, SqliteChunkStore,
    StorageError,
};
use crate::pipeline::structuring::{LlmClient, OllamaClient};

/// Above this many registry entries, idle locks are dropped on the next lookup.
const LOCK_REGISTRY_PRUNE_THRESHOLD: usize = 1024;

pub type SharedLlm = Arc<dyn LlmClient + Send + Sync>;
pub type SharedEmbedder = Arc<dyn EmbeddingModel + Send + Sync>;
pub type SharedChunkStore = Arc<dyn ChunkStore + Send + Sync>;

pub struct CoreState {
    db_path: PathBuf,
    llm: SharedLlm,
    embedder: SharedEmbedder,
    chunk_store: SharedChunkStore,
    policy: TemplatePolicy,
    locks: ConversationLocks,
    retry: RetryPolicy,
    pub generation_model: String,
    pub embedding_dim: usize,
    pub default_top_k: usize,
}

impl CoreState {
    /// Wire up Ollama generation, the configured embedding backend and the
    /// SQLite store under `config.data_dir`.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let llm = OllamaClient::new(&config.ollama_url, config.generation_timeout_secs)
            .map_err(|e| CoreError::Internal(format!("generation client: {e}")))?;

        let embedder: SharedEmbedder = match config.embedding_backend {
            EmbeddingBackend::Ollama => Arc::new(
                OllamaEmbedder::new(
                    &config.ollama_url,
                    &config.embedding_model,
                    config.embedding_dim,
                    config.embedding_timeout_secs,
                )
                .map_err(|e| CoreError::Internal(format!("embedding client: {e}")))?,
            ),
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embedding_dim)),
            EmbeddingBackend::Onnx => onnx_embedder(config)?,
        };

        Self::with_capabilities(config, Arc::new(llm), embedder)
    }

    /// Build state around already-constructed capabilities. Creates the data
    /// directory and brings the schema up to date.
    pub fn with_capabilities(
        config: &AppConfig,
        llm: SharedLlm,
        embedder: SharedEmbedder,
    ) -> Result<Self, CoreError> {
        if embedder.dimension() != config.embedding_dim {
            return Err(CoreError::Internal(format!(
                "embedder produces {} dimensions, configured for {}",
                embedder.dimension(),
                config.embedding_dim
            )));
        }

        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            CoreError::Internal(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;

        let db_path = config.database_path();
        // Migrate once up front so request handlers never race on schema creation.
        db::open_database(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database ready");

        Ok(Self {
            chunk_store: Arc::new(SqliteChunkStore::new(&db_path)),
            db_path,
            llm,
            embedder,
            policy: TemplatePolicy,
            locks: ConversationLocks::default(),
            retry: RetryPolicy::default(),
            generation_model: config.generation_model.clone(),
            embedding_dim: config.embedding_dim,
            default_top_k: config.default_top_k,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Open a database connection. Most service calls start here.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::from)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn llm(&self) -> SharedLlm {
        Arc::clone(&self.llm)
    }

    pub fn embedder(&self) -> SharedEmbedder {
        Arc::clone(&self.embedder)
    }

    pub fn chunk_store(&self) -> SharedChunkStore {
        Arc::clone(&self.chunk_store)
    }

    pub fn policy(&self) -> &TemplatePolicy {
        &self.policy
    }

    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

#[cfg(feature = "onnx-embeddings")]
fn onnx_embedder(config: &AppConfig) -> Result<SharedEmbedder, CoreError> {
    use crate::pipeline::storage::OnnxEmbedder;

    let embedder = OnnxEmbedder::load(&config.onnx_model_dir())
        .map_err(|e| CoreError::Internal(format!("onnx embedder: {e}")))?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx-embeddings"))]
fn onnx_embedder(_config: &AppConfig) -> Result<SharedEmbedder, CoreError> {
    Err(CoreError::Internal(
        "onnx embedding backend requires the `onnx-embeddings` feature".into(),
    ))
}

// ═══════════════════════════════════════════════════════════
// Per-conversation single-writer locks
// ═══════════════════════════════════════════════════════════

/// One mutex per conversation. `advance`, completion and re-index for the
/// same conversation run strictly one after another; different conversations
/// never block each other.
#[derive(Default)]
pub struct ConversationLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    /// The lock for `conversation_id`, created on first use.
    pub fn handle(&self, conversation_id: &Uuid) -> Result<Arc<Mutex<()>>, CoreError> {
        let mut map = self.inner.lock().map_err(|_| CoreError::LockPoisoned)?;
        if map.len() > LOCK_REGISTRY_PRUNE_THRESHOLD {
            // Only the registry holds these, so nobody is waiting on them.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(Arc::clone(map.entry(*conversation_id).or_default()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════
// Service-level error
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for CoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => {
                CoreError::NotFound(format!("{entity_type} {id}"))
            }
            other => CoreError::Database(other),
        }
    }
}

impl From<IntakeError> for CoreError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::ConversationComplete(_) => CoreError::InvalidState(e.to_string()),
            IntakeError::EmptyMessage => CoreError::InvalidInput(e.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Database(db) => db.into(),
            StorageError::LockPoisoned => CoreError::LockPoisoned,
            e if e.is_retryable() => CoreError::CapabilityUnavailable(e.to_string()),
            e => CoreError::Internal(e.to_string()),
        }
    }
}

impl From<RagError> for CoreError {
    fn from(e: RagError) -> Self {
        match e {
            RagError::EmptyQuestion => CoreError::InvalidInput(e.to_string()),
            RagError::Storage(storage) => storage.into(),
            e if e.is_retryable() => CoreError::CapabilityUnavailable(e.to_string()),
            e => CoreError::Internal(e.to_string()),
        }
    }
}
