use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Anamnesis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Embedding dimension of all-MiniLM-L6-v2 and the default for every backend.
pub const EMBEDDING_DIM: usize = 384;

const ENV_PREFIX: &str = "ANAMNESIS_";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_GENERATION_MODEL: &str = "llama3.1:8b";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "anamnesis_lib=debug,anamnesis=debug,tower_http=info,warn"
    } else {
        "anamnesis_lib=info,anamnesis=info,warn"
    }
}

/// Get the application data directory.
/// Platform data dir (e.g. ~/.local/share/anamnesis), falling back to ~/.anamnesis.
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|d| d.join("anamnesis"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".anamnesis")))
        .ok_or(ConfigError::NoDataDir)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot determine a data directory; set {ENV_PREFIX}DATA_DIR")]
    NoDataDir,

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Which embedding capability to wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Ollama `/api/embeddings`.
    Ollama,
    /// Local all-MiniLM-L6-v2 (requires the `onnx-embeddings` feature).
    Onnx,
    /// Offline lexical hashing embedder.
    Hashing,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "onnx" => Ok(Self::Onnx),
            "hashing" => Ok(Self::Hashing),
            other => Err(format!("unknown embedding backend `{other}`")),
        }
    }
}

/// Runtime configuration, read from `ANAMNESIS_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub ollama_url: String,
    pub generation_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub generation_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub default_top_k: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Keys carry the `ANAMNESIS_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = match get("DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        Ok(Self {
            data_dir,
            bind_addr: parse_or("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR)?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            generation_model: get("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.into()),
            embedding_backend: parse_or("EMBEDDING_BACKEND", get("EMBEDDING_BACKEND"), "ollama")?,
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            embedding_dim: positive(
                "EMBEDDING_DIM",
                parse_or("EMBEDDING_DIM", get("EMBEDDING_DIM"), &EMBEDDING_DIM.to_string())?,
            )?,
            generation_timeout_secs: positive(
                "GENERATION_TIMEOUT_SECS",
                parse_or(
                    "GENERATION_TIMEOUT_SECS",
                    get("GENERATION_TIMEOUT_SECS"),
                    &DEFAULT_GENERATION_TIMEOUT_SECS.to_string(),
                )?,
            )?,
            embedding_timeout_secs: positive(
                "EMBEDDING_TIMEOUT_SECS",
                parse_or(
                    "EMBEDDING_TIMEOUT_SECS",
                    get("EMBEDDING_TIMEOUT_SECS"),
                    &DEFAULT_EMBEDDING_TIMEOUT_SECS.to_string(),
                )?,
            )?,
            default_top_k: parse_or(
                "TOP_K",
                get("TOP_K"),
                &crate::pipeline::rag::DEFAULT_TOP_K.to_string(),
            )?,
        })
    }

    /// SQLite database file inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("anamnesis.db")
    }

    /// Directory expected to hold `model.onnx` and `tokenizer.json`.
    pub fn onnx_model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join("all-MiniLM-L6-v2")
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{name}"),
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn positive<T: PartialEq + Default + std::fmt::Display>(name: &str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key: format!("{ENV_PREFIX}{name}"),
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
