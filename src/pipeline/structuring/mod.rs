pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod types;
pub mod validation;

pub use ollama::*;
pub use orchestrator::*;
pub use parser::*;
pub use prompt::*;
pub use sanitize::*;
pub use types::*;
pub use validation::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Malformed model output: {0}")]
    MalformedResponse(String),

    #[error("Note does not match schema: {0}")]
    SchemaViolation(String),
}

impl StructuringError {
    /// Failure of the generation capability itself, as opposed to bad output.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            StructuringError::OllamaConnection(_)
                | StructuringError::Timeout(_)
                | StructuringError::OllamaError { .. }
                | StructuringError::HttpClient(_)
                | StructuringError::ResponseParsing(_)
        )
    }
}
