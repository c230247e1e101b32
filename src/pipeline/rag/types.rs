use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RetrievalResult;

/// A clinician's question about one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicianQuery {
    pub patient_id: Uuid,
    pub question: String,
    pub k: Option<usize>,
}

/// Grounded answer plus the evidence that was placed in front of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    /// Exactly the chunks that made it into the context, in rank order.
    pub chunks: Vec<RetrievalResult>,
    /// Context labels (`chunk N`) the answer actually refers to.
    pub cited: Vec<String>,
}

impl QaAnswer {
    pub fn insufficient(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            chunks: Vec::new(),
            cited: Vec::new(),
        }
    }
}

/// Context text ready for the prompt, with the chunks it was built from.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub chunks_included: Vec<RetrievalResult>,
    /// `chunk 1`, `chunk 2`, ... aligned with `chunks_included`.
    pub labels: Vec<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.chunks_included.is_empty()
    }
}
