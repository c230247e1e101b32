use super::citation::extract_cited_labels;
use super::context::{assemble_context, MAX_CONTEXT_CHARS};
use super::prompt::{build_qa_prompt, INSUFFICIENT_INFO_ANSWER, QA_SYSTEM_PROMPT};
use super::retrieval::{clamp_top_k, Retriever};
use super::types::{ClinicianQuery, QaAnswer};
use super::RagError;
use crate::pipeline::storage::types::{ChunkStore, EmbeddingModel};
use crate::pipeline::structuring::{truncate_chars, LlmClient, ResponseFormat};

/// Longest question passed on to embedding and generation.
pub const MAX_QUESTION_CHARS: usize = 2_000;

/// Grounded question answering over one patient's chunks.
///
/// embed → retrieve → assemble → generate → cite.
pub struct QaOrchestrator<G: LlmClient, E: EmbeddingModel, S: ChunkStore> {
    llm: G,
    model: String,
    embedder: E,
    retriever: Retriever<S>,
    context_budget: usize,
}

impl<G: LlmClient, E: EmbeddingModel, S: ChunkStore> QaOrchestrator<G, E, S> {
    pub fn new(llm: G, model: &str, embedder: E, store: S) -> Self {
        Self {
            llm,
            model: model.to_string(),
            embedder,
            retriever: Retriever::new(store),
            context_budget: MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_context_budget(mut self, chars: usize) -> Self {
        self.context_budget = chars;
        self
    }

    pub fn answer(&self, query: &ClinicianQuery) -> Result<QaAnswer, RagError> {
        let _span = tracing::info_span!("qa_answer", patient_id = %query.patient_id).entered();

        let question = truncate_chars(query.question.trim(), MAX_QUESTION_CHARS);
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }
        let k = clamp_top_k(query.k);

        let retrieved = self
            .retriever
            .search(&self.embedder, &query.patient_id, &question, k)?;
        if retrieved.is_empty() {
            tracing::info!("No chunks for patient, returning insufficient-information answer");
            return Ok(QaAnswer::insufficient(INSUFFICIENT_INFO_ANSWER));
        }

        let context = assemble_context(&retrieved, self.context_budget);
        if context.is_empty() {
            return Ok(QaAnswer::insufficient(INSUFFICIENT_INFO_ANSWER));
        }

        let prompt = build_qa_prompt(&question, &context);
        tracing::debug!(prompt_chars = prompt.chars().count(), "QA prompt assembled");

        let raw = self
            .llm
            .generate(&self.model, &prompt, QA_SYSTEM_PROMPT, ResponseFormat::Text)
            .map_err(|e| {
                tracing::warn!(error = %e, "QA generation failed");
                RagError::Generation(e)
            })?;

        let answer = raw.trim().to_string();
        let cited = extract_cited_labels(&answer, &context);

        tracing::info!(
            retrieved = retrieved.len(),
            in_context = context.chunks_included.len(),
            cited = cited.len(),
            "QA answer generated"
        );

        Ok(QaAnswer {
            answer,
            chunks: context.chunks_included,
            cited,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::models::enums::ChunkSource;
    use crate::models::{ChunkDraft, ChunkSet, EmbeddedChunk};
    use crate::pipeline::storage::embedder::{HashingEmbedder, MockEmbedder};
    use crate::pipeline::storage::vectordb::InMemoryChunkStore;
    use crate::pipeline::structuring::{ScriptedLlmClient, StructuringError};

    fn store_texts(
        store: &InMemoryChunkStore,
        embedder: &dyn EmbeddingModel,
        patient: Uuid,
        texts: &[(&str, ChunkSource)],
    ) {
        let entries = texts
            .iter()
            .map(|(text, source)| EmbeddedChunk {
                draft: ChunkDraft {
                    source: *source,
                    field_group: None,
                    text: text.to_string(),
                },
                embedding: embedder.embed(text).unwrap(),
            })
            .collect();
        store
            .replace_set(&ChunkSet {
                conversation_id: Uuid::new_v4(),
                patient_id: patient,
                epoch: 1,
                fingerprint: "fp".into(),
                entries,
            })
            .unwrap();
    }

    fn query(patient: Uuid, question: &str) -> ClinicianQuery {
        ClinicianQuery {
            patient_id: patient,
            question: question.into(),
            k: None,
        }
    }

    #[test]
    fn no_chunks_short_circuits_without_generation() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let store = InMemoryChunkStore::new();
        let qa = QaOrchestrator::new(llm.clone(), "m", MockEmbedder::new(), &store);

        let answer = qa.answer(&query(Uuid::new_v4(), "Any allergies?")).unwrap();
        assert_eq!(answer.answer, INSUFFICIENT_INFO_ANSWER);
        assert!(answer.chunks.is_empty());
        assert!(answer.cited.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn answer_carries_context_chunks_and_citations() {
        let embedder = HashingEmbedder::new(64);
        let store = InMemoryChunkStore::new();
        let patient = Uuid::new_v4();
        store_texts(
            &store,
            &embedder,
            patient,
            &[
                ("Chief complaint: throbbing headache", ChunkSource::StructuredField),
                ("Allergies: penicillin, reaction: hives", ChunkSource::StructuredField),
            ],
        );
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(
            "  A throbbing headache [chunk 1]. Also see [chunk 7].  ".into(),
        )]));
        let qa = QaOrchestrator::new(llm.clone(), "m", HashingEmbedder::new(64), &store);

        let answer = qa
            .answer(&query(patient, "What kind of headache does the patient have?"))
            .unwrap();

        assert_eq!(answer.answer, "A throbbing headache [chunk 1]. Also see [chunk 7].");
        assert_eq!(answer.chunks.len(), 2);
        assert_eq!(answer.chunks[0].chunk.text, "Chief complaint: throbbing headache");
        assert_eq!(answer.cited, vec!["chunk 1"]);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[chunk 1 | structured-field]\nChief complaint: throbbing headache"));
    }

    #[test]
    fn k_limits_the_evidence() {
        let embedder = MockEmbedder::with_dimension(16);
        let store = InMemoryChunkStore::new();
        let patient = Uuid::new_v4();
        let texts: Vec<(String, ChunkSource)> = (0..12)
            .map(|i| (format!("note line {i}"), ChunkSource::StructuredField))
            .collect();
        let borrowed: Vec<(&str, ChunkSource)> =
            texts.iter().map(|(t, s)| (t.as_str(), *s)).collect();
        store_texts(&store, &embedder, patient, &borrowed);

        let qa = QaOrchestrator::new(
            MockLlmAnswer,
            "m",
            MockEmbedder::with_dimension(16),
            &store,
        );
        let mut q = query(patient, "note line");
        q.k = Some(3);
        assert_eq!(qa.answer(&q).unwrap().chunks.len(), 3);
        q.k = Some(100);
        assert_eq!(qa.answer(&q).unwrap().chunks.len(), 10);
    }

    struct MockLlmAnswer;

    impl LlmClient for MockLlmAnswer {
        fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _system: &str,
            _format: ResponseFormat,
        ) -> Result<String, StructuringError> {
            Ok("Noted [chunk 1].".into())
        }
    }

    #[test]
    fn generation_timeout_is_retryable() {
        let embedder = MockEmbedder::with_dimension(8);
        let store = InMemoryChunkStore::new();
        let patient = Uuid::new_v4();
        store_texts(&store, &embedder, patient, &[("headache", ChunkSource::PatientUtterances)]);
        let llm = ScriptedLlmClient::new(vec![Err(StructuringError::Timeout(30))]);
        let qa = QaOrchestrator::new(llm, "m", MockEmbedder::with_dimension(8), &store);

        let err = qa.answer(&query(patient, "headache?")).unwrap_err();
        assert!(matches!(err, RagError::Generation(StructuringError::Timeout(30))));
        assert!(err.is_retryable());
    }

    #[test]
    fn blank_question_is_rejected() {
        let store = InMemoryChunkStore::new();
        let qa = QaOrchestrator::new(MockLlmAnswer, "m", MockEmbedder::new(), &store);
        assert!(matches!(
            qa.answer(&query(Uuid::new_v4(), "   ")),
            Err(RagError::EmptyQuestion)
        ));
    }

    #[test]
    fn long_questions_are_truncated_before_prompting() {
        let embedder = MockEmbedder::with_dimension(8);
        let store = InMemoryChunkStore::new();
        let patient = Uuid::new_v4();
        store_texts(&store, &embedder, patient, &[("headache", ChunkSource::PatientUtterances)]);
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("ok".into())]));
        let qa = QaOrchestrator::new(llm.clone(), "m", MockEmbedder::with_dimension(8), &store);

        let long = "q".repeat(MAX_QUESTION_CHARS + 500);
        qa.answer(&query(patient, &long)).unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains(&"q".repeat(MAX_QUESTION_CHARS)));
        assert!(!prompt.contains(&"q".repeat(MAX_QUESTION_CHARS + 1)));
    }
}
