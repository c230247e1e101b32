use super::types::AssembledContext;

/// Returned when retrieval finds nothing for the patient. No generation call
/// is made in that case.
pub const INSUFFICIENT_INFO_ANSWER: &str =
    "I couldn't find any information about that in this patient's records.";

pub const QA_SYSTEM_PROMPT: &str = r#"You are assisting a clinician who is reviewing a single patient's intake record. You are given excerpts from that patient's intake conversation and structured note.

RULES:
1. Answer ONLY from the provided excerpts. Do not use outside medical knowledge to fill gaps.
2. If the excerpts do not clearly support an answer, say that the record does not say.
3. Keep answers short and direct (one or two sentences).
4. Cite the excerpts that support each statement as [chunk N].
5. Summarise what the patient said; do not quote long passages verbatim.
6. Do not diagnose or recommend treatment."#;

/// User prompt for a grounded answer.
pub fn build_qa_prompt(question: &str, context: &AssembledContext) -> String {
    format!(
        "Clinician's question: {question}\n\n\
         Excerpts from this patient's record:\n\
         <context>\n{}\n</context>\n\n\
         Answer using only these excerpts and cite them as [chunk N]. \
         If they do not contain the answer, say so clearly.",
        context.text
    )
}
