use super::types::Chunker;
use crate::models::enums::{ChunkSource, FieldGroup};
use crate::models::{ChunkDraft, StructuredNote, Symptom, Turn};
use crate::pipeline::intake::{assistant_text, patient_text};

/// Fixed-layout chunker for intake notes.
///
/// Emits at most one structured chunk per field group, in a fixed group
/// order, followed by the aggregated patient and assistant utterances.
/// Empty groups produce no chunk. Same input, same output.
pub struct NoteChunker;

impl Chunker for NoteChunker {
    fn chunk(&self, note: &StructuredNote, turns: &[Turn]) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();

        let groups: [(FieldGroup, Option<String>); 7] = [
            (FieldGroup::ChiefComplaint, render_chief_complaint(note)),
            (FieldGroup::Symptoms, render_symptoms(&note.symptoms)),
            (FieldGroup::Medications, render_medications(note)),
            (FieldGroup::Allergies, render_allergies(note)),
            (FieldGroup::Histories, render_histories(note)),
            (FieldGroup::RedFlags, render_red_flags(note)),
            (FieldGroup::GoalsAndNotes, render_goals_and_notes(note)),
        ];
        for (group, text) in groups {
            if let Some(text) = text {
                drafts.push(ChunkDraft {
                    source: ChunkSource::StructuredField,
                    field_group: Some(group),
                    text,
                });
            }
        }

        let patient = patient_text(turns);
        if !patient.trim().is_empty() {
            drafts.push(ChunkDraft {
                source: ChunkSource::PatientUtterances,
                field_group: None,
                text: format!("Patient statements:\n{patient}"),
            });
        }

        let assistant = assistant_text(turns);
        if !assistant.trim().is_empty() {
            drafts.push(ChunkDraft {
                source: ChunkSource::AssistantUtterances,
                field_group: None,
                text: format!("Questions asked:\n{assistant}"),
            });
        }

        drafts
    }
}

fn render_chief_complaint(note: &StructuredNote) -> Option<String> {
    note.chief_complaint
        .as_deref()
        .map(|cc| format!("Chief complaint: {cc}"))
}

fn render_symptoms(symptoms: &[Symptom]) -> Option<String> {
    if symptoms.is_empty() {
        return None;
    }
    let rendered: Vec<String> = symptoms.iter().map(render_symptom).collect();
    Some(format!("Symptoms: {}", rendered.join(" | ")))
}

fn render_symptom(s: &Symptom) -> String {
    let mut parts = vec![format!("name: {}", s.name)];
    let optional = [
        ("onset", &s.onset),
        ("duration", &s.duration),
        ("location", &s.location),
        ("character", &s.character),
        ("severity", &s.severity),
        ("worse with", &s.aggravating_factors),
        ("better with", &s.relieving_factors),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            parts.push(format!("{label}: {v}"));
        }
    }
    if !s.associated_symptoms.is_empty() {
        parts.push(format!("associated: {}", s.associated_symptoms.join(", ")));
    }
    parts.join("; ")
}

fn render_medications(note: &StructuredNote) -> Option<String> {
    if note.medications.is_empty() {
        return None;
    }
    let rendered: Vec<String> = note
        .medications
        .iter()
        .map(|m| {
            let mut parts = vec![m.name.clone()];
            parts.extend(m.dose.clone());
            parts.extend(m.frequency.clone());
            parts.extend(m.route.clone());
            if let Some(ind) = &m.indication {
                parts.push(format!("for {ind}"));
            }
            parts.join(", ")
        })
        .collect();
    Some(format!("Medications: {}", rendered.join("; ")))
}

fn render_allergies(note: &StructuredNote) -> Option<String> {
    if note.allergies.is_empty() {
        return None;
    }
    let rendered: Vec<String> = note
        .allergies
        .iter()
        .map(|a| {
            let mut parts = vec![a.substance.clone()];
            if let Some(r) = &a.reaction {
                parts.push(format!("reaction: {r}"));
            }
            if let Some(s) = &a.severity {
                parts.push(format!("severity: {s}"));
            }
            parts.join(", ")
        })
        .collect();
    Some(format!("Allergies: {}", rendered.join("; ")))
}

fn render_histories(note: &StructuredNote) -> Option<String> {
    let sections = [
        ("Past medical history", &note.past_medical_history),
        ("Family history", &note.family_history),
        ("Social history", &note.social_history),
    ];
    let lines: Vec<String> = sections
        .iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(label, items)| format!("{label}: {}", items.join("; ")))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Note-level red flags first, then per-symptom flags not already listed.
fn render_red_flags(note: &StructuredNote) -> Option<String> {
    let mut flags: Vec<String> = note.red_flags.clone();
    for symptom in &note.symptoms {
        for flag in &symptom.red_flags {
            let labelled = format!("{flag} ({})", symptom.name);
            if !flags.iter().any(|f| f.eq_ignore_ascii_case(flag)) && !flags.contains(&labelled) {
                flags.push(labelled);
            }
        }
    }
    (!flags.is_empty()).then(|| format!("Red flags: {}", flags.join("; ")))
}

fn render_goals_and_notes(note: &StructuredNote) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(goals) = &note.patient_goals {
        lines.push(format!("Patient goals: {goals}"));
    }
    if let Some(other) = &note.other_notes {
        lines.push(format!("Other notes: {other}"));
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Stage, TurnRole};
    use crate::models::{Allergy, Medication};

    fn turns() -> Vec<Turn> {
        vec![
            Turn { seq: 0, role: TurnRole::Assistant, stage: Stage::ChiefComplaint, text: "What brings you in?".into() },
            Turn { seq: 1, role: TurnRole::Patient, stage: Stage::ChiefComplaint, text: "Headache".into() },
            Turn { seq: 2, role: TurnRole::Assistant, stage: Stage::SymptomDetails, text: "When did it start?".into() },
            Turn { seq: 3, role: TurnRole::Patient, stage: Stage::SymptomDetails, text: "Three days ago".into() },
        ]
    }

    fn full_note() -> StructuredNote {
        StructuredNote {
            chief_complaint: Some("headache".into()),
            symptoms: vec![Symptom {
                name: "headache".into(),
                onset: Some("three days ago".into()),
                severity: Some("7/10".into()),
                red_flags: vec!["worst headache of life".into()],
                ..Symptom::default()
            }],
            medications: vec![Medication {
                name: "ibuprofen".into(),
                dose: Some("400mg".into()),
                frequency: Some("as needed".into()),
                ..Medication::default()
            }],
            allergies: vec![Allergy {
                substance: "penicillin".into(),
                reaction: Some("rash".into()),
                severity: None,
            }],
            past_medical_history: vec!["migraine".into()],
            family_history: vec![],
            social_history: vec!["non-smoker".into()],
            red_flags: vec![],
            patient_goals: Some("pain relief".into()),
            other_notes: None,
        }
    }

    #[test]
    fn one_chunk_per_non_empty_group_plus_utterances() {
        let drafts = NoteChunker.chunk(&full_note(), &turns());
        let groups: Vec<Option<FieldGroup>> = drafts.iter().map(|d| d.field_group).collect();
        assert_eq!(
            groups,
            vec![
                Some(FieldGroup::ChiefComplaint),
                Some(FieldGroup::Symptoms),
                Some(FieldGroup::Medications),
                Some(FieldGroup::Allergies),
                Some(FieldGroup::Histories),
                Some(FieldGroup::RedFlags),
                Some(FieldGroup::GoalsAndNotes),
                None,
                None,
            ]
        );
        assert_eq!(drafts[7].source, ChunkSource::PatientUtterances);
        assert_eq!(drafts[8].source, ChunkSource::AssistantUtterances);
    }

    #[test]
    fn empty_groups_are_skipped() {
        let note = StructuredNote::heuristic(Some("cough".into()));
        let drafts = NoteChunker.chunk(&note, &turns());
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].text, "Chief complaint: cough");
    }

    #[test]
    fn rendering_formats() {
        let drafts = NoteChunker.chunk(&full_note(), &[]);
        assert_eq!(
            drafts[1].text,
            "Symptoms: name: headache; onset: three days ago; severity: 7/10"
        );
        assert_eq!(drafts[2].text, "Medications: ibuprofen, 400mg, as needed");
        assert_eq!(drafts[3].text, "Allergies: penicillin, reaction: rash");
        assert_eq!(
            drafts[4].text,
            "Past medical history: migraine\nSocial history: non-smoker"
        );
        assert_eq!(drafts[5].text, "Red flags: worst headache of life (headache)");
    }

    #[test]
    fn utterance_chunks_keep_sequence_order() {
        let drafts = NoteChunker.chunk(&StructuredNote::default(), &turns());
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "Patient statements:\nHeadache\nThree days ago");
        assert_eq!(drafts[1].text, "Questions asked:\nWhat brings you in?\nWhen did it start?");
    }

    #[test]
    fn chunking_is_deterministic() {
        let a = NoteChunker.chunk(&full_note(), &turns());
        let b = NoteChunker.chunk(&full_note(), &turns());
        assert_eq!(a, b);
    }
}
