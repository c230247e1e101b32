// Field-by-field schema check for model-produced notes, followed by
// normalisation of the accepted note.

use serde_json::{Map, Value};

use super::StructuringError;
use crate::models::{Allergy, Medication, StructuredNote, Symptom};

const TOP_LEVEL_KEYS: &[&str] = &[
    "chief_complaint",
    "symptoms",
    "medications",
    "allergies",
    "past_medical_history",
    "family_history",
    "social_history",
    "red_flags",
    "patient_goals",
    "other_notes",
];

const LIST_KEYS: &[&str] = &[
    "symptoms",
    "medications",
    "allergies",
    "past_medical_history",
    "family_history",
    "social_history",
    "red_flags",
];

const MAX_SYMPTOMS: usize = 20;
const MAX_MEDICATIONS: usize = 30;
const MAX_ALLERGIES: usize = 20;
const MAX_LIST_ITEMS: usize = 30;

/// Check a parsed model answer against the note schema.
///
/// Rejects non-objects, unknown top-level keys, wrong value types and blank
/// required names. A `null` list is read as an empty list.
pub fn validate_note(value: Value) -> Result<StructuredNote, StructuringError> {
    let Value::Object(mut map) = value else {
        return Err(violation(format!("expected a JSON object, got {}", type_name(&value))));
    };

    if let Some(unknown) = map.keys().find(|k| !TOP_LEVEL_KEYS.contains(&k.as_str())) {
        return Err(violation(format!("unknown key `{unknown}`")));
    }

    null_lists_to_empty(&mut map);

    let note: StructuredNote = serde_json::from_value(Value::Object(map))
        .map_err(|e| violation(format!("wrong field type: {e}")))?;

    check_required_names(&note)?;
    Ok(note)
}

fn null_lists_to_empty(map: &mut Map<String, Value>) {
    for key in LIST_KEYS {
        if matches!(map.get(*key), Some(Value::Null)) {
            map.insert((*key).to_string(), Value::Array(Vec::new()));
        }
    }
}

fn check_required_names(note: &StructuredNote) -> Result<(), StructuringError> {
    if let Some(i) = note.symptoms.iter().position(|s| s.name.trim().is_empty()) {
        return Err(violation(format!("symptoms[{i}].name is blank")));
    }
    if let Some(i) = note.medications.iter().position(|m| m.name.trim().is_empty()) {
        return Err(violation(format!("medications[{i}].name is blank")));
    }
    if let Some(i) = note.allergies.iter().position(|a| a.substance.trim().is_empty()) {
        return Err(violation(format!("allergies[{i}].substance is blank")));
    }
    Ok(())
}

fn violation(reason: String) -> StructuringError {
    StructuringError::SchemaViolation(reason)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trim strings, turn empty strings into `None`, drop duplicate list entries
/// (first occurrence wins) and cap entity counts.
pub fn normalise_note(note: StructuredNote) -> StructuredNote {
    let mut symptoms: Vec<Symptom> = note.symptoms.into_iter().map(normalise_symptom).collect();
    dedup_by_key(&mut symptoms, |s| s.name.to_lowercase());
    cap("symptoms", &mut symptoms, MAX_SYMPTOMS);

    let mut medications: Vec<Medication> = note
        .medications
        .into_iter()
        .map(|m| Medication {
            name: m.name.trim().to_string(),
            dose: clean_opt(m.dose),
            frequency: clean_opt(m.frequency),
            route: clean_opt(m.route),
            indication: clean_opt(m.indication),
        })
        .collect();
    dedup_by_key(&mut medications, |m| m.name.to_lowercase());
    cap("medications", &mut medications, MAX_MEDICATIONS);

    let mut allergies: Vec<Allergy> = note
        .allergies
        .into_iter()
        .map(|a| Allergy {
            substance: a.substance.trim().to_string(),
            reaction: clean_opt(a.reaction),
            severity: clean_opt(a.severity),
        })
        .collect();
    dedup_by_key(&mut allergies, |a| a.substance.to_lowercase());
    cap("allergies", &mut allergies, MAX_ALLERGIES);

    StructuredNote {
        chief_complaint: clean_opt(note.chief_complaint),
        symptoms,
        medications,
        allergies,
        past_medical_history: clean_list(note.past_medical_history),
        family_history: clean_list(note.family_history),
        social_history: clean_list(note.social_history),
        red_flags: clean_list(note.red_flags),
        patient_goals: clean_opt(note.patient_goals),
        other_notes: clean_opt(note.other_notes),
    }
}

fn normalise_symptom(s: Symptom) -> Symptom {
    Symptom {
        name: s.name.trim().to_string(),
        onset: clean_opt(s.onset),
        duration: clean_opt(s.duration),
        location: clean_opt(s.location),
        character: clean_opt(s.character),
        severity: clean_opt(s.severity),
        aggravating_factors: clean_opt(s.aggravating_factors),
        relieving_factors: clean_opt(s.relieving_factors),
        associated_symptoms: clean_list(s.associated_symptoms),
        red_flags: clean_list(s.red_flags),
    }
}

fn clean_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    dedup_by_key(&mut out, |i| i.to_lowercase());
    cap("list", &mut out, MAX_LIST_ITEMS);
    out
}

fn dedup_by_key<T, K: PartialEq>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen: Vec<K> = Vec::with_capacity(items.len());
    items.retain(|item| {
        let k = key(item);
        if seen.contains(&k) {
            false
        } else {
            seen.push(k);
            true
        }
    });
}

fn cap<T>(field: &str, items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        tracing::warn!(field, count = items.len(), max, "Excessive entities capped");
        items.truncate(max);
    }
}
