use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::{ChunkSource, FieldGroup};
use crate::models::{Chunk, ChunkSet};

/// Epoch and fingerprint of the chunk set currently stored for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSetInfo {
    pub epoch: u32,
    pub fingerprint: String,
    pub count: usize,
}

/// Delete the conversation's chunks and insert the new set in one transaction.
///
/// Either the whole new set becomes visible or the previous set stays.
pub fn replace_chunk_set(conn: &Connection, set: &ChunkSet) -> Result<Vec<Chunk>, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM chunks WHERE conversation_id = ?1",
        params![set.conversation_id.to_string()],
    )?;

    let mut stored = Vec::with_capacity(set.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO chunks
             (conversation_id, patient_id, source_type, field_group, ordinal, text,
              embedding, dimension, epoch, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for (ordinal, entry) in set.entries.iter().enumerate() {
            stmt.execute(params![
                set.conversation_id.to_string(),
                set.patient_id.to_string(),
                entry.draft.source.as_str(),
                entry.draft.field_group.map(|g| g.as_str()),
                ordinal as u32,
                entry.draft.text,
                encode_embedding(&entry.embedding),
                entry.embedding.len() as i64,
                set.epoch,
                set.fingerprint,
            ])?;
            stored.push(Chunk {
                id: tx.last_insert_rowid(),
                conversation_id: set.conversation_id,
                patient_id: set.patient_id,
                source: entry.draft.source,
                field_group: entry.draft.field_group,
                ordinal: ordinal as u32,
                text: entry.draft.text.clone(),
                embedding: entry.embedding.clone(),
                epoch: set.epoch,
            });
        }
    }

    tx.commit()?;
    Ok(stored)
}

pub fn get_chunk_set_info(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Option<StoredSetInfo>, DatabaseError> {
    let (count, epoch, fingerprint): (i64, Option<u32>, Option<String>) = conn.query_row(
        "SELECT COUNT(*), MAX(epoch), MAX(fingerprint) FROM chunks WHERE conversation_id = ?1",
        params![conversation_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    match (epoch, fingerprint) {
        (Some(epoch), Some(fingerprint)) if count > 0 => Ok(Some(StoredSetInfo {
            epoch,
            fingerprint,
            count: count as usize,
        })),
        _ => Ok(None),
    }
}

/// All chunks of one patient, in ascending id order.
pub fn get_chunks_for_patient(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Chunk>, DatabaseError> {
    query_chunks(
        conn,
        "SELECT id, conversation_id, patient_id, source_type, field_group, ordinal, text,
                embedding, epoch
         FROM chunks WHERE patient_id = ?1 ORDER BY id ASC",
        patient_id,
    )
}

pub fn get_chunks_for_conversation(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Vec<Chunk>, DatabaseError> {
    query_chunks(
        conn,
        "SELECT id, conversation_id, patient_id, source_type, field_group, ordinal, text,
                embedding, epoch
         FROM chunks WHERE conversation_id = ?1 ORDER BY ordinal ASC",
        conversation_id,
    )
}

struct ChunkRow {
    id: i64,
    conversation_id: String,
    patient_id: String,
    source_type: String,
    field_group: Option<String>,
    ordinal: u32,
    text: String,
    embedding: Vec<u8>,
    epoch: u32,
}

fn query_chunks(conn: &Connection, sql: &str, key: &Uuid) -> Result<Vec<Chunk>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![key.to_string()], |row| {
        Ok(ChunkRow {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            patient_id: row.get(2)?,
            source_type: row.get(3)?,
            field_group: row.get(4)?,
            ordinal: row.get(5)?,
            text: row.get(6)?,
            embedding: row.get(7)?,
            epoch: row.get(8)?,
        })
    })?;

    let mut chunks = Vec::new();
    for row in rows {
        chunks.push(chunk_from_row(row?)?);
    }
    Ok(chunks)
}

fn chunk_from_row(row: ChunkRow) -> Result<Chunk, DatabaseError> {
    Ok(Chunk {
        id: row.id,
        conversation_id: parse_uuid("chunks.conversation_id", &row.conversation_id)?,
        patient_id: parse_uuid("chunks.patient_id", &row.patient_id)?,
        source: ChunkSource::from_str(&row.source_type)?,
        field_group: row.field_group.as_deref().map(FieldGroup::from_str).transpose()?,
        ordinal: row.ordinal,
        text: row.text,
        embedding: decode_embedding(&row.embedding)?,
        epoch: row.epoch,
    })
}

/// Little-endian f32 sequence.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, DatabaseError> {
    if bytes.len() % 4 != 0 {
        return Err(DatabaseError::Corrupt {
            field: "chunks.embedding".into(),
            reason: format!("blob length {} is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{create_conversation, insert_patient};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Stage;
    use crate::models::{ChunkDraft, Conversation, EmbeddedChunk, Patient};
    use chrono::Utc;

    fn setup(conn: &Connection) -> (Uuid, Uuid) {
        let now = Utc::now().naive_utc();
        let patient_id = Uuid::new_v4();
        insert_patient(conn, &Patient { id: patient_id, display_name: None, created_at: now }).unwrap();
        let conv = Conversation {
            id: Uuid::new_v4(),
            patient_id,
            stage: Stage::Done,
            stage_answers: 0,
            turns: vec![],
            is_complete: true,
            started_at: now,
            completed_at: Some(now),
        };
        create_conversation(conn, &conv).unwrap();
        (patient_id, conv.id)
    }

    fn make_set(patient_id: Uuid, conversation_id: Uuid, epoch: u32, texts: &[&str]) -> ChunkSet {
        ChunkSet {
            conversation_id,
            patient_id,
            epoch,
            fingerprint: format!("fp-{epoch}"),
            entries: texts
                .iter()
                .map(|t| EmbeddedChunk {
                    draft: ChunkDraft {
                        source: ChunkSource::StructuredField,
                        field_group: Some(FieldGroup::ChiefComplaint),
                        text: (*t).into(),
                    },
                    embedding: vec![0.6, 0.8, 0.0],
                })
                .collect(),
        }
    }

    #[test]
    fn replace_swaps_whole_set() {
        let conn = open_memory_database().unwrap();
        let (patient_id, conv_id) = setup(&conn);

        replace_chunk_set(&conn, &make_set(patient_id, conv_id, 1, &["a", "b", "c"])).unwrap();
        let stored = replace_chunk_set(&conn, &make_set(patient_id, conv_id, 2, &["x"])).unwrap();
        assert_eq!(stored.len(), 1);

        let chunks = get_chunks_for_conversation(&conn, &conv_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "x");
        assert_eq!(chunks[0].epoch, 2);
        assert_eq!(chunks[0].embedding, vec![0.6, 0.8, 0.0]);

        let info = get_chunk_set_info(&conn, &conv_id).unwrap().unwrap();
        assert_eq!(info.epoch, 2);
        assert_eq!(info.fingerprint, "fp-2");
        assert_eq!(info.count, 1);
    }

    #[test]
    fn patient_query_never_returns_other_patients_chunks() {
        let conn = open_memory_database().unwrap();
        let (p1, c1) = setup(&conn);
        let (p2, c2) = setup(&conn);
        replace_chunk_set(&conn, &make_set(p1, c1, 1, &["mine"])).unwrap();
        replace_chunk_set(&conn, &make_set(p2, c2, 1, &["theirs"])).unwrap();

        let chunks = get_chunks_for_patient(&conn, &p1).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks.iter().all(|c| c.patient_id == p1));
    }

    #[test]
    fn failed_insert_keeps_previous_set() {
        let conn = open_memory_database().unwrap();
        let (patient_id, conv_id) = setup(&conn);
        replace_chunk_set(&conn, &make_set(patient_id, conv_id, 1, &["old"])).unwrap();

        // Unknown patient violates the foreign key midway through the swap.
        let broken = make_set(Uuid::new_v4(), conv_id, 2, &["new"]);
        assert!(replace_chunk_set(&conn, &broken).is_err());

        let chunks = get_chunks_for_conversation(&conn, &conv_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "old");
    }

    #[test]
    fn empty_conversation_has_no_set_info() {
        let conn = open_memory_database().unwrap();
        let (_, conv_id) = setup(&conn);
        assert!(get_chunk_set_info(&conn, &conv_id).unwrap().is_none());
    }

    #[test]
    fn truncated_embedding_blob_is_corrupt() {
        assert!(decode_embedding(&[0, 0, 128]).is_err());
        assert_eq!(decode_embedding(&encode_embedding(&[1.5, -2.0])).unwrap(), vec![1.5, -2.0]);
    }
}
