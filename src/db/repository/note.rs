use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::NoteOrigin;
use crate::models::{StoredNote, StructuredNote};

/// Replace the live note of a conversation, bumping its version.
///
/// The first note of a conversation gets version 1.
pub fn upsert_note(
    conn: &Connection,
    conversation_id: &Uuid,
    origin: NoteOrigin,
    note: &StructuredNote,
) -> Result<StoredNote, DatabaseError> {
    let data = serde_json::to_string(note).map_err(|e| DatabaseError::Corrupt {
        field: "structured_notes.data".into(),
        reason: e.to_string(),
    })?;
    let created_at = Utc::now().naive_utc();

    let tx = conn.unchecked_transaction()?;
    let previous: Option<u32> = match tx.query_row(
        "SELECT version FROM structured_notes WHERE conversation_id = ?1",
        params![conversation_id.to_string()],
        |row| row.get(0),
    ) {
        Ok(v) => Some(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };
    let version = previous.map_or(1, |v| v + 1);

    tx.execute(
        "INSERT INTO structured_notes (conversation_id, version, origin, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(conversation_id) DO UPDATE SET
            version = excluded.version,
            origin = excluded.origin,
            data = excluded.data,
            created_at = excluded.created_at",
        params![
            conversation_id.to_string(),
            version,
            origin.as_str(),
            data,
            format_timestamp(&created_at),
        ],
    )?;
    tx.commit()?;

    Ok(StoredNote {
        conversation_id: *conversation_id,
        version,
        origin,
        note: note.clone(),
        created_at,
    })
}

pub fn get_note(conn: &Connection, conversation_id: &Uuid) -> Result<Option<StoredNote>, DatabaseError> {
    let result = conn.query_row(
        "SELECT version, origin, data, created_at FROM structured_notes
         WHERE conversation_id = ?1",
        params![conversation_id.to_string()],
        |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    let (version, origin, data, created_at) = match result {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let note: StructuredNote = serde_json::from_str(&data).map_err(|e| DatabaseError::Corrupt {
        field: "structured_notes.data".into(),
        reason: e.to_string(),
    })?;

    Ok(Some(StoredNote {
        conversation_id: *conversation_id,
        version,
        origin: NoteOrigin::from_str(&origin)?,
        note,
        created_at: parse_timestamp("structured_notes.created_at", &created_at)?,
    }))
}
