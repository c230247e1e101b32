use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, insert_patient, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{Stage, TurnRole};
use crate::models::{Conversation, Patient, Turn};

/// Insert a new conversation together with the turns it already carries.
pub fn create_conversation(conn: &Connection, conv: &Conversation) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    write_conversation(&tx, conv)?;
    tx.commit()?;
    Ok(())
}

/// Register a patient and their first conversation in one transaction.
///
/// Either both rows exist afterwards or neither does.
pub fn create_patient_with_conversation(
    conn: &Connection,
    patient: &Patient,
    conv: &Conversation,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    insert_patient(&tx, patient)?;
    write_conversation(&tx, conv)?;
    tx.commit()?;
    Ok(())
}

fn write_conversation(conn: &Connection, conv: &Conversation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversations
         (id, patient_id, stage, stage_answers, is_complete, started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            conv.id.to_string(),
            conv.patient_id.to_string(),
            conv.stage.as_str(),
            conv.stage_answers,
            conv.is_complete,
            format_timestamp(&conv.started_at),
            conv.completed_at.as_ref().map(format_timestamp),
        ],
    )?;
    for turn in &conv.turns {
        insert_turn(conn, &conv.id, turn)?;
    }
    Ok(())
}

/// Persist the outcome of one advance: new turns plus the updated stage state.
///
/// Runs in one transaction; a sequence index that already exists violates the
/// primary key and aborts the whole write.
pub fn record_advance(
    conn: &Connection,
    conv: &Conversation,
    new_turns: &[Turn],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let updated = tx.execute(
        "UPDATE conversations
         SET stage = ?2, stage_answers = ?3, is_complete = ?4, completed_at = ?5
         WHERE id = ?1",
        params![
            conv.id.to_string(),
            conv.stage.as_str(),
            conv.stage_answers,
            conv.is_complete,
            conv.completed_at.as_ref().map(format_timestamp),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Conversation".into(),
            id: conv.id.to_string(),
        });
    }
    for turn in new_turns {
        insert_turn(&tx, &conv.id, turn)?;
    }
    tx.commit()?;
    Ok(())
}

fn insert_turn(conn: &Connection, conversation_id: &Uuid, turn: &Turn) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO turns (conversation_id, seq, role, stage, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            conversation_id.to_string(),
            turn.seq,
            turn.role.as_str(),
            turn.stage.as_str(),
            turn.text,
            format_timestamp(&Utc::now().naive_utc()),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "turn {} already exists for conversation {conversation_id}",
                turn.seq
            ))
        }
        other => other.into(),
    })?;
    Ok(())
}

struct ConversationRow {
    id: String,
    patient_id: String,
    stage: String,
    stage_answers: u32,
    is_complete: bool,
    started_at: String,
    completed_at: Option<String>,
}

/// Load a conversation with its full turn history in sequence order.
pub fn get_conversation(conn: &Connection, id: &Uuid) -> Result<Option<Conversation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, stage, stage_answers, is_complete, started_at, completed_at
         FROM conversations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(ConversationRow {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                stage: row.get(2)?,
                stage_answers: row.get(3)?,
                is_complete: row.get(4)?,
                started_at: row.get(5)?,
                completed_at: row.get(6)?,
            })
        },
    );

    let row = match result {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let conv_id = parse_uuid("conversations.id", &row.id)?;
    Ok(Some(Conversation {
        id: conv_id,
        patient_id: parse_uuid("conversations.patient_id", &row.patient_id)?,
        stage: Stage::from_str(&row.stage)?,
        stage_answers: row.stage_answers,
        turns: get_turns(conn, &conv_id)?,
        is_complete: row.is_complete,
        started_at: parse_timestamp("conversations.started_at", &row.started_at)?,
        completed_at: row
            .completed_at
            .as_deref()
            .map(|ts| parse_timestamp("conversations.completed_at", ts))
            .transpose()?,
    }))
}

pub fn get_turns(conn: &Connection, conversation_id: &Uuid) -> Result<Vec<Turn>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, role, stage, text FROM turns
         WHERE conversation_id = ?1 ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut turns = Vec::new();
    for row in rows {
        let (seq, role, stage, text) = row?;
        turns.push(Turn {
            seq,
            role: TurnRole::from_str(&role)?,
            stage: Stage::from_str(&stage)?,
            text,
        });
    }
    Ok(turns)
}
