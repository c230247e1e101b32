use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, display_name, created_at) VALUES (?1, ?2, ?3)",
        params![
            patient.id.to_string(),
            patient.display_name,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, display_name, created_at FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((id, display_name, created_at)) => Ok(Some(Patient {
            id: parse_uuid("patients.id", &id)?,
            display_name,
            created_at: parse_timestamp("patients.created_at", &created_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn patient_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    #[test]
    fn patient_insert_and_get() {
        let conn = open_memory_database().unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            display_name: Some("Ada".into()),
            created_at: Utc::now().naive_utc(),
        };
        insert_patient(&conn, &patient).unwrap();

        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.id, patient.id);
        assert_eq!(loaded.display_name.as_deref(), Some("Ada"));
        assert!(patient_exists(&conn, &patient.id).unwrap());
    }

    #[test]
    fn unknown_patient_is_none() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        assert!(get_patient(&conn, &id).unwrap().is_none());
        assert!(!patient_exists(&conn, &id).unwrap());
    }
}
