//! Repository layer: entity-scoped database operations.
//!
//! Functions take a borrowed `Connection` so callers decide connection
//! lifetime and transaction boundaries.

mod chunk;
mod conversation;
mod note;
mod patient;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

pub use chunk::*;
pub use conversation::*;
pub use note::*;
pub use patient::*;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| DatabaseError::Corrupt {
        field: field.into(),
        reason: e.to_string(),
    })
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::Corrupt {
        field: field.into(),
        reason: e.to_string(),
    })
}
