use rusqlite::{Connection, params};
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, Serialize)]
pub struct WebhookLog {
    pub id: i64,
    pub endpoint: String,
    pub payload: String,
    pub signature: Option<String>,
    pub valid_signature: bool,
    pub processed: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Record an inbound webhook call before any processing, so that a crash
/// mid-apply still leaves an audit trail. Returns the row id.
pub fn insert(
    conn: &Connection,
    endpoint: &str,
    payload: &str,
    signature: Option<&str>,
    valid_signature: bool,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO webhook_logs (endpoint, payload, signature, valid_signature)
         VALUES (?1, ?2, ?3, ?4)",
        params![endpoint, payload, signature, valid_signature],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn mark_processed(conn: &Connection, id: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE webhook_logs SET processed = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Store the failure on the audit row; the full payload is already there
/// for replay.
pub fn mark_error(conn: &Connection, id: i64, error: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE webhook_logs SET processed = 0, error_message = ?2 WHERE id = ?1",
        params![id, error],
    )?;
    Ok(())
}

pub fn find_by_endpoint(conn: &Connection, endpoint: &str) -> Result<Vec<WebhookLog>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, endpoint, payload, signature, valid_signature, processed, error_message, created_at
         FROM webhook_logs WHERE endpoint = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![endpoint], |row| {
            Ok(WebhookLog {
                id: row.get(0)?,
                endpoint: row.get(1)?,
                payload: row.get(2)?,
                signature: row.get(3)?,
                valid_signature: row.get(4)?,
                processed: row.get(5)?,
                error_message: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
