use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::AppError;
use super::types::*;

pub fn create(conn: &Connection, new: &NewGesuch) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO gesuche (jahr, titel, beschreibung, status)
         VALUES (?1, ?2, ?3, 'hochgeladen')",
        params![new.jahr, new.titel, new.beschreibung],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Gesuch>, AppError> {
    let gesuch = conn
        .query_row(
            "SELECT id, jahr, titel, beschreibung, status, service_job_id,
                    processing_started_at, processing_completed_at, service_error, created_at
             FROM gesuche WHERE id = ?1",
            params![id],
            map_gesuch,
        )
        .optional()?;
    Ok(gesuch)
}

pub fn find_all(conn: &Connection) -> Result<Vec<Gesuch>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, jahr, titel, beschreibung, status, service_job_id,
                processing_started_at, processing_completed_at, service_error, created_at
         FROM gesuche ORDER BY jahr DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], map_gesuch)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record a successful dispatch: store the job id and enter `verarbeitung`.
/// Guarded on `hochgeladen` so a webhook that lands before this write cannot
/// be dragged back to an in-flight status. Returns the number of rows changed.
pub fn mark_verarbeitung(conn: &Connection, id: i64, job_id: &str) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE gesuche
         SET status = 'verarbeitung', service_job_id = ?2,
             processing_started_at = ?3, updated_at = ?3
         WHERE id = ?1 AND status = 'hochgeladen'",
        params![id, job_id, Utc::now().to_rfc3339()],
    )?;
    Ok(changed)
}

/// Enter the manual path after a failed dispatch. The message is kept so an
/// operator can see why the remote path was skipped.
pub fn mark_manuell(conn: &Connection, id: i64, message: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE gesuche
         SET status = 'manuell', service_error = ?2, updated_at = ?3
         WHERE id = ?1",
        params![id, message, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Terminal success transition, applied by the webhook (or, status-only, by
/// the poll safety net). Guarded so a late arrival cannot drag a Gesuch out
/// of `fehler` or `manuell`. Returns the number of rows changed.
pub fn mark_verarbeitet(conn: &Connection, id: i64) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE gesuche
         SET status = 'verarbeitet', processing_completed_at = ?2, updated_at = ?2,
             service_error = NULL
         WHERE id = ?1 AND status IN ('hochgeladen', 'verarbeitung', 'verarbeitet')",
        params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(changed)
}

/// Terminal failure transition with the same guard semantics.
pub fn mark_fehler(conn: &Connection, id: i64, error: &str) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE gesuche
         SET status = 'fehler', service_error = ?2, processing_completed_at = ?3, updated_at = ?3
         WHERE id = ?1 AND status IN ('hochgeladen', 'verarbeitung', 'fehler')",
        params![id, error, Utc::now().to_rfc3339()],
    )?;
    Ok(changed)
}

pub fn find_by_job_id(conn: &Connection, job_id: &str) -> Result<Option<Gesuch>, AppError> {
    let gesuch = conn
        .query_row(
            "SELECT id, jahr, titel, beschreibung, status, service_job_id,
                    processing_started_at, processing_completed_at, service_error, created_at
             FROM gesuche WHERE service_job_id = ?1",
            params![job_id],
            map_gesuch,
        )
        .optional()?;
    Ok(gesuch)
}

fn map_gesuch(row: &rusqlite::Row<'_>) -> rusqlite::Result<Gesuch> {
    Ok(Gesuch {
        id: row.get(0)?,
        jahr: row.get(1)?,
        titel: row.get(2)?,
        beschreibung: row.get(3)?,
        status: row.get(4)?,
        service_job_id: row.get(5)?,
        processing_started_at: row.get(6)?,
        processing_completed_at: row.get(7)?,
        service_error: row.get(8)?,
        created_at: row.get(9)?,
    })
}
