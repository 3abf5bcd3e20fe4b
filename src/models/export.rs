use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, Serialize)]
pub struct WordExport {
    pub id: i64,
    pub gesuch_id: i64,
    pub job_id: Option<String>,
    pub status: String,
    pub download_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub expires_at: Option<String>,
}

/// Create an export record awaiting the remote job's result.
pub fn create_pending(conn: &Connection, gesuch_id: i64, job_id: &str) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO word_exports (gesuch_id, job_id, status) VALUES (?1, ?2, 'pending')",
        params![gesuch_id, job_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Create a placeholder export for the manual path.
pub fn create_placeholder(conn: &Connection, gesuch_id: i64, expires_at: &str) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO word_exports (gesuch_id, status, expires_at) VALUES (?1, 'manuell', ?2)",
        params![gesuch_id, expires_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fill in the download details delivered by the word-ready webhook.
/// Keyed by job id; re-applying the same payload rewrites the same values.
pub fn mark_ready(
    conn: &Connection,
    job_id: &str,
    download_url: &str,
    expires_at: &str,
    file_name: Option<&str>,
    file_size: Option<i64>,
) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE word_exports
         SET status = 'ready', download_url = ?2, expires_at = ?3, file_name = ?4, file_size = ?5
         WHERE job_id = ?1",
        params![job_id, download_url, expires_at, file_name, file_size],
    )?;
    Ok(changed)
}

pub fn find_by_job_id(conn: &Connection, job_id: &str) -> Result<Option<WordExport>, AppError> {
    let export = conn
        .query_row(
            "SELECT id, gesuch_id, job_id, status, download_url, file_name, file_size, expires_at
             FROM word_exports WHERE job_id = ?1",
            params![job_id],
            map_export,
        )
        .optional()?;
    Ok(export)
}

pub fn find_for_gesuch(conn: &Connection, gesuch_id: i64) -> Result<Vec<WordExport>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, gesuch_id, job_id, status, download_url, file_name, file_size, expires_at
         FROM word_exports WHERE gesuch_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![gesuch_id], map_export)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_export(row: &rusqlite::Row<'_>) -> rusqlite::Result<WordExport> {
    Ok(WordExport {
        id: row.get(0)?,
        gesuch_id: row.get(1)?,
        job_id: row.get(2)?,
        status: row.get(3)?,
        download_url: row.get(4)?,
        file_name: row.get(5)?,
        file_size: row.get(6)?,
        expires_at: row.get(7)?,
    })
}
