use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::errors::AppError;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

#[derive(Debug, Serialize)]
pub struct ServiceJob {
    pub id: i64,
    pub job_id: String,
    pub service_name: String,
    pub operation: String,
    pub status: String,
    pub result: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<String>,
}

/// Insert a pending job row keyed by the externally-assigned job id.
pub fn create(
    conn: &Connection,
    job_id: &str,
    operation: &str,
    payload: &serde_json::Value,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO service_jobs (job_id, operation, payload) VALUES (?1, ?2, ?3)",
        params![job_id, operation, payload.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_job_id(conn: &Connection, job_id: &str) -> Result<Option<ServiceJob>, AppError> {
    let job = conn
        .query_row(
            "SELECT id, job_id, service_name, operation, status, result, error_message, completed_at
             FROM service_jobs WHERE job_id = ?1",
            params![job_id],
            |row| {
                Ok(ServiceJob {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    service_name: row.get(2)?,
                    operation: row.get(3)?,
                    status: row.get(4)?,
                    result: row.get(5)?,
                    error_message: row.get(6)?,
                    completed_at: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(job)
}

/// Transition a job to `completed`. Returns true if this call performed the
/// transition. A repeat call with the same outcome is a logged no-op; a call
/// contradicting an earlier `failed` state is logged as an anomaly and the
/// original terminal state wins.
pub fn complete(conn: &Connection, job_id: &str, result: &serde_json::Value) -> Result<bool, AppError> {
    terminalize(conn, job_id, STATUS_COMPLETED, Some(&result.to_string()), None)
}

/// Transition a job to `failed`, with the same idempotency rules as `complete`.
pub fn fail(conn: &Connection, job_id: &str, error: &str) -> Result<bool, AppError> {
    terminalize(conn, job_id, STATUS_FAILED, None, Some(error))
}

fn terminalize(
    conn: &Connection,
    job_id: &str,
    new_status: &str,
    result: Option<&str>,
    error: Option<&str>,
) -> Result<bool, AppError> {
    // The conditional update is the sole arbiter between the webhook path
    // and the status-poll path; whichever observes completion first wins.
    let changed = conn.execute(
        "UPDATE service_jobs
         SET status = ?2, result = ?3, error_message = ?4, completed_at = ?5
         WHERE job_id = ?1 AND status = 'pending'",
        params![job_id, new_status, result, error, Utc::now().to_rfc3339()],
    )?;
    if changed > 0 {
        return Ok(true);
    }

    match find_by_job_id(conn, job_id)? {
        Some(job) if job.status == new_status => {
            log::info!("service job {job_id} already {new_status}, ignoring repeat update");
            Ok(false)
        }
        Some(job) => {
            log::warn!(
                "service job {job_id} is already {}, refusing contradictory transition to {new_status}",
                job.status
            );
            Ok(false)
        }
        None => {
            log::warn!("terminal update for unknown service job {job_id}");
            Ok(false)
        }
    }
}

/// Count pending jobs (dashboard / reconciliation support).
pub fn count_pending(conn: &Connection) -> Result<i64, AppError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM service_jobs WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
