//! Application of verified webhook payloads. Each function is safe to call
//! more than once for the same job id: sub-project inserts are keyed on
//! (gesuch_id, nummer) and report-template creation is gated by winning the
//! job's pending->terminal transition.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::errors::AppError;
use crate::models::{export, gesuch, rapport, service_job, teilprojekt};
use crate::models::teilprojekt::NewTeilprojekt;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GesuchProcessedPayload {
    #[serde(default)]
    pub event: String,
    pub job_id: String,
    pub gesuch_id: i64,
    pub status: String,
    #[serde(default)]
    pub teilprojekte: Vec<NewTeilprojekt>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RapporteReadyPayload {
    #[serde(default)]
    pub event: String,
    pub job_id: String,
    pub gesuch_id: i64,
    pub rapporte: Vec<RapportTemplatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RapportTemplatePayload {
    pub titel: String,
    #[serde(default)]
    pub teilprojekt_nummer: Option<i64>,
    #[serde(default)]
    pub inhalt: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordReadyPayload {
    #[serde(default)]
    pub event: String,
    pub job_id: String,
    pub gesuch_id: i64,
    pub download_url: String,
    pub expires_at: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Extraction result: write sub-projects (with nested line items) and mark
/// the Gesuch `verarbeitet`, or mark it `fehler` on a failed run. The
/// associated job is always terminalized.
pub fn apply_gesuch_processed(
    conn: &Connection,
    payload: &GesuchProcessedPayload,
) -> Result<Value, AppError> {
    gesuch::find_by_id(conn, payload.gesuch_id)?.ok_or(AppError::NotFound)?;

    match payload.status.as_str() {
        "completed" => {}
        "failed" => {
            let error = payload.error.as_deref().unwrap_or("processing failed");
            gesuch::mark_fehler(conn, payload.gesuch_id, error)?;
            service_job::fail(conn, &payload.job_id, error)?;
            return Ok(json!({ "gesuchId": payload.gesuch_id, "status": "fehler" }));
        }
        // Only terminal statuses carry a decision; anything else is ignored
        // so a later terminal delivery can still land.
        other => {
            log::warn!(
                "gesuch-processed for job {}: non-terminal status '{other}', ignoring",
                payload.job_id
            );
            return Ok(json!({ "gesuchId": payload.gesuch_id, "status": "ignored" }));
        }
    }

    for tp in &payload.teilprojekte {
        teilprojekt::upsert(conn, payload.gesuch_id, tp)?;
    }
    gesuch::mark_verarbeitet(conn, payload.gesuch_id)?;
    service_job::complete(
        conn,
        &payload.job_id,
        &json!({ "teilprojekte": payload.teilprojekte.len() }),
    )?;

    Ok(json!({
        "gesuchId": payload.gesuch_id,
        "status": "verarbeitet",
        "teilprojekte": payload.teilprojekte.len(),
    }))
}

/// Generated report templates: create one Rapport per entry, linked to the
/// Gesuch (and sub-project) via junction rows. Creation only happens on the
/// first terminal transition of the job, so duplicate delivery is a no-op.
pub fn apply_rapporte_ready(
    conn: &Connection,
    payload: &RapporteReadyPayload,
) -> Result<Value, AppError> {
    gesuch::find_by_id(conn, payload.gesuch_id)?.ok_or(AppError::NotFound)?;

    let first = service_job::complete(
        conn,
        &payload.job_id,
        &json!({ "rapporte": payload.rapporte.len() }),
    )?;
    if !first {
        return Ok(json!({ "gesuchId": payload.gesuch_id, "created": 0, "repeat": true }));
    }

    let author_id = template_author(conn)?;
    let mut created = Vec::with_capacity(payload.rapporte.len());
    for entry in &payload.rapporte {
        let tp_id = match entry.teilprojekt_nummer {
            Some(nummer) => find_teilprojekt_id(conn, payload.gesuch_id, nummer)?,
            None => None,
        };
        let inhalt = entry.inhalt.clone().unwrap_or_else(|| json!({}));
        let category = entry
            .category
            .clone()
            .or_else(|| entry.teilprojekt_nummer.map(|n| format!("tp{n}")))
            .unwrap_or_default();
        let rapport_id =
            rapport::create_template(conn, &entry.titel, &inhalt, author_id, tp_id, &category)?;
        rapport::link_to_gesuch(conn, payload.gesuch_id, rapport_id, tp_id)?;
        created.push(rapport_id);
    }

    Ok(json!({ "gesuchId": payload.gesuch_id, "created": created.len(), "rapportIds": created }))
}

/// Finished export: persist the download URL and expiry on the export row
/// keyed by job id and complete the job. Out-of-order delivery (before the
/// export row exists) creates the row instead.
pub fn apply_word_ready(conn: &Connection, payload: &WordReadyPayload) -> Result<Value, AppError> {
    let changed = export::mark_ready(
        conn,
        &payload.job_id,
        &payload.download_url,
        &payload.expires_at,
        payload.file_name.as_deref(),
        payload.file_size,
    )?;
    if changed == 0 {
        gesuch::find_by_id(conn, payload.gesuch_id)?.ok_or(AppError::NotFound)?;
        conn.execute(
            "INSERT INTO word_exports (gesuch_id, job_id, status, download_url, expires_at, file_name, file_size)
             VALUES (?1, ?2, 'ready', ?3, ?4, ?5, ?6)",
            params![
                payload.gesuch_id,
                payload.job_id,
                payload.download_url,
                payload.expires_at,
                payload.file_name,
                payload.file_size,
            ],
        )?;
    }
    service_job::complete(
        conn,
        &payload.job_id,
        &json!({ "downloadUrl": payload.download_url }),
    )?;

    Ok(json!({ "gesuchId": payload.gesuch_id, "status": "ready" }))
}

/// Generated templates need an owner even though webhooks carry no
/// principal; the first admin account takes that role.
fn template_author(conn: &Connection) -> Result<i64, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM users WHERE role IN ('admin', 'super_admin') ORDER BY id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    id.ok_or_else(|| AppError::Validation("no admin user to own generated templates".to_string()))
}

fn find_teilprojekt_id(
    conn: &Connection,
    gesuch_id: i64,
    nummer: i64,
) -> Result<Option<i64>, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM teilprojekte WHERE gesuch_id = ?1 AND nummer = ?2",
            params![gesuch_id, nummer],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}
