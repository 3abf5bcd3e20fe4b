//! Gesuch orchestration: upload -> dispatch -> (job tracked) or (fallback),
//! plus the webhook-independent status poll safety net.

use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::auth::identity::{current_user, require_admin};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::{export, gesuch, rapport, service_job, teilprojekt};
use crate::models::gesuch::NewGesuch;
use crate::models::teilprojekt::NewTeilprojekt;
use crate::processing::{client::MicroserviceClient, fallback};

/// POST /api/gesuche (multipart: file, jahr, titel, beschreibung)
/// Persists the Gesuch, hands the document to the extraction service, and
/// reports "processing" or "manual" depending on whether a job was obtained.
pub async fn upload(
    pool: web::Data<DbPool>,
    service: web::Data<MicroserviceClient>,
    req: HttpRequest,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    current_user(&req)?;

    let mut jahr: Option<i64> = None;
    let mut titel = String::new();
    let mut beschreibung = String::new();
    let mut file_name = String::new();
    let mut file_bytes: Vec<u8> = Vec::new();

    while let Some(field) = payload.next().await {
        let mut field =
            field.map_err(|e| AppError::Validation(format!("bad multipart field: {e}")))?;
        let name = field.name().to_string();
        if name == "file" {
            file_name = field
                .content_disposition()
                .get_filename()
                .unwrap_or("gesuch.pdf")
                .to_string();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::Validation(format!("upload aborted: {e}")))?;
                file_bytes.extend_from_slice(&chunk);
            }
        } else {
            let mut value = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::Validation(format!("upload aborted: {e}")))?;
                value.extend_from_slice(&chunk);
            }
            let value = String::from_utf8_lossy(&value).trim().to_string();
            match name.as_str() {
                "jahr" => jahr = value.parse().ok(),
                "titel" => titel = value,
                "beschreibung" => beschreibung = value,
                _ => {}
            }
        }
    }

    let jahr = jahr.ok_or_else(|| AppError::Validation("jahr is required".to_string()))?;
    if titel.is_empty() {
        return Err(AppError::Validation("titel is required".to_string()));
    }
    if file_bytes.is_empty() {
        return Err(AppError::Validation("file is required".to_string()));
    }

    let gesuch_id = {
        let conn = pool.get()?;
        gesuch::create(&conn, &NewGesuch { jahr, titel: titel.clone(), beschreibung })?
    };

    let dispatch = service
        .process_gesuch(&pool, gesuch_id, jahr, &titel, &file_name, file_bytes)
        .await?;

    let conn = pool.get()?;
    match dispatch.job_id {
        Some(ref job_id) => {
            if gesuch::mark_verarbeitung(&conn, gesuch_id, job_id)? == 0 {
                log::info!("gesuch {gesuch_id}: webhook landed before dispatch bookkeeping");
            }
            Ok(HttpResponse::Accepted().json(json!({
                "success": true,
                "gesuchId": gesuch_id,
                "status": "processing",
                "jobId": job_id,
            })))
        }
        None => {
            gesuch::mark_manuell(
                &conn,
                gesuch_id,
                dispatch.message.as_deref().unwrap_or("service unavailable"),
            )?;
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "gesuchId": gesuch_id,
                "status": "manual",
                "message": dispatch.message,
            })))
        }
    }
}

/// GET /api/gesuche/{id}/status
/// Polls the remote job as a safety net independent of webhooks. A terminal
/// poll result applies the status-only transition; entity data stays the
/// webhook's responsibility.
pub async fn status(
    pool: web::Data<DbPool>,
    service: web::Data<MicroserviceClient>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    current_user(&req)?;
    let gesuch_id = path.into_inner();

    let record = {
        let conn = pool.get()?;
        gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?
    };

    let mut remote_status = None;
    if let Some(ref job_id) = record.service_job_id {
        if record.status == gesuch::STATUS_VERARBEITUNG {
            if let Some(polled) = service.job_status(job_id).await {
                let conn = pool.get()?;
                match polled.status.as_str() {
                    "completed" => {
                        gesuch::mark_verarbeitet(&conn, gesuch_id)?;
                        service_job::complete(&conn, job_id, &json!({ "source": "poll" }))?;
                    }
                    "failed" => {
                        let error = polled.message.as_deref().unwrap_or("processing failed");
                        gesuch::mark_fehler(&conn, gesuch_id, error)?;
                        service_job::fail(&conn, job_id, error)?;
                    }
                    _ => {}
                }
                remote_status = Some(polled.status);
            }
        }
    }

    let conn = pool.get()?;
    let record = gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "gesuch": record,
        "remoteStatus": remote_status,
    })))
}

/// POST /api/gesuche/{id}/teilprojekte (admin)
/// Manual sub-project entry: the fallback equivalent of document extraction.
pub async fn create_teilprojekte(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<Vec<NewTeilprojekt>>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    require_admin(&caller)?;
    let gesuch_id = path.into_inner();
    if body.is_empty() {
        return Err(AppError::Validation("at least one teilprojekt is required".to_string()));
    }

    let conn = pool.get()?;
    gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?;
    let ids = fallback::create_teilprojekte(&conn, gesuch_id, &body)?;

    Ok(HttpResponse::Created().json(json!({ "success": true, "teilprojektIds": ids })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateForm {
    #[serde(default)]
    pub template_settings: serde_json::Value,
}

/// POST /api/gesuche/{id}/rapporte/generate (admin)
/// Asks the service for report templates; degrades to the deterministic
/// local default template when no job is obtained.
pub async fn generate_rapporte(
    pool: web::Data<DbPool>,
    service: web::Data<MicroserviceClient>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: Option<web::Json<GenerateForm>>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    require_admin(&caller)?;
    let gesuch_id = path.into_inner();
    let settings = body.map(|b| b.into_inner().template_settings).unwrap_or_default();

    let teilprojekte = {
        let conn = pool.get()?;
        gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?;
        teilprojekt::find_for_gesuch(&conn, gesuch_id)?
    };
    if teilprojekte.is_empty() {
        return Err(AppError::Validation("gesuch has no teilprojekte yet".to_string()));
    }

    let tp_payload = json!(
        teilprojekte
            .iter()
            .map(|tp| json!({ "nummer": tp.nummer, "name": tp.name, "budget": tp.budget }))
            .collect::<Vec<_>>()
    );
    let dispatch = service
        .generate_rapporte(&pool, gesuch_id, &tp_payload, &settings)
        .await?;

    match dispatch.job_id {
        Some(job_id) => Ok(HttpResponse::Accepted().json(json!({
            "success": true,
            "status": "processing",
            "jobId": job_id,
        }))),
        None => {
            let conn = pool.get()?;
            let ids = fallback::create_rapport_vorlagen(&conn, gesuch_id, caller.id)?;
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "status": "manual",
                "rapportIds": ids,
            })))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportForm {
    pub rapport_ids: Vec<i64>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "docx".to_string()
}

/// POST /api/gesuche/{id}/export
/// Requests a Word export; degrades to a placeholder record when no job is
/// obtained.
pub async fn export(
    pool: web::Data<DbPool>,
    service: web::Data<MicroserviceClient>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ExportForm>,
) -> Result<HttpResponse, AppError> {
    current_user(&req)?;
    let gesuch_id = path.into_inner();
    if body.rapport_ids.is_empty() {
        return Err(AppError::Validation("rapportIds must not be empty".to_string()));
    }

    {
        let conn = pool.get()?;
        gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?;
    }

    let dispatch = service
        .export_word(&pool, gesuch_id, &body.rapport_ids, &body.format)
        .await?;

    let conn = pool.get()?;
    match dispatch.job_id {
        Some(ref job_id) => {
            let export_id = export::create_pending(&conn, gesuch_id, job_id)?;
            Ok(HttpResponse::Accepted().json(json!({
                "success": true,
                "status": "processing",
                "exportId": export_id,
                "jobId": job_id,
            })))
        }
        None => {
            let export_id = fallback::register_export_platzhalter(&conn, gesuch_id)?;
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "status": "manual",
                "exportId": export_id,
            })))
        }
    }
}

/// GET /api/gesuche
pub async fn list(pool: web::Data<DbPool>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    current_user(&req)?;
    let conn = pool.get()?;
    let gesuche = gesuch::find_all(&conn)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "gesuche": gesuche })))
}

/// GET /api/gesuche/{id} — detail with sub-projects and linked rapporte.
pub async fn detail(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    current_user(&req)?;
    let gesuch_id = path.into_inner();
    let conn = pool.get()?;

    let record = gesuch::find_by_id(&conn, gesuch_id)?.ok_or(AppError::NotFound)?;
    let teilprojekte = teilprojekt::find_for_gesuch(&conn, gesuch_id)?;
    let rapport_ids = rapport::find_for_gesuch(&conn, gesuch_id)?;
    let exports = export::find_for_gesuch(&conn, gesuch_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "gesuch": record,
        "teilprojekte": teilprojekte,
        "rapportIds": rapport_ids,
        "exports": exports,
    })))
}
