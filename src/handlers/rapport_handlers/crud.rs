use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::identity::{current_user, require_admin};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::rapport::{self, ALL_STATUSES, NewRapport, RapportContent, STATUS_ANGEFORDERT};

#[derive(Deserialize)]
pub struct RapportForm {
    pub titel: String,
    #[serde(default)]
    pub beschreibung: String,
    #[serde(default)]
    pub inhalt: serde_json::Value,
    #[serde(default)]
    pub teilprojekt_id: Option<i64>,
    #[serde(default)]
    pub massnahme_id: Option<i64>,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    /// Reporting period `YYYY-MM`; defaults to the current month.
    #[serde(default)]
    pub period: Option<String>,
    /// Id of an `angefordert` rapport this submission fulfills.
    #[serde(default)]
    pub fulfills_request_id: Option<i64>,
    /// Admin-only direct status override on update.
    #[serde(default)]
    pub status: Option<String>,
}

fn default_priority() -> String {
    "normal".to_string()
}

/// POST /api/rapporte
/// Creates a draft. One rapport per author, category and period: a clash
/// with a non-rejected existing rapport is a 409 naming that rapport.
pub async fn create(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    form: web::Json<RapportForm>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    if form.titel.trim().is_empty() {
        return Err(AppError::Validation("titel is required".to_string()));
    }
    let period = form
        .period
        .clone()
        .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());

    let conn = pool.get()?;

    // A request may only be fulfilled by the author it was assigned to,
    // checked up front so the draft is not created against a dead request.
    if let Some(request_id) = form.fulfills_request_id {
        let request = rapport::find_by_id(&conn, request_id)?.ok_or(AppError::NotFound)?;
        if request.author_id != caller.id {
            return Err(AppError::PermissionDenied(
                "request is assigned to another author".to_string(),
            ));
        }
        if request.status != STATUS_ANGEFORDERT || request.fulfilled_rapport_id.is_some() {
            return Err(AppError::Conflict(json!({
                "error": "request is not open for fulfillment",
                "status": request.status,
            })));
        }
    }

    if let Some((existing_id, existing_status)) =
        rapport::find_duplicate(&conn, caller.id, &form.category, &period)?
    {
        return Err(AppError::Conflict(json!({
            "error": format!(
                "a rapport for category '{}' and period {period} already exists",
                form.category
            ),
            "existingId": existing_id,
            "existingStatus": existing_status,
        })));
    }

    let id = rapport::create(
        &conn,
        &NewRapport {
            titel: form.titel.trim().to_string(),
            beschreibung: form.beschreibung.clone(),
            inhalt: form.inhalt.to_string(),
            author_id: caller.id,
            teilprojekt_id: form.teilprojekt_id,
            massnahme_id: form.massnahme_id,
            category: form.category.clone(),
            priority: form.priority.clone(),
            period,
        },
    )?;

    if let Some(request_id) = form.fulfills_request_id {
        // The guarded UPDATE re-checks under the write; a concurrent
        // fulfillment between the check above and here surfaces as 409.
        let linked = rapport::link_fulfillment(&conn, request_id, id, caller.id)?;
        if linked == 0 {
            return Err(AppError::Conflict(json!({
                "error": "request is no longer open for fulfillment",
                "rapportId": id,
            })));
        }
    }

    Ok(HttpResponse::Created().json(json!({ "success": true, "id": id })))
}

/// GET /api/rapporte — admins see everything, members their own.
pub async fn list(pool: web::Data<DbPool>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    let conn = pool.get()?;
    let author_filter = if caller.is_admin() { None } else { Some(caller.id) };
    let rapporte = rapport::find_all(&conn, author_filter)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "rapporte": rapporte })))
}

/// GET /api/rapporte/{id}
pub async fn detail(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    let conn = pool.get()?;
    let record = rapport::find_by_id(&conn, path.into_inner())?.ok_or(AppError::NotFound)?;
    // Foreign drafts are invisible, not forbidden.
    if record.author_id != caller.id && !caller.is_admin() {
        return Err(AppError::NotFound);
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "rapport": record })))
}

/// PUT /api/rapporte/{id}
/// Authors may edit content while `entwurf` or `eingereicht`; admins may
/// edit anything and set the status directly. The guarded UPDATE decides;
/// a zero-row result is mapped to 404/403/409 by re-reading once.
pub async fn update(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    form: web::Json<RapportForm>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    let id = path.into_inner();
    let conn = pool.get()?;

    let record = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    let period = form.period.clone().unwrap_or_else(|| record.period.clone());
    let content = RapportContent {
        titel: form.titel.trim().to_string(),
        beschreibung: form.beschreibung.clone(),
        inhalt: form.inhalt.to_string(),
        category: form.category.clone(),
        priority: form.priority.clone(),
        period,
    };

    let changed = if caller.is_admin() {
        if let Some(ref status) = form.status {
            if !ALL_STATUSES.contains(&status.as_str()) {
                return Err(AppError::Validation(format!("unknown status '{status}'")));
            }
        }
        rapport::admin_update(&conn, id, &content, form.status.as_deref())?
    } else {
        if record.author_id != caller.id {
            return Err(AppError::PermissionDenied("not the author".to_string()));
        }
        if form.status.is_some() {
            return Err(AppError::PermissionDenied("only admins may set status".to_string()));
        }
        rapport::update_content(&conn, id, caller.id, &content)?
    };

    if changed == 0 {
        let current = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
        return Err(AppError::Conflict(json!({
            "error": format!("rapport is '{}' and no longer editable", current.status),
            "status": current.status,
        })));
    }

    let record = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "rapport": record })))
}

/// DELETE /api/rapporte/{id}
/// Authors may delete only their own drafts; admins anything.
pub async fn delete(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    let id = path.into_inner();
    let conn = pool.get()?;

    let changed = if caller.is_admin() {
        rapport::delete_any(&conn, id)?
    } else {
        rapport::delete_draft(&conn, id, caller.id)?
    };

    if changed == 0 {
        let record = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
        if record.author_id != caller.id {
            return Err(AppError::PermissionDenied("not the author".to_string()));
        }
        return Err(AppError::Conflict(json!({
            "error": format!("only drafts can be deleted, rapport is '{}'", record.status),
            "status": record.status,
        })));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct RequestForm {
    pub titel: String,
    #[serde(default)]
    pub beschreibung: String,
    #[serde(default)]
    pub category: String,
    pub author_id: i64,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// POST /api/rapporte/anfordern (admin)
/// Creates an `angefordert` rapport assigned to a target author with a
/// deadline. Fulfilled later by linking, not by a status change.
pub async fn request(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    form: web::Json<RequestForm>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    require_admin(&caller)?;
    if form.titel.trim().is_empty() {
        return Err(AppError::Validation("titel is required".to_string()));
    }

    let conn = pool.get()?;
    let id = rapport::create_request(
        &conn,
        form.titel.trim(),
        &form.beschreibung,
        &form.category,
        form.author_id,
        caller.id,
        form.deadline.as_deref(),
    )?;

    Ok(HttpResponse::Created().json(json!({ "success": true, "id": id })))
}
