use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::auth::identity::{current_user, require_admin};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::rapport;

/// POST /api/rapporte/{id}/submit
/// entwurf -> eingereicht, author only. The guarded UPDATE is the arbiter;
/// on zero rows we re-read once to pick the right error code.
pub async fn submit(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    let id = path.into_inner();
    let conn = pool.get()?;

    let changed = rapport::submit(&conn, id, caller.id)?;
    if changed == 0 {
        let record = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
        if record.author_id != caller.id {
            return Err(AppError::PermissionDenied("not the author".to_string()));
        }
        return Err(AppError::Conflict(json!({
            "error": format!("only drafts can be submitted, rapport is '{}'", record.status),
            "status": record.status,
        })));
    }

    log::info!("rapport {id} submitted by '{}'", caller.username);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "status": "eingereicht" })))
}

#[derive(Deserialize)]
pub struct ApprovalForm {
    pub action: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// POST /api/rapporte/{id}/approve  {action: approve|reject, rejection_reason?}
/// Admin only; legal from eingereicht, in_bearbeitung or fertig. Rejection
/// requires a reason. genehmigt/abgelehnt are terminal.
pub async fn approve(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    form: web::Json<ApprovalForm>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    require_admin(&caller)?;
    let id = path.into_inner();
    let conn = pool.get()?;

    let (changed, new_status) = match form.action.as_str() {
        "approve" => (rapport::approve(&conn, id, caller.id)?, "genehmigt"),
        "reject" => {
            let reason = form
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("rejection_reason is required".to_string())
                })?;
            (rapport::reject(&conn, id, caller.id, reason)?, "abgelehnt")
        }
        other => {
            return Err(AppError::Validation(format!("unknown action '{other}'")));
        }
    };

    if changed == 0 {
        let record = rapport::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
        return Err(AppError::Conflict(json!({
            "error": format!("rapport is '{}' and cannot be decided", record.status),
            "status": record.status,
        })));
    }

    log::info!("rapport {id} -> {new_status} by '{}'", caller.username);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "status": new_status })))
}
