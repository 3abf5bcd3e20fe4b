use actix_web::{HttpResponse, ResponseError};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Db(rusqlite::Error),
    Pool(r2d2::Error),
    /// Missing or invalid credentials (401).
    Auth(String),
    /// Authenticated but not allowed (403).
    PermissionDenied(String),
    NotFound,
    /// Precondition failed on an existing resource (409). The body carries
    /// enough context for the client to navigate to the conflicting record.
    Conflict(serde_json::Value),
    Validation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Pool(e) => write!(f, "Pool error: {e}"),
            AppError::Auth(e) => write!(f, "Authentication error: {e}"),
            AppError::PermissionDenied(what) => write!(f, "Permission denied: {what}"),
            AppError::NotFound => write!(f, "Not found"),
            AppError::Conflict(body) => write!(f, "Conflict: {body}"),
            AppError::Validation(e) => write!(f, "Validation error: {e}"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Auth(msg) => HttpResponse::Unauthorized()
                .json(serde_json::json!({ "success": false, "error": msg })),
            AppError::PermissionDenied(what) => HttpResponse::Forbidden()
                .json(serde_json::json!({ "success": false, "error": format!("permission denied: {what}") })),
            AppError::NotFound => HttpResponse::NotFound()
                .json(serde_json::json!({ "success": false, "error": "not found" })),
            AppError::Conflict(body) => {
                let mut obj = serde_json::json!({ "success": false });
                if let (Some(dst), Some(src)) = (obj.as_object_mut(), body.as_object()) {
                    for (k, v) in src {
                        dst.insert(k.clone(), v.clone());
                    }
                }
                HttpResponse::Conflict().json(obj)
            }
            AppError::Validation(msg) => HttpResponse::BadRequest()
                .json(serde_json::json!({ "success": false, "error": msg })),
            _ => {
                log::error!("{self}");
                HttpResponse::InternalServerError()
                    .json(serde_json::json!({ "success": false, "error": "internal server error" }))
            }
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        AppError::Pool(e)
    }
}
