use actix_web::{HttpMessage, HttpRequest};
use serde::Serialize;

use crate::errors::AppError;

/// The authenticated principal, resolved once by the auth middleware and
/// stored in request extensions. Role is always read from here, never from
/// a request body.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin" || self.role == "super_admin"
    }
}

/// Fetch the authenticated user placed in extensions by `require_auth`.
pub fn current_user(req: &HttpRequest) -> Result<AuthUser, AppError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Auth("not authenticated".to_string()))
}

/// Check admin/super_admin role; returns Err(AppError) if denied.
pub fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("admin role required".to_string()))
    }
}
