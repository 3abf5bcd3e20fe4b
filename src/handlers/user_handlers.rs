use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::identity::{current_user, require_admin};
use crate::auth::password;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::user::{self, NewUser};

#[derive(Deserialize)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "member".to_string()
}

/// POST /api/users (admin)
/// Minimal provisioning endpoint so accounts exist to author rapporte.
pub async fn create(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    form: web::Json<UserForm>,
) -> Result<HttpResponse, AppError> {
    let caller = current_user(&req)?;
    require_admin(&caller)?;

    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation("username and password are required".to_string()));
    }
    if !matches!(form.role.as_str(), "member" | "admin" | "super_admin") {
        return Err(AppError::Validation(format!("unknown role '{}'", form.role)));
    }

    let hashed = password::hash_password(&form.password)
        .map_err(|_| AppError::Validation("password could not be hashed".to_string()))?;

    let conn = pool.get()?;
    let new = NewUser {
        username: username.to_string(),
        password: hashed,
        email: form.email.trim().to_string(),
        display_name: form.display_name.trim().to_string(),
        role: form.role.clone(),
    };
    let id = match user::create(&conn, &new) {
        Ok(id) => id,
        Err(AppError::Db(e)) if e.to_string().contains("UNIQUE") => {
            return Err(AppError::Conflict(serde_json::json!({
                "error": "username already exists",
            })));
        }
        Err(e) => return Err(e),
    };

    log::info!("admin '{}' created user '{}'", caller.username, username);
    Ok(HttpResponse::Created().json(serde_json::json!({ "success": true, "id": id })))
}
