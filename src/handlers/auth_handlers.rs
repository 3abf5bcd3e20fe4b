use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::{password, token};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::user;

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
/// Verifies credentials and issues a bearer token.
pub async fn login(
    pool: web::Data<DbPool>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;

    let Some((account, hash)) = user::find_for_login(&conn, form.username.trim())? else {
        return Err(AppError::Auth("invalid credentials".to_string()));
    };
    if !password::verify_password(&form.password, &hash).unwrap_or(false) {
        return Err(AppError::Auth("invalid credentials".to_string()));
    }

    let bearer = token::issue(&conn, account.id)?;
    log::info!("user '{}' logged in", account.username);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": bearer,
        "user": account,
    })))
}

/// POST /api/auth/logout
/// Revokes the presented bearer token.
pub async fn logout(pool: web::Data<DbPool>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;
    if let Some(bearer) = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(token::from_header)
    {
        token::revoke(&conn, bearer)?;
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
