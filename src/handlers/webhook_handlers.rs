//! Inbound webhook endpoints for the processing microservice.
//!
//! Every call follows the same protocol: read the raw body and signature
//! header, write an audit row before doing anything else, verify the
//! signature (401 on mismatch, no side effects), then apply the payload in
//! a transaction and update the audit row. Internal failures still produce
//! a definitive 500 so the upstream retry policy can engage.

use actix_web::{HttpRequest, HttpResponse, web};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::webhook_log;
use crate::processing::{signature, webhooks};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/webhooks")
            .route("/gesuch-processed", web::post().to(gesuch_processed))
            .route("/rapporte-ready", web::post().to(rapporte_ready))
            .route("/word-ready", web::post().to(word_ready)),
    );
}

pub async fn gesuch_processed(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    receive(&pool, &config, &req, &body, "gesuch-processed", |conn, payload| {
        webhooks::apply_gesuch_processed(conn, &payload)
    })
}

pub async fn rapporte_ready(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    receive(&pool, &config, &req, &body, "rapporte-ready", |conn, payload| {
        webhooks::apply_rapporte_ready(conn, &payload)
    })
}

pub async fn word_ready(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    receive(&pool, &config, &req, &body, "word-ready", |conn, payload| {
        webhooks::apply_word_ready(conn, &payload)
    })
}

/// Shared receiver protocol. `apply` runs inside a transaction; the audit
/// row is written outside of it so a crash mid-apply still leaves a trace.
fn receive<P, F>(
    pool: &DbPool,
    config: &AppConfig,
    req: &HttpRequest,
    body: &[u8],
    endpoint: &str,
    apply: F,
) -> HttpResponse
where
    P: DeserializeOwned,
    F: FnOnce(&Connection, P) -> Result<Value, AppError>,
{
    let sig = req
        .headers()
        .get("X-Webhook-Signature")
        .and_then(|v| v.to_str().ok());

    let conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("webhook {endpoint}: pool error: {e}");
            return internal_error();
        }
    };

    let valid = signature::verify(body, sig, config.webhook_secret.as_deref());
    let body_text = String::from_utf8_lossy(body);
    let log_id = match webhook_log::insert(&conn, endpoint, &body_text, sig, valid) {
        Ok(id) => id,
        Err(e) => {
            log::error!("webhook {endpoint}: failed to write audit row: {e}");
            return internal_error();
        }
    };

    if !valid {
        log::warn!("webhook {endpoint}: invalid signature, rejecting");
        return HttpResponse::Unauthorized()
            .json(json!({ "success": false, "error": "invalid signature" }));
    }

    let payload: P = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            let msg = format!("malformed payload: {e}");
            let _ = webhook_log::mark_error(&conn, log_id, &msg);
            return HttpResponse::BadRequest().json(json!({ "success": false, "error": msg }));
        }
    };

    let applied = conn
        .unchecked_transaction()
        .map_err(AppError::from)
        .and_then(|tx| {
            let detail = apply(&tx, payload)?;
            tx.commit()?;
            Ok(detail)
        });

    match applied {
        Ok(detail) => {
            let _ = webhook_log::mark_processed(&conn, log_id);
            let mut ack = json!({ "success": true, "received": true });
            if let (Some(dst), Some(src)) = (ack.as_object_mut(), detail.as_object()) {
                for (k, v) in src {
                    dst.insert(k.clone(), v.clone());
                }
            }
            HttpResponse::Ok().json(ack)
        }
        Err(AppError::NotFound) => {
            let _ = webhook_log::mark_error(&conn, log_id, "referenced record not found");
            HttpResponse::NotFound()
                .json(json!({ "success": false, "error": "referenced record not found" }))
        }
        Err(e) => {
            log::error!("webhook {endpoint}: apply failed: {e}");
            let _ = webhook_log::mark_error(&conn, log_id, &e.to_string());
            internal_error()
        }
    }
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .json(json!({ "success": false, "error": "internal server error" }))
}
