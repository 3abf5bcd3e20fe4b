use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web,
};

use crate::auth::token;
use crate::db::DbPool;

/// Middleware function that resolves the bearer token to an `AuthUser` and
/// stores it in request extensions. Responds 401 if the token is missing
/// or unknown.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(token::from_header)
        .map(str::to_owned);

    let user = match bearer {
        Some(ref t) => {
            let pool = req
                .app_data::<web::Data<DbPool>>()
                .expect("DbPool missing from app data");
            match pool.get() {
                Ok(conn) => token::lookup(&conn, t).ok().flatten(),
                Err(e) => {
                    log::error!("auth middleware: pool error: {e}");
                    None
                }
            }
        }
        None => None,
    };

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await.map(|res| res.map_into_left_body())
        }
        None => {
            let response = HttpResponse::Unauthorized()
                .json(serde_json::json!({ "success": false, "error": "missing or invalid bearer token" }));
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}
