use rand::Rng;
use rusqlite::{Connection, OptionalExtension, params};

use crate::auth::identity::AuthUser;
use crate::errors::AppError;

/// Generate a random 32-byte hex bearer token.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Issue a new bearer token for a user and persist it.
pub fn issue(conn: &Connection, user_id: i64) -> Result<String, AppError> {
    let token = generate_token();
    conn.execute(
        "INSERT INTO auth_tokens (token, user_id) VALUES (?1, ?2)",
        params![token, user_id],
    )?;
    Ok(token)
}

/// Resolve a bearer token to its user, or None if unknown.
pub fn lookup(conn: &Connection, token: &str) -> Result<Option<AuthUser>, AppError> {
    let user = conn
        .query_row(
            "SELECT u.id, u.username, u.role
             FROM auth_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.token = ?1",
            params![token],
            |row| {
                Ok(AuthUser {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    role: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Delete a token (logout). Unknown tokens are a no-op.
pub fn revoke(conn: &Connection, token: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
    Ok(())
}

/// Extract the bearer token from an Authorization header value.
pub fn from_header(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
