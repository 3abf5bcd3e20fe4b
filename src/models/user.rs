use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

pub struct NewUser {
    pub username: String,
    /// Already hashed; hashing happens at the handler boundary.
    pub password: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

pub fn create(conn: &Connection, new: &NewUser) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO users (username, password, email, display_name, role)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new.username, new.password, new.email, new.display_name, new.role],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<User>, AppError> {
    let user = conn
        .query_row(
            "SELECT id, username, email, display_name, role FROM users WHERE id = ?1",
            params![id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Fetch a user with their password hash for login verification.
pub fn find_for_login(conn: &Connection, username: &str) -> Result<Option<(User, String)>, AppError> {
    let row = conn
        .query_row(
            "SELECT id, username, email, display_name, role, password
             FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok((
                    User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        display_name: row.get(3)?,
                        role: row.get(4)?,
                    },
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    Ok(row)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
    })
}
