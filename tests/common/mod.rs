//! Shared test infrastructure for model and processing layer tests.

use rusqlite::{Connection, params};
use tempfile::TempDir;

use agrirapport::auth::password;
use agrirapport::db::MIGRATIONS;
use agrirapport::models::gesuch::{self, NewGesuch};
use agrirapport::models::user::{self, NewUser};

/// Setup a temporary SQLite database with the full schema applied.
///
/// Returns (TempDir, Connection); the TempDir must be kept alive for the
/// Connection to remain valid.
pub fn setup_test_db() -> (TempDir, Connection) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let conn = Connection::open(&db_path).expect("Failed to open test DB");

    conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA journal_mode=WAL;")
        .expect("Failed to set pragmas");
    conn.execute_batch(MIGRATIONS)
        .expect("Failed to run migrations");

    (dir, conn)
}

/// Seed an admin user and return its id.
pub fn seed_admin(conn: &Connection) -> i64 {
    user::create(
        conn,
        &NewUser {
            username: "admin".to_string(),
            password: password::hash_password("admin123").unwrap(),
            email: "admin@test.com".to_string(),
            display_name: "Admin".to_string(),
            role: "admin".to_string(),
        },
    )
    .unwrap()
}

/// Seed a regular member and return its id.
pub fn seed_member(conn: &Connection, username: &str) -> i64 {
    user::create(
        conn,
        &NewUser {
            username: username.to_string(),
            password: password::hash_password("pass").unwrap(),
            email: format!("{username}@test.com"),
            display_name: username.to_string(),
            role: "member".to_string(),
        },
    )
    .unwrap()
}

/// Seed a Gesuch in `hochgeladen` and return its id.
pub fn seed_gesuch(conn: &Connection) -> i64 {
    gesuch::create(
        conn,
        &NewGesuch {
            jahr: 2025,
            titel: "Strukturverbesserung 2025".to_string(),
            beschreibung: "Test".to_string(),
        },
    )
    .unwrap()
}

/// Seed a pending service job for a Gesuch and return the job id string.
pub fn seed_job(conn: &Connection, gesuch_id: i64, job_id: &str) -> String {
    agrirapport::models::service_job::create(
        conn,
        job_id,
        "process-gesuch",
        &serde_json::json!({ "gesuchId": gesuch_id }),
    )
    .unwrap();
    gesuch::mark_verarbeitung(conn, gesuch_id, job_id).unwrap();
    job_id.to_string()
}

/// Direct status read helper.
pub fn gesuch_status(conn: &Connection, id: i64) -> String {
    conn.query_row("SELECT status FROM gesuche WHERE id = ?1", params![id], |r| r.get(0))
        .unwrap()
}
