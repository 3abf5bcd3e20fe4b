use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::AppError;
use super::types::*;

/// Create a rapport in `entwurf`. The duplicate guard (author + category +
/// period) is checked by the handler before calling this.
pub fn create(conn: &Connection, new: &NewRapport) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO rapporte (titel, beschreibung, inhalt, status, author_id,
                               teilprojekt_id, massnahme_id, category, priority, period)
         VALUES (?1, ?2, ?3, 'entwurf', ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.titel,
            new.beschreibung,
            new.inhalt,
            new.author_id,
            new.teilprojekt_id,
            new.massnahme_id,
            new.category,
            new.priority,
            new.period,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Create an admin-requested rapport in `angefordert`, assigned to a target
/// author with a deadline. Fulfilled later by linking, not by status change.
pub fn create_request(
    conn: &Connection,
    titel: &str,
    beschreibung: &str,
    category: &str,
    author_id: i64,
    requested_by: i64,
    deadline: Option<&str>,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO rapporte (titel, beschreibung, status, author_id, category,
                               is_requested, deadline, requested_by)
         VALUES (?1, ?2, 'angefordert', ?3, ?4, 1, ?5, ?6)",
        params![titel, beschreibung, author_id, category, deadline, requested_by],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Create a report template produced by the generation pipeline (webhook or
/// fallback). Templates start in `entwurf` and carry the template fields as
/// JSON in `inhalt`.
pub fn create_template(
    conn: &Connection,
    titel: &str,
    inhalt: &serde_json::Value,
    author_id: i64,
    teilprojekt_id: Option<i64>,
    category: &str,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO rapporte (titel, inhalt, status, author_id, teilprojekt_id, category)
         VALUES (?1, ?2, 'entwurf', ?3, ?4, ?5)",
        params![titel, inhalt.to_string(), author_id, teilprojekt_id, category],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Link a rapport template to its Gesuch (junction row). Re-inserting the
/// same pair is a no-op.
pub fn link_to_gesuch(
    conn: &Connection,
    gesuch_id: i64,
    rapport_id: i64,
    teilprojekt_id: Option<i64>,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO gesuch_rapporte (gesuch_id, rapport_id, teilprojekt_id)
         VALUES (?1, ?2, ?3)",
        params![gesuch_id, rapport_id, teilprojekt_id],
    )?;
    Ok(())
}

pub fn find_for_gesuch(conn: &Connection, gesuch_id: i64) -> Result<Vec<i64>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT rapport_id FROM gesuch_rapporte WHERE gesuch_id = ?1 ORDER BY rapport_id",
    )?;
    let ids = stmt
        .query_map(params![gesuch_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Rapport>, AppError> {
    let rapport = conn
        .query_row(
            &format!("{SELECT_RAPPORT} WHERE id = ?1"),
            params![id],
            map_rapport,
        )
        .optional()?;
    Ok(rapport)
}

/// List rapporte; non-admin callers only see their own.
pub fn find_all(conn: &Connection, author_id: Option<i64>) -> Result<Vec<Rapport>, AppError> {
    let mut rows = Vec::new();
    match author_id {
        Some(uid) => {
            let mut stmt =
                conn.prepare(&format!("{SELECT_RAPPORT} WHERE author_id = ?1 ORDER BY id DESC"))?;
            for r in stmt.query_map(params![uid], map_rapport)? {
                rows.push(r?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{SELECT_RAPPORT} ORDER BY id DESC"))?;
            for r in stmt.query_map([], map_rapport)? {
                rows.push(r?);
            }
        }
    }
    Ok(rows)
}

/// Duplicate guard: an existing rapport for the same author, category and
/// period that is not `abgelehnt` blocks creation of a second one.
pub fn find_duplicate(
    conn: &Connection,
    author_id: i64,
    category: &str,
    period: &str,
) -> Result<Option<(i64, String)>, AppError> {
    let existing = conn
        .query_row(
            "SELECT id, status FROM rapporte
             WHERE author_id = ?1 AND category = ?2 AND period = ?3
               AND status != 'abgelehnt'
             LIMIT 1",
            params![author_id, category, period],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(existing)
}

/// Author content update, legal only while `entwurf` or `eingereicht`.
/// Zero rows changed means the guard failed; the caller decides whether
/// that is 404, 403 or 409.
pub fn update_content(
    conn: &Connection,
    id: i64,
    author_id: i64,
    content: &RapportContent,
) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE rapporte
         SET titel = ?3, beschreibung = ?4, inhalt = ?5, category = ?6,
             priority = ?7, period = ?8, updated_at = ?9
         WHERE id = ?1 AND author_id = ?2 AND status IN ('entwurf', 'eingereicht')",
        params![
            id,
            author_id,
            content.titel,
            content.beschreibung,
            content.inhalt,
            content.category,
            content.priority,
            content.period,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(changed)
}

/// Admin update: any rapport, optionally setting the status directly.
pub fn admin_update(
    conn: &Connection,
    id: i64,
    content: &RapportContent,
    status: Option<&str>,
) -> Result<usize, AppError> {
    let changed = match status {
        Some(status) => conn.execute(
            "UPDATE rapporte
             SET titel = ?2, beschreibung = ?3, inhalt = ?4, category = ?5,
                 priority = ?6, period = ?7, status = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                id,
                content.titel,
                content.beschreibung,
                content.inhalt,
                content.category,
                content.priority,
                content.period,
                status,
                Utc::now().to_rfc3339(),
            ],
        )?,
        None => conn.execute(
            "UPDATE rapporte
             SET titel = ?2, beschreibung = ?3, inhalt = ?4, category = ?5,
                 priority = ?6, period = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id,
                content.titel,
                content.beschreibung,
                content.inhalt,
                content.category,
                content.priority,
                content.period,
                Utc::now().to_rfc3339(),
            ],
        )?,
    };
    Ok(changed)
}

/// entwurf -> eingereicht, author only. Single-statement guard.
pub fn submit(conn: &Connection, id: i64, author_id: i64) -> Result<usize, AppError> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE rapporte
         SET status = 'eingereicht', submitted_at = ?3, updated_at = ?3
         WHERE id = ?1 AND author_id = ?2 AND status = 'entwurf'",
        params![id, author_id, now],
    )?;
    Ok(changed)
}

/// eingereicht|in_bearbeitung|fertig -> genehmigt, admin only (checked by
/// the handler; this guards the status precondition).
pub fn approve(conn: &Connection, id: i64, approved_by: i64) -> Result<usize, AppError> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE rapporte
         SET status = 'genehmigt', approved_by = ?2, approved_at = ?3, updated_at = ?3,
             rejection_reason = NULL
         WHERE id = ?1 AND status IN ('eingereicht', 'in_bearbeitung', 'fertig')",
        params![id, approved_by, now],
    )?;
    Ok(changed)
}

/// eingereicht|in_bearbeitung|fertig -> abgelehnt with a required reason.
pub fn reject(conn: &Connection, id: i64, approved_by: i64, reason: &str) -> Result<usize, AppError> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE rapporte
         SET status = 'abgelehnt', approved_by = ?2, approved_at = ?3, updated_at = ?3,
             rejection_reason = ?4
         WHERE id = ?1 AND status IN ('eingereicht', 'in_bearbeitung', 'fertig')",
        params![id, approved_by, now, reason],
    )?;
    Ok(changed)
}

/// Author delete, legal only for their own `entwurf`.
pub fn delete_draft(conn: &Connection, id: i64, author_id: i64) -> Result<usize, AppError> {
    let changed = conn.execute(
        "DELETE FROM rapporte WHERE id = ?1 AND author_id = ?2 AND status = 'entwurf'",
        params![id, author_id],
    )?;
    Ok(changed)
}

/// Admin delete, any status.
pub fn delete_any(conn: &Connection, id: i64) -> Result<usize, AppError> {
    let changed = conn.execute("DELETE FROM rapporte WHERE id = ?1", params![id])?;
    Ok(changed)
}

/// Mark an `angefordert` request as fulfilled by linking the newly authored
/// rapport. Guarded: still angefordert, not yet fulfilled, and assigned to
/// the fulfilling author. A request can only be closed by its own target.
pub fn link_fulfillment(
    conn: &Connection,
    request_id: i64,
    rapport_id: i64,
    author_id: i64,
) -> Result<usize, AppError> {
    let changed = conn.execute(
        "UPDATE rapporte
         SET fulfilled_rapport_id = ?2, updated_at = ?4
         WHERE id = ?1 AND author_id = ?3 AND status = 'angefordert'
           AND fulfilled_rapport_id IS NULL",
        params![request_id, rapport_id, author_id, Utc::now().to_rfc3339()],
    )?;
    Ok(changed)
}

const SELECT_RAPPORT: &str = "SELECT id, titel, beschreibung, inhalt, status, author_id,
        teilprojekt_id, massnahme_id, category, priority, period, is_requested,
        deadline, requested_by, fulfilled_rapport_id, rejection_reason,
        created_at, submitted_at, approved_at, approved_by
 FROM rapporte";

fn map_rapport(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rapport> {
    Ok(Rapport {
        id: row.get(0)?,
        titel: row.get(1)?,
        beschreibung: row.get(2)?,
        inhalt: row.get(3)?,
        status: row.get(4)?,
        author_id: row.get(5)?,
        teilprojekt_id: row.get(6)?,
        massnahme_id: row.get(7)?,
        category: row.get(8)?,
        priority: row.get(9)?,
        period: row.get(10)?,
        is_requested: row.get(11)?,
        deadline: row.get(12)?,
        requested_by: row.get(13)?,
        fulfilled_rapport_id: row.get(14)?,
        rejection_reason: row.get(15)?,
        created_at: row.get(16)?,
        submitted_at: row.get(17)?,
        approved_at: row.get(18)?,
        approved_by: row.get(19)?,
    })
}
