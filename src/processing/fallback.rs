//! Synchronous equivalents of the remote pipeline, used whenever a dispatch
//! reports no job. Writes the same tables the webhooks would, so everything
//! downstream is agnostic to which path produced the data.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde_json::json;

use crate::errors::AppError;
use crate::models::{export, gesuch, rapport, teilprojekt};
use crate::models::teilprojekt::NewTeilprojekt;

/// Create sub-projects directly from a caller-supplied array (no extraction)
/// and put the Gesuch into `manuell`. Returns the sub-project row ids.
pub fn create_teilprojekte(
    conn: &Connection,
    gesuch_id: i64,
    items: &[NewTeilprojekt],
) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        ids.push(teilprojekt::upsert(conn, gesuch_id, item)?);
    }
    gesuch::mark_manuell(conn, gesuch_id, "teilprojekte manually entered")?;
    log::info!("fallback: created {} teilprojekte for gesuch {gesuch_id}", ids.len());
    Ok(ids)
}

/// The deterministic default report template: five fixed fields.
pub fn default_template(tp: &teilprojekt::Teilprojekt) -> serde_json::Value {
    json!({
        "ziele": "",
        "massnahmen": "",
        "ergebnisse": "",
        "budget": tp.budget,
        "bemerkungen": "",
    })
}

/// Generate one default report template per sub-project of a Gesuch,
/// linked via junction rows. Returns the new rapport ids.
pub fn create_rapport_vorlagen(
    conn: &Connection,
    gesuch_id: i64,
    author_id: i64,
) -> Result<Vec<i64>, AppError> {
    let teilprojekte = teilprojekt::find_for_gesuch(conn, gesuch_id)?;
    let mut ids = Vec::with_capacity(teilprojekte.len());
    for tp in &teilprojekte {
        let titel = format!("Rapport TP{} {}", tp.nummer, tp.name);
        let inhalt = default_template(tp);
        let rapport_id = rapport::create_template(
            conn,
            &titel,
            &inhalt,
            author_id,
            Some(tp.id),
            &format!("tp{}", tp.nummer),
        )?;
        rapport::link_to_gesuch(conn, gesuch_id, rapport_id, Some(tp.id))?;
        ids.push(rapport_id);
    }
    log::info!("fallback: generated {} rapport templates for gesuch {gesuch_id}", ids.len());
    Ok(ids)
}

/// Register a placeholder export record with a 24-hour expiry.
pub fn register_export_platzhalter(conn: &Connection, gesuch_id: i64) -> Result<i64, AppError> {
    let expires_at = (Utc::now() + Duration::hours(24)).to_rfc3339();
    let id = export::create_placeholder(conn, gesuch_id, &expires_at)?;
    log::info!("fallback: registered placeholder export {id} for gesuch {gesuch_id}");
    Ok(id)
}
