use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Serialize)]
pub struct Teilprojekt {
    pub id: i64,
    pub gesuch_id: i64,
    pub nummer: i64,
    pub name: String,
    pub beschreibung: String,
    pub budget: f64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct Massnahme {
    pub id: i64,
    pub teilprojekt_id: i64,
    pub nummer: i64,
    pub name: String,
    pub beschreibung: String,
    pub budget: f64,
}

/// Sub-project data as delivered by the extraction service or entered
/// manually. Shared between the webhook payload and the fallback path.
#[derive(Debug, Deserialize)]
pub struct NewTeilprojekt {
    pub nummer: i64,
    pub name: String,
    #[serde(default)]
    pub beschreibung: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub massnahmen: Vec<NewMassnahme>,
}

#[derive(Debug, Deserialize)]
pub struct NewMassnahme {
    pub nummer: i64,
    pub name: String,
    #[serde(default)]
    pub beschreibung: String,
    #[serde(default)]
    pub budget: f64,
}

/// Insert a sub-project, keyed on (gesuch_id, nummer). A repeat insert with
/// the same key is ignored, which is what makes webhook re-delivery safe.
/// Returns the row id of the (possibly pre-existing) sub-project.
pub fn upsert(conn: &Connection, gesuch_id: i64, tp: &NewTeilprojekt) -> Result<i64, AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO teilprojekte (gesuch_id, nummer, name, beschreibung, budget)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![gesuch_id, tp.nummer, tp.name, tp.beschreibung, tp.budget],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM teilprojekte WHERE gesuch_id = ?1 AND nummer = ?2",
        params![gesuch_id, tp.nummer],
        |row| row.get(0),
    )?;

    for m in &tp.massnahmen {
        conn.execute(
            "INSERT OR IGNORE INTO massnahmen (teilprojekt_id, nummer, name, beschreibung, budget)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, m.nummer, m.name, m.beschreibung, m.budget],
        )?;
    }

    Ok(id)
}

pub fn find_for_gesuch(conn: &Connection, gesuch_id: i64) -> Result<Vec<Teilprojekt>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, gesuch_id, nummer, name, beschreibung, budget, status
         FROM teilprojekte WHERE gesuch_id = ?1 ORDER BY nummer",
    )?;
    let rows = stmt
        .query_map(params![gesuch_id], |row| {
            Ok(Teilprojekt {
                id: row.get(0)?,
                gesuch_id: row.get(1)?,
                nummer: row.get(2)?,
                name: row.get(3)?,
                beschreibung: row.get(4)?,
                budget: row.get(5)?,
                status: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_massnahmen(conn: &Connection, teilprojekt_id: i64) -> Result<Vec<Massnahme>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, teilprojekt_id, nummer, name, beschreibung, budget
         FROM massnahmen WHERE teilprojekt_id = ?1 ORDER BY nummer",
    )?;
    let rows = stmt
        .query_map(params![teilprojekt_id], |row| {
            Ok(Massnahme {
                id: row.get(0)?,
                teilprojekt_id: row.get(1)?,
                nummer: row.get(2)?,
                name: row.get(3)?,
                beschreibung: row.get(4)?,
                budget: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_for_gesuch(conn: &Connection, gesuch_id: i64) -> Result<i64, AppError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM teilprojekte WHERE gesuch_id = ?1",
        params![gesuch_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
