use serde::Serialize;

pub const STATUS_ENTWURF: &str = "entwurf";
pub const STATUS_EINGEREICHT: &str = "eingereicht";
pub const STATUS_IN_BEARBEITUNG: &str = "in_bearbeitung";
pub const STATUS_FERTIG: &str = "fertig";
pub const STATUS_GENEHMIGT: &str = "genehmigt";
pub const STATUS_ABGELEHNT: &str = "abgelehnt";
pub const STATUS_ANGEFORDERT: &str = "angefordert";

/// Statuses from which an admin may approve or reject.
pub const APPROVABLE: &[&str] = &[STATUS_EINGEREICHT, STATUS_IN_BEARBEITUNG, STATUS_FERTIG];

/// Statuses an admin may set directly on update.
pub const ALL_STATUSES: &[&str] = &[
    STATUS_ENTWURF,
    STATUS_EINGEREICHT,
    STATUS_IN_BEARBEITUNG,
    STATUS_FERTIG,
    STATUS_GENEHMIGT,
    STATUS_ABGELEHNT,
    STATUS_ANGEFORDERT,
];

#[derive(Debug, Serialize)]
pub struct Rapport {
    pub id: i64,
    pub titel: String,
    pub beschreibung: String,
    pub inhalt: String,
    pub status: String,
    pub author_id: i64,
    pub teilprojekt_id: Option<i64>,
    pub massnahme_id: Option<i64>,
    pub category: String,
    pub priority: String,
    pub period: String,
    pub is_requested: bool,
    pub deadline: Option<String>,
    pub requested_by: Option<i64>,
    pub fulfilled_rapport_id: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
    pub approved_by: Option<i64>,
}

pub struct NewRapport {
    pub titel: String,
    pub beschreibung: String,
    pub inhalt: String,
    pub author_id: i64,
    pub teilprojekt_id: Option<i64>,
    pub massnahme_id: Option<i64>,
    pub category: String,
    pub priority: String,
    /// Reporting period, `YYYY-MM`. Part of the duplicate guard key.
    pub period: String,
}

/// Content fields an author may change while the rapport is editable.
pub struct RapportContent {
    pub titel: String,
    pub beschreibung: String,
    pub inhalt: String,
    pub category: String,
    pub priority: String,
    pub period: String,
}
