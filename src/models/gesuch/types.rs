use serde::Serialize;

pub const STATUS_HOCHGELADEN: &str = "hochgeladen";
pub const STATUS_VERARBEITUNG: &str = "verarbeitung";
pub const STATUS_VERARBEITET: &str = "verarbeitet";
pub const STATUS_FEHLER: &str = "fehler";
pub const STATUS_MANUELL: &str = "manuell";

#[derive(Debug, Serialize)]
pub struct Gesuch {
    pub id: i64,
    pub jahr: i64,
    pub titel: String,
    pub beschreibung: String,
    pub status: String,
    pub service_job_id: Option<String>,
    pub processing_started_at: Option<String>,
    pub processing_completed_at: Option<String>,
    pub service_error: Option<String>,
    pub created_at: String,
}

pub struct NewGesuch {
    pub jahr: i64,
    pub titel: String,
    pub beschreibung: String,
}
