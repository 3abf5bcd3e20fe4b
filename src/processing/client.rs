use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::service_job;

/// Outcome of a dispatch to the external processing service. Callers branch
/// on `job_id`: `Some` means the remote pipeline owns the work, `None` means
/// the caller must take the manual/fallback path. There is no error variant
/// on purpose; a remote failure is not an application error.
#[derive(Debug)]
pub struct Dispatch {
    pub job_id: Option<String>,
    pub status: &'static str,
    pub message: Option<String>,
}

impl Dispatch {
    fn processing(job_id: String) -> Self {
        Dispatch { job_id: Some(job_id), status: "processing", message: None }
    }

    fn manual(message: String) -> Self {
        Dispatch { job_id: None, status: "manual", message: Some(message) }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct JobResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

/// Client for the extraction/export microservice. Holds its own configured
/// `reqwest::Client` so base URL, API key and timeouts are explicit and a
/// test can point it anywhere.
#[derive(Clone)]
pub struct MicroserviceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    callback_base: String,
    status_timeout: std::time::Duration,
}

impl MicroserviceClient {
    pub fn new(cfg: &ServiceConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            callback_base: cfg.callback_base.trim_end_matches('/').to_string(),
            status_timeout: cfg.status_timeout,
        }
    }

    fn callback_url(&self, endpoint: &str) -> String {
        format!("{}/api/webhooks/{endpoint}", self.callback_base)
    }

    /// Submit an uploaded Gesuch document for extraction.
    pub async fn process_gesuch(
        &self,
        pool: &DbPool,
        gesuch_id: i64,
        jahr: i64,
        titel: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> Result<Dispatch, AppError> {
        let callback = self.callback_url("gesuch-processed");
        let form = Form::new()
            .part(
                "file",
                Part::bytes(file_bytes)
                    .file_name(file_name.to_string())
                    .mime_str("application/octet-stream")
                    .unwrap_or_else(|_| Part::bytes(Vec::new())),
            )
            .text("gesuchId", gesuch_id.to_string())
            .text("jahr", jahr.to_string())
            .text("titel", titel.to_string())
            .text("callbackUrl", callback.clone());

        let url = format!("{}/process-gesuch", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .multipart(form)
            .send()
            .await;

        let payload = json!({
            "gesuchId": gesuch_id,
            "jahr": jahr,
            "titel": titel,
            "callbackUrl": callback,
        });
        self.finish_dispatch(pool, "process-gesuch", response, payload).await
    }

    /// Ask the service to generate report templates for extracted sub-projects.
    pub async fn generate_rapporte(
        &self,
        pool: &DbPool,
        gesuch_id: i64,
        teilprojekte: &serde_json::Value,
        template_settings: &serde_json::Value,
    ) -> Result<Dispatch, AppError> {
        let payload = json!({
            "gesuchId": gesuch_id,
            "teilprojekte": teilprojekte,
            "templateSettings": template_settings,
            "callbackUrl": self.callback_url("rapporte-ready"),
        });
        let url = format!("{}/generate-rapporte", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&payload)
            .send()
            .await;
        self.finish_dispatch(pool, "generate-rapporte", response, payload).await
    }

    /// Request a Word export of approved rapporte.
    pub async fn export_word(
        &self,
        pool: &DbPool,
        gesuch_id: i64,
        rapport_ids: &[i64],
        format: &str,
    ) -> Result<Dispatch, AppError> {
        let payload = json!({
            "rapportIds": rapport_ids,
            "gesuchId": gesuch_id,
            "format": format,
            "callbackUrl": self.callback_url("word-ready"),
        });
        let url = format!("{}/export-word", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&payload)
            .send()
            .await;
        self.finish_dispatch(pool, "export-word", response, payload).await
    }

    /// Poll the status of a dispatched job. Returns None on any failure so
    /// the caller treats a broken poll like a missing webhook: no decision.
    pub async fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        let url = format!("{}/status/{job_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .timeout(self.status_timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<JobStatus>().await {
                Ok(status) => Some(status),
                Err(e) => {
                    log::warn!("status poll for job {job_id}: unparseable body: {e}");
                    None
                }
            },
            Ok(resp) => {
                log::warn!("status poll for job {job_id}: HTTP {}", resp.status());
                None
            }
            Err(e) => {
                log::warn!("status poll for job {job_id} failed: {e}");
                None
            }
        }
    }

    /// Shared tail of every dispatch: on HTTP success with a job id, record
    /// a pending ServiceJob and report "processing"; on any failure, degrade
    /// to "manual" without propagating an error.
    async fn finish_dispatch(
        &self,
        pool: &DbPool,
        operation: &str,
        response: Result<reqwest::Response, reqwest::Error>,
        payload: serde_json::Value,
    ) -> Result<Dispatch, AppError> {
        let message = match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<JobResponse>().await {
                Ok(body) => {
                    let conn = pool.get()?;
                    service_job::create(&conn, &body.job_id, operation, &payload)?;
                    return Ok(Dispatch::processing(body.job_id));
                }
                Err(e) => format!("{operation}: 2xx without a job id: {e}"),
            },
            Ok(resp) => format!("{operation}: service returned HTTP {}", resp.status()),
            Err(e) if e.is_timeout() => format!("{operation}: service timed out"),
            Err(e) => format!("{operation}: service unreachable: {e}"),
        };
        log::warn!("{message}; falling back to manual processing");
        Ok(Dispatch::manual(message))
    }
}
