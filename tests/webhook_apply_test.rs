//! Integration tests for webhook payload application: idempotency under
//! re-delivery and the race between webhook and status poll.

mod common;

use agrirapport::models::{export, gesuch, rapport, service_job, teilprojekt};
use agrirapport::processing::webhooks::{
    self, GesuchProcessedPayload, RapporteReadyPayload, WordReadyPayload,
};
use common::{gesuch_status, seed_admin, seed_gesuch, seed_job, setup_test_db};
use serde_json::json;

fn processed_payload(gesuch_id: i64, job_id: &str) -> GesuchProcessedPayload {
    serde_json::from_value(json!({
        "event": "gesuch.processed",
        "jobId": job_id,
        "gesuchId": gesuch_id,
        "status": "completed",
        "teilprojekte": [
            { "nummer": 1, "name": "Bewaesserung", "budget": 12000.0,
              "massnahmen": [ { "nummer": 1, "name": "Leitungsbau", "budget": 8000.0 } ] },
            { "nummer": 2, "name": "Weidepflege", "budget": 5000.0 }
        ]
    }))
    .unwrap()
}

#[test]
fn test_gesuch_processed_applies_once() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-1");

    let payload = processed_payload(gesuch_id, "job-1");
    webhooks::apply_gesuch_processed(&conn, &payload).unwrap();

    assert_eq!(gesuch_status(&conn, gesuch_id), "verarbeitet");
    let tps = teilprojekt::find_for_gesuch(&conn, gesuch_id).unwrap();
    assert_eq!(tps.len(), 2);
    assert_eq!(teilprojekt::find_massnahmen(&conn, tps[0].id).unwrap().len(), 1);

    // Re-delivery: same payload, no duplicates, status unchanged.
    webhooks::apply_gesuch_processed(&conn, &payload).unwrap();
    assert_eq!(teilprojekt::count_for_gesuch(&conn, gesuch_id).unwrap(), 2);
    assert_eq!(gesuch_status(&conn, gesuch_id), "verarbeitet");

    let job = service_job::find_by_job_id(&conn, "job-1").unwrap().unwrap();
    assert_eq!(job.status, "completed");

    println!("[PASS] test_gesuch_processed_applies_once");
}

#[test]
fn test_gesuch_processed_failure() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-1");

    let payload: GesuchProcessedPayload = serde_json::from_value(json!({
        "jobId": "job-1",
        "gesuchId": gesuch_id,
        "status": "failed",
        "error": "document unreadable"
    }))
    .unwrap();
    webhooks::apply_gesuch_processed(&conn, &payload).unwrap();

    assert_eq!(gesuch_status(&conn, gesuch_id), "fehler");
    let record = gesuch::find_by_id(&conn, gesuch_id).unwrap().unwrap();
    assert_eq!(record.service_error.as_deref(), Some("document unreadable"));
    let job = service_job::find_by_job_id(&conn, "job-1").unwrap().unwrap();
    assert_eq!(job.status, "failed");

    println!("[PASS] test_gesuch_processed_failure");
}

#[test]
fn test_gesuch_processed_non_terminal_status_is_ignored() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-1");

    let payload: GesuchProcessedPayload = serde_json::from_value(json!({
        "jobId": "job-1",
        "gesuchId": gesuch_id,
        "status": "pending",
        "teilprojekte": []
    }))
    .unwrap();
    let detail = webhooks::apply_gesuch_processed(&conn, &payload).unwrap();
    assert_eq!(detail["status"], "ignored");

    // Nothing moved: the Gesuch stays in flight and the job stays pending,
    // so a later terminal delivery can still land.
    assert_eq!(gesuch_status(&conn, gesuch_id), "verarbeitung");
    let job = service_job::find_by_job_id(&conn, "job-1").unwrap().unwrap();
    assert_eq!(job.status, "pending");

    let terminal = processed_payload(gesuch_id, "job-1");
    webhooks::apply_gesuch_processed(&conn, &terminal).unwrap();
    assert_eq!(gesuch_status(&conn, gesuch_id), "verarbeitet");

    println!("[PASS] test_gesuch_processed_non_terminal_status_is_ignored");
}

#[test]
fn test_gesuch_processed_unknown_gesuch() {
    let (_dir, conn) = setup_test_db();
    let payload = processed_payload(999, "job-x");
    assert!(webhooks::apply_gesuch_processed(&conn, &payload).is_err());

    println!("[PASS] test_gesuch_processed_unknown_gesuch");
}

#[test]
fn test_poll_then_webhook_keeps_entity_work() {
    // The status poll terminalizes the job first; the later webhook must
    // still write the entity data it alone carries.
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-1");

    // Poll path: status-only transition.
    gesuch::mark_verarbeitet(&conn, gesuch_id).unwrap();
    assert!(service_job::complete(&conn, "job-1", &json!({ "source": "poll" })).unwrap());
    assert_eq!(teilprojekt::count_for_gesuch(&conn, gesuch_id).unwrap(), 0);

    // Late webhook: upserts still run, job stays completed.
    let payload = processed_payload(gesuch_id, "job-1");
    webhooks::apply_gesuch_processed(&conn, &payload).unwrap();
    assert_eq!(teilprojekt::count_for_gesuch(&conn, gesuch_id).unwrap(), 2);
    assert_eq!(gesuch_status(&conn, gesuch_id), "verarbeitet");

    println!("[PASS] test_poll_then_webhook_keeps_entity_work");
}

#[test]
fn test_rapporte_ready_creates_templates_once() {
    let (_dir, conn) = setup_test_db();
    seed_admin(&conn);
    let gesuch_id = seed_gesuch(&conn);
    teilprojekt::upsert(
        &conn,
        gesuch_id,
        &serde_json::from_value(json!({ "nummer": 1, "name": "Bewaesserung", "budget": 12000.0 }))
            .unwrap(),
    )
    .unwrap();
    seed_job(&conn, gesuch_id, "job-2");

    let payload: RapporteReadyPayload = serde_json::from_value(json!({
        "jobId": "job-2",
        "gesuchId": gesuch_id,
        "rapporte": [
            { "titel": "Rapport TP1 Bewaesserung", "teilprojektNummer": 1,
              "inhalt": { "ziele": "" } },
            { "titel": "Gesamtrapport", "category": "gesamt" }
        ]
    }))
    .unwrap();

    let detail = webhooks::apply_rapporte_ready(&conn, &payload).unwrap();
    assert_eq!(detail["created"], 2);
    let linked = rapport::find_for_gesuch(&conn, gesuch_id).unwrap();
    assert_eq!(linked.len(), 2);

    let first = rapport::find_by_id(&conn, linked[0]).unwrap().unwrap();
    assert_eq!(first.status, "entwurf");
    assert!(first.teilprojekt_id.is_some());
    assert_eq!(first.category, "tp1");

    // Re-delivery is gated on the job transition: nothing new appears.
    let detail = webhooks::apply_rapporte_ready(&conn, &payload).unwrap();
    assert_eq!(detail["created"], 0);
    assert_eq!(rapport::find_for_gesuch(&conn, gesuch_id).unwrap().len(), 2);

    println!("[PASS] test_rapporte_ready_creates_templates_once");
}

#[test]
fn test_word_ready_updates_export() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-3");
    export::create_pending(&conn, gesuch_id, "job-3").unwrap();

    let payload: WordReadyPayload = serde_json::from_value(json!({
        "jobId": "job-3",
        "gesuchId": gesuch_id,
        "downloadUrl": "https://files.example.com/rapport.docx",
        "expiresAt": "2025-09-01T00:00:00Z",
        "fileSize": 52000,
        "fileName": "rapport.docx"
    }))
    .unwrap();
    webhooks::apply_word_ready(&conn, &payload).unwrap();

    let record = export::find_by_job_id(&conn, "job-3").unwrap().unwrap();
    assert_eq!(record.status, "ready");
    assert_eq!(record.download_url.as_deref(), Some("https://files.example.com/rapport.docx"));
    assert_eq!(record.file_size, Some(52000));

    let job = service_job::find_by_job_id(&conn, "job-3").unwrap().unwrap();
    assert_eq!(job.status, "completed");

    println!("[PASS] test_word_ready_updates_export");
}

#[test]
fn test_word_ready_out_of_order() {
    // Webhook lands before any export row exists: the row is created.
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    seed_job(&conn, gesuch_id, "job-4");

    let payload: WordReadyPayload = serde_json::from_value(json!({
        "jobId": "job-4",
        "gesuchId": gesuch_id,
        "downloadUrl": "https://files.example.com/out-of-order.docx",
        "expiresAt": "2025-09-01T00:00:00Z"
    }))
    .unwrap();
    webhooks::apply_word_ready(&conn, &payload).unwrap();

    let record = export::find_by_job_id(&conn, "job-4").unwrap().unwrap();
    assert_eq!(record.status, "ready");
    assert_eq!(record.gesuch_id, gesuch_id);

    println!("[PASS] test_word_ready_out_of_order");
}
