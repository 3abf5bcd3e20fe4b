//! Integration tests for the rapport model layer and its state machine.

mod common;

use agrirapport::models::rapport::{self, NewRapport};
use common::{seed_admin, seed_gesuch, seed_member, setup_test_db};

fn draft(conn: &rusqlite::Connection, author_id: i64, category: &str, period: &str) -> i64 {
    rapport::create(
        conn,
        &NewRapport {
            titel: "Monatsrapport".to_string(),
            beschreibung: "".to_string(),
            inhalt: "{}".to_string(),
            author_id,
            teilprojekt_id: None,
            massnahme_id: None,
            category: category.to_string(),
            priority: "normal".to_string(),
            period: period.to_string(),
        },
    )
    .unwrap()
}

#[test]
fn test_create_and_submit() {
    let (_dir, conn) = setup_test_db();
    let author = seed_member(&conn, "bauer1");
    let id = draft(&conn, author, "tp1", "2025-08");

    let record = rapport::find_by_id(&conn, id).unwrap().unwrap();
    assert_eq!(record.status, "entwurf");

    assert_eq!(rapport::submit(&conn, id, author).unwrap(), 1);
    let record = rapport::find_by_id(&conn, id).unwrap().unwrap();
    assert_eq!(record.status, "eingereicht");
    assert!(record.submitted_at.is_some());

    println!("[PASS] test_create_and_submit");
}

#[test]
fn test_submit_guards() {
    let (_dir, conn) = setup_test_db();
    let author = seed_member(&conn, "bauer1");
    let other = seed_member(&conn, "bauer2");
    let id = draft(&conn, author, "tp1", "2025-08");

    // Not the author: no transition.
    assert_eq!(rapport::submit(&conn, id, other).unwrap(), 0);
    assert_eq!(rapport::find_by_id(&conn, id).unwrap().unwrap().status, "entwurf");

    // Double submit: second call changes nothing.
    assert_eq!(rapport::submit(&conn, id, author).unwrap(), 1);
    assert_eq!(rapport::submit(&conn, id, author).unwrap(), 0);

    println!("[PASS] test_submit_guards");
}

#[test]
fn test_approve_and_reject() {
    let (_dir, conn) = setup_test_db();
    let admin = seed_admin(&conn);
    let author = seed_member(&conn, "bauer1");

    // Approval from entwurf is illegal.
    let id = draft(&conn, author, "tp1", "2025-08");
    assert_eq!(rapport::approve(&conn, id, admin).unwrap(), 0);

    rapport::submit(&conn, id, author).unwrap();
    assert_eq!(rapport::approve(&conn, id, admin).unwrap(), 1);
    let record = rapport::find_by_id(&conn, id).unwrap().unwrap();
    assert_eq!(record.status, "genehmigt");
    assert_eq!(record.approved_by, Some(admin));
    assert!(record.approved_at.is_some());

    // genehmigt is terminal: a late reject does not move it.
    assert_eq!(rapport::reject(&conn, id, admin, "zu spaet").unwrap(), 0);
    assert_eq!(rapport::find_by_id(&conn, id).unwrap().unwrap().status, "genehmigt");

    // Rejection path keeps the reason.
    let id2 = draft(&conn, author, "tp2", "2025-08");
    rapport::submit(&conn, id2, author).unwrap();
    assert_eq!(rapport::reject(&conn, id2, admin, "Budget fehlt").unwrap(), 1);
    let record = rapport::find_by_id(&conn, id2).unwrap().unwrap();
    assert_eq!(record.status, "abgelehnt");
    assert_eq!(record.rejection_reason.as_deref(), Some("Budget fehlt"));

    println!("[PASS] test_approve_and_reject");
}

#[test]
fn test_duplicate_guard() {
    let (_dir, conn) = setup_test_db();
    let author = seed_member(&conn, "bauer1");
    let other = seed_member(&conn, "bauer2");
    let id = draft(&conn, author, "tp1", "2025-08");

    // Same author, category and period clashes.
    let dup = rapport::find_duplicate(&conn, author, "tp1", "2025-08").unwrap();
    assert_eq!(dup, Some((id, "entwurf".to_string())));

    // Another author, another period or category: no clash.
    assert!(rapport::find_duplicate(&conn, other, "tp1", "2025-08").unwrap().is_none());
    assert!(rapport::find_duplicate(&conn, author, "tp1", "2025-09").unwrap().is_none());
    assert!(rapport::find_duplicate(&conn, author, "tp2", "2025-08").unwrap().is_none());

    // A rejected rapport does not block a retry.
    let admin = seed_admin(&conn);
    rapport::submit(&conn, id, author).unwrap();
    rapport::reject(&conn, id, admin, "nochmal").unwrap();
    assert!(rapport::find_duplicate(&conn, author, "tp1", "2025-08").unwrap().is_none());

    println!("[PASS] test_duplicate_guard");
}

#[test]
fn test_update_content_window() {
    let (_dir, conn) = setup_test_db();
    let admin = seed_admin(&conn);
    let author = seed_member(&conn, "bauer1");
    let id = draft(&conn, author, "tp1", "2025-08");

    let content = rapport::RapportContent {
        titel: "Monatsrapport v2".to_string(),
        beschreibung: "aktualisiert".to_string(),
        inhalt: r#"{"ziele":"x"}"#.to_string(),
        category: "tp1".to_string(),
        priority: "hoch".to_string(),
        period: "2025-08".to_string(),
    };

    // Editable while entwurf and eingereicht.
    assert_eq!(rapport::update_content(&conn, id, author, &content).unwrap(), 1);
    rapport::submit(&conn, id, author).unwrap();
    assert_eq!(rapport::update_content(&conn, id, author, &content).unwrap(), 1);

    // Frozen once decided.
    rapport::approve(&conn, id, admin).unwrap();
    assert_eq!(rapport::update_content(&conn, id, author, &content).unwrap(), 0);

    // Admin update bypasses the window.
    assert_eq!(rapport::admin_update(&conn, id, &content, None).unwrap(), 1);

    println!("[PASS] test_update_content_window");
}

#[test]
fn test_delete_rules() {
    let (_dir, conn) = setup_test_db();
    let author = seed_member(&conn, "bauer1");
    let id = draft(&conn, author, "tp1", "2025-08");

    // Author delete only while entwurf.
    rapport::submit(&conn, id, author).unwrap();
    assert_eq!(rapport::delete_draft(&conn, id, author).unwrap(), 0);
    assert!(rapport::find_by_id(&conn, id).unwrap().is_some());

    // Admin delete works in any status.
    assert_eq!(rapport::delete_any(&conn, id).unwrap(), 1);
    assert!(rapport::find_by_id(&conn, id).unwrap().is_none());

    let id2 = draft(&conn, author, "tp2", "2025-08");
    assert_eq!(rapport::delete_draft(&conn, id2, author).unwrap(), 1);

    println!("[PASS] test_delete_rules");
}

#[test]
fn test_requested_rapport_fulfillment() {
    let (_dir, conn) = setup_test_db();
    let admin = seed_admin(&conn);
    let author = seed_member(&conn, "bauer1");

    let request_id = rapport::create_request(
        &conn,
        "Zwischenbericht TP1",
        "Bitte bis Ende Monat",
        "tp1",
        author,
        admin,
        Some("2025-09-30"),
    )
    .unwrap();

    let record = rapport::find_by_id(&conn, request_id).unwrap().unwrap();
    assert_eq!(record.status, "angefordert");
    assert!(record.is_requested);
    assert_eq!(record.deadline.as_deref(), Some("2025-09-30"));
    assert_eq!(record.requested_by, Some(admin));

    // Fulfillment links the authored rapport onto the request.
    let fulfilling = draft(&conn, author, "tp1", "2025-09");
    assert_eq!(rapport::link_fulfillment(&conn, request_id, fulfilling, author).unwrap(), 1);
    let record = rapport::find_by_id(&conn, request_id).unwrap().unwrap();
    assert_eq!(record.fulfilled_rapport_id, Some(fulfilling));

    // A second fulfillment is refused; the first link stands.
    let second = draft(&conn, author, "tp1", "2025-10");
    assert_eq!(rapport::link_fulfillment(&conn, request_id, second, author).unwrap(), 0);
    let record = rapport::find_by_id(&conn, request_id).unwrap().unwrap();
    assert_eq!(record.fulfilled_rapport_id, Some(fulfilling));

    println!("[PASS] test_requested_rapport_fulfillment");
}

#[test]
fn test_fulfillment_requires_assigned_author() {
    let (_dir, conn) = setup_test_db();
    let admin = seed_admin(&conn);
    let assigned = seed_member(&conn, "bauer1");
    let intruder = seed_member(&conn, "bauer2");

    let request_id = rapport::create_request(
        &conn,
        "Zwischenbericht TP1",
        "",
        "tp1",
        assigned,
        admin,
        None,
    )
    .unwrap();

    // Someone else's rapport cannot close a request assigned to bauer1.
    let foreign = draft(&conn, intruder, "tp1", "2025-09");
    assert_eq!(rapport::link_fulfillment(&conn, request_id, foreign, intruder).unwrap(), 0);
    let record = rapport::find_by_id(&conn, request_id).unwrap().unwrap();
    assert!(record.fulfilled_rapport_id.is_none());
    assert_eq!(record.status, "angefordert");

    // The assigned author still can.
    let own = draft(&conn, assigned, "tp1", "2025-09");
    assert_eq!(rapport::link_fulfillment(&conn, request_id, own, assigned).unwrap(), 1);

    println!("[PASS] test_fulfillment_requires_assigned_author");
}

#[test]
fn test_find_all_scoping() {
    let (_dir, conn) = setup_test_db();
    let a = seed_member(&conn, "bauer1");
    let b = seed_member(&conn, "bauer2");
    draft(&conn, a, "tp1", "2025-08");
    draft(&conn, b, "tp1", "2025-08");
    draft(&conn, b, "tp2", "2025-08");

    assert_eq!(rapport::find_all(&conn, None).unwrap().len(), 3);
    assert_eq!(rapport::find_all(&conn, Some(a)).unwrap().len(), 1);
    assert_eq!(rapport::find_all(&conn, Some(b)).unwrap().len(), 2);

    println!("[PASS] test_find_all_scoping");
}
