//! Integration tests for the local fallback path used when the processing
//! service is unavailable.

mod common;

use agrirapport::models::{export, rapport, teilprojekt};
use agrirapport::processing::fallback;
use common::{gesuch_status, seed_admin, seed_gesuch, setup_test_db};
use serde_json::json;

fn sample_teilprojekte() -> Vec<teilprojekt::NewTeilprojekt> {
    serde_json::from_value(json!([
        { "nummer": 1, "name": "Bewaesserung", "budget": 12000.0,
          "massnahmen": [ { "nummer": 1, "name": "Leitungsbau", "budget": 8000.0 } ] },
        { "nummer": 2, "name": "Weidepflege", "budget": 5000.0 }
    ]))
    .unwrap()
}

#[test]
fn test_manual_teilprojekte_mark_gesuch_manuell() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);

    let ids = fallback::create_teilprojekte(&conn, gesuch_id, &sample_teilprojekte()).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(gesuch_status(&conn, gesuch_id), "manuell");

    // Re-entry with the same numbers does not duplicate.
    let again = fallback::create_teilprojekte(&conn, gesuch_id, &sample_teilprojekte()).unwrap();
    assert_eq!(again, ids);
    assert_eq!(teilprojekt::count_for_gesuch(&conn, gesuch_id).unwrap(), 2);

    println!("[PASS] test_manual_teilprojekte_mark_gesuch_manuell");
}

#[test]
fn test_default_template_shape() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);
    fallback::create_teilprojekte(&conn, gesuch_id, &sample_teilprojekte()).unwrap();
    let tps = teilprojekt::find_for_gesuch(&conn, gesuch_id).unwrap();

    let template = fallback::default_template(&tps[0]);
    let obj = template.as_object().unwrap();
    assert_eq!(obj.len(), 5);
    for field in ["ziele", "massnahmen", "ergebnisse", "budget", "bemerkungen"] {
        assert!(obj.contains_key(field), "missing field {field}");
    }
    assert_eq!(template["budget"], 12000.0);

    println!("[PASS] test_default_template_shape");
}

#[test]
fn test_rapport_vorlagen_one_per_teilprojekt() {
    let (_dir, conn) = setup_test_db();
    let admin = seed_admin(&conn);
    let gesuch_id = seed_gesuch(&conn);
    fallback::create_teilprojekte(&conn, gesuch_id, &sample_teilprojekte()).unwrap();

    let ids = fallback::create_rapport_vorlagen(&conn, gesuch_id, admin).unwrap();
    assert_eq!(ids.len(), 2);

    let first = rapport::find_by_id(&conn, ids[0]).unwrap().unwrap();
    assert_eq!(first.status, "entwurf");
    assert_eq!(first.author_id, admin);
    assert_eq!(first.titel, "Rapport TP1 Bewaesserung");
    assert_eq!(first.category, "tp1");

    let linked = rapport::find_for_gesuch(&conn, gesuch_id).unwrap();
    assert_eq!(linked, ids);

    println!("[PASS] test_rapport_vorlagen_one_per_teilprojekt");
}

#[test]
fn test_export_platzhalter_expiry() {
    let (_dir, conn) = setup_test_db();
    let gesuch_id = seed_gesuch(&conn);

    let id = fallback::register_export_platzhalter(&conn, gesuch_id).unwrap();
    let exports = export::find_for_gesuch(&conn, gesuch_id).unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].id, id);
    assert_eq!(exports[0].status, "manuell");

    let expires = chrono::DateTime::parse_from_rfc3339(exports[0].expires_at.as_deref().unwrap())
        .unwrap()
        .with_timezone(&chrono::Utc);
    let hours = (expires - chrono::Utc::now()).num_hours();
    assert!((23..=24).contains(&hours), "expiry should be ~24h out, got {hours}h");

    println!("[PASS] test_export_platzhalter_expiry");
}
