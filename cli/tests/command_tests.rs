//! End-to-end operator flows against a temporary database.

mod common;

use common::{open_beta, test_config};
use pretty_assertions::assert_eq;
use relay_beta_cli::{ActivateReport, Beta, IssueReport, Report, VerifyReport, keygen};
use relay_beta_license::{IssueRequest, SigningKey, VerifyingKey, issue_at};

fn issued_token(report: &IssueReport) -> String {
    report.token().expect("token issued").encoded()
}

#[test]
fn keygen_produces_matching_pair() {
    let report = keygen();
    let signing = SigningKey::from_hex(&report.signing_key).unwrap();
    let public = VerifyingKey::from_hex(&report.public_key).unwrap();
    assert_eq!(signing.verifying_key(), public);
    assert!(report.to_string().contains("RELAY_BETA_SIGNING_KEY="));
}

#[test]
fn issue_then_verify() {
    let (_dir, beta) = open_beta();
    let report = beta.issue(42, "alice").unwrap();
    assert!(matches!(report, IssueReport::Issued { number: 1, .. }));
    assert!(report.succeeded());

    let token = issued_token(&report);
    assert!(token.starts_with("RELAY-BETA-"));
    match beta.verify(&token).unwrap() {
        VerifyReport::Valid { envelope, .. } => {
            assert_eq!(envelope.owner_id, 42);
            assert_eq!(envelope.display_name, "alice");
        }
        other => panic!("expected a valid token, got {other:?}"),
    }
}

#[test]
fn reissue_returns_same_token() {
    let (_dir, beta) = open_beta();
    let first = issued_token(&beta.issue(42, "alice").unwrap());
    let again = beta.issue(42, "alice").unwrap();
    assert!(matches!(again, IssueReport::AlreadyHave { .. }));
    assert_eq!(issued_token(&again), first);
}

#[test]
fn issue_without_signing_key_fails() {
    let (_dir, mut config) = test_config();
    config.signing_key = None;
    let beta = Beta::open(config).unwrap();
    let err = beta.issue(42, "alice").unwrap_err();
    assert!(err.to_string().contains("RELAY_BETA_SIGNING_KEY"));
}

#[test]
fn issue_reports_no_slots() {
    let (_dir, mut config) = test_config();
    config.max_beta_users = 1;
    let beta = Beta::open(config).unwrap();
    beta.issue(1, "a").unwrap();

    let report = beta.issue(2, "b").unwrap();
    assert!(matches!(report, IssueReport::NoSlots { issued: 1, cap: 1 }));
    assert!(!report.succeeded());
}

#[test]
fn tampered_token_is_invalid() {
    let (_dir, beta) = open_beta();
    let token = issued_token(&beta.issue(42, "alice").unwrap());
    let tampered = token.replacen("RELAY-BETA-", "RELAY-BETA-x", 1);

    let report = beta.verify(&tampered).unwrap();
    assert!(matches!(report, VerifyReport::Invalid { .. }));
    assert!(!report.succeeded());
}

#[test]
fn activation_lifecycle() {
    let (_dir, beta) = open_beta();
    let token = issued_token(&beta.issue(42, "alice").unwrap());

    let first = beta.activate(&token, Some("mac-a"), Some("1.4.0")).unwrap();
    let ActivateReport::Activated { key_id, count: 1, max: 2, .. } = first.clone() else {
        panic!("expected first activation, got {first:?}");
    };
    assert!(matches!(
        beta.activate(&token, Some("mac-a"), None).unwrap(),
        ActivateReport::AlreadyActivated { .. }
    ));
    assert!(matches!(
        beta.activate(&token, Some("mac-b"), None).unwrap(),
        ActivateReport::Activated { count: 2, .. }
    ));

    let denied = beta.activate(&token, Some("mac-c"), None).unwrap();
    assert_eq!(denied.to_string(), format!("limit_reached:2 (key {key_id})"));
    assert!(!denied.succeeded());

    assert!(beta.deactivate(&key_id, "mac-a").unwrap().removed);
    assert!(!beta.deactivate(&key_id, "mac-a").unwrap().removed);
    assert!(matches!(
        beta.activate(&token, Some("mac-c"), None).unwrap(),
        ActivateReport::Activated { count: 2, .. }
    ));
}

#[test]
fn activation_defaults_to_local_fingerprint() {
    let (_dir, beta) = open_beta();
    let token = issued_token(&beta.issue(7, "bob").unwrap());

    match beta.activate(&token, None, None).unwrap() {
        ActivateReport::Activated { machine_id, .. } => {
            assert_eq!(machine_id, relay_beta_cli::machine_fingerprint());
        }
        other => panic!("expected activation, got {other:?}"),
    }
}

#[test]
fn expired_token_cannot_activate() {
    let (_dir, beta) = open_beta();
    let key = SigningKey::from_bytes(&[11u8; 32]);
    let request = IssueRequest {
        owner_id: 9,
        display_name: "old",
        validity_days: 7,
        cohort: "beta-jan-2026",
    };
    let token = issue_at(request, Some(&key), 1_600_000_000).unwrap().encode();

    let verified = beta.verify(&token).unwrap();
    assert!(matches!(verified, VerifyReport::Valid { .. }));
    assert!(!verified.succeeded());

    let report = beta.activate(&token, Some("mac-a"), None).unwrap();
    assert!(matches!(report, ActivateReport::Rejected { .. }));
    assert_eq!(beta.stats().unwrap().activations.total_keys, 0);
}

#[test]
fn token_from_another_key_cannot_activate() {
    let (_dir, beta) = open_beta();
    let stranger = SigningKey::from_bytes(&[99u8; 32]);
    let request = IssueRequest {
        owner_id: 9,
        display_name: "mallory",
        validity_days: 7,
        cohort: "beta-jan-2026",
    };
    let token = issue_at(request, Some(&stranger), chrono::Utc::now().timestamp())
        .unwrap()
        .encode();

    assert!(matches!(
        beta.activate(&token, Some("mac-a"), None).unwrap(),
        ActivateReport::Rejected { .. }
    ));
}

#[test]
fn stats_cover_both_stores() {
    let (_dir, beta) = open_beta();
    let a = issued_token(&beta.issue(1, "a").unwrap());
    let b = issued_token(&beta.issue(2, "b").unwrap());
    beta.activate(&a, Some("m1"), None).unwrap();
    beta.activate(&a, Some("m2"), None).unwrap();
    beta.activate(&b, Some("m1"), None).unwrap();

    let stats = beta.stats().unwrap();
    assert_eq!(stats.issuance.issued, 2);
    assert_eq!(stats.issuance.slots_left, 98);
    assert_eq!(stats.activations.total_keys, 2);
    assert_eq!(stats.activations.total_activations, 3);
    assert_eq!(stats.activations.keys_at_limit, 1);
}

#[test]
fn reports_serialize_with_status_tag() {
    let (_dir, beta) = open_beta();
    let report = beta.issue(42, "alice").unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "issued");
    assert_eq!(json["number"], 1);
}

#[test]
fn database_reopens_with_state() {
    let (_dir, config) = test_config();
    let token = {
        let beta = Beta::open(config.clone()).unwrap();
        issued_token(&beta.issue(42, "alice").unwrap())
    };
    let beta = Beta::open(config).unwrap();
    assert_eq!(issued_token(&beta.issue(42, "alice").unwrap()), token);
}

fn valid_report(remaining_secs: i64) -> VerifyReport {
    VerifyReport::Valid {
        envelope: relay_beta_license::LicenseEnvelope {
            owner_id: 42,
            display_name: "alice".to_string(),
            issued_at: 0,
            expires_at: i64::MAX,
            cohort: "beta-jan-2026".to_string(),
            discount_code: relay_beta_license::discount_code(42),
            key_id: relay_beta_license::key_id(42, 0),
        },
        status: relay_beta_license::EnvelopeStatus::Active { remaining_secs },
    }
}

#[test]
fn days_left_rounds_partial_days_up() {
    assert!(valid_report(1).to_string().starts_with("Valid token, 1 day(s) left"));
    assert!(valid_report(86_400).to_string().starts_with("Valid token, 1 day(s) left"));
    assert!(valid_report(86_401).to_string().starts_with("Valid token, 2 day(s) left"));
}

#[test]
fn far_future_expiry_renders() {
    let text = valid_report(i64::MAX).to_string();
    let expected = i64::MAX / 86_400 + 1;
    assert!(text.starts_with(&format!("Valid token, {expected} day(s) left")));
}
