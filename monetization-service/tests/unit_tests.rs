/// Unit tests for monetization-service core functionality
///
/// This test module covers:
/// - Model serialization/deserialization
/// - Enum parsing helpers
/// - Accrual pricing invariants
/// - Rate update validation
use chrono::Utc;
use monetization_service::handlers::earnings::AccrualResponse;
use monetization_service::models::*;
use monetization_service::services::accrual::view_amount;
use monetization_service::services::rates::RateUpdate;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn sample_rates() -> RateSchedule {
    RateSchedule {
        version: 3,
        per_view: dec("0.5"),
        per_watch_minute: dec("1"),
        engagement_bonus_pct: dec("0.1"),
        min_retention_for_bonus: dec("0.5"),
        per_like: dec("0.05"),
        per_comment: dec("0.10"),
        per_share: dec("0.15"),
        min_payout: dec("50"),
        created_at: Utc::now(),
    }
}

fn sample_entry(kind: EarningKind, amount: &str) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        creator_id: Uuid::new_v4(),
        video_id: Some(Uuid::new_v4()),
        session_id: match kind {
            EarningKind::View => Some("sess-1".to_string()),
            _ => None,
        },
        kind,
        amount: dec(amount),
        status: EarningStatus::Pending,
        description: "test entry".to_string(),
        rate_version: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_earning_kind_serialization() {
    let kinds = vec![
        EarningKind::View,
        EarningKind::Like,
        EarningKind::Comment,
        EarningKind::Share,
    ];

    for kind in kinds {
        let json = serde_json::to_string(&kind).unwrap();
        let deserialized: EarningKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, deserialized);
    }
}

#[test]
fn test_earning_kind_parse_roundtrip() {
    for s in ["view", "like", "comment", "share"] {
        let kind: EarningKind = s.parse().unwrap();
        assert_eq!(kind.as_str(), s);
    }

    assert!("dislike".parse::<EarningKind>().is_err());
    assert!("View".parse::<EarningKind>().is_err());
}

#[test]
fn test_earning_kind_engagement_split() {
    assert!(!EarningKind::View.is_engagement());
    assert!(EarningKind::Like.is_engagement());
    assert!(EarningKind::Comment.is_engagement());
    assert!(EarningKind::Share.is_engagement());
}

#[test]
fn test_earning_status_serialization() {
    let statuses = vec![
        EarningStatus::Pending,
        EarningStatus::Approved,
        EarningStatus::Paid,
    ];

    for status in statuses {
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: EarningStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}

#[test]
fn test_earning_status_parse() {
    assert_eq!(
        "pending".parse::<EarningStatus>().unwrap(),
        EarningStatus::Pending
    );
    assert!("refunded".parse::<EarningStatus>().is_err());
}

#[test]
fn test_ledger_entry_amount_serializes_as_number() {
    let entry = sample_entry(EarningKind::View, "7.15");
    let json = serde_json::to_value(&entry).unwrap();

    assert!(json["amount"].is_number());
    assert_eq!(json["amount"], serde_json::json!(7.15));
    assert_eq!(json["kind"], "view");
    assert_eq!(json["status"], "pending");
}

#[test]
fn test_engagement_entry_has_no_session() {
    let entry = sample_entry(EarningKind::Like, "0.05");
    let json = serde_json::to_value(&entry).unwrap();

    assert_eq!(json["kind"], "like");
    assert!(json["session_id"].is_null());
}

#[test]
fn test_accrual_response_from_created() {
    let entry = sample_entry(EarningKind::View, "7.15");
    let response = AccrualResponse::from(AccrualOutcome::Created(entry));

    assert!(response.accrued);
    assert_eq!(response.outcome, "created");
    assert!(response.reason.is_none());
    assert!(response.entry.is_some());
}

#[test]
fn test_accrual_response_from_skip() {
    let response = AccrualResponse::from(AccrualOutcome::Skipped(SkipReason::CreatorNotVerified));

    assert!(!response.accrued);
    assert_eq!(response.outcome, "skipped");
    assert_eq!(response.reason, Some("creator_not_verified"));
    assert!(response.entry.is_none());

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("entry").is_none());
}

#[test]
fn test_rate_update_deserializes_json_numbers() {
    let json = r#"{
        "per_view": 0.5,
        "per_watch_minute": 1.0,
        "engagement_bonus_pct": 0.1,
        "min_retention_for_bonus": 0.5,
        "per_like": 0.05,
        "per_comment": 0.1,
        "per_share": 0.15,
        "min_payout": 50.0
    }"#;

    let update: RateUpdate = serde_json::from_str(json).unwrap();
    assert!(update.validate().is_ok());
    assert_eq!(update.per_view, dec("0.5"));
    assert_eq!(update.min_payout, dec("50"));
}

#[test]
fn test_rate_update_rejects_out_of_bounds() {
    let json = r#"{
        "per_view": 250.0,
        "per_watch_minute": 1.0,
        "engagement_bonus_pct": 0.1,
        "min_retention_for_bonus": 0.5,
        "per_like": 0.05,
        "per_comment": 0.1,
        "per_share": 0.15,
        "min_payout": 50.0
    }"#;

    let update: RateUpdate = serde_json::from_str(json).unwrap();
    assert!(update.validate().is_err());
}

#[test]
fn test_view_pricing_scenario() {
    // The canonical heartbeat sequence: 360s then 420s of a 600s video.
    // The second report re-prices the same session; the balance moves by
    // the difference only.
    let rates = sample_rates();

    let first = view_amount(&rates, 360, 600);
    let second = view_amount(&rates, 420, 600);

    assert_eq!(first, dec("7.15"));
    assert_eq!(second, dec("8.25"));
    assert_eq!(second - first, dec("1.10"));
}

#[test]
fn test_engagement_rates_are_flat_per_event() {
    let rates = sample_rates();
    let three_likes = rates.engagement_rate(EarningKind::Like) * Decimal::from(3);
    assert_eq!(three_likes, dec("0.15"));
}

#[test]
fn test_balance_totals_serialize_as_numbers() {
    let totals = BalanceTotals {
        total: dec("100.50"),
        pending: dec("25.25"),
        paid: dec("75.25"),
    };

    let json = serde_json::to_value(&totals).unwrap();
    assert_eq!(json["total"], serde_json::json!(100.5));
    assert_eq!(json["pending"], serde_json::json!(25.25));
    assert_eq!(json["paid"], serde_json::json!(75.25));
}
