//! End-to-end event processor scenarios, driven entirely through
//! `loyalty_service`'s public API against an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use loyalty_core::{EventInput, EventType, FactValue, Market};
use loyalty_service::{AuditLogger, ConsumerLockRegistry, EventProcessor, InMemoryConsumerStore, InMemoryRuleLoader};

fn new_processor(rules_json: &str) -> EventProcessor {
    let store = Arc::new(InMemoryConsumerStore::new());
    let loader = Arc::new(InMemoryRuleLoader::load_from_str(rules_json).unwrap());
    let locks = Arc::new(ConsumerLockRegistry::new());
    let audit = Arc::new(AuditLogger::new());
    EventProcessor::new(store, loader, locks, audit)
}

fn event(consumer_id: &str, event_id: &str, event_type: EventType, market: Market, attrs: &[(&str, i64)]) -> EventInput {
    let mut attributes = HashMap::new();
    for (key, value) in attrs {
        attributes.insert(key.to_string(), FactValue::from_i64(*value));
    }
    EventInput {
        event_id: event_id.to_string(),
        event_type,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap(),
        market,
        channel: "ONLINE".to_string(),
        product_line: "SKINCARE".to_string(),
        consumer_id: consumer_id.to_string(),
        context: HashMap::new(),
        attributes,
    }
}

#[tokio::test]
async fn hk_base_purchase_awards_points_equal_to_amount() {
    let processor = new_processor(
        r#"[{"name": "hk-base", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {"standardRate": 1}}}]"#,
    );
    let response = processor
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 2000)]))
        .await
        .unwrap();
    assert_eq!(response.total_points_awarded, 2000);
    assert_eq!(response.resulting_balance.total, 2000);
    assert_eq!(response.resulting_balance.available, 2000);
}

#[tokio::test]
async fn jp_base_purchase_uses_conversion_rate() {
    let processor = new_processor(
        r#"[{"name": "jp-base", "conditions": {"fact": "market", "operator": "equal", "value": "JP"}, "event": {"type": "ORDER_BASE_POINT", "params": {"conversionRate": 0.1}}}]"#,
    );
    let response = processor
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Jp, &[("amount", 15000)]))
        .await
        .unwrap();
    assert_eq!(response.total_points_awarded, 1500);
}

#[tokio::test]
async fn second_purchase_within_window_also_earns_the_multiple_point_bonus() {
    let processor = new_processor(
        r#"[
            {"name": "jp-base", "priority": 10, "conditions": {"fact": "market", "operator": "equal", "value": "JP"}, "event": {"type": "ORDER_BASE_POINT", "params": {"conversionRate": 1}}},
            {"name": "jp-multiple", "priority": 20, "conditions": {"all": [
                {"fact": "market", "operator": "equal", "value": "JP"},
                {"fact": "daysSinceFirstPurchase", "operator": "lessThanInclusive", "value": 60},
                {"fact": "purchaseCount", "operator": "greaterThan", "value": 0}
            ]}, "event": {"type": "ORDER_MULTIPLE_POINT_LIMIT", "params": {"conversionRate": 1, "multiplier": 2.0}}}
        ]"#,
    );

    let first = event("cons-1", "evt-first", EventType::Purchase, Market::Jp, &[("amount", 500)]);
    processor.process_event(first).await.unwrap();

    let mut second = event("cons-1", "evt-second", EventType::Purchase, Market::Jp, &[("amount", 1000)]);
    second.timestamp = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap() + ChronoDuration::days(32);
    let response = processor.process_event(second).await.unwrap();

    // base=100, bonus=floor(100*2.0)-100=100 → total 200.
    assert_eq!(response.total_points_awarded, 200);
    assert_eq!(response.point_breakdown.len(), 2);
}

#[tokio::test]
async fn basket_threshold_is_all_or_nothing() {
    let processor = new_processor(
        r#"[{"name": "basket", "conditions": {"fact": "attributes.amount", "operator": "greaterThanInclusive", "value": 5000}, "event": {"type": "FLEXIBLE_BASKET_AMOUNT", "params": {"threshold": 5000, "bonus": 300}}}]"#,
    );

    let hit = processor
        .process_event(event("cons-1", "evt-hit", EventType::Purchase, Market::Hk, &[("amount", 5500)]))
        .await
        .unwrap();
    assert_eq!(hit.total_points_awarded, 300);

    let miss = processor
        .process_event(event("cons-2", "evt-miss", EventType::Purchase, Market::Hk, &[("amount", 4999)]))
        .await
        .unwrap();
    assert_eq!(miss.total_points_awarded, 0);
}

#[tokio::test]
async fn redemption_moves_points_from_available_to_used() {
    let processor = new_processor(
        r#"[{"name": "base", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {"standardRate": 1}}},
            {"name": "redeem", "conditions": {"fact": "eventType", "operator": "equal", "value": "REDEMPTION"}, "event": {"type": "REDEMPTION_DEDUCTION", "params": {}}}]"#,
    );

    processor
        .process_event(event("cons-1", "evt-purchase", EventType::Purchase, Market::Hk, &[("amount", 1200)]))
        .await
        .unwrap();

    let redeem = processor
        .process_event(event("cons-1", "evt-redeem", EventType::Redemption, Market::Hk, &[("redemptionPoints", 500)]))
        .await
        .unwrap();

    assert_eq!(redeem.total_points_awarded, -500);
    assert_eq!(redeem.resulting_balance.total, 1200);
    assert_eq!(redeem.resulting_balance.available, 700);
    assert_eq!(redeem.resulting_balance.used, 500);
}

#[tokio::test]
async fn point_breakdown_is_ordered_by_ascending_priority_then_name() {
    let processor = new_processor(
        r#"[
            {"name": "zeta", "priority": 10, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "CONSULTATION_BONUS", "params": {"consultationBonus": 5}}},
            {"name": "alpha", "priority": 10, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "CONSULTATION_BONUS", "params": {"consultationBonus": 7}}},
            {"name": "early", "priority": 1, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "CONSULTATION_BONUS", "params": {"consultationBonus": 3}}}
        ]"#,
    );
    let response = processor
        .process_event(event("cons-1", "evt-1", EventType::Consultation, Market::Hk, &[]))
        .await
        .unwrap();
    let names: Vec<_> = response.point_breakdown.iter().map(|b| b.rule_name.as_str()).collect();
    assert_eq!(names, vec!["early", "alpha", "zeta"]);
}

#[tokio::test]
async fn same_input_and_snapshot_produce_an_identical_response() {
    let rules = r#"[{"name": "base", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {"standardRate": 1}}}]"#;

    let p1 = new_processor(rules);
    let r1 = p1
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 2000)]))
        .await
        .unwrap();

    let p2 = new_processor(rules);
    let r2 = p2
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 2000)]))
        .await
        .unwrap();

    assert_eq!(r1.total_points_awarded, r2.total_points_awarded);
    assert_eq!(r1.point_breakdown.len(), r2.point_breakdown.len());
    assert_eq!(r1.resulting_balance, r2.resulting_balance);
}

#[tokio::test]
async fn resubmitting_a_duplicate_event_id_never_mutates_the_balance() {
    let processor = new_processor(
        r#"[{"name": "base", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {"standardRate": 1}}}]"#,
    );
    let first = processor
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 2000)]))
        .await
        .unwrap();

    let retry = processor.process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 999_999)])).await;
    assert!(retry.is_err());

    // Balance must be exactly what the first, accepted submission produced.
    let second = processor
        .process_event(event("cons-1", "evt-2", EventType::Purchase, Market::Hk, &[("amount", 0)]))
        .await
        .unwrap();
    assert_eq!(second.resulting_balance.total, first.resulting_balance.total);
}

#[tokio::test]
async fn balances_never_go_negative() {
    let processor = new_processor(
        r#"[{"name": "redeem", "conditions": {"fact": "eventType", "operator": "equal", "value": "REDEMPTION"}, "event": {"type": "REDEMPTION_DEDUCTION", "params": {}}}]"#,
    );
    let response = processor
        .process_event(event("cons-1", "evt-1", EventType::Redemption, Market::Hk, &[("redemptionPoints", 500)]))
        .await
        .unwrap();
    assert!(response.resulting_balance.available >= 0);
    assert!(response.resulting_balance.used >= 0);
    assert!(response.resulting_balance.total >= 0);
    assert_eq!(response.resulting_balance.used, 500);
}

#[tokio::test]
async fn unmatched_event_still_records_history_with_zero_points() {
    let processor = new_processor("[]");
    let response = processor
        .process_event(event("cons-1", "evt-1", EventType::Purchase, Market::Hk, &[("amount", 500)]))
        .await
        .unwrap();
    assert!(response.point_breakdown.is_empty());
    assert_eq!(response.total_points_awarded, 0);
    assert_eq!(response.resulting_balance.transaction_count, 1);
}
