mod support;

use std::sync::Arc;

use pglens_common::AdvisorConfig;
use pglens_engine::{Engine, WorkloadOptions};
use support::{orders_snapshot, MockGateway};

fn engine() -> Engine {
    let gateway = MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        ..MockGateway::default()
    };
    Engine::new(Arc::new(gateway), AdvisorConfig::default())
}

fn n_plus_one_inputs() -> Vec<String> {
    (1..=12)
        .map(|i| format!("SELECT * FROM orders WHERE user_id = {i}"))
        .collect()
}

#[tokio::test]
async fn repeated_shape_is_grouped_and_merged() {
    let report = engine()
        .workload(&n_plus_one_inputs(), &WorkloadOptions::default())
        .await;

    assert_eq!(report.stats.total, 12);
    assert_eq!(report.stats.analyzed, 12);
    assert_eq!(report.stats.skipped, 0);
    assert_eq!(report.stats.unique_fingerprints, 1);
    assert_eq!(report.grouped.len(), 1);
    assert_eq!(report.grouped[0].count, 12);
    // Lexicographic representative: "= 1" sorts below "= 10".
    assert_eq!(
        report.grouped[0].example_sql,
        "SELECT * FROM orders WHERE user_id = 1"
    );

    let merged = report
        .merged_index_suggestions
        .iter()
        .find(|m| m.relation == "orders" && m.columns == vec!["user_id".to_string()])
        .expect("merged index on orders(user_id)");
    assert_eq!(merged.frequency, 12);

    let n1 = report
        .workload_recommendations
        .iter()
        .find(|r| r.kind == "n_plus_one")
        .expect("n+1 recommendation");
    assert_eq!(n1.fingerprints, vec![report.grouped[0].fingerprint]);
}

#[tokio::test]
async fn below_threshold_shapes_are_not_flagged() {
    let inputs: Vec<String> = (1..=9)
        .map(|i| format!("SELECT * FROM orders WHERE user_id = {i}"))
        .collect();
    let report = engine().workload(&inputs, &WorkloadOptions::default()).await;
    assert!(report
        .workload_recommendations
        .iter()
        .all(|r| r.kind != "n_plus_one"));
}

#[tokio::test]
async fn non_select_inputs_are_skipped_with_reason() {
    let inputs = vec![
        "SELECT id FROM orders WHERE user_id = 1".to_string(),
        "UPDATE orders SET total_cents = 0".to_string(),
    ];
    let report = engine().workload(&inputs, &WorkloadOptions::default()).await;
    assert_eq!(report.stats.analyzed, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(
        report.per_query[1].skipped.as_deref(),
        Some("non-SELECT statement")
    );
    assert!(report.per_query[1].suggestions.is_empty());
}

#[tokio::test]
async fn input_order_does_not_change_grouped_output() {
    let mut forward = n_plus_one_inputs();
    forward.push("SELECT id FROM orders WHERE total_cents > 100".to_string());
    let mut reversed = forward.clone();
    reversed.reverse();

    let a = engine()
        .workload(&forward, &WorkloadOptions::default())
        .await;
    let b = engine()
        .workload(&reversed, &WorkloadOptions::default())
        .await;

    assert_eq!(a.grouped, b.grouped);
    assert_eq!(a.stats.unique_fingerprints, b.stats.unique_fingerprints);
    assert_eq!(
        serde_json::to_string(&a.merged_index_suggestions).unwrap(),
        serde_json::to_string(&b.merged_index_suggestions).unwrap()
    );
}

#[tokio::test]
async fn widespread_star_projection_is_reported() {
    let report = engine()
        .workload(&n_plus_one_inputs(), &WorkloadOptions::default())
        .await;
    let rec = report
        .workload_recommendations
        .iter()
        .find(|r| r.kind == "widespread_select_star")
        .expect("star recommendation");
    assert!(rec.detail.contains("12 of 12"));
}

#[tokio::test]
async fn capitalization_of_unquoted_identifiers_does_not_split_groups() {
    let inputs = vec![
        "SELECT id FROM orders WHERE user_id = 1".to_string(),
        "select ID from ORDERS where USER_ID = 2".to_string(),
    ];
    let report = engine().workload(&inputs, &WorkloadOptions::default()).await;
    assert_eq!(report.stats.unique_fingerprints, 1);
    assert_eq!(report.grouped[0].count, 2);
}
