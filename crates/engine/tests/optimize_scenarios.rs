mod support;

use std::sync::Arc;

use pglens_advisor::{Impact, Ranking, SuggestionKind};
use pglens_common::{AdviseError, AdvisorConfig};
use pglens_engine::{Engine, OptimizeOptions};
use pglens_model::IndexDef;
use support::{orders_snapshot, MockGateway};

const SCENARIO_SQL: &str =
    "SELECT * FROM orders WHERE user_id = 42 ORDER BY created_at DESC LIMIT 100";

const EXPECTED_DDL: &str =
    "CREATE INDEX CONCURRENTLY idx_orders_user_id_created_at ON orders (user_id, created_at)";

fn engine_with(gateway: MockGateway) -> Engine {
    Engine::new(Arc::new(gateway), AdvisorConfig::default())
}

#[tokio::test]
async fn equality_order_query_gets_index_and_projection_rewrite() {
    let mut gateway = MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        baseline_cost: 1910.68,
        ..MockGateway::default()
    };
    gateway.trial_costs.insert(
        "CREATE INDEX ON orders (user_id, created_at)".to_string(),
        104.59,
    );
    let engine = engine_with(gateway);

    let response = engine
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                what_if: Some(true),
                ..OptimizeOptions::default()
            },
        )
        .await
        .expect("optimize succeeds");

    assert_eq!(response.ranking, Ranking::CostBased);
    assert!(response.what_if_report.enabled);
    assert!(response.what_if_report.available);
    assert_eq!(response.what_if_report.trials_completed, 1);
    assert!(!response.what_if_report.budget_exceeded);

    // The measured index ranks first.
    let top = &response.suggestions[0];
    assert_eq!(top.kind, SuggestionKind::Index);
    assert_eq!(top.statements, vec![EXPECTED_DDL.to_string()]);
    assert_eq!(top.impact, Impact::High);
    assert_eq!(top.est_reduction_pct, Some(15.0));
    assert_eq!(top.est_cost_before, Some(1910.68));
    assert_eq!(top.est_cost_after, Some(104.59));
    assert_eq!(top.est_cost_delta, Some(1806.09));

    // The projection rewrite is still present.
    assert!(response
        .suggestions
        .iter()
        .any(|s| s.title == "Replace SELECT * with explicit columns"));

    // And the linter flags the star projection.
    let lint = engine.lint(SCENARIO_SQL);
    assert!(lint.issues.iter().any(|i| i.code == "SELECT_STAR"));
}

#[tokio::test]
async fn small_table_yields_only_rewrites() {
    let gateway = MockGateway {
        snapshot: orders_snapshot(200, vec![]),
        ..MockGateway::default()
    };
    let engine = engine_with(gateway);
    let response = engine
        .optimize(
            "SELECT * FROM orders WHERE user_id = 42",
            &OptimizeOptions::default(),
        )
        .await
        .unwrap();
    assert!(response
        .suggestions
        .iter()
        .all(|s| s.kind == SuggestionKind::Rewrite));
    assert!(response
        .suggestions
        .iter()
        .any(|s| s.title == "Replace SELECT * with explicit columns"));
}

#[tokio::test]
async fn existing_index_suppresses_candidate_but_not_rewrites() {
    let gateway = MockGateway {
        snapshot: orders_snapshot(
            2_500_000,
            vec![IndexDef {
                name: "ix_orders_uc".to_string(),
                columns: vec!["user_id".to_string(), "created_at".to_string()],
                directions: None,
                unique: false,
            }],
        ),
        ..MockGateway::default()
    };
    let engine = engine_with(gateway);
    let response = engine
        .optimize(SCENARIO_SQL, &OptimizeOptions::default())
        .await
        .unwrap();
    assert!(response
        .suggestions
        .iter()
        .all(|s| s.kind == SuggestionKind::Rewrite));
}

#[tokio::test]
async fn missing_capability_keeps_heuristic_ranking() {
    let gateway = MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        capability: false,
        ..MockGateway::default()
    };
    let engine = engine_with(gateway);
    let response = engine
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                what_if: Some(true),
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(response.ranking, Ranking::Heuristic);
    assert!(response.what_if_report.enabled);
    assert!(!response.what_if_report.available);
    assert_eq!(response.what_if_report.trials_completed, 0);
    assert!(response
        .suggestions
        .iter()
        .all(|s| s.est_cost_before.is_none()
            && s.est_cost_after.is_none()
            && s.est_cost_delta.is_none()));

    // Heuristic layout: rewrites in catalog order, then scored indexes.
    let first_index = response
        .suggestions
        .iter()
        .position(|s| s.kind == SuggestionKind::Index)
        .expect("index suggestion present");
    assert!(response.suggestions[first_index..]
        .iter()
        .all(|s| s.kind == SuggestionKind::Index));
}

#[tokio::test]
async fn what_if_disabled_yields_same_set_modulo_costs() {
    let mk = || {
        let mut gateway = MockGateway {
            snapshot: orders_snapshot(2_500_000, vec![]),
            baseline_cost: 1910.68,
            ..MockGateway::default()
        };
        gateway.trial_costs.insert(
            "CREATE INDEX ON orders (user_id, created_at)".to_string(),
            104.59,
        );
        engine_with(gateway)
    };

    let with = mk()
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                what_if: Some(true),
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();
    let without = mk()
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                what_if: Some(false),
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();

    let mut with_titles: Vec<_> = with.suggestions.iter().map(|s| s.title.clone()).collect();
    let mut without_titles: Vec<_> = without
        .suggestions
        .iter()
        .map(|s| s.title.clone())
        .collect();
    with_titles.sort();
    without_titles.sort();
    assert_eq!(with_titles, without_titles);
    assert!(without
        .suggestions
        .iter()
        .all(|s| s.est_cost_delta.is_none()));
}

#[tokio::test]
async fn diff_pairs_baseline_with_best_trial() {
    let mut gateway = MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        baseline_cost: 1910.68,
        ..MockGateway::default()
    };
    gateway.trial_costs.insert(
        "CREATE INDEX ON orders (user_id, created_at)".to_string(),
        104.59,
    );
    let engine = engine_with(gateway);
    let response = engine
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                what_if: Some(true),
                diff: true,
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();

    let diff = response.plan_diff.expect("diff requested and trial ran");
    assert_eq!(diff.nodes[0].cost_before, Some(1910.68));
    assert_eq!(diff.nodes[0].cost_after, Some(104.59));

    // Without what-if there is nothing to compare against.
    let engine = engine_with(MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        ..MockGateway::default()
    });
    let response = engine
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                diff: true,
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(response.plan_diff.is_none());
}

#[tokio::test]
async fn syntax_error_is_fatal() {
    let engine = engine_with(MockGateway::default());
    let err = engine
        .optimize("SELEC broken", &OptimizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdviseError::Syntax(_)));
}

#[tokio::test]
async fn non_select_is_fatal() {
    let engine = engine_with(MockGateway::default());
    let err = engine
        .optimize("DELETE FROM orders", &OptimizeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdviseError::NonSelect(_)));
}

#[tokio::test]
async fn catalog_failure_degrades_to_rewrites_only() {
    let gateway = MockGateway {
        fail_schema: true,
        ..MockGateway::default()
    };
    let engine = engine_with(gateway);
    let response = engine
        .optimize(SCENARIO_SQL, &OptimizeOptions::default())
        .await
        .expect("degrades, does not fail");
    assert!(response
        .suggestions
        .iter()
        .all(|s| s.kind == SuggestionKind::Rewrite));
}

#[tokio::test]
async fn top_k_truncates_and_reports() {
    let gateway = MockGateway {
        snapshot: orders_snapshot(2_500_000, vec![]),
        ..MockGateway::default()
    };
    let engine = engine_with(gateway);
    let response = engine
        .optimize(
            SCENARIO_SQL,
            &OptimizeOptions {
                top_k: 1,
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.suggestions.len(), 1);
    assert_eq!(response.top_k_returned, 1);
}

#[tokio::test]
async fn identical_requests_serialize_identically() {
    let mk = || {
        let mut gateway = MockGateway {
            snapshot: orders_snapshot(2_500_000, vec![]),
            baseline_cost: 1910.68,
            ..MockGateway::default()
        };
        gateway.trial_costs.insert(
            "CREATE INDEX ON orders (user_id, created_at)".to_string(),
            104.59,
        );
        engine_with(gateway)
    };
    let opts = OptimizeOptions {
        what_if: Some(true),
        ..OptimizeOptions::default()
    };
    let a = mk().optimize(SCENARIO_SQL, &opts).await.unwrap();
    let b = mk().optimize(SCENARIO_SQL, &opts).await.unwrap();
    assert_eq!(
        serde_json::to_string(&a.suggestions).unwrap(),
        serde_json::to_string(&b.suggestions).unwrap()
    );
    assert_eq!(a.summary, b.summary);
}
