use pglens_common::round3;
use pglens_model::{PlanNode, PlanTree};
use serde::{Deserialize, Serialize};

/// Row-count threshold above which scans and plans count as large.
const LARGE_SCAN_ROWS: f64 = 100_000.0;

/// Planner/actual row mismatch ratio that triggers a warning.
const ESTIMATE_MISMATCH_RATIO: f64 = 0.5;

/// One plan-level warning with its stable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWarning {
    /// Stable warning code, e.g. `SEQ_SCAN_LARGE`.
    pub code: String,
    /// Human-readable detail.
    pub detail: String,
    /// Scanned relation, when the warning concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

/// Small numeric summary of one EXPLAIN result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    /// Planning time in milliseconds, rounded to 3 digits.
    pub planning_time_ms: f64,
    /// Execution time in milliseconds; zero without ANALYZE.
    pub execution_time_ms: f64,
    /// Number of nodes in the plan tree.
    pub node_count: usize,
}

/// Walk a plan tree and emit warnings plus metrics.
///
/// Warnings are ordered by node pre-order position, then by code, so the
/// output is deterministic for any tree.
pub fn inspect(tree: &PlanTree) -> (Vec<PlanWarning>, PlanMetrics) {
    let mut nodes: Vec<&PlanNode> = Vec::new();
    tree.root.walk(&mut |n| nodes.push(n));

    let has_gather = nodes.iter().any(|n| n.node_type.contains("Gather"));

    let mut warnings = Vec::new();
    for (pos, node) in nodes.iter().enumerate() {
        let mut here = node_warnings(node);
        if pos == 0 {
            let root_rows = node.actual_rows.unwrap_or(node.plan_rows);
            if root_rows > LARGE_SCAN_ROWS && !has_gather {
                here.push(PlanWarning {
                    code: "PARALLEL_OFF".to_string(),
                    detail: format!(
                        "plan processes {root_rows:.0} rows but contains no Gather node"
                    ),
                    relation: None,
                });
            }
        }
        here.sort_by(|a, b| a.code.cmp(&b.code));
        warnings.extend(here);
    }

    let metrics = PlanMetrics {
        planning_time_ms: round3(tree.planning_time_ms),
        execution_time_ms: round3(tree.execution_time_ms),
        node_count: nodes.len(),
    };
    (warnings, metrics)
}

fn node_warnings(node: &PlanNode) -> Vec<PlanWarning> {
    let mut out = Vec::new();

    if node.node_type == "Seq Scan" {
        let rows = node.actual_rows.unwrap_or(node.plan_rows);
        if rows >= LARGE_SCAN_ROWS {
            out.push(PlanWarning {
                code: "SEQ_SCAN_LARGE".to_string(),
                detail: format!(
                    "sequential scan on {} over {rows:.0} rows",
                    node.relation_name.as_deref().unwrap_or("table")
                ),
                relation: node.relation_name.clone(),
            });
        }
        if node.filter.is_some() && node.plan_rows > LARGE_SCAN_ROWS {
            out.push(PlanWarning {
                code: "NO_INDEX_FILTER".to_string(),
                detail: format!(
                    "{} is filtered without an index",
                    node.relation_name.as_deref().unwrap_or("table")
                ),
                relation: node.relation_name.clone(),
            });
        }
    }

    if node.node_type.contains("Sort") {
        if let Some(method) = &node.sort_method {
            let lower = method.to_lowercase();
            if lower.contains("disk") || lower.contains("external") {
                out.push(PlanWarning {
                    code: "SORT_SPILL".to_string(),
                    detail: format!("sort spilled to disk using {method}"),
                    relation: None,
                });
            }
        }
    }

    if let Some(actual) = node.actual_rows {
        let error = (actual - node.plan_rows).abs() / node.plan_rows.max(1.0);
        if error > ESTIMATE_MISMATCH_RATIO {
            out.push(PlanWarning {
                code: "ESTIMATE_MISMATCH".to_string(),
                detail: format!(
                    "{}: planner expected {:.0} rows, saw {actual:.0}",
                    node.node_type, node.plan_rows
                ),
                relation: node.relation_name.clone(),
            });
        }
    }

    if node.node_type == "Nested Loop" {
        if let Some(inner) = node.children.get(1) {
            if inner.node_type == "Seq Scan" {
                out.push(PlanWarning {
                    code: "NESTED_LOOP_SEQ_INNER".to_string(),
                    detail: format!(
                        "nested loop with sequential inner scan on {}",
                        inner.relation_name.as_deref().unwrap_or("table")
                    ),
                    relation: inner.relation_name.clone(),
                });
            }
        }
    }

    out
}
