use pglens_common::round3;
use pglens_model::{PlanNode, PlanTree};
use serde::{Deserialize, Serialize};

/// One position in the pairwise plan comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDiffNode {
    /// Operator at this position in the baseline plan.
    pub before_op: String,
    /// Operator at this position in the comparison plan.
    pub after_op: String,
    /// Root total cost of the baseline; only on the first entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_before: Option<f64>,
    /// Root total cost of the comparison plan; only on the first entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_after: Option<f64>,
    /// Row estimate (or measured rows) at this position, baseline.
    pub rows_before: f64,
    /// Row estimate (or measured rows) at this position, comparison.
    pub rows_after: f64,
}

/// Compact positional diff between two plan trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDiff {
    /// Paired pre-order positions up to the shorter tree's length.
    pub nodes: Vec<PlanDiffNode>,
}

/// Pair the pre-order node sequences of two plans position by position.
///
/// Shape changes show up as operator mismatches; the root entry carries the
/// total-cost movement.
pub fn diff_plans(before: &PlanTree, after: &PlanTree) -> PlanDiff {
    let mut b_nodes: Vec<&PlanNode> = Vec::new();
    before.root.walk(&mut |n| b_nodes.push(n));
    let mut a_nodes: Vec<&PlanNode> = Vec::new();
    after.root.walk(&mut |n| a_nodes.push(n));

    let nodes = b_nodes
        .iter()
        .zip(&a_nodes)
        .enumerate()
        .map(|(i, (b, a))| PlanDiffNode {
            before_op: b.node_type.clone(),
            after_op: a.node_type.clone(),
            cost_before: (i == 0).then(|| round3(before.total_cost())),
            cost_after: (i == 0).then(|| round3(after.total_cost())),
            rows_before: b.actual_rows.unwrap_or(b.plan_rows),
            rows_after: a.actual_rows.unwrap_or(a.plan_rows),
        })
        .collect();
    PlanDiff { nodes }
}
