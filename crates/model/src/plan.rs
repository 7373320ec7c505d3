use pglens_common::{AdviseError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operator in a planner output tree.
///
/// Field names mirror the `EXPLAIN (FORMAT JSON)` keys so the tree decodes
/// and re-serializes without a translation layer. Child order is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Operator name, e.g. `Seq Scan`, `Sort`, `Nested Loop`.
    #[serde(rename = "Node Type")]
    pub node_type: String,
    /// Scanned relation, for scan nodes.
    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    /// Planner startup cost.
    #[serde(rename = "Startup Cost", default)]
    pub startup_cost: f64,
    /// Planner total cost.
    #[serde(rename = "Total Cost", default)]
    pub total_cost: f64,
    /// Planner row estimate.
    #[serde(rename = "Plan Rows", default)]
    pub plan_rows: f64,
    /// Planner average row width in bytes.
    #[serde(rename = "Plan Width", default)]
    pub plan_width: f64,
    /// Measured rows; present only under ANALYZE.
    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    /// Sort implementation, for sort nodes (e.g. `quicksort`, `external merge Disk`).
    #[serde(rename = "Sort Method", default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
    /// Filter expression text, when the node filters.
    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Output column expressions, when VERBOSE was requested.
    #[serde(rename = "Output", default, skip_serializing_if = "Vec::is_empty")]
    pub columns_used: Vec<String>,
    /// Children in planner order.
    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Pre-order walk over the subtree rooted here.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PlanNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of nodes in the subtree.
    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }
}

/// One decoded EXPLAIN result: the operator tree plus the top-level timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTree {
    /// Root operator.
    #[serde(rename = "Plan")]
    pub root: PlanNode,
    /// Planning time in milliseconds, when reported.
    #[serde(rename = "Planning Time", default)]
    pub planning_time_ms: f64,
    /// Execution time in milliseconds; zero without ANALYZE.
    #[serde(rename = "Execution Time", default)]
    pub execution_time_ms: f64,
}

impl PlanTree {
    /// Decode the JSON produced by `EXPLAIN (FORMAT JSON)`.
    ///
    /// PostgreSQL wraps the result in a one-element array; both the wrapped
    /// and unwrapped forms are accepted.
    pub fn from_explain_json(value: &Value) -> Result<PlanTree> {
        let obj = match value {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| AdviseError::Transport("empty EXPLAIN output".to_string()))?,
            other => other,
        };
        serde_json::from_value(obj.clone())
            .map_err(|e| AdviseError::Transport(format!("undecodable EXPLAIN output: {e}")))
    }

    /// Total planner cost of the root node.
    pub fn total_cost(&self) -> f64 {
        self.root.total_cost
    }
}
