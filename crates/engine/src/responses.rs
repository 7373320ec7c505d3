use pglens_advisor::{
    LintIssue, PlanDiff, PlanMetrics, PlanWarning, Ranking, Risk, Suggestion, WhatIfReport,
    WorkloadReport,
};
use pglens_model::{PlanTree, QueryModel};
use serde::{Deserialize, Serialize};

/// `lint` output: the parsed model plus linter findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintResponse {
    /// Normalized query model.
    pub model: QueryModel,
    /// Findings in fixed rule order.
    pub issues: Vec<LintIssue>,
    /// Aggregate risk.
    pub risk: Risk,
}

/// `explain` output. `plan` and `metrics` are absent when the planner call
/// degraded; the request still succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    /// Decoded plan tree, when the planner answered in time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanTree>,
    /// Plan warnings in deterministic order.
    pub warnings: Vec<PlanWarning>,
    /// Timing and node-count metrics, when a plan was obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PlanMetrics>,
    /// Optional natural-language explanation; absent on producer failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_text: Option<String>,
}

/// One-line summary with the aggregate opportunity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Headline, naming the top suggestion when one exists.
    pub summary: String,
    /// Mean of impact-weighted confidences over the leading suggestions,
    /// in [0, 1], rounded to 3 digits.
    pub score: f64,
}

/// `optimize` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    /// Ranked suggestions, truncated to the requested top-k.
    pub suggestions: Vec<Suggestion>,
    /// Headline and score.
    pub summary: Summary,
    /// Which ranking policy ordered the suggestions.
    pub ranking: Ranking,
    /// Hypothetical-trial accounting.
    pub what_if_report: WhatIfReport,
    /// Plan warnings, empty when no plan was obtainable.
    pub plan_warnings: Vec<PlanWarning>,
    /// Plan metrics, when a plan was obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_metrics: Option<PlanMetrics>,
    /// Baseline-versus-best-trial plan comparison, when requested and a
    /// trial completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_diff: Option<PlanDiff>,
    /// Number of suggestions returned after truncation.
    pub top_k_returned: usize,
}

/// `workload` output.
pub type WorkloadResponse = WorkloadReport;
