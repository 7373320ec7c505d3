//! Advisors over the pglens query model: lint rules, plan inspection,
//! rewrite and index suggestions, hypothetical-index evaluation, and
//! workload aggregation.
//!
//! Architecture role:
//! - pure computations over [`pglens_model`] values for lint/rewrite/index
//! - the what-if evaluator is the only component here that performs I/O,
//!   through the [`pglens_gateway::PlannerGateway`] seam
//!
//! Key modules:
//! - [`lint`]
//! - [`plan_inspect`]
//! - [`rewrite`]
//! - [`index`]
//! - [`whatif`]
//! - [`workload`]

/// Candidate index synthesis.
pub mod index;
/// Ordered lint rule set.
pub mod lint;
/// Positional plan-tree comparison.
pub mod plan_diff;
/// Plan-tree warnings and metrics.
pub mod plan_inspect;
/// Rewrite-rule catalog.
pub mod rewrite;
/// Suggestion and index-candidate value types.
pub mod suggestion;
/// Hypothetical-index what-if evaluator.
pub mod whatif;
/// Workload aggregation.
pub mod workload;

pub use index::suggest_indexes;
pub use lint::{lint, LintIssue, LintReport, Risk, Severity};
pub use plan_diff::{diff_plans, PlanDiff, PlanDiffNode};
pub use plan_inspect::{inspect, PlanMetrics, PlanWarning};
pub use rewrite::suggest_rewrites;
pub use suggestion::{Impact, IndexCandidate, Suggestion, SuggestionKind};
pub use whatif::{evaluate, rank_cost_based, BestTrial, Ranking, WhatIfOutcome, WhatIfReport};
pub use workload::{
    aggregate, AnalyzedQuery, GroupedShape, MergedIndexSuggestion, PerQueryRecord,
    WorkloadRecommendation, WorkloadReport, WorkloadStats,
};
