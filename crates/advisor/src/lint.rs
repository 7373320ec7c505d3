use pglens_common::{glob_matches, AdvisorConfig};
use pglens_model::{ColumnRef, LiteralShape, Projection, QueryModel};
use serde::{Deserialize, Serialize};

/// Lint issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    High,
}

/// Aggregate risk of a linted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

/// One lint finding with its stable rule code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintIssue {
    /// Stable rule code, e.g. `SELECT_STAR`.
    pub code: String,
    /// Human-readable finding.
    pub message: String,
    /// Severity band.
    pub severity: Severity,
    /// Short remediation hint.
    pub hint: String,
}

impl LintIssue {
    fn new(code: &str, message: String, severity: Severity, hint: &str) -> Self {
        Self {
            code: code.to_string(),
            message,
            severity,
            hint: hint.to_string(),
        }
    }
}

/// Linter output: ordered issues plus the risk summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintReport {
    /// Issues in fixed rule order.
    pub issues: Vec<LintIssue>,
    /// HIGH if any high issue, MEDIUM at two or more warnings, else LOW.
    pub risk: Risk,
}

/// Apply the fixed rule set over a query model. Pure function of the model
/// and configuration.
pub fn lint(model: &QueryModel, config: &AdvisorConfig) -> LintReport {
    let mut issues = Vec::new();

    if let Some(err) = &model.parse_error {
        issues.push(LintIssue::new(
            "PARSE_ERROR",
            format!("statement could not be parsed: {err}"),
            Severity::High,
            "Check SQL syntax",
        ));
        return LintReport {
            issues,
            risk: Risk::High,
        };
    }

    if model.is_select() {
        if model.has_star() {
            issues.push(LintIssue::new(
                "SELECT_STAR",
                "projection uses SELECT *".to_string(),
                Severity::Warn,
                "List the required columns explicitly",
            ));
        }

        let mut missing_on = false;
        for join in &model.joins {
            if join.kind.requires_condition() && join.on_columns.is_empty() {
                missing_on = true;
                issues.push(LintIssue::new(
                    "MISSING_JOIN_ON",
                    format!("join with {} has no usable ON condition", join.right),
                    Severity::High,
                    "Add an ON clause with join conditions",
                ));
            }
        }

        let has_cartesian = model
            .joins
            .iter()
            .any(|j| !j.kind.requires_condition());
        if has_cartesian || missing_on {
            issues.push(LintIssue::new(
                "CARTESIAN_JOIN",
                "cartesian product detected".to_string(),
                Severity::High,
                "Add join conditions or confirm the cross join is intended",
            ));
        }

        let mut reported = Vec::new();
        for col in model.column_refs() {
            if col.relation.is_none() && !reported.contains(&col.column) {
                reported.push(col.column.clone());
                issues.push(LintIssue::new(
                    "AMBIGUOUS_COLUMN",
                    format!("column {} is not table-qualified", col.column),
                    Severity::Warn,
                    "Qualify the column with a table name or alias",
                ));
            }
        }

        for rel in &model.relations {
            if rel.derived {
                continue;
            }
            let matches_pattern = config
                .large_table_patterns
                .iter()
                .any(|p| glob_matches(p, &rel.name));
            if matches_pattern
                && model.limit.is_none()
                && !relation_has_restriction(model, &rel.name)
            {
                issues.push(LintIssue::new(
                    "UNFILTERED_LARGE_TABLE",
                    format!("large table {} queried without restrictive filters", rel.name),
                    Severity::Warn,
                    "Add a restrictive WHERE clause or a LIMIT",
                ));
            }
        }

        for pred in &model.equality_predicates {
            let numeric_name = config
                .numeric_column_patterns
                .iter()
                .any(|p| glob_matches(p, &pred.column.column));
            if numeric_name && pred.literal == LiteralShape::Text {
                issues.push(LintIssue::new(
                    "IMPLICIT_CAST_PREDICATE",
                    format!(
                        "possible implicit cast comparing {} to a text literal",
                        pred.column.column
                    ),
                    Severity::Info,
                    "Match the literal type to the column type",
                ));
            }
        }

        if !model.has_star() {
            for rel in model.relations.iter().skip(1) {
                if rel.derived {
                    continue;
                }
                if !relation_used_outside_joins(model, &rel.name) {
                    issues.push(LintIssue::new(
                        "UNUSED_JOINED_TABLE",
                        format!("table {} is joined but never used", rel.name),
                        Severity::Warn,
                        "Remove the join or use columns from the table",
                    ));
                }
            }
        }
    }

    let risk = summarize_risk(&issues);
    LintReport { issues, risk }
}

fn relation_has_restriction(model: &QueryModel, relation: &str) -> bool {
    model
        .equality_predicates
        .iter()
        .map(|p| &p.column)
        .chain(model.range_predicates.iter().map(|p| &p.column))
        .any(|c| c.is_on(relation))
}

/// Usage for the unused-join rule: projections, predicates, and order/group
/// keys count; join conditions alone do not.
fn relation_used_outside_joins(model: &QueryModel, relation: &str) -> bool {
    let on_rel = |c: &ColumnRef| c.is_on(relation);
    model
        .projections
        .iter()
        .any(|p| matches!(p, Projection::Column { column } if on_rel(column)))
        || model.equality_predicates.iter().any(|p| on_rel(&p.column))
        || model.range_predicates.iter().any(|p| on_rel(&p.column))
        || model.order_keys.iter().any(|k| on_rel(&k.column))
        || model.group_keys.iter().any(on_rel)
}

fn summarize_risk(issues: &[LintIssue]) -> Risk {
    let highs = issues.iter().filter(|i| i.severity == Severity::High).count();
    let warns = issues.iter().filter(|i| i.severity == Severity::Warn).count();
    if highs > 0 {
        Risk::High
    } else if warns >= 2 {
        Risk::Medium
    } else {
        Risk::Low
    }
}
