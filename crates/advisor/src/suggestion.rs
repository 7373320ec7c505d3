use pglens_common::round3;
use pglens_model::SortDirection;
use serde::{Deserialize, Serialize};

/// Suggestion family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Rewrite,
    Index,
}

/// Expected impact band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    /// Rank used by the cost-based total order (HIGH=3, MEDIUM=2, LOW=1).
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// Weight used by the summary score.
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.5,
            Self::High => 0.8,
        }
    }
}

/// Column-pool sources contributing to an index candidate, as a bitmask.
pub mod source {
    /// Column came from an equality predicate.
    pub const EQUALITY: u8 = 1 << 0;
    /// Column came from a range predicate.
    pub const RANGE: u8 = 1 << 1;
    /// Column came from an order or group key.
    pub const ORDER: u8 = 1 << 2;
    /// Column also appears in a join condition.
    pub const JOIN: u8 = 1 << 3;
}

/// A proposed B-tree index, identified by relation, column list, and
/// direction vector. `directions == None` is the all-ASC default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCandidate {
    /// Target relation.
    pub relation: String,
    /// Key columns in order.
    pub columns: Vec<String>,
    /// Per-column directions; elided for the default vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<SortDirection>>,
    /// Union of contributing [`source`] bits.
    pub source_mask: u8,
}

impl IndexCandidate {
    /// Generated index name: `idx_<rel>_<cols>`, lowercased and truncated
    /// to the PostgreSQL identifier limit.
    pub fn index_name(&self) -> String {
        let mut name = format!("idx_{}_{}", self.relation, self.columns.join("_"));
        name.make_ascii_lowercase();
        name.truncate(63);
        name
    }

    /// Column list with `DESC` markers on non-default positions.
    fn column_list(&self) -> String {
        match &self.directions {
            None => self.columns.join(", "),
            Some(dirs) => self
                .columns
                .iter()
                .zip(dirs)
                .map(|(c, d)| match d {
                    SortDirection::Asc => c.clone(),
                    SortDirection::Desc => format!("{c} DESC"),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Informational DDL carried on the suggestion; never executed here.
    pub fn ddl(&self) -> String {
        format!(
            "CREATE INDEX CONCURRENTLY {} ON {} ({})",
            self.index_name(),
            self.relation,
            self.column_list()
        )
    }

    /// DDL form accepted by `hypopg_create_index` (no name, no CONCURRENTLY).
    pub fn hypopg_ddl(&self) -> String {
        format!("CREATE INDEX ON {} ({})", self.relation, self.column_list())
    }
}

/// One optimization suggestion.
///
/// Decimal fields are rounded to 3 digits when set, so serialized output is
/// bit-stable for identical inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Rewrite or index.
    pub kind: SuggestionKind,
    /// Canonical short title; rule identity for rewrites.
    pub title: String,
    /// Canonical one-line rationale.
    pub rationale: String,
    /// Expected impact band.
    pub impact: Impact,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// DDL statements (empty for rewrites).
    pub statements: Vec<String>,
    /// Example rewritten SQL (rewrites only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_sql: Option<String>,
    /// Heuristic score (index suggestions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Column-pool contribution summary (index suggestions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Heuristic reduction estimate in percent, within [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_reduction_pct: Option<f64>,
    /// Estimated index entry width in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_index_width_bytes: Option<u32>,
    /// Baseline planner cost, set by the what-if evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_cost_before: Option<f64>,
    /// Planner cost with the hypothetical index, set by the what-if evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_cost_after: Option<f64>,
    /// `est_cost_before - est_cost_after`, set by the what-if evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_cost_delta: Option<f64>,
    /// Candidate identity for what-if trials and workload merging.
    #[serde(skip)]
    pub candidate: Option<IndexCandidate>,
}

impl Suggestion {
    /// A rewrite suggestion with the fixed catalog fields.
    pub fn rewrite(
        title: &str,
        rationale: &str,
        impact: Impact,
        confidence: f64,
        alt_sql: Option<String>,
    ) -> Self {
        Self {
            kind: SuggestionKind::Rewrite,
            title: title.to_string(),
            rationale: rationale.to_string(),
            impact,
            confidence: round3(confidence),
            statements: Vec::new(),
            alt_sql,
            score: None,
            reason: None,
            est_reduction_pct: None,
            est_index_width_bytes: None,
            est_cost_before: None,
            est_cost_after: None,
            est_cost_delta: None,
            candidate: None,
        }
    }

    /// Attach measured planner costs, rounding at the boundary. The delta
    /// is computed from the rounded endpoints so `before - after == delta`
    /// holds on the serialized values.
    pub fn with_costs(&mut self, before: f64, after: f64) {
        let before = round3(before);
        let after = round3(after);
        self.est_cost_before = Some(before);
        self.est_cost_after = Some(after);
        self.est_cost_delta = Some(round3(before - after));
    }
}
