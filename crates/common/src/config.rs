use serde::{Deserialize, Serialize};

/// Index-advisor thresholds and caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexAdvisorConfig {
    /// Relations with fewer estimated live tuples are never indexed.
    pub min_rows_for_index: u64,
    /// Cap on the number of columns per candidate index.
    pub max_index_cols: usize,
    /// Candidates whose estimated entry width exceeds this are suppressed.
    pub index_max_width_bytes: u32,
    /// Candidates whose heuristic reduction percentage falls below this are suppressed.
    pub suppress_low_gain_pct: f64,
    /// Score multiplier applied when a candidate touches a join column.
    pub join_col_prior_boost: f64,
}

impl Default for IndexAdvisorConfig {
    fn default() -> Self {
        Self {
            min_rows_for_index: 10_000,
            max_index_cols: 3,
            index_max_width_bytes: 8192,
            suppress_low_gain_pct: 5.0,
            join_col_prior_boost: 1.2,
        }
    }
}

/// What-if (hypothetical index) evaluator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfConfig {
    /// Master switch; when false the evaluator returns suggestions unchanged.
    pub enabled: bool,
    /// Upper bound on hypothetical-index trials per request.
    pub max_trials: usize,
    /// Bounded worker count; each worker owns its planner session per trial.
    pub parallelism: usize,
    /// Statement timeout applied to each trial's planner call.
    pub trial_timeout_ms: u64,
    /// Wall-clock budget for the whole evaluation, measured from the baseline plan.
    pub global_timeout_ms: u64,
    /// Stop dispatching when the best completed reduction stays below this
    /// percentage after half the trials have finished.
    pub early_stop_pct: f64,
    /// Index suggestions whose measured cost reduction falls below this
    /// percentage of the baseline are dropped.
    pub min_cost_reduction_pct: f64,
}

impl Default for WhatIfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_trials: 8,
            parallelism: 2,
            trial_timeout_ms: 4_000,
            global_timeout_ms: 12_000,
            early_stop_pct: 2.0,
            min_cost_reduction_pct: 5.0,
        }
    }
}

/// Advisor configuration shared across the analysis pipeline.
///
/// Passed by reference into each component; there is no process-wide
/// mutable settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Default statement timeout for planner calls.
    pub timeout_ms_default: u64,
    /// Index advisor knobs.
    #[serde(default)]
    pub index: IndexAdvisorConfig,
    /// What-if evaluator knobs.
    #[serde(default)]
    pub what_if: WhatIfConfig,
    /// Glob list matched against relation names by the unfiltered-large-table lint.
    #[serde(default = "default_large_table_patterns")]
    pub large_table_patterns: Vec<String>,
    /// Glob list matched against column names by the implicit-cast lint.
    #[serde(default = "default_numeric_column_patterns")]
    pub numeric_column_patterns: Vec<String>,
    /// Repeated-shape count at which the workload aggregator reports an N+1 pattern.
    pub n1_threshold: usize,
}

fn default_large_table_patterns() -> Vec<String> {
    [
        "events",
        "logs",
        "transactions",
        "fact_*",
        "audit_*",
        "metrics",
        "analytics",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_numeric_column_patterns() -> Vec<String> {
    ["_id", "count", "amount", "price", "quantity", "score", "rating"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            timeout_ms_default: 10_000,
            index: IndexAdvisorConfig::default(),
            what_if: WhatIfConfig::default(),
            large_table_patterns: default_large_table_patterns(),
            numeric_column_patterns: default_numeric_column_patterns(),
            n1_threshold: 10,
        }
    }
}

/// Glob match with `*` (any run) and `?` (any one byte); a pattern containing
/// neither metacharacter matches as a substring.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return name.contains(pattern);
    }
    fn rec(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => rec(&p[1..], n) || (!n.is_empty() && rec(p, &n[1..])),
            (Some(b'?'), Some(_)) => rec(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => rec(&p[1..], &n[1..]),
            _ => false,
        }
    }
    rec(pattern.as_bytes(), name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AdvisorConfig::default();
        assert_eq!(cfg.index.min_rows_for_index, 10_000);
        assert_eq!(cfg.index.max_index_cols, 3);
        assert_eq!(cfg.index.index_max_width_bytes, 8192);
        assert_eq!(cfg.what_if.max_trials, 8);
        assert_eq!(cfg.what_if.parallelism, 2);
        assert_eq!(cfg.what_if.global_timeout_ms, 12_000);
        assert_eq!(cfg.n1_threshold, 10);
    }

    #[test]
    fn glob_star_and_substring_semantics() {
        assert!(glob_matches("fact_*", "fact_sales"));
        assert!(!glob_matches("fact_*", "dim_sales"));
        assert!(glob_matches("events", "user_events"));
        assert!(glob_matches("_id", "customer_id"));
        assert!(glob_matches("audit_?og", "audit_log"));
    }

    #[test]
    fn config_roundtrips_through_serde() {
        let cfg = AdvisorConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AdvisorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index.max_index_cols, cfg.index.max_index_cols);
        assert_eq!(back.large_table_patterns, cfg.large_table_patterns);
    }
}
