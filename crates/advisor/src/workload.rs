use std::collections::BTreeMap;

use pglens_common::{round3, AdvisorConfig};
use pglens_model::SortDirection;
use serde::{Deserialize, Serialize};

use crate::plan_inspect::PlanWarning;
use crate::suggestion::{Impact, Suggestion, SuggestionKind};

/// One analyzed workload input, produced by the per-query pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    /// Original SQL text.
    pub sql: String,
    /// Shape fingerprint; `None` for skipped inputs.
    pub fingerprint: Option<u64>,
    /// Why the input was skipped, when it was.
    pub skipped_reason: Option<String>,
    /// Whether the projection used `*`.
    pub select_star: bool,
    /// Relations referenced by the query.
    pub relations: Vec<String>,
    /// Per-query suggestions in their emitted order.
    pub suggestions: Vec<Suggestion>,
    /// Plan warnings, when a plan was obtainable.
    pub warnings: Vec<PlanWarning>,
}

/// Per-query record in the workload response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerQueryRecord {
    /// Original SQL text.
    pub sql: String,
    /// Shape fingerprint; absent for skipped inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<u64>,
    /// Present with the reason when the input was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// Suggestions for this query.
    pub suggestions: Vec<Suggestion>,
    /// Plan warnings for this query.
    pub warnings: Vec<PlanWarning>,
}

/// One fingerprint group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedShape {
    /// Shape fingerprint.
    pub fingerprint: u64,
    /// Number of inputs sharing the shape.
    pub count: usize,
    /// Lexicographically smallest SQL among the group's inputs, so the
    /// representative does not depend on input order.
    pub example_sql: String,
    /// Union of suggestion titles across the group, ascending.
    pub suggestion_titles: Vec<String>,
}

/// Index suggestion merged across queries by (relation, columns, directions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedIndexSuggestion {
    /// Target relation.
    pub relation: String,
    /// Key columns in order.
    pub columns: Vec<String>,
    /// Direction vector; absent for the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<SortDirection>>,
    /// Canonical title of the underlying suggestion.
    pub title: String,
    /// Informational DDL.
    pub statements: Vec<String>,
    /// Highest impact across the merged occurrences.
    pub impact: Impact,
    /// Number of queries that produced the candidate.
    pub frequency: usize,
    /// Sum of per-query heuristic scores.
    pub score: f64,
    /// Maximum heuristic reduction estimate.
    pub est_reduction_pct: f64,
    /// Sum of measured cost deltas, present only when every occurrence
    /// carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_cost_delta: Option<f64>,
}

/// Cross-query pattern finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecommendation {
    /// Stable pattern kind: `n_plus_one`, `shared_large_scan`, or
    /// `widespread_select_star`.
    pub kind: String,
    /// Human-readable summary.
    pub detail: String,
    /// Impact band.
    pub impact: Impact,
    /// Fingerprints backing the finding, ascending.
    pub fingerprints: Vec<u64>,
}

/// Workload counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStats {
    /// Inputs supplied.
    pub total: usize,
    /// Inputs analyzed as SELECT statements.
    pub analyzed: usize,
    /// Inputs skipped (non-SELECT or unparsable).
    pub skipped: usize,
    /// Distinct shape fingerprints among analyzed inputs.
    pub unique_fingerprints: usize,
}

/// Full workload aggregation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadReport {
    /// Records in input order.
    pub per_query: Vec<PerQueryRecord>,
    /// Shape groups, descending count then ascending fingerprint.
    pub grouped: Vec<GroupedShape>,
    /// Merged index suggestions.
    pub merged_index_suggestions: Vec<MergedIndexSuggestion>,
    /// Cross-query pattern findings.
    pub workload_recommendations: Vec<WorkloadRecommendation>,
    /// Counters.
    pub stats: WorkloadStats,
}

/// Aggregate per-query analyses into workload-level advice.
pub fn aggregate(
    queries: Vec<AnalyzedQuery>,
    cfg: &AdvisorConfig,
    top_k: usize,
) -> WorkloadReport {
    let total = queries.len();
    let analyzed = queries.iter().filter(|q| q.skipped_reason.is_none()).count();
    let skipped = total - analyzed;

    // Group by fingerprint; BTreeMap gives ascending-fingerprint iteration.
    struct Group {
        count: usize,
        example_sql: String,
        suggestion_titles: std::collections::BTreeSet<String>,
    }
    let mut groups: BTreeMap<u64, Group> = BTreeMap::new();
    for q in &queries {
        let Some(fp) = q.fingerprint else { continue };
        let titles = q.suggestions.iter().map(|s| s.title.clone());
        groups
            .entry(fp)
            .and_modify(|g| {
                g.count += 1;
                if q.sql < g.example_sql {
                    g.example_sql = q.sql.clone();
                }
            })
            .or_insert_with(|| Group {
                count: 1,
                example_sql: q.sql.clone(),
                suggestion_titles: Default::default(),
            })
            .suggestion_titles
            .extend(titles);
    }

    let mut grouped: Vec<GroupedShape> = groups
        .iter()
        .map(|(fp, g)| GroupedShape {
            fingerprint: *fp,
            count: g.count,
            example_sql: g.example_sql.clone(),
            suggestion_titles: g.suggestion_titles.iter().cloned().collect(),
        })
        .collect();
    grouped.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });

    let merged_index_suggestions = merge_index_candidates(&queries, top_k);
    let workload_recommendations = detect_patterns(
        &queries,
        &grouped,
        &merged_index_suggestions,
        cfg,
        analyzed,
    );

    let per_query = queries
        .into_iter()
        .map(|q| PerQueryRecord {
            sql: q.sql,
            fingerprint: q.fingerprint,
            skipped: q.skipped_reason,
            suggestions: q.suggestions,
            warnings: q.warnings,
        })
        .collect();

    WorkloadReport {
        per_query,
        grouped,
        merged_index_suggestions,
        workload_recommendations,
        stats: WorkloadStats {
            total,
            analyzed,
            skipped,
            unique_fingerprints: groups.len(),
        },
    }
}

fn merge_index_candidates(queries: &[AnalyzedQuery], top_k: usize) -> Vec<MergedIndexSuggestion> {
    struct Acc {
        entry: MergedIndexSuggestion,
        delta_sum: f64,
        delta_on_all: bool,
    }
    let mut merged: BTreeMap<(String, Vec<String>, String), Acc> = BTreeMap::new();
    for q in queries {
        for s in &q.suggestions {
            if s.kind != SuggestionKind::Index {
                continue;
            }
            let Some(cand) = &s.candidate else { continue };
            let dir_key = match &cand.directions {
                None => String::new(),
                Some(dirs) => dirs
                    .iter()
                    .map(|d| match d {
                        SortDirection::Asc => 'a',
                        SortDirection::Desc => 'd',
                    })
                    .collect(),
            };
            let key = (cand.relation.clone(), cand.columns.clone(), dir_key);
            let acc = merged.entry(key).or_insert_with(|| Acc {
                entry: MergedIndexSuggestion {
                    relation: cand.relation.clone(),
                    columns: cand.columns.clone(),
                    directions: cand.directions.clone(),
                    title: s.title.clone(),
                    statements: s.statements.clone(),
                    impact: s.impact,
                    frequency: 0,
                    score: 0.0,
                    est_reduction_pct: 0.0,
                    est_cost_delta: None,
                },
                delta_sum: 0.0,
                delta_on_all: true,
            });
            acc.entry.frequency += 1;
            acc.entry.score = round3(acc.entry.score + s.score.unwrap_or(0.0));
            if let Some(pct) = s.est_reduction_pct {
                if pct > acc.entry.est_reduction_pct {
                    acc.entry.est_reduction_pct = pct;
                }
            }
            if acc.entry.impact < s.impact {
                acc.entry.impact = s.impact;
            }
            match s.est_cost_delta {
                Some(d) => acc.delta_sum += d,
                None => acc.delta_on_all = false,
            }
        }
    }

    let mut out: Vec<MergedIndexSuggestion> = merged
        .into_values()
        .map(|acc| {
            let mut entry = acc.entry;
            if acc.delta_on_all && entry.frequency > 0 {
                entry.est_cost_delta = Some(round3(acc.delta_sum));
            }
            entry
        })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.frequency.cmp(&a.frequency))
            .then_with(|| a.title.cmp(&b.title))
    });
    out.truncate(top_k);
    out
}

fn detect_patterns(
    queries: &[AnalyzedQuery],
    grouped: &[GroupedShape],
    merged: &[MergedIndexSuggestion],
    cfg: &AdvisorConfig,
    analyzed: usize,
) -> Vec<WorkloadRecommendation> {
    let mut out = Vec::new();

    // Repeated shape: the classic query-in-a-loop signature.
    for g in grouped {
        if g.count >= cfg.n1_threshold {
            out.push(WorkloadRecommendation {
                kind: "n_plus_one".to_string(),
                detail: format!(
                    "{} queries share one shape; batch them or fetch with a join",
                    g.count
                ),
                impact: Impact::High,
                fingerprints: vec![g.fingerprint],
            });
        }
    }

    // Shared large scan: several shapes hammer the same unindexed relation.
    let mut scans: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
    for q in queries {
        let Some(fp) = q.fingerprint else { continue };
        for w in &q.warnings {
            if w.code == "SEQ_SCAN_LARGE" {
                if let Some(rel) = &w.relation {
                    let fps = scans.entry(rel.as_str()).or_default();
                    if !fps.contains(&fp) {
                        fps.push(fp);
                    }
                }
            }
        }
    }
    for (rel, mut fps) in scans {
        if fps.len() < 2 {
            continue;
        }
        let Some(index) = merged.iter().find(|m| m.relation == rel) else {
            continue;
        };
        fps.sort_unstable();
        out.push(WorkloadRecommendation {
            kind: "shared_large_scan".to_string(),
            detail: format!(
                "{} query shapes scan {rel} sequentially; {} serves them all",
                fps.len(),
                index.title
            ),
            impact: Impact::High,
            fingerprints: fps,
        });
    }

    // Widespread SELECT *.
    let star_count = queries
        .iter()
        .filter(|q| q.skipped_reason.is_none() && q.select_star)
        .count();
    if analyzed > 0 && star_count * 2 >= analyzed {
        let mut fps: Vec<u64> = queries
            .iter()
            .filter(|q| q.select_star)
            .filter_map(|q| q.fingerprint)
            .collect();
        fps.sort_unstable();
        fps.dedup();
        out.push(WorkloadRecommendation {
            kind: "widespread_select_star".to_string(),
            detail: format!(
                "{star_count} of {analyzed} queries project *; switch to explicit columns"
            ),
            impact: Impact::Medium,
            fingerprints: fps,
        });
    }

    out
}
