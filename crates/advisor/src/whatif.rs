use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pglens_common::{MetricsRegistry, WhatIfConfig};
use pglens_gateway::{GatewayError, PlannerGateway};
use pglens_model::PlanTree;

use crate::suggestion::{IndexCandidate, Suggestion, SuggestionKind};

/// Ranking policy reflected in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    Heuristic,
    CostBased,
}

/// Trial accounting attached to every optimize response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatIfReport {
    /// Whether the evaluator was requested and enabled.
    pub enabled: bool,
    /// Whether hypothetical indexes were reachable.
    pub available: bool,
    /// Successfully completed trials.
    pub trials_completed: usize,
    /// Trials that failed; failures never abort the evaluation.
    pub trials_failed: usize,
    /// Index suggestions dropped by the minimum-reduction gate.
    pub trials_filtered_by_pct: usize,
    /// True when the global wall-clock budget cut dispatching short.
    pub budget_exceeded: bool,
}

impl WhatIfReport {
    fn disabled() -> Self {
        Self {
            enabled: false,
            available: false,
            trials_completed: 0,
            trials_failed: 0,
            trials_filtered_by_pct: 0,
            budget_exceeded: false,
        }
    }

    fn unavailable() -> Self {
        Self {
            enabled: true,
            available: false,
            ..Self::disabled()
        }
    }
}

/// The cheapest measured trial, kept for plan diffing.
#[derive(Debug, Clone)]
pub struct BestTrial {
    /// Title of the suggestion the trial belongs to.
    pub suggestion_title: String,
    /// Costs-only plan observed with the hypothetical index.
    pub plan: PlanTree,
}

/// Evaluator output: the (possibly re-ranked) suggestions plus accounting.
#[derive(Debug)]
pub struct WhatIfOutcome {
    /// Suggestions after cost attachment, filtering, and ranking.
    pub suggestions: Vec<Suggestion>,
    /// Which ranking policy produced the order.
    pub ranking: Ranking,
    /// Trial accounting.
    pub report: WhatIfReport,
    /// Baseline costs-only plan, when one was obtained.
    pub baseline_plan: Option<PlanTree>,
    /// The lowest-cost completed trial.
    pub best_trial: Option<BestTrial>,
}

fn heuristic(suggestions: Vec<Suggestion>, report: WhatIfReport) -> WhatIfOutcome {
    WhatIfOutcome {
        suggestions,
        ranking: Ranking::Heuristic,
        report,
        baseline_plan: None,
        best_trial: None,
    }
}

struct TrialState {
    queue: Mutex<VecDeque<(usize, IndexCandidate)>>,
    results: Mutex<Vec<(usize, f64, PlanTree)>>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    best_pct: Mutex<f64>,
    budget_exceeded: AtomicBool,
    stop: AtomicBool,
}

/// Measure planner-cost deltas for the top index candidates through
/// hypothetical indexes, then filter and re-rank.
///
/// Trials run on a bounded worker set; each worker owns one planner session
/// per trial, re-checks the global budget and the early-stop flag between
/// trials, and never aborts the evaluation on individual failures.
pub async fn evaluate(
    gateway: Arc<dyn PlannerGateway>,
    sql: &str,
    mut suggestions: Vec<Suggestion>,
    cfg: &WhatIfConfig,
    metrics: &MetricsRegistry,
) -> WhatIfOutcome {
    if !cfg.enabled {
        return heuristic(suggestions, WhatIfReport::disabled());
    }
    if !gateway.hypothetical_capability().await {
        return heuristic(suggestions, WhatIfReport::unavailable());
    }

    let candidates: VecDeque<(usize, IndexCandidate)> = suggestions
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == SuggestionKind::Index)
        .filter_map(|(i, s)| s.candidate.clone().map(|c| (i, c)))
        .take(cfg.max_trials)
        .collect();
    if candidates.is_empty() {
        return heuristic(
            suggestions,
            WhatIfReport {
                enabled: true,
                available: true,
                ..WhatIfReport::disabled()
            },
        );
    }

    let started = Instant::now();
    let baseline_plan = match gateway.explain_costs(sql, cfg.trial_timeout_ms).await {
        Ok(plan) => plan,
        Err(e) => {
            debug!(error = %e, "baseline plan unavailable, keeping heuristic ranking");
            let available = !matches!(e, GatewayError::Transport(_) | GatewayError::Unavailable);
            let mut report = WhatIfReport::unavailable();
            report.available = available;
            return heuristic(suggestions, report);
        }
    };
    let cost_before = baseline_plan.total_cost();

    let max_trials = cfg.max_trials;
    let state = Arc::new(TrialState {
        queue: Mutex::new(candidates),
        results: Mutex::new(Vec::new()),
        completed: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
        best_pct: Mutex::new(0.0),
        budget_exceeded: AtomicBool::new(false),
        stop: AtomicBool::new(false),
    });
    let deadline = started + Duration::from_millis(cfg.global_timeout_ms);

    let workers = cfg.parallelism.max(1);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let state = Arc::clone(&state);
        let gateway = Arc::clone(&gateway);
        let metrics = metrics.clone();
        let sql = sql.to_string();
        let trial_timeout_ms = cfg.trial_timeout_ms;
        let early_stop_pct = cfg.early_stop_pct;
        handles.push(tokio::spawn(async move {
            loop {
                if state.stop.load(Ordering::Acquire) {
                    break;
                }
                if Instant::now() >= deadline {
                    state.budget_exceeded.store(true, Ordering::Release);
                    state.stop.store(true, Ordering::Release);
                    break;
                }
                let next = state.queue.lock().expect("trial queue").pop_front();
                let Some((suggestion_idx, candidate)) = next else {
                    break;
                };
                let trial_started = Instant::now();
                match gateway
                    .with_hypothetical_index(&candidate.hypopg_ddl(), &sql, trial_timeout_ms)
                    .await
                {
                    Ok(trial) => {
                        metrics.observe_whatif_trial("ok", trial_started.elapsed().as_secs_f64());
                        let cost_after = trial.plan.total_cost();
                        state
                            .results
                            .lock()
                            .expect("trial results")
                            .push((suggestion_idx, cost_after, trial.plan));
                        let completed = state.completed.fetch_add(1, Ordering::AcqRel) + 1;
                        let pct = if cost_before > 0.0 {
                            ((cost_before - cost_after) / cost_before * 100.0).max(0.0)
                        } else {
                            0.0
                        };
                        let best = {
                            let mut best = state.best_pct.lock().expect("best pct");
                            if pct > *best {
                                *best = pct;
                            }
                            *best
                        };
                        if completed * 2 >= max_trials && best < early_stop_pct {
                            state.stop.store(true, Ordering::Release);
                        }
                    }
                    Err(e) => {
                        metrics
                            .observe_whatif_trial("failed", trial_started.elapsed().as_secs_f64());
                        debug!(error = %e, "hypothetical trial failed");
                        state.failed.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
        }));
    }
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            warn!(error = %e, "what-if worker panicked");
        }
    }

    let results = state.results.lock().expect("trial results").clone();
    for (idx, cost_after, _) in &results {
        suggestions[*idx].with_costs(cost_before, *cost_after);
    }
    // Lowest cost wins; on ties the earlier heuristic candidate, so the
    // choice is stable across trial completion orders.
    let best_trial = results
        .iter()
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(idx, _, plan)| BestTrial {
            suggestion_title: suggestions[*idx].title.clone(),
            plan: plan.clone(),
        });

    let mut filtered = 0usize;
    let min_pct = cfg.min_cost_reduction_pct;
    suggestions.retain(|s| {
        if s.kind != SuggestionKind::Index {
            return true;
        }
        let Some(delta) = s.est_cost_delta else {
            return true;
        };
        let pct = delta / cost_before.max(f64::EPSILON) * 100.0;
        if pct < min_pct {
            filtered += 1;
            false
        } else {
            true
        }
    });
    metrics.count_whatif_filtered(filtered);

    rank_cost_based(&mut suggestions);

    WhatIfOutcome {
        suggestions,
        ranking: Ranking::CostBased,
        report: WhatIfReport {
            enabled: true,
            available: true,
            trials_completed: state.completed.load(Ordering::Acquire),
            trials_failed: state.failed.load(Ordering::Acquire),
            trials_filtered_by_pct: filtered,
            budget_exceeded: state.budget_exceeded.load(Ordering::Acquire),
        },
        baseline_plan: Some(baseline_plan),
        best_trial,
    }
}

/// Total order of cost-based ranking: positive deltas first (largest
/// first), then items without a delta, then zero or negative deltas; ties
/// break on impact, confidence, and finally title.
pub fn rank_cost_based(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| {
        delta_class(a)
            .cmp(&delta_class(b))
            .then_with(|| {
                let da = a.est_cost_delta.unwrap_or(0.0);
                let db = b.est_cost_delta.unwrap_or(0.0);
                db.total_cmp(&da)
            })
            .then_with(|| b.impact.rank().cmp(&a.impact.rank()))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.title.cmp(&b.title))
    });
}

fn delta_class(s: &Suggestion) -> u8 {
    match s.est_cost_delta {
        Some(d) if d > 0.0 => 0,
        None => 1,
        Some(_) => 2,
    }
}
