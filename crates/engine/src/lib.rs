//! Inbound operations of the pglens analysis engine.
//!
//! Architecture role:
//! - wires the parser, linter, advisors, what-if evaluator, and workload
//!   aggregator behind four operations: `lint`, `explain`, `optimize`, and
//!   `workload`
//! - owns the degradation policy: planner timeouts and catalog failures
//!   produce partial responses, never fatal errors; only syntax errors and
//!   non-SELECT statements fail `optimize`
//!
//! Key modules:
//! - [`responses`]
//! - [`nl`]
//! - [`cache`]

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use pglens_advisor::{
    aggregate, diff_plans, evaluate, inspect, lint as lint_rules, suggest_indexes,
    suggest_rewrites, AnalyzedQuery, Suggestion,
};
use pglens_common::{AdviseError, AdvisorConfig, MetricsRegistry, Result, round3};
use pglens_gateway::{GatewayError, PlannerGateway, SchemaFilter};
use pglens_model::{fingerprint, parse, SchemaSnapshot};

/// Schema cache seam.
pub mod cache;
/// Natural-language producer seam.
pub mod nl;
/// Response value types.
pub mod responses;

pub use cache::SchemaCache;
pub use nl::{Audience, ExplanationProducer, NlOptions, NlUnavailable};
pub use responses::{
    ExplainResponse, LintResponse, OptimizeResponse, Summary, WorkloadResponse,
};

/// Options for [`Engine::explain`].
#[derive(Debug, Clone, Default)]
pub struct ExplainOptions {
    /// Run `EXPLAIN ANALYZE` instead of plain EXPLAIN.
    pub analyze: bool,
    /// Statement timeout override.
    pub timeout_ms: Option<u64>,
    /// Request a natural-language explanation with these options.
    pub explanation: Option<NlOptions>,
}

/// Options for [`Engine::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Request or suppress what-if evaluation; `None` follows configuration.
    pub what_if: Option<bool>,
    /// Maximum suggestions returned, clamped to 1..=50.
    pub top_k: usize,
    /// Statement timeout override.
    pub timeout_ms: Option<u64>,
    /// Include a baseline-versus-best-trial plan comparison.
    pub diff: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            what_if: None,
            top_k: 10,
            timeout_ms: None,
            diff: false,
        }
    }
}

/// Options for [`Engine::workload`].
#[derive(Debug, Clone)]
pub struct WorkloadOptions {
    /// Maximum merged index suggestions.
    pub top_k: usize,
    /// Run what-if trials for each analyzed query.
    pub what_if: bool,
}

impl Default for WorkloadOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            what_if: false,
        }
    }
}

/// The analysis engine: one instance per process, cheap to share.
pub struct Engine {
    gateway: Arc<dyn PlannerGateway>,
    config: AdvisorConfig,
    metrics: MetricsRegistry,
    explanations: Option<Arc<dyn ExplanationProducer>>,
    schema_cache: Option<Arc<dyn SchemaCache>>,
}

impl Engine {
    /// Build an engine over a planner gateway.
    pub fn new(gateway: Arc<dyn PlannerGateway>, config: AdvisorConfig) -> Self {
        Self {
            gateway,
            config,
            metrics: MetricsRegistry::new(),
            explanations: None,
            schema_cache: None,
        }
    }

    /// Attach a natural-language explanation producer.
    pub fn with_explanations(mut self, producer: Arc<dyn ExplanationProducer>) -> Self {
        self.explanations = Some(producer);
        self
    }

    /// Attach a schema snapshot cache.
    pub fn with_schema_cache(mut self, cache: Arc<dyn SchemaCache>) -> Self {
        self.schema_cache = Some(cache);
        self
    }

    /// The engine's metrics registry.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Lint a statement. Pure: never contacts the planner.
    pub fn lint(&self, sql: &str) -> LintResponse {
        let started = Instant::now();
        let model = parse(sql);
        let report = lint_rules(&model, &self.config);
        self.metrics
            .record_analysis("lint", started.elapsed().as_secs_f64());
        LintResponse {
            model,
            issues: report.issues,
            risk: report.risk,
        }
    }

    /// Explain a statement and inspect the resulting plan.
    ///
    /// Planner timeouts and transport failures degrade to an empty
    /// response; syntax errors and non-SELECT statements are fatal.
    pub async fn explain(&self, sql: &str, opts: &ExplainOptions) -> Result<ExplainResponse> {
        let started = Instant::now();
        let model = parse(sql);
        if let Some(err) = &model.parse_error {
            return Err(AdviseError::Syntax(err.clone()));
        }
        if !model.is_select() {
            return Err(AdviseError::NonSelect("statement is not a SELECT".to_string()));
        }
        let timeout_ms = opts.timeout_ms.unwrap_or(self.config.timeout_ms_default);

        let (plan, warnings, metrics) =
            match self.gateway.explain(sql, opts.analyze, timeout_ms).await {
                Ok(plan) => {
                    let (warnings, metrics) = inspect(&plan);
                    (Some(plan), warnings, Some(metrics))
                }
                Err(GatewayError::Syntax(msg)) => return Err(AdviseError::Syntax(msg)),
                Err(e) => {
                    self.record_degradation(&e);
                    (None, Vec::new(), None)
                }
            };

        let explanation_text = match (&self.explanations, &opts.explanation) {
            (Some(producer), Some(nl_opts)) => {
                let prompt = explanation_prompt(sql, &warnings);
                match producer.generate(&prompt, nl_opts).await {
                    Ok(text) => Some(text),
                    Err(_) => {
                        debug!("explanation producer unavailable");
                        None
                    }
                }
            }
            _ => None,
        };

        self.metrics
            .record_analysis("explain", started.elapsed().as_secs_f64());
        Ok(ExplainResponse {
            plan,
            warnings,
            metrics,
            explanation_text,
        })
    }

    /// Produce ranked optimization advice for one statement.
    pub async fn optimize(&self, sql: &str, opts: &OptimizeOptions) -> Result<OptimizeResponse> {
        let started = Instant::now();
        let model = parse(sql);
        if let Some(err) = &model.parse_error {
            return Err(AdviseError::Syntax(err.clone()));
        }
        if !model.is_select() {
            return Err(AdviseError::NonSelect("statement is not a SELECT".to_string()));
        }
        let timeout_ms = opts.timeout_ms.unwrap_or(self.config.timeout_ms_default);
        let top_k = opts.top_k.clamp(1, 50);

        let snapshot = self.snapshot(&SchemaFilter::default(), timeout_ms).await;

        let (plan_warnings, plan_metrics) =
            match self.gateway.explain(sql, false, timeout_ms).await {
                Ok(plan) => {
                    let (warnings, metrics) = inspect(&plan);
                    (warnings, Some(metrics))
                }
                Err(GatewayError::Syntax(msg)) => return Err(AdviseError::Syntax(msg)),
                Err(e) => {
                    self.record_degradation(&e);
                    (Vec::new(), None)
                }
            };

        let mut suggestions = suggest_rewrites(&model, &snapshot);
        suggestions.extend(suggest_indexes(&model, &snapshot, &self.config.index));

        let mut whatif_cfg = self.config.what_if.clone();
        if let Some(requested) = opts.what_if {
            whatif_cfg.enabled = requested;
        }
        let outcome = evaluate(
            Arc::clone(&self.gateway),
            sql,
            suggestions,
            &whatif_cfg,
            &self.metrics,
        )
        .await;

        let plan_diff = match (opts.diff, &outcome.baseline_plan, &outcome.best_trial) {
            (true, Some(baseline), Some(best)) => Some(diff_plans(baseline, &best.plan)),
            _ => None,
        };

        let mut suggestions = outcome.suggestions;
        suggestions.truncate(top_k);
        let summary = summarize(&suggestions);
        self.record_suggestion_counts(&suggestions);
        self.metrics
            .record_analysis("optimize", started.elapsed().as_secs_f64());
        Ok(OptimizeResponse {
            top_k_returned: suggestions.len(),
            suggestions,
            summary,
            ranking: outcome.ranking,
            what_if_report: outcome.report,
            plan_warnings,
            plan_metrics,
            plan_diff,
        })
    }

    /// Analyze a workload of statements and merge the advice.
    pub async fn workload(&self, sqls: &[String], opts: &WorkloadOptions) -> WorkloadResponse {
        let started = Instant::now();
        let timeout_ms = self.config.timeout_ms_default;
        let snapshot = self.snapshot(&SchemaFilter::default(), timeout_ms).await;

        let mut analyzed = Vec::with_capacity(sqls.len());
        for sql in sqls {
            let model = parse(sql);
            if !model.is_select() {
                let reason = match &model.parse_error {
                    Some(err) => format!("unparsable statement: {err}"),
                    None => "non-SELECT statement".to_string(),
                };
                analyzed.push(AnalyzedQuery {
                    sql: sql.clone(),
                    fingerprint: None,
                    skipped_reason: Some(reason),
                    select_star: false,
                    relations: Vec::new(),
                    suggestions: Vec::new(),
                    warnings: Vec::new(),
                });
                continue;
            }

            let warnings = match self.gateway.explain(sql, false, timeout_ms).await {
                Ok(plan) => inspect(&plan).0,
                Err(e) => {
                    self.record_degradation(&e);
                    Vec::new()
                }
            };

            let mut suggestions = suggest_rewrites(&model, &snapshot);
            suggestions.extend(suggest_indexes(&model, &snapshot, &self.config.index));
            if opts.what_if {
                let mut cfg = self.config.what_if.clone();
                cfg.enabled = true;
                suggestions = evaluate(
                    Arc::clone(&self.gateway),
                    sql,
                    suggestions,
                    &cfg,
                    &self.metrics,
                )
                .await
                .suggestions;
            }
            self.record_suggestion_counts(&suggestions);

            analyzed.push(AnalyzedQuery {
                sql: sql.clone(),
                fingerprint: Some(fingerprint(sql)),
                skipped_reason: None,
                select_star: model.has_star(),
                relations: model.relations.iter().map(|r| r.name.clone()).collect(),
                suggestions,
                warnings,
            });
        }

        let report = aggregate(analyzed, &self.config, opts.top_k.clamp(1, 50));
        self.metrics
            .record_analysis("workload", started.elapsed().as_secs_f64());
        report
    }

    async fn snapshot(&self, filter: &SchemaFilter, timeout_ms: u64) -> SchemaSnapshot {
        if let Some(cache) = &self.schema_cache {
            if let Some(hit) = cache.get(filter) {
                return hit;
            }
        }
        match self.gateway.fetch_schema(filter, timeout_ms).await {
            Ok(snapshot) => {
                if let Some(cache) = &self.schema_cache {
                    cache.put(filter, &snapshot);
                }
                snapshot
            }
            Err(e) => {
                // Index advice silently produces nothing against an empty
                // snapshot; lint and rewrites continue.
                warn!(error = %e, "catalog fetch failed, using empty snapshot");
                self.record_degradation(&e);
                SchemaSnapshot::empty()
            }
        }
    }

    fn record_degradation(&self, e: &GatewayError) {
        let kind = match e {
            GatewayError::Timeout => "timeout",
            GatewayError::Transport(_) => "transport",
            GatewayError::Syntax(_) => "syntax",
            GatewayError::Unavailable => "unavailable",
        };
        self.metrics.record_gateway_failure(kind);
    }

    fn record_suggestion_counts(&self, suggestions: &[Suggestion]) {
        let rewrites = suggestions
            .iter()
            .filter(|s| s.kind == pglens_advisor::SuggestionKind::Rewrite)
            .count();
        self.metrics.record_suggestions("rewrite", rewrites);
        self.metrics
            .record_suggestions("index", suggestions.len() - rewrites);
    }
}

/// Headline plus the impact-weighted mean confidence of the leading
/// suggestions.
fn summarize(suggestions: &[Suggestion]) -> Summary {
    if suggestions.is_empty() {
        return Summary {
            summary: "No optimizations identified.".to_string(),
            score: 0.0,
        };
    }
    let leading = &suggestions[..suggestions.len().min(5)];
    let total: f64 = leading
        .iter()
        .map(|s| s.impact.weight() * s.confidence)
        .sum();
    Summary {
        summary: format!("Top suggestion: {}", suggestions[0].title),
        score: round3(total / leading.len() as f64),
    }
}

fn explanation_prompt(sql: &str, warnings: &[pglens_advisor::PlanWarning]) -> String {
    let mut prompt = format!("Explain the execution characteristics of this SQL query.\n{sql}\n");
    if !warnings.is_empty() {
        prompt.push_str("Observed plan warnings:\n");
        for w in warnings {
            prompt.push_str(&format!("- {}: {}\n", w.code, w.detail));
        }
    }
    prompt
}
