//! Planner gateway for the pglens analysis pipeline.
//!
//! Architecture role:
//! - the only component that talks to PostgreSQL
//! - issues `EXPLAIN (FORMAT JSON[, ANALYZE])`, catalog/stat queries, and
//!   hypothetical-index trials under statement-level timeouts
//! - soft-fails: timeouts and transport errors surface as explicit variants
//!   the callers degrade on, never as panics or opaque errors
//!
//! Key modules:
//! - [`pg`]: the tokio-postgres implementation

use async_trait::async_trait;
use pglens_model::{PlanTree, SchemaSnapshot};
use thiserror::Error;

/// The tokio-postgres gateway implementation.
pub mod pg;

pub use pg::{PgGateway, PgGatewayConfig};

/// Explicit failure variants at the planner boundary.
///
/// Every caller must handle each case: `Timeout` and `Transport` degrade to
/// missing data, `Syntax` is fatal to the request, `Unavailable` disables
/// the what-if path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The statement exceeded its server-side deadline.
    #[error("statement timed out")]
    Timeout,
    /// The planner is unreachable or the session broke mid-call.
    #[error("planner unreachable: {0}")]
    Transport(String),
    /// The submitted SQL was rejected by the server parser.
    #[error("invalid SQL: {0}")]
    Syntax(String),
    /// A required optional capability (hypopg) is absent.
    #[error("capability not available")]
    Unavailable,
}

/// Result alias at the planner boundary.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<GatewayError> for pglens_common::AdviseError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => Self::Timeout,
            GatewayError::Transport(msg) => Self::Transport(msg),
            GatewayError::Syntax(msg) => Self::Syntax(msg),
            GatewayError::Unavailable => Self::Unavailable("hypothetical indexes".to_string()),
        }
    }
}

/// Catalog fetch filter; `schema` defaults to `public`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFilter {
    /// Schema name; `public` when absent.
    pub schema: Option<String>,
    /// Restrict the snapshot to one table.
    pub table: Option<String>,
}

impl SchemaFilter {
    /// Filter for a fixed table list's schema (the common analysis path).
    pub fn schema_only(schema: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: None,
        }
    }

    /// Effective schema name.
    pub fn schema_name(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

/// Outcome of one hypothetical-index trial.
#[derive(Debug, Clone, PartialEq)]
pub struct HypotheticalTrial {
    /// Costs-only plan observed with the hypothetical index in place.
    pub plan: PlanTree,
    /// Wall time spent in the trial's planner call, in milliseconds.
    pub trial_duration_ms: f64,
}

/// Bounded planner access used by the analysis pipeline.
///
/// Implementations are session-safe: concurrent calls may run, but no
/// session is shared between calls, and hypothetical-index state never
/// leaks out of a single [`PlannerGateway::with_hypothetical_index`] call.
#[async_trait]
pub trait PlannerGateway: Send + Sync {
    /// `EXPLAIN (FORMAT JSON[, ANALYZE, BUFFERS, TIMING])` under a
    /// statement timeout. Non-SELECT statements are rejected before
    /// submission when recognizable.
    async fn explain(&self, sql: &str, analyze: bool, timeout_ms: u64) -> GatewayResult<PlanTree>;

    /// Costs-only EXPLAIN used in the what-if hot loop; never ANALYZE.
    async fn explain_costs(&self, sql: &str, timeout_ms: u64) -> GatewayResult<PlanTree>;

    /// Fetch tables, columns, indexes, widths, and row estimates.
    async fn fetch_schema(
        &self,
        filter: &SchemaFilter,
        timeout_ms: u64,
    ) -> GatewayResult<SchemaSnapshot>;

    /// Whether hypothetical indexes are available. One probe per process
    /// lifetime is sufficient; implementations cache the answer.
    async fn hypothetical_capability(&self) -> bool;

    /// Run one trial on a dedicated session: reset hypothetical state,
    /// create the hypothetical index, re-plan, and reset again on every
    /// exit path.
    async fn with_hypothetical_index(
        &self,
        index_ddl: &str,
        sql: &str,
        timeout_ms: u64,
    ) -> GatewayResult<HypotheticalTrial>;
}

/// Best-effort statement-kind screen used to refuse non-SELECT text before
/// it reaches the planner.
pub fn looks_like_select(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    head == "select" || head == "with" || head == "(" || head.starts_with("(select")
}
