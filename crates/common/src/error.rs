use thiserror::Error;

/// Canonical pglens error taxonomy used across crates.
///
/// Classification guidance:
/// - [`AdviseError::Syntax`]: the input SQL cannot be parsed at all; fatal to the request
/// - [`AdviseError::NonSelect`]: syntactically valid statement of an unadvisable kind; fatal to `optimize`
/// - [`AdviseError::Timeout`]: a planner call exceeded its statement deadline; callers degrade
/// - [`AdviseError::Transport`]: the planner is unreachable; callers degrade
/// - [`AdviseError::Unavailable`]: an optional capability (hypothetical indexes, NL producer) is absent
/// - [`AdviseError::Catalog`]: schema/stat fetch failed; advisors run on an empty snapshot
#[derive(Debug, Error)]
pub enum AdviseError {
    /// The SQL text could not be parsed into any statement tree.
    ///
    /// The only fatal lint-side condition: it surfaces as a single
    /// `PARSE_ERROR` issue, and `explain`/`optimize` reject the request
    /// without contacting the planner.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A parsed statement of a kind the advisors do not handle (anything
    /// other than SELECT). Fatal to `optimize`, recorded as skipped by the
    /// workload aggregator.
    #[error("unsupported statement kind: {0}")]
    NonSelect(String),

    /// A planner call exceeded its statement-level deadline. Local to the
    /// call; the caller proceeds with missing plan/trial/stat data.
    #[error("planner statement timed out")]
    Timeout,

    /// The planner is unreachable or the connection broke mid-call. Same
    /// degradation policy as [`AdviseError::Timeout`].
    #[error("planner transport error: {0}")]
    Transport(String),

    /// An optional collaborator capability is not installed or not enabled.
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// Catalog/statistics access failed; index advice is skipped for the
    /// request while lint and rewrite advice continue.
    #[error("catalog access failed: {0}")]
    Catalog(String),
}

/// Standard pglens result alias.
pub type Result<T> = std::result::Result<T, AdviseError>;
