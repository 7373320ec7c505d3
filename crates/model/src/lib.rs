//! SQL model and shared value types for the pglens analysis pipeline.
//!
//! Architecture role:
//! - parses SELECT text into the normalized [`QueryModel`]
//! - computes stable workload fingerprints over canonical query shapes
//! - defines the [`PlanTree`] and [`SchemaSnapshot`] values exchanged with
//!   the planner gateway
//!
//! Key modules:
//! - [`parser`]
//! - [`query`]
//! - [`fingerprint`]
//! - [`plan`]
//! - [`schema`]

/// Workload shape normalization and fingerprinting.
pub mod fingerprint;
/// SQL text to [`QueryModel`] frontend.
pub mod parser;
/// EXPLAIN plan tree values.
pub mod plan;
/// Normalized query model value types.
pub mod query;
/// Catalog snapshot value types.
pub mod schema;

pub use fingerprint::{fingerprint, normalize_shape};
pub use parser::parse;
pub use plan::{PlanNode, PlanTree};
pub use query::*;
pub use schema::{ColumnDef, ColumnKind, IndexDef, SchemaSnapshot, TableSchema};
