#![deny(missing_docs)]

//! Shared configuration, error types, metrics, and output-formatting
//! primitives for pglens crates.
//!
//! Architecture role:
//! - defines the advisor configuration passed across layers
//! - provides the common [`AdviseError`] / [`Result`] contracts
//! - hosts the metrics registry and the single outbound rounding routine
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`metrics`]
//! - [`output`]

/// Advisor configuration types and pattern matching helpers.
pub mod config;
/// Shared error taxonomy.
pub mod error;
/// Metrics registry and Prometheus rendering helpers.
pub mod metrics;
/// Centralized rounding for outbound decimals.
pub mod output;

pub use config::{glob_matches, AdvisorConfig, IndexAdvisorConfig, WhatIfConfig};
pub use error::{AdviseError, Result};
pub use metrics::{global_metrics, MetricsRegistry};
pub use output::{fmt3, round3};
