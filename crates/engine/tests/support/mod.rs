#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use pglens_gateway::{
    GatewayError, GatewayResult, HypotheticalTrial, PlannerGateway, SchemaFilter,
};
use pglens_model::{
    ColumnDef, ColumnKind, IndexDef, PlanTree, SchemaSnapshot, TableSchema,
};

/// In-memory planner double with scripted plans and trial costs.
pub struct MockGateway {
    pub snapshot: SchemaSnapshot,
    pub explain_plan: Option<serde_json::Value>,
    pub baseline_cost: f64,
    pub trial_costs: HashMap<String, f64>,
    pub capability: bool,
    pub fail_schema: bool,
    pub trial_delay: Duration,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            snapshot: SchemaSnapshot::empty(),
            explain_plan: None,
            baseline_cost: 100.0,
            trial_costs: HashMap::new(),
            capability: true,
            fail_schema: false,
            trial_delay: Duration::ZERO,
        }
    }
}

pub fn cost_only_plan(total_cost: f64) -> PlanTree {
    PlanTree::from_explain_json(&json!({
        "Plan": {
            "Node Type": "Seq Scan",
            "Relation Name": "orders",
            "Startup Cost": 0.0,
            "Total Cost": total_cost,
            "Plan Rows": 1000.0,
            "Plan Width": 32.0
        }
    }))
    .expect("synthesized plan decodes")
}

#[async_trait]
impl PlannerGateway for MockGateway {
    async fn explain(
        &self,
        _sql: &str,
        _analyze: bool,
        _timeout_ms: u64,
    ) -> GatewayResult<PlanTree> {
        match &self.explain_plan {
            Some(value) => {
                PlanTree::from_explain_json(value).map_err(|e| GatewayError::Transport(e.to_string()))
            }
            None => Ok(cost_only_plan(self.baseline_cost)),
        }
    }

    async fn explain_costs(&self, _sql: &str, _timeout_ms: u64) -> GatewayResult<PlanTree> {
        Ok(cost_only_plan(self.baseline_cost))
    }

    async fn fetch_schema(
        &self,
        _filter: &SchemaFilter,
        _timeout_ms: u64,
    ) -> GatewayResult<SchemaSnapshot> {
        if self.fail_schema {
            return Err(GatewayError::Transport("catalog unreachable".to_string()));
        }
        Ok(self.snapshot.clone())
    }

    async fn hypothetical_capability(&self) -> bool {
        self.capability
    }

    async fn with_hypothetical_index(
        &self,
        index_ddl: &str,
        _sql: &str,
        _timeout_ms: u64,
    ) -> GatewayResult<HypotheticalTrial> {
        if !self.trial_delay.is_zero() {
            tokio::time::sleep(self.trial_delay).await;
        }
        match self.trial_costs.get(index_ddl) {
            Some(cost) => Ok(HypotheticalTrial {
                plan: cost_only_plan(*cost),
                trial_duration_ms: self.trial_delay.as_secs_f64() * 1000.0,
            }),
            None => Err(GatewayError::Transport(format!(
                "no scripted trial for: {index_ddl}"
            ))),
        }
    }
}

pub fn bigint(name: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        kind: ColumnKind::BigInt,
        nullable: false,
        avg_width_bytes: None,
    }
}

pub fn timestamp(name: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        kind: ColumnKind::Timestamp,
        nullable: false,
        avg_width_bytes: None,
    }
}

pub fn integer(name: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        kind: ColumnKind::Integer,
        nullable: false,
        avg_width_bytes: None,
    }
}

/// A large orders table, optionally with existing secondary indexes.
pub fn orders_snapshot(rows: u64, indexes: Vec<IndexDef>) -> SchemaSnapshot {
    let mut tables = BTreeMap::new();
    tables.insert(
        "orders".to_string(),
        TableSchema {
            name: "orders".to_string(),
            columns: vec![
                bigint("id"),
                bigint("user_id"),
                timestamp("created_at"),
                integer("total_cents"),
            ],
            indexes,
        },
    );
    let mut row_estimates = BTreeMap::new();
    row_estimates.insert("orders".to_string(), rows);
    SchemaSnapshot {
        tables,
        row_estimates,
    }
}
