use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::SortDirection;

/// Column type class; only the classes the width model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    BigInt,
    Timestamp,
    Boolean,
    Text,
    Numeric,
    Other,
}

impl ColumnKind {
    /// Classify a PostgreSQL `data_type` string.
    pub fn from_pg_type(data_type: &str) -> Self {
        match data_type.to_lowercase().as_str() {
            "smallint" | "int2" | "integer" | "int" | "int4" | "serial" => Self::Integer,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            t if t.starts_with("timestamp") || t == "date" => Self::Timestamp,
            "boolean" | "bool" => Self::Boolean,
            t if t.starts_with("character") || t == "text" || t == "varchar" || t == "char" => {
                Self::Text
            }
            t if t.starts_with("numeric") || t.starts_with("decimal") => Self::Numeric,
            _ => Self::Other,
        }
    }

    /// Default average width in bytes, used when `pg_stats` has no sample.
    pub fn default_width(self) -> u32 {
        match self {
            Self::Integer => 4,
            Self::BigInt => 8,
            Self::Timestamp => 8,
            Self::Boolean => 1,
            Self::Text => 16,
            Self::Numeric => 16,
            Self::Other => 8,
        }
    }
}

/// One column definition with its sampled average width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Type class.
    pub kind: ColumnKind,
    /// Whether NULLs are allowed.
    pub nullable: bool,
    /// Average stored width from `pg_stats`, when sampled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_width_bytes: Option<u32>,
}

impl ColumnDef {
    /// Sampled width, or the kind default.
    pub fn width(&self) -> u32 {
        match self.avg_width_bytes {
            Some(w) => w,
            None => self.kind.default_width(),
        }
    }
}

/// One existing index in declared column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Key columns in declared order.
    pub columns: Vec<String>,
    /// Per-column directions; `None` means the all-ASC default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<SortDirection>>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// One table's columns and indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnDef>,
    /// Existing indexes.
    pub indexes: Vec<IndexDef>,
}

/// Read-only catalog snapshot taken once per analysis request.
///
/// Ordered maps keep boundary iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Tables by name.
    pub tables: BTreeMap<String, TableSchema>,
    /// Approximate live-tuple counts by table name.
    pub row_estimates: BTreeMap<String, u64>,
}

impl SchemaSnapshot {
    /// The empty snapshot used when catalog access fails; the index advisor
    /// produces nothing against it while lint and rewrites continue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up one table.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Row estimate for a table, zero when unknown.
    pub fn row_estimate(&self, name: &str) -> u64 {
        self.row_estimates.get(name).copied().unwrap_or(0)
    }

    /// Look up one column definition.
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDef> {
        self.table(table)
            .and_then(|t| t.columns.iter().find(|c| c.name == column))
    }

    /// Whether a column is declared NOT NULL.
    pub fn column_is_not_null(&self, table: &str, column: &str) -> bool {
        self.column(table, column).is_some_and(|c| !c.nullable)
    }

    /// Existing indexes of a table, empty when unknown.
    pub fn indexes(&self, table: &str) -> &[IndexDef] {
        self.table(table).map(|t| t.indexes.as_slice()).unwrap_or(&[])
    }
}
