use serde::{Deserialize, Serialize};

/// Statement classification; only SELECT statements receive advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// A plain SELECT (possibly a set operation over SELECTs).
    Select,
    /// Anything else; advisors short-circuit.
    Other,
}

/// One relation mentioned in FROM, in textual order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation name, lowercased unless quoted in the source.
    pub name: String,
    /// Declared alias, when present.
    pub alias: Option<String>,
    /// True for derived tables (`FROM (SELECT ...) x`).
    pub derived: bool,
}

/// A column reference resolved against the declared FROM relations.
///
/// `relation == None` marks the reference as ambiguous (unqualified in a
/// multi-relation scope, or qualified by an unknown alias); advisors skip
/// such columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Resolved relation name (not the alias), or `None` when ambiguous.
    pub relation: Option<String>,
    /// Column name, lowercased unless quoted in the source.
    pub column: String,
    /// True when the source spelled the column as a quoted identifier.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub quoted: bool,
}

impl ColumnRef {
    /// Reference resolved to a known relation.
    pub fn resolved(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            column: column.into(),
            quoted: false,
        }
    }

    /// Reference that could not be resolved.
    pub fn ambiguous(column: impl Into<String>) -> Self {
        Self {
            relation: None,
            column: column.into(),
            quoted: false,
        }
    }

    /// Whether this reference resolved to the given relation.
    pub fn is_on(&self, relation: &str) -> bool {
        self.relation.as_deref() == Some(relation)
    }
}

/// One projected item in SELECT-list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Projection {
    /// `*` or `alias.*`.
    Star,
    /// A plain column reference.
    Column {
        /// The referenced column.
        column: ColumnRef,
    },
    /// A computed expression; its text is kept for display only.
    Opaque {
        /// Rendered expression text.
        text: String,
    },
}

/// Join operator kind, including the comma form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    ImplicitComma,
}

impl JoinKind {
    /// Whether this kind requires an ON condition to be well-formed.
    pub fn requires_condition(self) -> bool {
        matches!(self, Self::Inner | Self::Left | Self::Right | Self::Full)
    }
}

/// One join edge in FROM order. An empty `on_columns` records a missing
/// join condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    /// Join operator kind.
    pub kind: JoinKind,
    /// Resolved name of the right-hand relation.
    pub right: String,
    /// Columns appearing in the equality join condition, both sides.
    pub on_columns: Vec<ColumnRef>,
}

/// Shape of a literal compared against a column; the value itself is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralShape {
    Integer,
    Decimal,
    Text,
    Boolean,
    Null,
    Parameter,
}

/// `column = literal` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualityPredicate {
    /// Left-hand column.
    pub column: ColumnRef,
    /// Shape of the compared literal.
    pub literal: LiteralShape,
}

/// Range comparison kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Between,
    In,
}

/// `column <op> ...` range predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePredicate {
    /// Constrained column.
    pub column: ColumnRef,
    /// Comparison kind.
    pub kind: RangeKind,
}

/// Sort direction; ASC is the default everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ORDER BY key with its direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    /// Sorted column.
    pub column: ColumnRef,
    /// ASC unless the source says DESC; NULLS ordering is ignored.
    pub direction: SortDirection,
}

/// `IN (SELECT ...)` / `NOT IN (SELECT ...)` shape facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InSubquery {
    /// Outer comparison column, when it is a plain column.
    pub outer: Option<ColumnRef>,
    /// Column projected by the subquery, when it is a plain column.
    /// Resolved against the subquery's own FROM scope.
    pub inner_column: Option<ColumnRef>,
    /// True for NOT IN.
    pub negated: bool,
    /// True when the subquery references outer relations.
    pub correlated: bool,
}

/// `EXISTS (SELECT ...)` shape facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsSubquery {
    /// True for NOT EXISTS.
    pub negated: bool,
    /// Outer columns equated with subquery columns in the correlation.
    pub correlation_columns: Vec<ColumnRef>,
}

/// A disjunction of equality comparisons on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrChain {
    /// The repeated column.
    pub column: ColumnRef,
    /// Number of OR arms.
    pub arms: usize,
}

/// A LIKE predicate on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikePredicate {
    /// Matched column.
    pub column: ColumnRef,
    /// True when the pattern starts with `%`.
    pub leading_wildcard: bool,
}

/// Argument shape of a COUNT aggregate in the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CountArg {
    /// `COUNT(*)`.
    Star,
    /// `COUNT(column)`.
    Column {
        /// The counted column.
        column: ColumnRef,
    },
}

/// Top-level set-operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOpKind {
    Union,
    UnionAll,
}

/// Top-level set operation over SELECT branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOperation {
    /// UNION vs UNION ALL.
    pub kind: SetOpKind,
    /// Plain-column projections of each branch, resolved per branch.
    pub branch_projections: Vec<Vec<ColumnRef>>,
}

/// Normalized model of one SELECT statement.
///
/// Built once per input SQL and immutable afterwards; every sequence
/// preserves the original textual order so downstream iteration is
/// deterministic without sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    /// SELECT vs everything else.
    pub statement_kind: StatementKind,
    /// Parser message when no tree could be produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    /// FROM relations in declaration order.
    pub relations: Vec<Relation>,
    /// SELECT list in order; `Star` is the `*` sentinel.
    pub projections: Vec<Projection>,
    /// True when SELECT DISTINCT.
    pub distinct: bool,
    /// Join edges in FROM order.
    pub joins: Vec<JoinEdge>,
    /// Equality predicates in textual order, deduplicated.
    pub equality_predicates: Vec<EqualityPredicate>,
    /// Range predicates in textual order, deduplicated.
    pub range_predicates: Vec<RangePredicate>,
    /// ORDER BY keys in order.
    pub order_keys: Vec<OrderKey>,
    /// GROUP BY keys in order.
    pub group_keys: Vec<ColumnRef>,
    /// LIMIT when present and a plain non-negative integer.
    pub limit: Option<u64>,
    /// IN/NOT-IN subquery facts.
    pub in_subqueries: Vec<InSubquery>,
    /// EXISTS/NOT-EXISTS subquery facts.
    pub exists_subqueries: Vec<ExistsSubquery>,
    /// Equality OR-chains per column.
    pub or_chains: Vec<OrChain>,
    /// LIKE predicates.
    pub like_predicates: Vec<LikePredicate>,
    /// COUNT aggregate argument shapes in projection order.
    pub count_args: Vec<CountArg>,
    /// Top-level set operation, when the statement is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_op: Option<SetOperation>,
}

impl QueryModel {
    /// An empty non-SELECT model carrying an optional parser message.
    pub fn other(parse_error: Option<String>) -> Self {
        Self {
            statement_kind: StatementKind::Other,
            parse_error,
            relations: Vec::new(),
            projections: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            equality_predicates: Vec::new(),
            range_predicates: Vec::new(),
            order_keys: Vec::new(),
            group_keys: Vec::new(),
            limit: None,
            in_subqueries: Vec::new(),
            exists_subqueries: Vec::new(),
            or_chains: Vec::new(),
            like_predicates: Vec::new(),
            count_args: Vec::new(),
            set_op: None,
        }
    }

    /// Whether the statement is an advisable SELECT.
    pub fn is_select(&self) -> bool {
        self.statement_kind == StatementKind::Select
    }

    /// Whether the projection contains the `*` sentinel.
    pub fn has_star(&self) -> bool {
        self.projections.iter().any(|p| matches!(p, Projection::Star))
    }

    /// Whether any projected item is a computed expression.
    pub fn has_opaque_projection(&self) -> bool {
        self.projections
            .iter()
            .any(|p| matches!(p, Projection::Opaque { .. }))
    }

    /// Whether the FROM clause contains a derived table.
    pub fn has_derived_table(&self) -> bool {
        self.relations.iter().any(|r| r.derived)
    }

    /// Every resolvable column reference in predicates, keys, and
    /// projections, in model order. Used by the linter.
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut out: Vec<&ColumnRef> = Vec::new();
        for p in &self.projections {
            if let Projection::Column { column } = p {
                out.push(column);
            }
        }
        for e in &self.equality_predicates {
            out.push(&e.column);
        }
        for r in &self.range_predicates {
            out.push(&r.column);
        }
        for k in &self.order_keys {
            out.push(&k.column);
        }
        for g in &self.group_keys {
            out.push(g);
        }
        out
    }

}
