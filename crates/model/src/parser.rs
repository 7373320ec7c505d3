use sqlparser::ast::{
    BinaryOperator, Distinct, Expr as SqlExpr, FunctionArg, FunctionArgExpr, FunctionArguments,
    GroupByExpr, Ident, Join, JoinConstraint, JoinOperator, ObjectName, Query, Select, SelectItem,
    SetExpr, SetOperator, SetQuantifier, Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::query::{
    ColumnRef, CountArg, EqualityPredicate, ExistsSubquery, InSubquery, JoinEdge, JoinKind,
    LikePredicate, LiteralShape, OrChain, OrderKey, Projection, QueryModel, RangeKind,
    RangePredicate, Relation, SetOpKind, SetOperation, SortDirection, StatementKind,
};

/// Parse one SQL statement into a [`QueryModel`].
///
/// Never fails: when the parser cannot produce any tree the model carries
/// `statement_kind = Other` and the parser message in `parse_error`, which
/// the linter surfaces as `PARSE_ERROR`. Non-SELECT statements yield an
/// empty `Other` model.
pub fn parse(sql: &str) -> QueryModel {
    let stmts = match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(s) => s,
        Err(e) => return QueryModel::other(Some(e.to_string())),
    };
    let Some(stmt) = stmts.first() else {
        return QueryModel::other(Some("empty statement".to_string()));
    };
    match stmt {
        Statement::Query(q) => query_to_model(q),
        _ => QueryModel::other(None),
    }
}

fn query_to_model(q: &Query) -> QueryModel {
    match q.body.as_ref() {
        SetExpr::Select(select) => {
            let mut model = select_to_model(select);
            attach_order_and_limit(&mut model, q, &Scope::of_select(select));
            model
        }
        SetExpr::SetOperation {
            op, set_quantifier, ..
        } => {
            let branches = flatten_set_branches(q.body.as_ref());
            let Some(first) = branches.first() else {
                return QueryModel::other(None);
            };
            let mut model = select_to_model(first);
            attach_order_and_limit(&mut model, q, &Scope::of_select(first));
            if *op == SetOperator::Union {
                let kind = match set_quantifier {
                    SetQuantifier::All | SetQuantifier::AllByName => SetOpKind::UnionAll,
                    _ => SetOpKind::Union,
                };
                let branch_projections = branches
                    .iter()
                    .map(|sel| {
                        let scope = Scope::of_select(sel);
                        sel.projection
                            .iter()
                            .filter_map(|item| match item {
                                SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                                    column_ref(e, &scope)
                                }
                                _ => None,
                            })
                            .collect()
                    })
                    .collect();
                model.set_op = Some(SetOperation {
                    kind,
                    branch_projections,
                });
            }
            model
        }
        SetExpr::Query(inner) => query_to_model(inner),
        _ => QueryModel::other(None),
    }
}

fn flatten_set_branches(body: &SetExpr) -> Vec<&Select> {
    match body {
        SetExpr::Select(s) => vec![s.as_ref()],
        SetExpr::Query(q) => flatten_set_branches(q.body.as_ref()),
        SetExpr::SetOperation { left, right, .. } => {
            let mut out = flatten_set_branches(left);
            out.extend(flatten_set_branches(right));
            out
        }
        _ => Vec::new(),
    }
}

fn attach_order_and_limit(model: &mut QueryModel, q: &Query, scope: &Scope) {
    for item in &q.order_by {
        let Some(column) = column_ref(&item.expr, scope) else {
            continue;
        };
        let direction = if item.asc == Some(false) {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        model.order_keys.push(OrderKey { column, direction });
    }
    if let Some(limit) = &q.limit {
        if let SqlExpr::Value(Value::Number(n, _)) = limit {
            model.limit = n.parse::<u64>().ok();
        }
    }
}

/// Name-resolution scope: declared FROM relations keyed by their binding
/// (the alias when declared, the bare name otherwise).
struct Scope {
    /// (binding, relation name) pairs in declaration order.
    bindings: Vec<(String, String)>,
    /// One relation name per FROM instance.
    relation_names: Vec<String>,
}

impl Scope {
    fn of_select(select: &Select) -> Self {
        let mut scope = Scope {
            bindings: Vec::new(),
            relation_names: Vec::new(),
        };
        for twj in &select.from {
            collect_bindings(&twj.relation, &mut scope);
            for j in &twj.joins {
                collect_bindings(&j.relation, &mut scope);
            }
        }
        scope
    }

    /// The sole relation name when exactly one relation is in scope;
    /// unqualified columns resolve to it.
    fn single(&self) -> Option<&String> {
        match self.relation_names.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    fn resolve_qualifier(&self, qualifier: &str) -> Option<String> {
        self.bindings
            .iter()
            .find(|(b, _)| b == qualifier)
            .map(|(_, name)| name.clone())
    }

    fn contains_qualifier(&self, qualifier: &str) -> bool {
        self.bindings.iter().any(|(b, _)| b == qualifier)
    }
}

fn collect_bindings(tf: &TableFactor, scope: &mut Scope) {
    match tf {
        TableFactor::Table { name, alias, .. } => {
            let rel = object_name_text(name);
            // An alias replaces the bare name as the usable qualifier.
            let binding = match alias {
                Some(a) => ident_text(&a.name).0,
                None => rel.clone(),
            };
            scope.bindings.push((binding, rel.clone()));
            scope.relation_names.push(rel);
        }
        TableFactor::Derived { alias, .. } => {
            let name = alias
                .as_ref()
                .map(|a| ident_text(&a.name).0)
                .unwrap_or_else(|| "(derived)".to_string());
            scope.bindings.push((name.clone(), name.clone()));
            scope.relation_names.push(name);
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_bindings(&table_with_joins.relation, scope);
            for j in &table_with_joins.joins {
                collect_bindings(&j.relation, scope);
            }
        }
        _ => {}
    }
}

fn select_to_model(select: &Select) -> QueryModel {
    let scope = Scope::of_select(select);
    let mut model = QueryModel {
        statement_kind: StatementKind::Select,
        ..QueryModel::other(None)
    };

    collect_relations_and_joins(&select.from, &scope, &mut model);
    model.distinct = matches!(select.distinct, Some(Distinct::Distinct));

    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {
                model.projections.push(Projection::Star);
            }
            SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                collect_count_arg(e, &scope, &mut model);
                match column_ref(e, &scope) {
                    Some(column) => model.projections.push(Projection::Column { column }),
                    None => model.projections.push(Projection::Opaque {
                        text: e.to_string(),
                    }),
                }
            }
        }
    }

    let mut where_join_pairs: Vec<(ColumnRef, ColumnRef)> = Vec::new();
    if let Some(selection) = &select.selection {
        walk_predicate(selection, &scope, true, &mut model, &mut where_join_pairs);
    }
    attach_comma_join_conditions(&mut model, where_join_pairs);

    if let GroupByExpr::Expressions(exprs) = &select.group_by {
        for e in exprs {
            if let Some(column) = column_ref(e, &scope) {
                model.group_keys.push(column);
            }
        }
    }

    dedup_predicates(&mut model);
    model
}

fn collect_relations_and_joins(from: &[TableWithJoins], scope: &Scope, model: &mut QueryModel) {
    for (i, twj) in from.iter().enumerate() {
        push_relation(&twj.relation, model);
        if i > 0 {
            if let Some(right) = factor_relation_name(&twj.relation) {
                model.joins.push(JoinEdge {
                    kind: JoinKind::ImplicitComma,
                    right,
                    on_columns: Vec::new(),
                });
            }
        }
        for j in &twj.joins {
            push_relation(&j.relation, model);
            if let Some(edge) = join_to_edge(j, scope) {
                model.joins.push(edge);
            }
        }
    }
}

fn push_relation(tf: &TableFactor, model: &mut QueryModel) {
    match tf {
        TableFactor::Table { name, alias, .. } => {
            model.relations.push(Relation {
                name: object_name_text(name),
                alias: alias.as_ref().map(|a| ident_text(&a.name).0),
                derived: false,
            });
        }
        TableFactor::Derived { alias, .. } => {
            let name = alias
                .as_ref()
                .map(|a| ident_text(&a.name).0)
                .unwrap_or_else(|| "(derived)".to_string());
            model.relations.push(Relation {
                name,
                alias: None,
                derived: true,
            });
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            push_relation(&table_with_joins.relation, model);
            for j in &table_with_joins.joins {
                push_relation(&j.relation, model);
            }
        }
        _ => {}
    }
}

fn factor_relation_name(tf: &TableFactor) -> Option<String> {
    match tf {
        TableFactor::Table { name, .. } => Some(object_name_text(name)),
        TableFactor::Derived { alias, .. } => Some(
            alias
                .as_ref()
                .map(|a| ident_text(&a.name).0)
                .unwrap_or_else(|| "(derived)".to_string()),
        ),
        _ => None,
    }
}

fn join_to_edge(j: &Join, scope: &Scope) -> Option<JoinEdge> {
    let right = factor_relation_name(&j.relation)?;
    let (kind, constraint) = match &j.join_operator {
        JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
        JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
        JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
        JoinOperator::CrossJoin => (JoinKind::Cross, None),
        _ => return None,
    };
    let mut on_columns = Vec::new();
    if let Some(constraint) = constraint {
        match constraint {
            JoinConstraint::On(expr) => collect_on_columns(expr, scope, &mut on_columns),
            JoinConstraint::Using(idents) => {
                for id in idents {
                    let (column, quoted) = ident_text(id);
                    on_columns.push(ColumnRef {
                        relation: Some(right.clone()),
                        column,
                        quoted,
                    });
                }
            }
            _ => {}
        }
    }
    Some(JoinEdge {
        kind,
        right,
        on_columns,
    })
}

fn collect_on_columns(expr: &SqlExpr, scope: &Scope, out: &mut Vec<ColumnRef>) {
    match expr {
        SqlExpr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                collect_on_columns(left, scope, out);
                collect_on_columns(right, scope, out);
            }
            BinaryOperator::Eq => {
                if let (Some(l), Some(r)) = (column_ref(left, scope), column_ref(right, scope)) {
                    out.push(l);
                    out.push(r);
                }
            }
            _ => {}
        },
        SqlExpr::Nested(e) => collect_on_columns(e, scope, out),
        _ => {}
    }
}

/// Comma-join conditions live in WHERE; attach each equality pair to the
/// comma edge whose right side matches one of the pair's relations.
fn attach_comma_join_conditions(model: &mut QueryModel, pairs: Vec<(ColumnRef, ColumnRef)>) {
    for (a, b) in pairs {
        let edge = model.joins.iter_mut().find(|j| {
            j.kind == JoinKind::ImplicitComma
                && (a.is_on(&j.right) || b.is_on(&j.right))
        });
        let edge = match edge {
            Some(e) => Some(e),
            None => model
                .joins
                .iter_mut()
                .find(|j| j.kind == JoinKind::ImplicitComma),
        };
        if let Some(edge) = edge {
            edge.on_columns.push(a);
            edge.on_columns.push(b);
        }
    }
}

fn walk_predicate(
    expr: &SqlExpr,
    scope: &Scope,
    conjunctive: bool,
    model: &mut QueryModel,
    join_pairs: &mut Vec<(ColumnRef, ColumnRef)>,
) {
    match expr {
        SqlExpr::Nested(e) => walk_predicate(e, scope, conjunctive, model, join_pairs),
        SqlExpr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                walk_predicate(left, scope, conjunctive, model, join_pairs);
                walk_predicate(right, scope, conjunctive, model, join_pairs);
            }
            BinaryOperator::Or => {
                let mut arms = Vec::new();
                flatten_or(expr, &mut arms);
                if let Some(column) = uniform_equality_column(&arms, scope) {
                    if conjunctive {
                        model.or_chains.push(OrChain {
                            column: column.clone(),
                            arms: arms.len(),
                        });
                        model.range_predicates.push(RangePredicate {
                            column,
                            kind: RangeKind::In,
                        });
                    }
                } else {
                    for arm in arms {
                        walk_predicate(arm, scope, false, model, join_pairs);
                    }
                }
            }
            BinaryOperator::Eq => {
                let lcol = column_ref(left, scope);
                let rcol = column_ref(right, scope);
                match (lcol, rcol) {
                    (Some(l), Some(r)) => {
                        if conjunctive {
                            join_pairs.push((l, r));
                        }
                    }
                    (Some(col), None) => {
                        if let Some(shape) = literal_shape(right) {
                            if conjunctive {
                                model
                                    .equality_predicates
                                    .push(EqualityPredicate { column: col, literal: shape });
                            }
                        }
                    }
                    (None, Some(col)) => {
                        if let Some(shape) = literal_shape(left) {
                            if conjunctive {
                                model
                                    .equality_predicates
                                    .push(EqualityPredicate { column: col, literal: shape });
                            }
                        }
                    }
                    (None, None) => {}
                }
            }
            BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Gt | BinaryOperator::GtEq => {
                let (col, kind) = match (column_ref(left, scope), column_ref(right, scope)) {
                    (Some(c), None) => (Some(c), range_kind(op, false)),
                    (None, Some(c)) => (Some(c), range_kind(op, true)),
                    _ => (None, None),
                };
                if conjunctive {
                    if let (Some(column), Some(kind)) = (col, kind) {
                        model.range_predicates.push(RangePredicate { column, kind });
                    }
                }
            }
            _ => {}
        },
        SqlExpr::Between {
            expr: inner,
            negated: false,
            ..
        } => {
            if conjunctive {
                if let Some(column) = column_ref(inner, scope) {
                    model.range_predicates.push(RangePredicate {
                        column,
                        kind: RangeKind::Between,
                    });
                }
            }
        }
        SqlExpr::InList {
            expr: inner,
            negated: false,
            ..
        } => {
            if conjunctive {
                if let Some(column) = column_ref(inner, scope) {
                    model.range_predicates.push(RangePredicate {
                        column,
                        kind: RangeKind::In,
                    });
                }
            }
        }
        SqlExpr::InSubquery {
            expr: inner,
            subquery,
            negated,
        } => {
            let (inner_scope, inner_column) = subquery_scope_and_projection(subquery);
            let outer_refs = subquery_outer_refs(subquery, scope, &inner_scope);
            model.in_subqueries.push(InSubquery {
                outer: column_ref(inner, scope),
                inner_column,
                negated: *negated,
                correlated: !outer_refs.is_empty(),
            });
        }
        SqlExpr::Exists { subquery, negated } => {
            let (inner_scope, _) = subquery_scope_and_projection(subquery);
            let correlation_columns = subquery_outer_refs(subquery, scope, &inner_scope);
            model.exists_subqueries.push(ExistsSubquery {
                negated: *negated,
                correlation_columns,
            });
        }
        SqlExpr::Like {
            negated: false,
            expr: inner,
            pattern,
            ..
        }
        | SqlExpr::ILike {
            negated: false,
            expr: inner,
            pattern,
            ..
        } => {
            if let Some(column) = column_ref(inner, scope) {
                let leading_wildcard = matches!(
                    pattern.as_ref(),
                    SqlExpr::Value(Value::SingleQuotedString(s)) if s.starts_with('%')
                );
                model.like_predicates.push(LikePredicate {
                    column,
                    leading_wildcard,
                });
            }
        }
        _ => {}
    }
}

fn flatten_or<'a>(expr: &'a SqlExpr, out: &mut Vec<&'a SqlExpr>) {
    match expr {
        SqlExpr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            flatten_or(left, out);
            flatten_or(right, out);
        }
        SqlExpr::Nested(e) => flatten_or(e, out),
        other => out.push(other),
    }
}

/// When every OR arm is `col = literal` on the same column, return it.
fn uniform_equality_column(arms: &[&SqlExpr], scope: &Scope) -> Option<ColumnRef> {
    let mut column: Option<ColumnRef> = None;
    for arm in arms {
        let SqlExpr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } = unnest(arm)
        else {
            return None;
        };
        let (col, lit) = match (column_ref(left, scope), column_ref(right, scope)) {
            (Some(c), None) => (c, literal_shape(right)),
            (None, Some(c)) => (c, literal_shape(left)),
            _ => return None,
        };
        lit?;
        match &column {
            None => column = Some(col),
            Some(prev) if *prev == col => {}
            Some(_) => return None,
        }
    }
    column
}

fn unnest(expr: &SqlExpr) -> &SqlExpr {
    match expr {
        SqlExpr::Nested(e) => unnest(e),
        other => other,
    }
}

fn range_kind(op: &BinaryOperator, reversed: bool) -> Option<RangeKind> {
    Some(match (op, reversed) {
        (BinaryOperator::Lt, false) | (BinaryOperator::Gt, true) => RangeKind::Lt,
        (BinaryOperator::LtEq, false) | (BinaryOperator::GtEq, true) => RangeKind::LtEq,
        (BinaryOperator::Gt, false) | (BinaryOperator::Lt, true) => RangeKind::Gt,
        (BinaryOperator::GtEq, false) | (BinaryOperator::LtEq, true) => RangeKind::GtEq,
        _ => return None,
    })
}

fn subquery_scope_and_projection(q: &Query) -> (Scope, Option<ColumnRef>) {
    let SetExpr::Select(select) = q.body.as_ref() else {
        return (
            Scope {
                bindings: Vec::new(),
                relation_names: Vec::new(),
            },
            None,
        );
    };
    let scope = Scope::of_select(select);
    let inner_column = select.projection.first().and_then(|item| match item {
        SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
            column_ref(e, &scope)
        }
        _ => None,
    });
    (scope, inner_column)
}

/// Outer-scope columns referenced inside a subquery's WHERE clause:
/// qualified references whose qualifier binds in the outer scope but not in
/// the subquery's own FROM scope.
fn subquery_outer_refs(q: &Query, outer: &Scope, inner: &Scope) -> Vec<ColumnRef> {
    let SetExpr::Select(select) = q.body.as_ref() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(selection) = &select.selection {
        collect_outer_refs(selection, outer, inner, &mut out);
    }
    out
}

fn collect_outer_refs(expr: &SqlExpr, outer: &Scope, inner: &Scope, out: &mut Vec<ColumnRef>) {
    match expr {
        SqlExpr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let (qualifier, _) = ident_text(&parts[parts.len() - 2]);
            if !inner.contains_qualifier(&qualifier) {
                if let Some(rel) = outer.resolve_qualifier(&qualifier) {
                    let (column, quoted) = ident_text(&parts[parts.len() - 1]);
                    out.push(ColumnRef {
                        relation: Some(rel),
                        column,
                        quoted,
                    });
                }
            }
        }
        SqlExpr::BinaryOp { left, right, .. } => {
            collect_outer_refs(left, outer, inner, out);
            collect_outer_refs(right, outer, inner, out);
        }
        SqlExpr::Nested(e) | SqlExpr::UnaryOp { expr: e, .. } => {
            collect_outer_refs(e, outer, inner, out)
        }
        SqlExpr::IsNull(e) | SqlExpr::IsNotNull(e) => collect_outer_refs(e, outer, inner, out),
        _ => {}
    }
}

fn collect_count_arg(expr: &SqlExpr, scope: &Scope, model: &mut QueryModel) {
    let SqlExpr::Function(func) = expr else {
        return;
    };
    let name = object_name_text(&func.name);
    if name != "count" {
        return;
    }
    let FunctionArguments::List(list) = &func.args else {
        return;
    };
    match list.args.first() {
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => {
            model.count_args.push(CountArg::Star);
        }
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(e))) => {
            if let Some(column) = column_ref(e, scope) {
                model.count_args.push(CountArg::Column { column });
            }
        }
        _ => {}
    }
}

fn column_ref(expr: &SqlExpr, scope: &Scope) -> Option<ColumnRef> {
    match expr {
        SqlExpr::Identifier(id) => {
            let (column, quoted) = ident_text(id);
            Some(ColumnRef {
                relation: scope.single().cloned(),
                column,
                quoted,
            })
        }
        SqlExpr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let (qualifier, _) = ident_text(&parts[parts.len() - 2]);
            let (column, quoted) = ident_text(&parts[parts.len() - 1]);
            Some(ColumnRef {
                relation: scope.resolve_qualifier(&qualifier),
                column,
                quoted,
            })
        }
        SqlExpr::Nested(e) => column_ref(e, scope),
        _ => None,
    }
}

fn literal_shape(expr: &SqlExpr) -> Option<LiteralShape> {
    match expr {
        SqlExpr::Value(v) => Some(match v {
            Value::Number(n, _) => {
                if n.contains('.') || n.contains('e') || n.contains('E') {
                    LiteralShape::Decimal
                } else {
                    LiteralShape::Integer
                }
            }
            Value::SingleQuotedString(_)
            | Value::DollarQuotedString(_)
            | Value::EscapedStringLiteral(_) => LiteralShape::Text,
            Value::Boolean(_) => LiteralShape::Boolean,
            Value::Null => LiteralShape::Null,
            Value::Placeholder(_) => LiteralShape::Parameter,
            _ => return None,
        }),
        SqlExpr::Nested(e) => literal_shape(e),
        _ => None,
    }
}

/// Identifier text per the casing rule: unquoted identifiers are
/// lowercased, quoted identifiers keep their source spelling.
fn ident_text(id: &Ident) -> (String, bool) {
    match id.quote_style {
        Some(_) => (id.value.clone(), true),
        None => (id.value.to_lowercase(), false),
    }
}

fn object_name_text(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|id| ident_text(id).0)
        .unwrap_or_default()
}

fn dedup_predicates(model: &mut QueryModel) {
    let mut seen = Vec::new();
    model.equality_predicates.retain(|p| {
        let key = (p.column.clone(), p.literal);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    let mut seen = Vec::new();
    model.range_predicates.retain(|p| {
        let key = (p.column.clone(), p.kind);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}
