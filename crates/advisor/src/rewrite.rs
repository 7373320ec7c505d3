use pglens_model::{
    ColumnRef, CountArg, Projection, QueryModel, SchemaSnapshot, SetOpKind,
};

use crate::suggestion::{Impact, Suggestion};

/// Apply the fixed rewrite-rule catalog over a query model.
///
/// Each rule is a pure predicate producing at most one suggestion with a
/// fixed title; output order is catalog order, which doubles as the
/// heuristic tie-break order for rewrites.
pub fn suggest_rewrites(model: &QueryModel, schema: &SchemaSnapshot) -> Vec<Suggestion> {
    if !model.is_select() {
        return Vec::new();
    }
    let rules: [fn(&QueryModel, &SchemaSnapshot) -> Option<Suggestion>; 12] = [
        explicit_projection,
        in_subquery_to_exists,
        decorrelate_exists,
        top_n_alignment,
        predicate_pushdown,
        union_to_union_all,
        or_chain_to_in,
        not_in_to_not_exists,
        like_leading_wildcard,
        distinct_with_group_by,
        implicit_join,
        count_column_to_count_star,
    ];
    let mut out: Vec<Suggestion> = Vec::new();
    for rule in rules {
        if let Some(s) = rule(model, schema) {
            if !out.iter().any(|prev| prev.title == s.title) {
                out.push(s);
            }
        }
    }
    out
}

/// Render a column per the casing rule: quoted identifiers keep their
/// source spelling, everything else is already lowercased.
fn ident(column: &ColumnRef) -> String {
    if column.quoted {
        format!("\"{}\"", column.column)
    } else {
        column.column.clone()
    }
}

fn explicit_projection(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    if !model.has_star() || model.has_opaque_projection() {
        return None;
    }
    let first = model.relations.first()?;
    let alt_sql = schema.table(&first.name).map(|t| {
        let cols: Vec<&str> = t
            .columns
            .iter()
            .take(5)
            .map(|c| c.name.as_str())
            .collect();
        format!("SELECT {} FROM {}", cols.join(", "), first.name)
    });
    Some(Suggestion::rewrite(
        "Replace SELECT * with explicit columns",
        "Explicit projections reduce I/O and enable index-only scans.",
        Impact::Low,
        0.9,
        alt_sql,
    ))
}

fn in_subquery_to_exists(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    let sub = model
        .in_subqueries
        .iter()
        .find(|s| !s.negated && !s.correlated)?;
    let alt_sql = match (&sub.outer, &sub.inner_column) {
        (Some(outer), Some(inner)) => inner.relation.as_ref().map(|rel| {
            format!(
                "... WHERE EXISTS (SELECT 1 FROM {rel} WHERE {rel}.{} = {})",
                ident(inner),
                ident(outer)
            )
        }),
        _ => None,
    };
    Some(Suggestion::rewrite(
        "Rewrite IN (subquery) as EXISTS",
        "EXISTS can short-circuit and avoids deduplication work.",
        Impact::Medium,
        0.7,
        alt_sql,
    ))
}

fn decorrelate_exists(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    model
        .exists_subqueries
        .iter()
        .find(|s| !s.negated && !s.correlation_columns.is_empty())?;
    Some(Suggestion::rewrite(
        "Decorrelate EXISTS subquery",
        "Unnesting an equality-correlated EXISTS enables join planning.",
        Impact::Medium,
        0.6,
        Some("... JOIN (...) ON the correlated equality instead of EXISTS".to_string()),
    ))
}

fn top_n_alignment(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    if model.order_keys.is_empty() || model.limit.is_none() {
        return None;
    }
    let relation = model.order_keys[0].column.relation.as_deref()?;
    let mut target: Vec<&str> = Vec::new();
    for p in &model.equality_predicates {
        if p.column.is_on(relation) && !target.contains(&p.column.column.as_str()) {
            target.push(&p.column.column);
        }
    }
    for k in &model.order_keys {
        if k.column.is_on(relation) && !target.contains(&k.column.column.as_str()) {
            target.push(&k.column.column);
        }
    }
    if target.is_empty() {
        return None;
    }
    let covered = schema.indexes(relation).iter().any(|ix| {
        ix.columns.len() >= target.len()
            && ix.columns[..target.len()]
                .iter()
                .zip(&target)
                .all(|(a, b)| a == b)
    });
    if covered {
        return None;
    }
    Some(Suggestion::rewrite(
        "Align ORDER BY with an index for Top-N",
        "An index matching the equality prefix and sort keys lets the scan stop early.",
        Impact::Medium,
        0.7,
        Some(format!(
            "-- index ({}) on {relation} supports this ORDER BY ... LIMIT",
            target.join(", ")
        )),
    ))
}

fn predicate_pushdown(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    if !model.has_derived_table() || model.group_keys.is_empty() {
        return None;
    }
    let preds: Vec<&ColumnRef> = model
        .equality_predicates
        .iter()
        .map(|p| &p.column)
        .chain(model.range_predicates.iter().map(|p| &p.column))
        .collect();
    if preds.is_empty() {
        return None;
    }
    let group_cols: Vec<&str> = model.group_keys.iter().map(|g| g.column.as_str()).collect();
    if !preds.iter().all(|c| group_cols.contains(&c.column.as_str())) {
        return None;
    }
    Some(Suggestion::rewrite(
        "Push predicates into the subquery",
        "Filtering on grouping keys before aggregation shrinks the aggregated input.",
        Impact::Medium,
        0.6,
        Some("-- move the outer WHERE on grouping keys inside the subquery".to_string()),
    ))
}

fn union_to_union_all(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    let set_op = model.set_op.as_ref()?;
    if set_op.kind != SetOpKind::Union || set_op.branch_projections.is_empty() {
        return None;
    }
    // Duplicates are impossible when every branch projects a column backed
    // by a single-column unique index.
    let all_unique = set_op.branch_projections.iter().all(|cols| {
        cols.iter().any(|c| {
            c.relation.as_deref().is_some_and(|rel| {
                schema
                    .indexes(rel)
                    .iter()
                    .any(|ix| ix.unique && ix.columns.len() == 1 && ix.columns[0] == c.column)
            })
        })
    });
    if !all_unique {
        return None;
    }
    Some(Suggestion::rewrite(
        "Use UNION ALL when duplicates are impossible",
        "UNION deduplicates with a sort or hash; unique keys make that work pure overhead.",
        Impact::Low,
        0.5,
        Some("... UNION ALL ...".to_string()),
    ))
}

fn or_chain_to_in(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    let chain = model.or_chains.iter().find(|c| c.arms >= 3)?;
    Some(Suggestion::rewrite(
        "Collapse OR chain into IN list",
        "A single IN list plans as one index condition instead of stacked ORs.",
        Impact::Low,
        0.7,
        Some(format!("... WHERE {} IN (...)", ident(&chain.column))),
    ))
}

fn not_in_to_not_exists(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    let nullable_hit = model.in_subqueries.iter().any(|s| {
        s.negated
            && s.inner_column.as_ref().is_some_and(|c| {
                c.relation
                    .as_deref()
                    .and_then(|rel| schema.column(rel, &c.column))
                    .is_some_and(|def| def.nullable)
            })
    });
    if !nullable_hit {
        return None;
    }
    Some(Suggestion::rewrite(
        "Rewrite NOT IN as NOT EXISTS",
        "NOT IN over a nullable column yields no rows once a NULL appears; NOT EXISTS is safe.",
        Impact::Medium,
        0.7,
        Some("... WHERE NOT EXISTS (SELECT 1 FROM ... WHERE ...)".to_string()),
    ))
}

fn like_leading_wildcard(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    let hit = model.like_predicates.iter().find(|l| {
        l.leading_wildcard
            && l.column.relation.as_deref().is_some_and(|rel| {
                schema
                    .indexes(rel)
                    .iter()
                    .any(|ix| ix.columns.first() == Some(&l.column.column))
            })
    })?;
    Some(Suggestion::rewrite(
        "Leading-wildcard LIKE cannot use the index",
        "A pattern starting with % defeats the B-tree; consider trigram indexing or reversed columns.",
        Impact::Low,
        0.5,
        Some(format!(
            "-- {} LIKE '%...' scans despite the index",
            ident(&hit.column)
        )),
    ))
}

fn distinct_with_group_by(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    if !model.distinct || model.group_keys.is_empty() {
        return None;
    }
    let projected: Vec<&ColumnRef> = model
        .projections
        .iter()
        .filter_map(|p| match p {
            Projection::Column { column } => Some(column),
            _ => None,
        })
        .collect();
    if projected.is_empty() || projected.len() != model.projections.len() {
        return None;
    }
    let same_keys = projected.len() == model.group_keys.len()
        && projected
            .iter()
            .all(|c| model.group_keys.iter().any(|g| g == *c));
    if !same_keys {
        return None;
    }
    Some(Suggestion::rewrite(
        "Drop DISTINCT duplicated by GROUP BY",
        "GROUP BY on the projected keys already deduplicates; DISTINCT adds a useless pass.",
        Impact::Low,
        0.7,
        Some("SELECT ... GROUP BY ... -- without DISTINCT".to_string()),
    ))
}

fn implicit_join(model: &QueryModel, _schema: &SchemaSnapshot) -> Option<Suggestion> {
    let edge = model
        .joins
        .iter()
        .find(|j| j.kind == pglens_model::JoinKind::ImplicitComma)?;
    Some(Suggestion::rewrite(
        "Use explicit JOIN syntax",
        "Comma joins hide the join condition and invite accidental cartesian products.",
        Impact::Low,
        0.7,
        Some(format!("... JOIN {} ON <condition>", edge.right)),
    ))
}

fn count_column_to_count_star(model: &QueryModel, schema: &SchemaSnapshot) -> Option<Suggestion> {
    let hit = model.count_args.iter().find_map(|c| match c {
        CountArg::Column { column } => column
            .relation
            .as_deref()
            .filter(|rel| schema.column_is_not_null(rel, &column.column))
            .map(|_| column),
        CountArg::Star => None,
    })?;
    Some(Suggestion::rewrite(
        "Use COUNT(*) instead of COUNT(column)",
        "Counting a NOT NULL column equals COUNT(*) but blocks some planner shortcuts.",
        Impact::Low,
        0.7,
        Some(format!("SELECT COUNT(*) ... -- {} is NOT NULL", ident(hit))),
    ))
}
