use pglens_common::{round3, IndexAdvisorConfig};
use pglens_model::{
    ColumnKind, IndexDef, QueryModel, SchemaSnapshot, SortDirection,
};

use crate::suggestion::{source, Impact, IndexCandidate, Suggestion, SuggestionKind};

/// Synthesize candidate B-tree indexes for every relation in the model.
///
/// Column order is fixed as equality, then range, then order/group keys;
/// candidates are deduplicated against existing indexes, filtered by size
/// and width caps, scored, and returned in descending score order with the
/// title as tie-break.
pub fn suggest_indexes(
    model: &QueryModel,
    schema: &SchemaSnapshot,
    cfg: &IndexAdvisorConfig,
) -> Vec<Suggestion> {
    if !model.is_select() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut seen_relations: Vec<&str> = Vec::new();
    for rel in &model.relations {
        if rel.derived || seen_relations.contains(&rel.name.as_str()) {
            continue;
        }
        seen_relations.push(&rel.name);
        if let Some(s) = candidate_for_relation(model, schema, cfg, &rel.name) {
            out.push(s);
        }
    }
    out.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .total_cmp(&a.score.unwrap_or(0.0))
            .then_with(|| a.title.cmp(&b.title))
    });
    out
}

struct Pools {
    equality: Vec<String>,
    range: Vec<String>,
    order: Vec<(String, SortDirection)>,
    group: Vec<String>,
    join: Vec<String>,
}

fn pools_for(model: &QueryModel, relation: &str) -> Pools {
    let mut pools = Pools {
        equality: Vec::new(),
        range: Vec::new(),
        order: Vec::new(),
        group: Vec::new(),
        join: Vec::new(),
    };
    for p in &model.equality_predicates {
        if p.column.is_on(relation) && !pools.equality.contains(&p.column.column) {
            pools.equality.push(p.column.column.clone());
        }
    }
    for p in &model.range_predicates {
        if p.column.is_on(relation) && !pools.range.contains(&p.column.column) {
            pools.range.push(p.column.column.clone());
        }
    }
    for k in &model.order_keys {
        if k.column.is_on(relation)
            && !pools.order.iter().any(|(c, _)| *c == k.column.column)
        {
            pools.order.push((k.column.column.clone(), k.direction));
        }
    }
    for g in &model.group_keys {
        if g.is_on(relation) && !pools.group.contains(&g.column) {
            pools.group.push(g.column.clone());
        }
    }
    for j in &model.joins {
        for c in &j.on_columns {
            if c.is_on(relation) && !pools.join.contains(&c.column) {
                pools.join.push(c.column.clone());
            }
        }
    }
    pools
}

fn candidate_for_relation(
    model: &QueryModel,
    schema: &SchemaSnapshot,
    cfg: &IndexAdvisorConfig,
    relation: &str,
) -> Option<Suggestion> {
    if schema.row_estimate(relation) < cfg.min_rows_for_index {
        return None;
    }
    let pools = pools_for(model, relation);

    // Column list: equality, then range, then order/group, deduplicated
    // preserving first appearance.
    let mut columns: Vec<String> = Vec::new();
    let mut dirs: Vec<SortDirection> = Vec::new();
    let mut order_positions: Vec<usize> = Vec::new();
    let mut push = |columns: &mut Vec<String>,
                    dirs: &mut Vec<SortDirection>,
                    col: &str,
                    dir: Option<SortDirection>,
                    order_positions: &mut Vec<usize>| {
        if !columns.iter().any(|c| c == col) {
            if let Some(d) = dir {
                order_positions.push(columns.len());
                dirs.push(d);
            } else {
                dirs.push(SortDirection::Asc);
            }
            columns.push(col.to_string());
        }
    };
    for c in &pools.equality {
        push(&mut columns, &mut dirs, c, None, &mut order_positions);
    }
    for c in &pools.range {
        push(&mut columns, &mut dirs, c, None, &mut order_positions);
    }
    for (c, d) in &pools.order {
        push(&mut columns, &mut dirs, c, Some(*d), &mut order_positions);
    }
    for c in &pools.group {
        push(&mut columns, &mut dirs, c, None, &mut order_positions);
    }
    if columns.is_empty() {
        return None;
    }
    columns.truncate(cfg.max_index_cols);
    dirs.truncate(cfg.max_index_cols);
    order_positions.retain(|p| *p < columns.len());

    // A uniformly-directed order suffix is served by a backward scan of the
    // default index, so only genuinely mixed vectors are kept.
    let order_dirs: Vec<SortDirection> =
        order_positions.iter().map(|p| dirs[*p]).collect();
    let uniform = order_dirs.windows(2).all(|w| w[0] == w[1]);
    let directions = if uniform {
        None
    } else {
        Some(dirs.clone())
    };

    let candidate_dirs = expand_directions(&directions, columns.len());
    if schema
        .indexes(relation)
        .iter()
        .any(|ix| index_covers(ix, &columns, &candidate_dirs))
    {
        return None;
    }

    let width: u32 = columns
        .iter()
        .map(|c| {
            schema
                .column(relation, c)
                .map(|def| def.width())
                .unwrap_or_else(|| ColumnKind::Other.default_width())
        })
        .sum();
    if width > cfg.index_max_width_bytes {
        return None;
    }

    let eq_hits = columns.iter().filter(|c| pools.equality.contains(c)).count();
    let range_hits = columns.iter().filter(|c| pools.range.contains(c)).count();
    let order_hits = columns
        .iter()
        .filter(|c| pools.order.iter().any(|(oc, _)| oc == *c))
        .count();
    let order_group_hits = columns
        .iter()
        .filter(|c| {
            pools.order.iter().any(|(oc, _)| oc == *c) || pools.group.contains(c)
        })
        .count();
    let join_hit = columns.iter().any(|c| pools.join.contains(c));

    let base_score =
        1.0 * eq_hits as f64 + 0.5 * range_hits as f64 + 0.25 * order_group_hits as f64;
    let boost = if join_hit { cfg.join_col_prior_boost } else { 1.0 };
    let width_penalty = (cfg.index_max_width_bytes as f64 / f64::from(width.max(1)))
        .sqrt()
        .max(0.1);
    let score = round3(base_score * boost * width_penalty);

    let est_reduction_pct = (10.0 * eq_hits as f64
        + if order_hits > 0 { 5.0 } else { 0.0 })
    .min(100.0);
    if est_reduction_pct < cfg.suppress_low_gain_pct {
        return None;
    }

    let mut source_mask = 0u8;
    if eq_hits > 0 {
        source_mask |= source::EQUALITY;
    }
    if range_hits > 0 {
        source_mask |= source::RANGE;
    }
    if order_group_hits > 0 {
        source_mask |= source::ORDER;
    }
    if join_hit {
        source_mask |= source::JOIN;
    }

    let candidate = IndexCandidate {
        relation: relation.to_string(),
        columns: columns.clone(),
        directions,
        source_mask,
    };
    let impact = if eq_hits > 0 && order_group_hits > 0 {
        Impact::High
    } else {
        Impact::Medium
    };
    let confidence = if order_hits > 0 { 0.7 } else { 0.6 };

    Some(Suggestion {
        kind: SuggestionKind::Index,
        title: format!("Index on {relation}({})", columns.join(", ")),
        rationale: "Supports equality, range, and ordering for faster lookups and Top-N."
            .to_string(),
        impact,
        confidence,
        statements: vec![candidate.ddl()],
        alt_sql: None,
        score: Some(score),
        reason: Some(format!(
            "equality({eq_hits}), range({range_hits}), order/group({order_group_hits})"
        )),
        est_reduction_pct: Some(round3(est_reduction_pct)),
        est_index_width_bytes: Some(width),
        est_cost_before: None,
        est_cost_after: None,
        est_cost_delta: None,
        candidate: Some(candidate),
    })
}

fn expand_directions(directions: &Option<Vec<SortDirection>>, len: usize) -> Vec<SortDirection> {
    match directions {
        Some(d) => d.clone(),
        None => vec![SortDirection::Asc; len],
    }
}

/// Whether an existing index serves the candidate: its leading columns
/// equal the candidate's list and the direction prefix is equivalent
/// (identical, or fully reversed, which a backward scan serves).
fn index_covers(existing: &IndexDef, columns: &[String], candidate_dirs: &[SortDirection]) -> bool {
    if existing.columns.len() < columns.len() {
        return false;
    }
    if existing.columns[..columns.len()] != *columns {
        return false;
    }
    let existing_dirs: Vec<SortDirection> = match &existing.directions {
        Some(d) => d[..columns.len()].to_vec(),
        None => vec![SortDirection::Asc; columns.len()],
    };
    let flipped: Vec<SortDirection> = candidate_dirs
        .iter()
        .map(|d| match d {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        })
        .collect();
    existing_dirs == candidate_dirs || existing_dirs == flipped
}
