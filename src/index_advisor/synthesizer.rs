//! Three-star index synthesis.
//!
//! Equality columns come first so the index narrows to a single key range,
//! then at most one range column, then the grouping or sort columns so the
//! rows come back already ordered. Join conditions produce their own,
//! independent candidates.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::config::MAX_INDEX_NAME_LENGTH;
use super::context::AdvisorContext;
use crate::types::{ClassifiedColumnSet, Column, IndexCandidate};

/// Planned index columns keyed by `(database, table)`
pub type IndexPlan = BTreeMap<(String, String), Vec<Column>>;

/// Append `column` to its table's plan unless a column of that name is already there
pub fn plan_column(plan: &mut IndexPlan, column: &Column) {
    let columns = plan
        .entry((column.database.clone(), column.table.clone()))
        .or_default();
    if !columns.iter().any(|existing| existing.name == column.name) {
        columns.push(column.clone());
    }
}

/// Per-table column order for the WHERE / GROUP BY / ORDER BY part of a statement
pub fn three_star_plan(set: &ClassifiedColumnSet) -> IndexPlan {
    let mut plan = IndexPlan::new();

    if !set.has_where {
        for column in &set.group_by {
            plan_column(&mut plan, column);
        }
        return plan;
    }

    for column in &set.where_eq {
        plan_column(&mut plan, column);
    }
    if let Some(range) = set.where_ineq.first() {
        plan_column(&mut plan, range);
    }

    let ignored = set.ignored();
    if !ignored.is_empty() {
        let names: Vec<&str> = ignored.iter().map(|column| column.name.as_str()).collect();
        debug!("Filters on {:?} are not indexable, skipping GROUP BY and ORDER BY", names);
        return plan;
    }

    if set.group_by.is_empty() {
        for column in &set.order_by {
            plan_column(&mut plan, column);
        }
    } else {
        for column in &set.group_by {
            plan_column(&mut plan, column);
        }
    }
    plan
}

/// Candidates for a classified statement: join candidates first, then filter candidates
pub fn synthesize(set: &ClassifiedColumnSet, ctx: &AdvisorContext) -> Vec<IndexCandidate> {
    let mut candidates = Vec::new();

    for group in &set.join_groups {
        let mut plan = IndexPlan::new();
        for column in group {
            plan_column(&mut plan, column);
        }
        candidates.extend(build_candidates(plan, ctx));
    }
    candidates.extend(build_candidates(three_star_plan(set), ctx));

    debug!("Synthesized {} index candidate(s)", candidates.len());
    candidates
}

/// Turn a plan into named candidates. Without a live dictionary every column
/// becomes its own single-column candidate.
pub fn build_candidates(plan: IndexPlan, ctx: &AdvisorContext) -> Vec<IndexCandidate> {
    let live = ctx.is_live();
    let mut candidates = Vec::new();

    for ((database, table), mut columns) in plan {
        if !live {
            for column in columns {
                if column.table.is_empty() {
                    warn!("Cannot determine the table of column `{}`, no index advised", column.name);
                    continue;
                }
                let mut candidate = IndexCandidate::new(column.database.clone(), column.table.clone(), vec![column]);
                candidate.name = index_name(&candidate.columns);
                candidates.push(candidate);
            }
            continue;
        }

        columns.truncate(ctx.config.max_index_columns);
        columns.retain(|column| {
            let resolved = !column.table.is_empty() && !column.database.is_empty();
            if !resolved {
                warn!("Cannot determine the owner of column `{}`, no index advised", column.name);
            }
            resolved
        });
        if columns.is_empty() {
            continue;
        }

        let mut candidate = IndexCandidate::new(database, table, columns);
        candidate.name = index_name(&candidate.columns);
        candidates.push(candidate);
    }
    candidates
}

/// Break composite candidates into one candidate per column
pub fn split_single_column(candidates: Vec<IndexCandidate>) -> Vec<IndexCandidate> {
    let mut split = Vec::new();
    for candidate in candidates {
        if candidate.columns.len() <= 1 {
            split.push(candidate);
            continue;
        }
        for column in candidate.columns {
            let mut single = IndexCandidate::new(candidate.database.clone(), candidate.table.clone(), vec![column]);
            single.name = index_name(&single.columns);
            split.push(single);
        }
    }
    split
}

/// `idx_` followed by the column names, cut to the identifier limit
pub fn index_name(columns: &[Column]) -> String {
    let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
    let name = format!("idx_{}", names.join("_"));
    truncate_identifier(&name, MAX_INDEX_NAME_LENGTH)
        .trim_end_matches('_')
        .to_string()
}

/// Leading `max_chars` characters of `name`
pub fn truncate_identifier(name: &str, max_chars: usize) -> &str {
    match name.char_indices().nth(max_chars) {
        Some((end, _)) => &name[..end],
        None => name,
    }
}
