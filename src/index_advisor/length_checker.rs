use tracing::warn;

use super::config::{AdvisorConfig, PREFIX_SAFETY_MARGIN};
use super::context::AdvisorContext;
use super::storage::{charset_width, data_bytes, is_binary_type, is_string_type, DEFAULT_CHARSET_BYTES};
use super::synthesizer::index_name;
use crate::types::{IndexAction, IndexCandidate};

/// Fit every candidate into the key length budget and render its DDL.
/// Type information only exists with a live dictionary; otherwise DDL is
/// rendered as synthesized.
pub fn bound_candidates(candidates: Vec<IndexCandidate>, ctx: &AdvisorContext) -> Vec<IndexCandidate> {
    let live = ctx.is_live();
    candidates
        .into_iter()
        .map(|mut candidate| {
            if candidate.action == IndexAction::Drop {
                return candidate;
            }
            if live {
                candidate = bound(candidate, &ctx.config);
            } else {
                candidate.render_ddl();
            }
            candidate
        })
        .collect()
}

/// Walk the columns in order keeping a running byte total. Columns wider than
/// the per-column limit, or that no longer fit the overall budget, get a
/// prefix length; columns that cannot take one are dropped.
pub fn bound(mut candidate: IndexCandidate, config: &AdvisorConfig) -> IndexCandidate {
    let per_column = config.max_index_bytes_per_column;
    let mut total = 0usize;
    let mut kept = Vec::with_capacity(candidate.columns.len());

    for mut column in std::mem::take(&mut candidate.columns) {
        let Some(bytes) = data_bytes(
            &column.data_type,
            &column.character_set,
            config.server_version,
            per_column,
        ) else {
            warn!(
                "{}.{} has unsupported type '{}', excluded from index",
                column.table, column.name, column.data_type
            );
            continue;
        };

        let fits = total.saturating_add(bytes) <= config.max_index_bytes;
        if fits && bytes <= per_column {
            total += bytes;
            kept.push(column);
            continue;
        }

        if !is_string_type(&column.data_type) {
            warn!(
                "{}.{} needs {} bytes and cannot take a prefix, excluded from index",
                column.table, column.name, bytes
            );
            continue;
        }

        let width = if is_binary_type(&column.data_type) {
            1
        } else {
            charset_width(&column.character_set).unwrap_or_else(|| {
                warn!(
                    "{}.{} has unknown character set '{}', assuming {} bytes per character",
                    column.table, column.name, column.character_set, DEFAULT_CHARSET_BYTES
                );
                DEFAULT_CHARSET_BYTES
            })
        };
        let available = per_column.min(config.max_index_bytes.saturating_sub(total));
        let prefix = available.saturating_sub(PREFIX_SAFETY_MARGIN) / width;
        if prefix == 0 {
            warn!(
                "{}.{} does not fit the remaining {} index bytes, excluded from index",
                column.table, column.name, available
            );
            continue;
        }

        warn!("{}.{} is too long for a full index, using prefix length {}", column.table, column.name, prefix);
        total += prefix * width;
        column.prefix_length = Some(prefix);
        kept.push(column);
    }

    candidate.columns = kept;
    if !candidate.columns.is_empty() {
        candidate.name = index_name(&candidate.columns);
        candidate.render_ddl();
    }
    candidate
}
