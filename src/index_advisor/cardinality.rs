use std::cmp::Ordering;

use tracing::debug;

use super::context::AdvisorContext;
use crate::types::Column;

/// Attach a selectivity estimate to each resolved column.
///
/// A column that alone forms the primary key or a unique index is perfectly
/// selective; everything else asks the dictionary. Lookups that fail leave
/// the estimate unset, which ranks as zero.
pub fn estimate(columns: &mut [Column], ctx: &mut AdvisorContext) {
    for column in columns.iter_mut() {
        if column.table.is_empty() || column.data_type.is_empty() {
            continue;
        }
        let database = if column.database.is_empty() {
            ctx.default_database()
        } else {
            column.database.clone()
        };

        let sole_unique = ctx
            .table_indexes(&database, &column.table)
            .map_or(false, |info| info.is_sole_unique_column(&column.name));
        if sole_unique {
            column.cardinality = Some(1.0);
            continue;
        }

        let Some(dictionary) = ctx.dictionary() else {
            return;
        };
        match dictionary.column_cardinality(&database, &column.table, &column.name) {
            Ok(value) if value.is_nan() => column.cardinality = Some(0.0),
            Ok(value) => column.cardinality = Some(value.clamp(0.0, 1.0)),
            Err(e) => {
                debug!("Cardinality of `{}`.`{}` unavailable: {}", column.table, column.name, e);
                ctx.record_failure(&e);
            }
        }
    }
}

/// Stable sort, most selective first
pub fn sort_by_cardinality(columns: &mut [Column]) {
    columns.sort_by(|a, b| {
        b.cardinality_or_zero()
            .partial_cmp(&a.cardinality_or_zero())
            .unwrap_or(Ordering::Equal)
    });
}
