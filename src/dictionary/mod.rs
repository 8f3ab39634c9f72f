// Data dictionary boundary
pub mod snapshot;

pub use snapshot::*;

use crate::error::AdvisorResult;
use crate::types::{ColumnInfo, IndexRow};

/// Column found by [`DataDictionary::find_column`], tagged with its owner
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub database: String,
    pub table: String,
    pub info: ColumnInfo,
}

/// Read-only access to live schema metadata.
///
/// Every call may fail. Missing tables must be reported as
/// [`crate::error::AdvisorError::TableNotFound`] so callers can tell them apart from
/// connectivity problems.
pub trait DataDictionary: Send + Sync {
    fn list_columns(&self, database: &str, table: &str) -> AdvisorResult<Vec<ColumnInfo>>;

    fn list_indexes(&self, database: &str, table: &str) -> AdvisorResult<Vec<IndexRow>>;

    /// Fraction of distinct non-null values, expected in [0, 1]
    fn column_cardinality(&self, database: &str, table: &str, column: &str) -> AdvisorResult<f64>;

    fn is_view(&self, database: &str, table: &str) -> AdvisorResult<bool>;

    fn list_tables(&self, database: &str) -> AdvisorResult<Vec<String>>;

    /// Database assumed for unqualified tables, empty when unknown
    fn default_database(&self) -> &str {
        ""
    }

    /// Every column named `name` across `tables` of `database`. Tables that do not exist are skipped.
    fn find_column(&self, name: &str, database: &str, tables: &[String]) -> AdvisorResult<Vec<ResolvedColumn>> {
        let mut found = Vec::new();
        for table in tables {
            let columns = match self.list_columns(database, table) {
                Ok(columns) => columns,
                Err(e) if e.is_table_not_found() => continue,
                Err(e) => return Err(e),
            };
            found.extend(
                columns
                    .into_iter()
                    .filter(|column| column.name.eq_ignore_ascii_case(name))
                    .map(|info| ResolvedColumn {
                        database: database.to_string(),
                        table: table.clone(),
                        info,
                    }),
            );
        }
        Ok(found)
    }
}
