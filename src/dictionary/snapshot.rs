use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::DataDictionary;
use crate::error::{AdvisorError, AdvisorResult};
use crate::types::{ColumnInfo, IndexRow};

/// Schema metadata of one table inside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Whether the table is a view
    #[serde(default)]
    pub view: bool,
    /// Column definitions in table order
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    /// Index listing rows
    #[serde(default)]
    pub indexes: Vec<IndexRow>,
    /// Sampled distinct-value ratios keyed by column name
    #[serde(default)]
    pub cardinality: BTreeMap<String, f64>,
}

/// In-memory data dictionary loaded from a JSON schema snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticDictionary {
    /// Database used for unqualified table names
    #[serde(default)]
    pub default_database: String,
    /// `database -> table -> metadata`
    #[serde(default)]
    pub databases: BTreeMap<String, BTreeMap<String, TableSnapshot>>,
}

impl StaticDictionary {
    pub fn new(default_database: impl Into<String>) -> Self {
        Self {
            default_database: default_database.into(),
            databases: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> AdvisorResult<Self> {
        let dictionary: StaticDictionary = serde_json::from_str(json)?;
        debug!(
            "Loaded schema snapshot with {} database(s)",
            dictionary.databases.len()
        );
        Ok(dictionary)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AdvisorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let dictionary = Self::from_json(&content)?;
        info!("Schema snapshot loaded from {:?}", path);
        Ok(dictionary)
    }

    pub fn with_table(mut self, database: &str, table: &str, columns: Vec<ColumnInfo>) -> Self {
        self.table_entry(database, table).columns = columns;
        self
    }

    /// Register an index over `columns` in the given order
    pub fn with_index(mut self, database: &str, table: &str, key_name: &str, columns: &[&str], unique: bool) -> Self {
        let entry = self.table_entry(database, table);
        for (position, column) in columns.iter().enumerate() {
            entry.indexes.push(IndexRow {
                key_name: key_name.to_string(),
                column_name: column.to_string(),
                seq_in_index: position + 1,
                non_unique: !unique,
            });
        }
        self
    }

    pub fn with_cardinality(mut self, database: &str, table: &str, column: &str, cardinality: f64) -> Self {
        self.table_entry(database, table)
            .cardinality
            .insert(column.to_string(), cardinality);
        self
    }

    pub fn with_view(mut self, database: &str, view: &str, columns: Vec<ColumnInfo>) -> Self {
        let entry = self.table_entry(database, view);
        entry.view = true;
        entry.columns = columns;
        self
    }

    fn table_entry(&mut self, database: &str, table: &str) -> &mut TableSnapshot {
        self.databases
            .entry(database.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
    }

    fn resolve_database<'a>(&'a self, database: &'a str) -> &'a str {
        if database.is_empty() {
            &self.default_database
        } else {
            database
        }
    }

    fn table(&self, database: &str, table: &str) -> AdvisorResult<&TableSnapshot> {
        let database = self.resolve_database(database);
        self.databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .ok_or_else(|| AdvisorError::table_not_found(database, table))
    }
}

impl DataDictionary for StaticDictionary {
    fn list_columns(&self, database: &str, table: &str) -> AdvisorResult<Vec<ColumnInfo>> {
        Ok(self.table(database, table)?.columns.clone())
    }

    fn list_indexes(&self, database: &str, table: &str) -> AdvisorResult<Vec<IndexRow>> {
        Ok(self.table(database, table)?.indexes.clone())
    }

    fn column_cardinality(&self, database: &str, table: &str, column: &str) -> AdvisorResult<f64> {
        let snapshot = self.table(database, table)?;
        if !snapshot.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
            return Err(AdvisorError::dictionary(format!(
                "unknown column `{}` in `{}`.`{}`",
                column, database, table
            )));
        }
        Ok(snapshot.cardinality.get(column).copied().unwrap_or(0.0))
    }

    fn is_view(&self, database: &str, table: &str) -> AdvisorResult<bool> {
        Ok(self.table(database, table)?.view)
    }

    fn list_tables(&self, database: &str) -> AdvisorResult<Vec<String>> {
        let database = self.resolve_database(database);
        self.databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| AdvisorError::dictionary(format!("unknown database `{}`", database)))
    }

    fn default_database(&self) -> &str {
        &self.default_database
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "default_database": "shop",
        "databases": {
            "shop": {
                "orders": {
                    "columns": [
                        {"name": "id", "data_type": "int(11)"},
                        {"name": "status", "data_type": "varchar(16)", "character_set": "utf8mb4", "collation": "utf8mb4_general_ci"}
                    ],
                    "indexes": [
                        {"key_name": "PRIMARY", "column_name": "id", "seq_in_index": 1, "non_unique": false}
                    ],
                    "cardinality": {"status": 0.1}
                },
                "open_orders": {"view": true}
            }
        }
    }"#;

    #[test]
    fn test_load_snapshot_from_json() {
        let dictionary = StaticDictionary::from_json(SNAPSHOT).unwrap();
        assert_eq!(dictionary.default_database(), "shop");

        let columns = dictionary.list_columns("shop", "orders").unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].character_set, "utf8mb4");
        assert_eq!(columns[0].character_set, "");

        assert_eq!(dictionary.column_cardinality("", "orders", "status").unwrap(), 0.1);
        assert_eq!(dictionary.column_cardinality("shop", "orders", "id").unwrap(), 0.0);
        assert!(dictionary.is_view("shop", "open_orders").unwrap());
        assert!(!dictionary.is_view("shop", "orders").unwrap());
    }

    #[test]
    fn test_missing_table_is_table_not_found() {
        let dictionary = StaticDictionary::from_json(SNAPSHOT).unwrap();
        let err = dictionary.list_indexes("shop", "tmp_orders").unwrap_err();
        assert!(err.is_table_not_found());

        let err = dictionary.column_cardinality("shop", "orders", "nope").unwrap_err();
        assert!(!err.is_table_not_found());
    }

    #[test]
    fn test_find_column_skips_missing_tables() {
        let dictionary = StaticDictionary::new("app")
            .with_table("app", "users", vec![ColumnInfo::new("id", "int")])
            .with_table("app", "posts", vec![ColumnInfo::new("id", "bigint"), ColumnInfo::new("user_id", "int")]);

        let tables = vec!["users".to_string(), "ghost".to_string(), "posts".to_string()];
        let found = dictionary.find_column("id", "app", &tables).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].table, "users");
        assert_eq!(found[1].info.data_type, "bigint");
    }

    #[test]
    fn test_builder_index_rows() {
        let dictionary = StaticDictionary::new("app")
            .with_table("app", "t", vec![ColumnInfo::new("a", "int"), ColumnInfo::new("b", "int")])
            .with_index("app", "t", "uk_ab", &["a", "b"], true);
        let rows = dictionary.list_indexes("app", "t").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].seq_in_index, 2);
        assert!(!rows[1].non_unique);
        assert_eq!(dictionary.list_tables("").unwrap(), vec!["t".to_string()]);
    }
}
