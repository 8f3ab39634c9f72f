use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One referenced column occurrence, progressively resolved by the advisor stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as written in the statement
    pub name: String,
    /// Owning table, empty until resolved
    pub table: String,
    /// Owning database, empty until resolved
    pub database: String,
    /// Qualifiers the column was written under before alias resolution
    pub aliases: Vec<String>,
    /// Full column type as reported by the data dictionary, e.g. `varchar(64)`
    pub data_type: String,
    /// Character set reported by the data dictionary
    pub character_set: String,
    /// Collation reported by the data dictionary
    pub collation: String,
    /// Fraction of distinct values in [0, 1]; unset until estimated
    pub cardinality: Option<f64>,
    /// Explicit prefix length chosen by the length checker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<usize>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_cardinality(mut self, cardinality: f64) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Two occurrences denote the same key candidate when name, table and database agree
    pub fn same_key(&self, other: &Column) -> bool {
        self.name == other.name && self.table == other.table && self.database == other.database
    }

    /// Case-insensitive variant of [`Column::same_key`] used when comparing with existing indexes
    pub fn same_key_ignore_case(&self, other: &Column) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.table.eq_ignore_ascii_case(&other.table)
            && self.database.eq_ignore_ascii_case(&other.database)
    }

    /// Missing estimates rank as the least selective
    pub fn cardinality_or_zero(&self) -> f64 {
        self.cardinality.unwrap_or(0.0)
    }
}

/// Append `column` unless an occurrence with the same identity is already present
pub fn merge_column(columns: &mut Vec<Column>, column: Column) {
    if !columns.iter().any(|existing| existing.same_key(&column)) {
        columns.push(column);
    }
}

/// Remove later duplicates while keeping first-seen order
pub fn dedup_columns(columns: Vec<Column>) -> Vec<Column> {
    let mut result = Vec::with_capacity(columns.len());
    for column in columns {
        merge_column(&mut result, column);
    }
    result
}

/// Whether the shorter of the two lists is a leading part of the longer one (equal lists included)
pub fn is_cols_part(a: &[Column], b: &[Column]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.same_key_ignore_case(y))
}

/// Columns of one statement grouped by the indexing role they play
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedColumnSet {
    /// Every column referenced in WHERE, indexable or not
    pub where_all: Vec<Column>,
    /// Columns filtered by an equality-indexable predicate
    pub where_eq: Vec<Column>,
    /// Columns filtered by a range-indexable predicate
    pub where_ineq: Vec<Column>,
    /// GROUP BY columns in written order
    pub group_by: Vec<Column>,
    /// ORDER BY columns in written order
    pub order_by: Vec<Column>,
    /// One independent column list per join node
    pub join_groups: Vec<Vec<Column>>,
    /// Whether the statement carries a WHERE clause outside subqueries
    pub has_where: bool,
}

impl ClassifiedColumnSet {
    /// WHERE columns that neither equality nor range classification picked up
    pub fn ignored(&self) -> Vec<&Column> {
        self.where_all
            .iter()
            .filter(|column| {
                !self.where_eq.iter().any(|used| used.same_key(column))
                    && !self.where_ineq.iter().any(|used| used.same_key(column))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.where_all.is_empty()
            && self.where_eq.is_empty()
            && self.where_ineq.is_empty()
            && self.group_by.is_empty()
            && self.order_by.is_empty()
            && self.join_groups.is_empty()
    }
}

/// What a candidate asks the operator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexAction {
    Add,
    Drop,
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexAction::Add => write!(f, "add"),
            IndexAction::Drop => write!(f, "drop"),
        }
    }
}

/// A proposed index, the unit of advisor output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCandidate {
    /// Index identifier, at most 64 characters
    pub name: String,
    /// Target database, may be empty when unknown
    pub database: String,
    /// Target table
    pub table: String,
    /// Ordered index columns
    pub columns: Vec<Column>,
    /// Rendered ALTER TABLE statement, empty until rendered
    pub ddl: String,
    /// Add a new index or drop a redundant existing one
    pub action: IndexAction,
}

impl IndexCandidate {
    pub fn new(database: impl Into<String>, table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: String::new(),
            database: database.into(),
            table: table.into(),
            columns,
            ddl: String::new(),
            action: IndexAction::Add,
        }
    }

    /// Proposal to drop the existing index `name`
    pub fn drop_existing(
        database: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
    ) -> Self {
        let mut candidate = Self::new(database, table, columns);
        candidate.name = name.into();
        candidate.action = IndexAction::Drop;
        candidate.render_ddl();
        candidate
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Backquoted table reference, database-qualified when known
    pub fn qualified_table(&self) -> String {
        if self.database.is_empty() {
            format!("`{}`", self.table)
        } else {
            format!("`{}`.`{}`", self.database, self.table)
        }
    }

    /// The ADD/DROP part of the statement, reused when merging ALTERs per table
    pub fn clause(&self) -> String {
        match self.action {
            IndexAction::Add => {
                let columns: Vec<String> = self
                    .columns
                    .iter()
                    .map(|column| match column.prefix_length {
                        Some(length) => format!("`{}`({})", column.name, length),
                        None => format!("`{}`", column.name),
                    })
                    .collect();
                format!("ADD INDEX `{}` ({})", self.name, columns.join(", "))
            }
            IndexAction::Drop => format!("DROP INDEX `{}`", self.name),
        }
    }

    pub fn render_ddl(&mut self) {
        self.ddl = format!("ALTER TABLE {} {}", self.qualified_table(), self.clause());
    }
}

/// Column description returned by the data dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Full column type, e.g. `varchar(255)`
    pub data_type: String,
    /// Character set, empty for non-string columns
    #[serde(default)]
    pub character_set: String,
    /// Collation, empty for non-string columns
    #[serde(default)]
    pub collation: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    pub fn with_charset(mut self, character_set: impl Into<String>, collation: impl Into<String>) -> Self {
        self.character_set = character_set.into();
        self.collation = collation.into();
        self
    }
}

/// One row of an index listing, one per (index, column)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    /// Index name, `PRIMARY` for the primary key
    pub key_name: String,
    /// Column covered at this position
    pub column_name: String,
    /// 1-based position of the column inside the index
    pub seq_in_index: usize,
    /// False for primary and unique indexes
    pub non_unique: bool,
}

/// Existing indexes of one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableIndexInfo {
    pub rows: Vec<IndexRow>,
}

impl TableIndexInfo {
    pub fn new(rows: Vec<IndexRow>) -> Self {
        Self { rows }
    }

    /// Index name to its columns in `seq_in_index` order
    pub fn keys(&self) -> BTreeMap<String, Vec<String>> {
        let mut ordered: BTreeMap<String, Vec<&IndexRow>> = BTreeMap::new();
        for row in &self.rows {
            ordered.entry(row.key_name.clone()).or_default().push(row);
        }
        ordered
            .into_iter()
            .map(|(key, mut rows)| {
                rows.sort_by_key(|row| row.seq_in_index);
                (key, rows.into_iter().map(|row| row.column_name.clone()).collect())
            })
            .collect()
    }

    pub fn key_columns(&self, key_name: &str) -> Vec<String> {
        let mut rows: Vec<&IndexRow> = self.rows.iter().filter(|row| row.key_name == key_name).collect();
        rows.sort_by_key(|row| row.seq_in_index);
        rows.into_iter().map(|row| row.column_name.clone()).collect()
    }

    pub fn has_key(&self, key_name: &str) -> bool {
        self.rows.iter().any(|row| row.key_name.eq_ignore_ascii_case(key_name))
    }

    /// Primary keys and unique indexes
    pub fn is_constraint(&self, key_name: &str) -> bool {
        key_name == "PRIMARY"
            || self
                .rows
                .iter()
                .any(|row| row.key_name == key_name && !row.non_unique)
    }

    /// Whether `column` alone forms the primary key or a unique index
    pub fn is_sole_unique_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| {
            row.column_name == column
                && self.is_constraint(&row.key_name)
                && self.rows.iter().filter(|other| other.key_name == row.key_name).count() == 1
        })
    }

    /// Names of indexes whose leading column is `column`
    pub fn keys_starting_with(&self, column: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .rows
            .iter()
            .filter(|row| row.seq_in_index == 1 && row.column_name.eq_ignore_ascii_case(column))
            .map(|row| row.key_name.clone())
            .collect();
        keys.dedup();
        keys
    }
}

/// Lazily populated `database -> table -> indexes` map scoped to one advisor invocation.
/// A `None` entry memoizes a failed lookup.
#[derive(Debug, Clone, Default)]
pub struct IndexMetadataCache {
    databases: BTreeMap<String, BTreeMap<String, Option<TableIndexInfo>>>,
}

impl IndexMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, database: &str, table: &str) -> bool {
        self.databases
            .get(database)
            .map_or(false, |tables| tables.contains_key(table))
    }

    pub fn insert(&mut self, database: &str, table: &str, info: Option<TableIndexInfo>) {
        self.databases
            .entry(database.to_string())
            .or_default()
            .insert(table.to_string(), info);
    }

    pub fn get(&self, database: &str, table: &str) -> Option<&TableIndexInfo> {
        self.databases.get(database)?.get(table)?.as_ref()
    }
}
