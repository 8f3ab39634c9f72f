use std::collections::BTreeMap;

use tracing::debug;

use super::context::AdvisorContext;
use crate::dictionary::DataDictionary;
use crate::error::AdvisorResult;
use crate::sql_parser::{walk, Node, Statement, TableName, TableRef};
use crate::types::{dedup_columns, Column};

/// Tables referenced by a statement: `database -> table -> aliases`.
///
/// Derived tables are recorded with an empty name so that their aliases are
/// recognised without ever resolving to a real table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementTables {
    databases: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StatementTables {
    /// Collect every table reference below `root`, subqueries included
    pub fn from_node(root: Node<'_>) -> Self {
        let mut tables = Self::default();
        walk(root, &mut |node| {
            match node {
                Node::TableRef(TableRef::Table { name, alias }) => tables.add(name, alias.as_deref()),
                Node::TableRef(TableRef::Derived { alias, .. }) => {
                    tables.add(&TableName::new("", ""), alias.as_deref())
                }
                Node::Statement(Statement::Ddl { tables: names }) => {
                    for name in names {
                        tables.add(name, None);
                    }
                }
                _ => {}
            }
            true
        });
        tables
    }

    pub fn add(&mut self, name: &TableName, alias: Option<&str>) {
        let aliases = self
            .databases
            .entry(name.database.clone())
            .or_default()
            .entry(name.table.clone())
            .or_default();
        if let Some(alias) = alias.filter(|alias| !alias.is_empty()) {
            if !aliases.iter().any(|known| known == alias) {
                aliases.push(alias.to_string());
            }
        }
    }

    /// Move tables recorded without a database under `default_database`
    pub fn with_default_database(mut self, default_database: &str) -> Self {
        if default_database.is_empty() {
            return self;
        }
        if let Some(unqualified) = self.databases.remove("") {
            let target = self.databases.entry(default_database.to_string()).or_default();
            for (table, aliases) in unqualified {
                let known = target.entry(table).or_default();
                for alias in aliases {
                    if !known.contains(&alias) {
                        known.push(alias);
                    }
                }
            }
        }
        self
    }

    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    /// Real (non-derived) table names recorded under `database`
    pub fn tables(&self, database: &str) -> Vec<String> {
        self.databases
            .get(database)
            .map(|tables| tables.keys().filter(|table| !table.is_empty()).cloned().collect())
            .unwrap_or_default()
    }

    /// Every real table as `(database, table)`
    pub fn real_tables(&self) -> Vec<(String, String)> {
        self.databases
            .iter()
            .flat_map(|(database, tables)| {
                tables
                    .keys()
                    .filter(|table| !table.is_empty())
                    .map(move |table| (database.clone(), table.clone()))
            })
            .collect()
    }

    /// Owner of a qualifier written in front of a column. Aliases win over table names.
    pub fn resolve_qualifier(&self, qualifier: &str) -> Option<(String, String)> {
        let by_alias = self.databases.iter().find_map(|(database, tables)| {
            tables
                .iter()
                .find(|(_, aliases)| aliases.iter().any(|alias| alias == qualifier))
                .map(|(table, _)| (database.clone(), table.clone()))
        });
        by_alias.or_else(|| {
            self.databases.iter().find_map(|(database, tables)| {
                tables
                    .keys()
                    .find(|table| !table.is_empty() && table.as_str() == qualifier)
                    .map(|table| (database.clone(), table.clone()))
            })
        })
    }
}

/// Fill in owner table, database and type information of `columns`.
///
/// With a dictionary the owner is looked up live; without one (or after the
/// dictionary failed) ownership is inferred from the statement alone.
pub fn complete_columns(columns: Vec<Column>, tables: &StatementTables, ctx: &mut AdvisorContext) -> Vec<Column> {
    if columns.is_empty() {
        return columns;
    }

    let default_database = ctx.default_database();
    let tables = tables.clone().with_default_database(&default_database);
    let real_tables = tables.real_tables();

    let mut completed = Vec::with_capacity(columns.len());
    for mut column in columns {
        resolve_qualifier(&mut column, &tables);

        if let Some(dictionary) = ctx.dictionary() {
            match resolve_live(&mut column, &tables, dictionary.as_ref()) {
                Ok(()) => {
                    completed.push(column);
                    continue;
                }
                Err(e) => ctx.record_failure(&e),
            }
        }
        completed.extend(infer_owner(column, &real_tables, &default_database));
    }
    dedup_columns(completed)
}

fn resolve_qualifier(column: &mut Column, tables: &StatementTables) {
    if column.table.is_empty() {
        return;
    }
    let Some((database, table)) = tables.resolve_qualifier(&column.table) else {
        return;
    };
    if table != column.table {
        debug!("Column `{}` qualifier `{}` resolved to table `{}`", column.name, column.table, table);
        let alias = std::mem::replace(&mut column.table, table);
        column.aliases.push(alias);
    }
    column.database = database;
}

/// Ask the dictionary which of the statement's tables owns `column`
fn resolve_live(column: &mut Column, tables: &StatementTables, dictionary: &dyn DataDictionary) -> AdvisorResult<()> {
    let databases: Vec<String> = if column.database.is_empty() {
        tables.databases().map(str::to_string).collect()
    } else {
        vec![column.database.clone()]
    };

    for database in databases {
        let table_names = tables.tables(&database);
        if table_names.is_empty() {
            continue;
        }
        let found = dictionary.find_column(&column.name, &database, &table_names)?;
        let Some(first) = found.first() else {
            continue;
        };
        let owner = found
            .iter()
            .find(|resolved| !column.table.is_empty() && resolved.table == column.table)
            .unwrap_or(first);

        column.database = owner.database.clone();
        column.table = owner.table.clone();
        column.data_type = owner.info.data_type.clone();
        column.character_set = owner.info.character_set.clone();
        column.collation = owner.info.collation.clone();
        return Ok(());
    }

    debug!("Column `{}` not found in any referenced table", column.name);
    Ok(())
}

/// Ownership from the statement alone. A single table owns everything; with
/// several tables an unqualified column is attributed to each of them.
fn infer_owner(mut column: Column, real_tables: &[(String, String)], default_database: &str) -> Vec<Column> {
    match real_tables {
        [] => {
            if column.database.is_empty() {
                column.database = default_database.to_string();
            }
            vec![column]
        }
        [(database, table)] => {
            column.database = database.clone();
            column.table = table.clone();
            vec![column]
        }
        many if column.table.is_empty() => many
            .iter()
            .map(|(database, table)| {
                column
                    .clone()
                    .with_table(table.clone())
                    .with_database(database.clone())
            })
            .collect(),
        _ => {
            if column.database.is_empty() {
                column.database = default_database.to_string();
            }
            vec![column]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::StaticDictionary;
    use crate::index_advisor::config::AdvisorConfig;
    use crate::sql_parser::parse_statements;
    use crate::types::ColumnInfo;
    use std::sync::Arc;

    fn tables_of(sql: &str) -> StatementTables {
        let statements = parse_statements(sql).unwrap();
        StatementTables::from_node(Node::Statement(&statements[0]))
    }

    #[test]
    fn test_statement_tables_and_aliases() {
        let tables = tables_of("SELECT * FROM shop.orders o JOIN users u ON o.user_id = u.id");
        assert_eq!(tables.tables("shop"), vec!["orders"]);
        assert_eq!(tables.tables(""), vec!["users"]);
        assert_eq!(
            tables.resolve_qualifier("o"),
            Some(("shop".to_string(), "orders".to_string()))
        );
        assert_eq!(tables.resolve_qualifier("users"), Some((String::new(), "users".to_string())));
        assert_eq!(tables.resolve_qualifier("x"), None);
    }

    #[test]
    fn test_derived_alias_never_resolves_to_real_table() {
        let tables = tables_of("SELECT d.a FROM (SELECT a FROM t1) d");
        assert_eq!(tables.real_tables(), vec![(String::new(), "t1".to_string())]);
        assert_eq!(tables.resolve_qualifier("d"), Some((String::new(), String::new())));
    }

    #[test]
    fn test_default_database_applies_to_unqualified_tables() {
        let tables = tables_of("SELECT * FROM a JOIN other.b ON a.id = b.id").with_default_database("app");
        assert_eq!(
            tables.real_tables(),
            vec![
                ("app".to_string(), "a".to_string()),
                ("other".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn test_static_single_table_owns_every_column() {
        let tables = tables_of("SELECT * FROM t1 WHERE a = 1");
        let mut ctx = AdvisorContext::new(AdvisorConfig::default(), None);
        let columns = complete_columns(vec![Column::new("a")], &tables, &mut ctx);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].table, "t1");
        assert_eq!(columns[0].database, "");
    }

    #[test]
    fn test_static_multi_table_fans_out_unqualified_columns() {
        let tables = tables_of("SELECT * FROM t1, t2 WHERE a = 1 AND t2.b = 2");
        let mut ctx = AdvisorContext::new(AdvisorConfig::default(), None);
        let columns = complete_columns(
            vec![Column::new("a"), Column::new("b").with_table("t2")],
            &tables,
            &mut ctx,
        );
        let owners: Vec<(&str, &str)> = columns.iter().map(|c| (c.name.as_str(), c.table.as_str())).collect();
        assert_eq!(owners, vec![("a", "t1"), ("a", "t2"), ("b", "t2")]);
    }

    #[test]
    fn test_alias_is_recorded_on_resolution() {
        let tables = tables_of("SELECT * FROM orders o, users u WHERE o.status = 1");
        let mut ctx = AdvisorContext::new(AdvisorConfig::default(), None);
        let columns = complete_columns(vec![Column::new("status").with_table("o")], &tables, &mut ctx);
        assert_eq!(columns[0].table, "orders");
        assert_eq!(columns[0].aliases, vec!["o"]);
    }

    #[test]
    fn test_live_lookup_finds_owner_and_type() {
        let dictionary = StaticDictionary::new("app")
            .with_table("app", "users", vec![ColumnInfo::new("id", "int(11)")])
            .with_table(
                "app",
                "posts",
                vec![
                    ColumnInfo::new("id", "bigint(20)"),
                    ColumnInfo::new("title", "varchar(64)").with_charset("utf8mb4", "utf8mb4_general_ci"),
                ],
            );
        let tables = tables_of("SELECT * FROM users u JOIN posts p ON u.id = p.id WHERE title = 'x'");
        let mut ctx = AdvisorContext::new(AdvisorConfig::default(), Some(Arc::new(dictionary)));

        let columns = complete_columns(
            vec![Column::new("title"), Column::new("id").with_table("p")],
            &tables,
            &mut ctx,
        );
        assert_eq!(columns[0].table, "posts");
        assert_eq!(columns[0].database, "app");
        assert_eq!(columns[0].character_set, "utf8mb4");
        assert_eq!(columns[1].table, "posts");
        assert_eq!(columns[1].data_type, "bigint(20)");
        assert!(!ctx.is_degraded());
    }
}
