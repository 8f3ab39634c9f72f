use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{MAX_INDEX_NAME_LENGTH, NAME_SUFFIX_LENGTH};
use super::context::AdvisorContext;
use super::synthesizer::truncate_identifier;
use crate::dictionary::DataDictionary;
use crate::types::{is_cols_part, Column, IndexAction, IndexCandidate, TableIndexInfo};

/// Reconcile candidates with the indexes that already exist, then remove
/// candidates made redundant by other candidates.
pub fn merge(candidates: Vec<IndexCandidate>, ctx: &mut AdvisorContext) -> Vec<IndexCandidate> {
    let merged = if ctx.is_live() {
        merge_with_existing(candidates, ctx)
    } else {
        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            push_unique(&mut unique, candidate);
        }
        unique
    };
    remove_self_duplicates(merged)
}

fn merge_with_existing(candidates: Vec<IndexCandidate>, ctx: &mut AdvisorContext) -> Vec<IndexCandidate> {
    let mut merged = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        if candidate.action == IndexAction::Drop {
            push_unique(&mut merged, candidate);
            continue;
        }
        if candidate.columns.is_empty() {
            continue;
        }

        if let Some(dictionary) = ctx.dictionary() {
            match dictionary.is_view(&candidate.database, &candidate.table) {
                Ok(true) => {
                    info!("{} is a view, no index advised", candidate.qualified_table());
                    continue;
                }
                Ok(false) => {}
                Err(e) => debug!("View check for {} failed: {}", candidate.qualified_table(), e),
            }
        }

        let Some(existing) = ctx.table_indexes(&candidate.database, &candidate.table).cloned() else {
            push_unique(&mut merged, candidate);
            continue;
        };

        let mut covered = false;
        for key in existing.keys_starting_with(&candidate.columns[0].name) {
            let key_columns: Vec<Column> = existing
                .key_columns(&key)
                .into_iter()
                .map(|name| {
                    Column::new(name)
                        .with_table(candidate.table.clone())
                        .with_database(candidate.database.clone())
                })
                .collect();
            if !is_cols_part(&key_columns, &candidate.columns) {
                continue;
            }

            if key_columns.len() >= candidate.columns.len() {
                info!("{} already covered by index `{}`", candidate.ddl, key);
                covered = true;
                continue;
            }
            if existing.is_constraint(&key) {
                continue;
            }
            if ctx.config.allow_drop_index {
                push_unique(
                    &mut merged,
                    IndexCandidate::drop_existing(candidate.database.clone(), candidate.table.clone(), key, key_columns),
                );
            } else {
                warn!(
                    "Index `{}` on {} is a prefix of the advised `{}` and may be dropped",
                    key,
                    candidate.qualified_table(),
                    candidate.name
                );
            }
        }
        if covered {
            continue;
        }

        if existing.has_key(&candidate.name) {
            let renamed = unique_name(&candidate, &existing);
            warn!("Index name `{}` already exists, using `{}`", candidate.name, renamed);
            candidate.name = renamed;
            candidate.render_ddl();
        }
        push_unique(&mut merged, candidate);
    }
    merged
}

/// Truncated base name plus a short suffix derived from the statement text
fn unique_name(candidate: &IndexCandidate, existing: &TableIndexInfo) -> String {
    let base = truncate_identifier(&candidate.name, MAX_INDEX_NAME_LENGTH - NAME_SUFFIX_LENGTH - 1);
    let mut seed = candidate.ddl.clone();
    loop {
        let suffix = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).simple().to_string();
        let name = format!("{}_{}", base, &suffix[..NAME_SUFFIX_LENGTH]);
        if !existing.has_key(&name) {
            return name;
        }
        seed.push('#');
    }
}

fn push_unique(candidates: &mut Vec<IndexCandidate>, candidate: IndexCandidate) {
    if !candidates.iter().any(|known| known.ddl == candidate.ddl) {
        candidates.push(candidate);
    }
}

/// Drop every ADD candidate whose column list leads another ADD candidate on the same table.
/// Of two identical lists the first one stays.
pub fn remove_self_duplicates(candidates: Vec<IndexCandidate>) -> Vec<IndexCandidate> {
    let redundant: Vec<bool> = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            candidate.action == IndexAction::Add
                && candidates.iter().enumerate().any(|(j, other)| {
                    j != i
                        && other.action == IndexAction::Add
                        && other.database == candidate.database
                        && other.table == candidate.table
                        && is_cols_part(&candidate.columns, &other.columns)
                        && (other.columns.len() > candidate.columns.len()
                            || (other.columns.len() == candidate.columns.len() && j < i))
                })
        })
        .collect();

    candidates
        .into_iter()
        .zip(redundant)
        .filter_map(|(candidate, redundant)| {
            if redundant {
                debug!("Removing redundant candidate {}", candidate.ddl);
                None
            } else {
                Some(candidate)
            }
        })
        .collect()
}

/// An existing index made redundant by another index on the same table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateKeyFinding {
    pub database: String,
    pub table: String,
    /// The redundant index
    pub key: String,
    pub columns: Vec<String>,
    /// The index that already provides the same leading columns
    pub covered_by: String,
    pub covered_by_columns: Vec<String>,
}

/// Scan existing indexes of `databases` (the dictionary default when empty)
/// for keys whose columns lead another key of the same table.
pub fn duplicate_key_check(dictionary: &dyn DataDictionary, databases: &[String]) -> Vec<DuplicateKeyFinding> {
    let databases = if databases.is_empty() {
        vec![dictionary.default_database().to_string()]
    } else {
        databases.to_vec()
    };

    let mut findings = Vec::new();
    for database in &databases {
        let tables = match dictionary.list_tables(database) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Cannot list tables of `{}`: {}", database, e);
                continue;
            }
        };
        for table in tables {
            match dictionary.list_indexes(database, &table) {
                Ok(rows) => findings.extend(duplicate_keys(database, &table, &TableIndexInfo::new(rows))),
                Err(e) => warn!("Cannot list indexes of `{}`.`{}`: {}", database, table, e),
            }
        }
    }
    info!("Duplicate key check found {} redundant index(es)", findings.len());
    findings
}

fn duplicate_keys(database: &str, table: &str, info: &TableIndexInfo) -> Vec<DuplicateKeyFinding> {
    let keys: Vec<(String, Vec<String>)> = info.keys().into_iter().collect();
    let mut findings = Vec::new();

    for (i, (first, first_columns)) in keys.iter().enumerate() {
        for (second, second_columns) in keys.iter().skip(i + 1) {
            let leading = first_columns
                .iter()
                .zip(second_columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
            if !leading {
                continue;
            }

            // the shorter key is redundant; of equal keys a plain index goes before a constraint
            let first_redundant = match first_columns.len().cmp(&second_columns.len()) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => !info.is_constraint(first) && info.is_constraint(second),
            };
            let (key, columns, covered_by, covered_by_columns) = if first_redundant {
                (first, first_columns, second, second_columns)
            } else {
                (second, second_columns, first, first_columns)
            };
            if info.is_constraint(key) {
                continue;
            }

            findings.push(DuplicateKeyFinding {
                database: database.to_string(),
                table: table.to_string(),
                key: key.clone(),
                columns: columns.clone(),
                covered_by: covered_by.clone(),
                covered_by_columns: covered_by_columns.clone(),
            });
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::StaticDictionary;
    use crate::index_advisor::config::AdvisorConfig;
    use crate::types::ColumnInfo;
    use std::sync::Arc;

    fn col(name: &str) -> Column {
        Column::new(name).with_table("t").with_database("app")
    }

    fn add(names: &[&str]) -> IndexCandidate {
        let columns: Vec<Column> = names.iter().map(|name| col(name)).collect();
        let mut candidate = IndexCandidate::new("app", "t", columns);
        candidate.name = format!("idx_{}", names.join("_"));
        candidate.render_ddl();
        candidate
    }

    fn dictionary() -> StaticDictionary {
        StaticDictionary::new("app")
            .with_table(
                "app",
                "t",
                vec![
                    ColumnInfo::new("a", "int"),
                    ColumnInfo::new("b", "int"),
                    ColumnInfo::new("c", "int"),
                ],
            )
            .with_index("app", "t", "PRIMARY", &["c"], true)
            .with_index("app", "t", "idx_a", &["b"], false)
            .with_index("app", "t", "idx_ab_old", &["a", "b"], false)
            .with_view("app", "v", vec![ColumnInfo::new("a", "int")])
    }

    fn live_context(allow_drop_index: bool) -> AdvisorContext {
        let config = AdvisorConfig {
            allow_drop_index,
            ..AdvisorConfig::default()
        };
        AdvisorContext::new(config, Some(Arc::new(dictionary())))
    }

    #[test]
    fn test_self_duplicates_keep_longest() {
        let merged = remove_self_duplicates(vec![add(&["a"]), add(&["a", "b"]), add(&["b"]), add(&["a", "b"])]);
        let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["idx_a_b", "idx_b"]);
    }

    #[test]
    fn test_existing_index_covers_candidate() {
        let mut ctx = live_context(false);
        let merged = merge(vec![add(&["a"]), add(&["a", "b"])], &mut ctx);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_shorter_existing_index_may_be_dropped() {
        let mut ctx = live_context(true);
        let merged = merge(vec![add(&["a", "b", "c"])], &mut ctx);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ddl, "ALTER TABLE `app`.`t` DROP INDEX `idx_ab_old`");
        assert_eq!(merged[1].name, "idx_a_b_c");

        let mut ctx = live_context(false);
        let merged = merge(vec![add(&["a", "b", "c"])], &mut ctx);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].action, IndexAction::Add);
    }

    fn colliding() -> IndexCandidate {
        // `idx_a` already exists on column b
        let mut candidate = add(&["b", "c"]);
        candidate.name = "idx_a".to_string();
        candidate.render_ddl();
        candidate
    }

    #[test]
    fn test_colliding_name_is_renamed() {
        let merged = merge(vec![colliding()], &mut live_context(false));
        assert_eq!(merged.len(), 1);
        assert!(merged[0].name.starts_with("idx_a_"));
        assert_eq!(merged[0].name.len(), "idx_a_".len() + NAME_SUFFIX_LENGTH);
        assert!(merged[0].ddl.contains(&format!("ADD INDEX `{}`", merged[0].name)));
    }

    #[test]
    fn test_rename_is_deterministic() {
        let first = merge(vec![colliding()], &mut live_context(false));
        let second = merge(vec![colliding()], &mut live_context(false));
        assert_eq!(first, second);
    }

    #[test]
    fn test_views_are_skipped() {
        let mut candidate = IndexCandidate::new("app", "v", vec![Column::new("a").with_table("v").with_database("app")]);
        candidate.name = "idx_a".to_string();
        candidate.render_ddl();
        let merged = merge(vec![candidate], &mut live_context(false));
        assert!(merged.is_empty());
    }

    #[test]
    fn test_duplicate_key_check() {
        let dictionary = StaticDictionary::new("app")
            .with_table("app", "t", vec![ColumnInfo::new("a", "int"), ColumnInfo::new("b", "int")])
            .with_index("app", "t", "PRIMARY", &["a"], true)
            .with_index("app", "t", "idx_a", &["a"], false)
            .with_index("app", "t", "idx_a_b", &["a", "b"], false)
            .with_index("app", "t", "idx_b", &["b"], false);

        let findings = duplicate_key_check(&dictionary, &[]);
        let pairs: Vec<(&str, &str)> = findings
            .iter()
            .map(|f| (f.key.as_str(), f.covered_by.as_str()))
            .collect();
        assert_eq!(pairs, vec![("idx_a", "PRIMARY"), ("idx_a", "idx_a_b")]);
    }
}
