use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AdvisorResult;
use crate::types::{IndexAction, IndexCandidate};

/// One numbered advice item, covering every candidate of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportItem {
    /// `IDX.001`, `IDX.002`, ...
    pub item: String,
    pub database: String,
    pub table: String,
    pub summary: String,
    /// One line per advised column
    pub content: Vec<String>,
    /// Individual ALTER statements
    pub statements: Vec<String>,
    /// All statements of the table folded into one ALTER
    pub merged_ddl: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdviceReport {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ReportItem>,
}

impl AdviceReport {
    /// Group candidates per table. With `sampling` each column line carries
    /// its cardinality as a percentage.
    pub fn build(candidates: &[IndexCandidate], sampling: bool) -> Self {
        // tables in first-seen order
        let mut tables: Vec<((String, String), Vec<&IndexCandidate>)> = Vec::new();
        for candidate in candidates {
            let key = (candidate.database.clone(), candidate.table.clone());
            match tables.iter_mut().find(|(known, _)| *known == key) {
                Some((_, grouped)) => grouped.push(candidate),
                None => tables.push((key, vec![candidate])),
            }
        }

        let items = tables
            .into_iter()
            .enumerate()
            .map(|(position, ((database, table), candidates))| {
                let qualified = candidates[0].qualified_table();
                let summary = if candidates.iter().any(|c| c.action == IndexAction::Add) {
                    format!("Add index to table {}", qualified)
                } else {
                    format!("Drop redundant index from table {}", qualified)
                };

                let mut content = Vec::new();
                for candidate in candidates.iter().filter(|c| c.action == IndexAction::Add) {
                    for column in &candidate.columns {
                        let line = match column.cardinality {
                            Some(cardinality) if sampling && cardinality > 0.0 => {
                                format!("column `{}` cardinality {:.2}%", column.name, cardinality * 100.0)
                            }
                            _ => format!("column `{}`", column.name),
                        };
                        if !content.contains(&line) {
                            content.push(line);
                        }
                    }
                }

                ReportItem {
                    item: format!("IDX.{:03}", position + 1),
                    database,
                    table,
                    summary,
                    content,
                    statements: candidates.iter().map(|c| c.ddl.clone()).collect(),
                    merged_ddl: merge_alter_statements(&candidates),
                }
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        if self.items.is_empty() {
            text.push_str("No index advice.\n");
            return text;
        }
        for item in &self.items {
            let _ = writeln!(text, "[{}] {}", item.item, item.summary);
            for line in &item.content {
                let _ = writeln!(text, "  - {}", line);
            }
            let _ = writeln!(text, "  {};", item.merged_ddl);
            text.push('\n');
        }
        text
    }

    pub fn to_json(&self) -> AdvisorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Fold the statements of one table into a single `ALTER TABLE` with comma-separated clauses
pub fn merge_alter_statements(candidates: &[&IndexCandidate]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let clauses: Vec<String> = candidates.iter().map(|candidate| candidate.clause()).collect();
    format!("ALTER TABLE {} {}", first.qualified_table(), clauses.join(", "))
}
