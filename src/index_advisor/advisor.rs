use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cardinality::{estimate, sort_by_cardinality};
use super::classifier::{classify, leaf_subqueries};
use super::config::AdvisorConfig;
use super::context::AdvisorContext;
use super::length_checker::bound_candidates;
use super::merger::merge;
use super::metadata::{complete_columns, StatementTables};
use super::synthesizer::{split_single_column, synthesize};
use crate::dictionary::DataDictionary;
use crate::error::AdvisorResult;
use crate::sql_parser::{parse_statements, Node, Query, Statement};
use crate::types::IndexCandidate;

/// Advice produced for one query of a batch
#[derive(Debug, Clone, Serialize)]
pub struct StatementAdvice {
    pub query: String,
    pub candidates: Vec<IndexCandidate>,
    /// Parse failure, when the query could not be advised on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Suggests secondary indexes for SQL statements.
///
/// Without a data dictionary only single-column suggestions are produced.
pub struct IndexAdvisor {
    config: AdvisorConfig,
    dictionary: Option<Arc<dyn DataDictionary>>,
}

impl IndexAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            config,
            dictionary: None,
        }
    }

    pub fn with_dictionary(config: AdvisorConfig, dictionary: Arc<dyn DataDictionary>) -> Self {
        Self {
            config,
            dictionary: Some(dictionary),
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn is_live(&self) -> bool {
        self.dictionary.is_some()
    }

    /// Parse `sql` and advise on every statement it contains
    pub fn advise_sql(&self, sql: &str) -> AdvisorResult<Vec<IndexCandidate>> {
        let statements = parse_statements(sql)?;
        Ok(statements.iter().flat_map(|statement| self.advise(statement)).collect())
    }

    /// Independent queries are advised in parallel; results keep input order
    pub fn advise_batch(&self, queries: &[String]) -> Vec<StatementAdvice> {
        info!("Advising on {} queries", queries.len());
        queries
            .par_iter()
            .map(|query| match self.advise_sql(query) {
                Ok(candidates) => StatementAdvice {
                    query: query.clone(),
                    candidates,
                    error: None,
                },
                Err(e) => {
                    warn!("Skipping query: {}", e);
                    StatementAdvice {
                        query: query.clone(),
                        candidates: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Index candidates for one statement. Schema statements produce none.
    pub fn advise(&self, statement: &Statement) -> Vec<IndexCandidate> {
        if matches!(statement, Statement::Ddl { .. } | Statement::Other) {
            debug!("Statement kind carries no access path, nothing to advise");
            return Vec::new();
        }

        let mut ctx = AdvisorContext::new(self.config.clone(), self.dictionary.clone());
        let root = Node::Statement(statement);

        let subquery_candidates: Vec<IndexCandidate> = leaf_subqueries(root, self.config.max_subquery_depth)
            .into_iter()
            .flat_map(|query| self.advise_subquery(query, &mut ctx))
            .collect();

        let mut candidates = self.synthesize_node(root, &mut ctx);
        candidates.extend(subquery_candidates);

        if ctx.is_degraded() {
            candidates = split_single_column(candidates);
        }
        let candidates = bound_candidates(candidates, &ctx);
        let candidates = merge(candidates, &mut ctx);

        debug!("Advised {} index(es)", candidates.len());
        candidates
    }

    /// Subqueries are synthesized with their own context; a dictionary
    /// failure inside one still degrades the enclosing call.
    fn advise_subquery(&self, query: &Query, parent: &mut AdvisorContext) -> Vec<IndexCandidate> {
        let mut ctx = AdvisorContext::new(self.config.clone(), self.dictionary.clone());
        if parent.is_degraded() {
            ctx.mark_degraded();
        }
        let candidates = self.synthesize_node(Node::Query(query), &mut ctx);
        if ctx.is_degraded() {
            parent.mark_degraded();
        }
        candidates
    }

    /// Classify, resolve, estimate and synthesize for the statement or subquery at `root`
    fn synthesize_node(&self, root: Node<'_>, ctx: &mut AdvisorContext) -> Vec<IndexCandidate> {
        let mut set = classify(root);
        if set.is_empty() {
            return Vec::new();
        }
        let tables = StatementTables::from_node(root);

        set.where_all = complete_columns(std::mem::take(&mut set.where_all), &tables, ctx);
        set.where_eq = complete_columns(std::mem::take(&mut set.where_eq), &tables, ctx);
        set.where_ineq = complete_columns(std::mem::take(&mut set.where_ineq), &tables, ctx);
        set.group_by = complete_columns(std::mem::take(&mut set.group_by), &tables, ctx);
        set.order_by = complete_columns(std::mem::take(&mut set.order_by), &tables, ctx);
        set.join_groups = std::mem::take(&mut set.join_groups)
            .into_iter()
            .map(|group| complete_columns(group, &tables, ctx))
            .collect();

        if ctx.is_live() {
            estimate(&mut set.where_eq, ctx);
            estimate(&mut set.where_ineq, ctx);
            estimate(&mut set.group_by, ctx);
            estimate(&mut set.order_by, ctx);
            for group in set.join_groups.iter_mut() {
                estimate(group, ctx);
            }

            sort_by_cardinality(&mut set.where_eq);
            sort_by_cardinality(&mut set.where_ineq);
            for group in set.join_groups.iter_mut() {
                sort_by_cardinality(group);
            }
        }

        synthesize(&set, ctx)
    }
}
