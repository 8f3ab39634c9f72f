// SQL front end: sqlparser output lowered into the advisor's statement tree
pub mod ast;
pub mod lower;
pub mod walker;

#[cfg(test)]
mod tests;

pub use ast::*;
pub use walker::{is_subquery, walk, Node};

use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::error::{AdvisorError, AdvisorResult};

/// Parse MySQL text into advisor statements.
///
/// Empty input is rejected as invalid and syntax errors surface as [`AdvisorError::Parse`].
pub fn parse_statements(sql: &str) -> AdvisorResult<Vec<Statement>> {
    if sql.trim().is_empty() {
        return Err(AdvisorError::invalid_input("empty SQL text"));
    }

    let parsed = Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| AdvisorError::parse(e.to_string()))?;
    if parsed.is_empty() {
        return Err(AdvisorError::invalid_input("no statement found"));
    }

    debug!("Parsed {} statement(s)", parsed.len());
    Ok(parsed.iter().map(lower::lower_statement).collect())
}
