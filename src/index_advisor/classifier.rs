use tracing::debug;

use crate::sql_parser::{
    is_subquery, walk, ColumnRef, CompareOp, Expr, IsTest, Join, JoinCondition, Literal, Node, OrderItem, Query,
    Statement, TableRef,
};
use crate::types::{merge_column, ClassifiedColumnSet, Column};

/// Indexing role of one predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateRole {
    /// Exact-match prefix of a B-tree
    Equality,
    /// Bounded range scan
    Range,
}

impl PredicateRole {
    /// Role of a comparison operator
    pub fn of_compare(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq | CompareOp::NullSafeEq => PredicateRole::Equality,
            CompareOp::NotEq | CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq => {
                PredicateRole::Range
            }
        }
    }

    /// Role of an `IS ...` test
    pub fn of_is_test(test: IsTest) -> Self {
        match test {
            IsTest::True | IsTest::NotTrue | IsTest::False | IsTest::NotFalse | IsTest::Null => PredicateRole::Equality,
            IsTest::NotNull => PredicateRole::Range,
        }
    }
}

pub fn column_from_ref(column: &ColumnRef) -> Column {
    Column::new(column.name.clone())
        .with_table(column.table.clone())
        .with_database(column.database.clone())
}

/// Split the columns of a statement (or of one subquery) by indexing role.
///
/// Nested queries are not searched; they are advised on separately.
pub fn classify(root: Node<'_>) -> ClassifiedColumnSet {
    let mut set = ClassifiedColumnSet::default();
    let mut group_exprs: Vec<&Expr> = Vec::new();
    let mut order_items: Vec<&OrderItem> = Vec::new();

    walk(root, &mut |node| match node {
        Node::Statement(Statement::Update { selection, .. }) | Node::Statement(Statement::Delete { selection, .. }) => {
            if let Some(selection) = selection {
                set.has_where = true;
                collect_where(selection, &mut set);
            }
            true
        }
        Node::Query(query) => {
            order_items.extend(query.order_by.iter());
            true
        }
        Node::Select(select) => {
            if let Some(selection) = &select.selection {
                set.has_where = true;
                collect_where(selection, &mut set);
            }
            group_exprs.extend(select.group_by.iter());
            true
        }
        Node::Join(join) => {
            collect_join(join, &mut set);
            true
        }
        Node::TableRef(TableRef::Derived { .. }) | Node::Expr(_) => false,
        _ => true,
    });

    set.group_by = group_by_columns(&group_exprs);
    set.order_by = order_by_columns(&order_items);

    debug!(
        "Classified columns: {} where, {} eq, {} ineq, {} group by, {} order by, {} join group(s)",
        set.where_all.len(),
        set.where_eq.len(),
        set.where_ineq.len(),
        set.group_by.len(),
        set.order_by.len(),
        set.join_groups.len()
    );
    set
}

fn collect_where(selection: &Expr, set: &mut ClassifiedColumnSet) {
    collect_columns(selection, true, &mut set.where_all);
    fold_predicates(selection, set);
}

/// Walk the AND-tree of a filter and sort indexable predicates into `where_eq`/`where_ineq`
fn fold_predicates(filter: &Expr, set: &mut ClassifiedColumnSet) {
    walk(Node::Expr(filter), &mut |node| {
        let Node::Expr(expr) = node else {
            return false;
        };
        match expr {
            Expr::And(..) | Expr::Nested(_) => true,
            // OR branches, negations, computed values and nested queries never feed an index prefix
            Expr::Or(..)
            | Expr::Not(_)
            | Expr::Arithmetic(_)
            | Expr::Function { .. }
            | Expr::Opaque(_)
            | Expr::Subquery(_)
            | Expr::Exists { .. }
            | Expr::InSubquery { .. } => false,
            predicate => {
                match classify_predicate(predicate) {
                    Some((PredicateRole::Equality, column)) => merge_column(&mut set.where_eq, column),
                    Some((PredicateRole::Range, column)) => merge_column(&mut set.where_ineq, column),
                    None => {}
                }
                false
            }
        }
    });
}

/// Role and filtered column of a single predicate, `None` when it cannot drive an index
pub fn classify_predicate(predicate: &Expr) -> Option<(PredicateRole, Column)> {
    match predicate {
        Expr::Compare { op, left, right } => {
            single_column(&[left.as_ref(), right.as_ref()]).map(|column| (PredicateRole::of_compare(*op), column))
        }
        Expr::Is { test, expr } => single_column(&[expr.as_ref()]).map(|column| (PredicateRole::of_is_test(*test), column)),
        Expr::InList { negated: true, .. } => None,
        Expr::InList { expr, list, .. } => {
            let role = match list.len() {
                0 => return None,
                1 => PredicateRole::Equality,
                _ => PredicateRole::Range,
            };
            let mut operands: Vec<&Expr> = vec![expr.as_ref()];
            operands.extend(list.iter());
            single_column(&operands).map(|column| (role, column))
        }
        Expr::Between { expr, low, high, .. } => {
            single_column(&[expr.as_ref(), low.as_ref(), high.as_ref()]).map(|column| (PredicateRole::Range, column))
        }
        Expr::Like { expr, pattern, .. } => {
            if matches!(pattern.unnested(), Expr::Literal(Literal::String(text)) if text.starts_with('%')) {
                return None;
            }
            single_column(&[expr.as_ref(), pattern.as_ref()]).map(|column| (PredicateRole::Range, column))
        }
        _ => None,
    }
}

/// The one column a predicate filters on. Columns inside function calls do not count,
/// and the remaining column must appear bare as one of the operands.
fn single_column(operands: &[&Expr]) -> Option<Column> {
    let mut found = Vec::new();
    for operand in operands {
        collect_columns(operand, false, &mut found);
    }
    if found.len() != 1 {
        return None;
    }

    let column = found.remove(0);
    let bare = operands.iter().any(|operand| {
        operand
            .as_column()
            .map_or(false, |reference| column_from_ref(reference).same_key(&column))
    });
    bare.then_some(column)
}

/// Columns referenced by `expr` outside nested queries, deduplicated in encounter order
pub fn collect_columns(expr: &Expr, include_functions: bool, out: &mut Vec<Column>) {
    walk(Node::Expr(expr), &mut |node| match node {
        Node::Expr(Expr::Column(column)) => {
            merge_column(out, column_from_ref(column));
            false
        }
        Node::Expr(Expr::Function { .. }) => include_functions,
        Node::Query(_) => false,
        _ => true,
    });
}

fn collect_join(join: &Join, set: &mut ClassifiedColumnSet) {
    match &join.condition {
        JoinCondition::On(on) => {
            let mut columns = Vec::new();
            collect_columns(on, false, &mut columns);
            if columns.len() > 1 {
                set.join_groups.push(columns);
            }
            // filters written inside ON behave like WHERE filters
            fold_predicates(on, set);
        }
        JoinCondition::Using(names) => {
            let left = plain_table_name(&join.left);
            let right = plain_table_name(&join.right);
            let mut columns = Vec::new();
            for name in names {
                for table in [left, right].into_iter().flatten() {
                    merge_column(&mut columns, Column::new(name.clone()).with_table(table));
                }
            }
            if !columns.is_empty() {
                set.join_groups.push(columns);
            }
        }
        JoinCondition::Natural | JoinCondition::None => {}
    }
}

fn plain_table_name(table: &TableRef) -> Option<&str> {
    match table {
        TableRef::Table { name, .. } => Some(name.table.as_str()),
        _ => None,
    }
}

/// GROUP BY columns in written order, or nothing when any item is computed
fn group_by_columns(exprs: &[&Expr]) -> Vec<Column> {
    let computed = exprs.iter().any(|expr| {
        let mut found = false;
        walk(Node::Expr(expr), &mut |node| match node {
            Node::Expr(Expr::Arithmetic(_)) | Node::Expr(Expr::Function { .. }) | Node::Expr(Expr::Opaque(_)) => {
                found = true;
                false
            }
            Node::Query(_) => false,
            _ => true,
        });
        found
    });
    if computed {
        debug!("GROUP BY contains computed items, ignoring it for index advice");
        return Vec::new();
    }

    let mut columns = Vec::new();
    for expr in exprs {
        collect_columns(expr, false, &mut columns);
    }
    columns
}

/// ORDER BY columns in written order, or nothing when directions are mixed
fn order_by_columns(items: &[&OrderItem]) -> Vec<Column> {
    let Some(first) = items.first() else {
        return Vec::new();
    };
    if items.iter().any(|item| item.descending != first.descending) {
        debug!("ORDER BY mixes sort directions, ignoring it for index advice");
        return Vec::new();
    }

    let mut columns = Vec::new();
    for item in items {
        if let Some(column) = item.expr.as_column() {
            merge_column(&mut columns, column_from_ref(column));
        }
    }
    columns
}

/// Innermost subqueries below `root`, descending at most `max_depth` levels
pub fn leaf_subqueries<'a>(root: Node<'a>, max_depth: usize) -> Vec<&'a Query> {
    let mut found = Vec::new();
    collect_leaf_subqueries(root, 0, max_depth, &mut found);
    found
}

fn collect_leaf_subqueries<'a>(root: Node<'a>, depth: usize, max_depth: usize, found: &mut Vec<&'a Query>) {
    walk(root, &mut |node| {
        if !is_subquery(node) {
            return true;
        }
        let Some(query) = subquery_of(node) else {
            return false;
        };
        if contains_subquery(query) {
            if depth + 1 < max_depth {
                collect_leaf_subqueries(Node::Query(query), depth + 1, max_depth, found);
            } else {
                debug!("Subquery nesting deeper than {} levels, not descending further", max_depth);
            }
        } else {
            found.push(query);
        }
        false
    });
}

fn subquery_of(node: Node<'_>) -> Option<&Query> {
    match node {
        Node::Expr(Expr::Subquery(query))
        | Node::Expr(Expr::Exists { subquery: query, .. })
        | Node::Expr(Expr::InSubquery { subquery: query, .. })
        | Node::TableRef(TableRef::Derived { query, .. }) => Some(query.as_ref()),
        _ => None,
    }
}

fn contains_subquery(query: &Query) -> bool {
    let mut nested = false;
    walk(Node::Query(query), &mut |node| {
        if is_subquery(node) {
            nested = true;
        }
        !nested
    });
    nested
}
