use super::ast::{Expr, Join, JoinCondition, Query, Select, SetExpr, Statement, TableRef};

/// Borrowed view of any node in the statement tree
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Query(&'a Query),
    SetExpr(&'a SetExpr),
    Select(&'a Select),
    TableRef(&'a TableRef),
    Join(&'a Join),
    Expr(&'a Expr),
}

/// Pre-order traversal. `visit` returns whether to descend into the node's children.
pub fn walk<'a, F>(node: Node<'a>, visit: &mut F)
where
    F: FnMut(Node<'a>) -> bool,
{
    if !visit(node) {
        return;
    }

    match node {
        Node::Statement(statement) => match statement {
            Statement::Query(query) => walk(Node::Query(query), visit),
            Statement::Update { tables, selection } | Statement::Delete { tables, selection } => {
                for table in tables {
                    walk(Node::TableRef(table), visit);
                }
                if let Some(selection) = selection {
                    walk(Node::Expr(selection), visit);
                }
            }
            Statement::Insert { source, .. } => {
                if let Some(source) = source {
                    walk(Node::Query(source), visit);
                }
            }
            Statement::Ddl { .. } | Statement::Other => {}
        },
        Node::Query(query) => {
            walk(Node::SetExpr(&query.body), visit);
            for item in &query.order_by {
                walk(Node::Expr(&item.expr), visit);
            }
        }
        Node::SetExpr(set_expr) => match set_expr {
            SetExpr::Select(select) => walk(Node::Select(select), visit),
            SetExpr::Query(query) => walk(Node::Query(query), visit),
            SetExpr::SetOperation { left, right } => {
                walk(Node::SetExpr(left), visit);
                walk(Node::SetExpr(right), visit);
            }
            SetExpr::Other => {}
        },
        Node::Select(select) => {
            for expr in &select.projection {
                walk(Node::Expr(expr), visit);
            }
            for table in &select.from {
                walk(Node::TableRef(table), visit);
            }
            if let Some(selection) = &select.selection {
                walk(Node::Expr(selection), visit);
            }
            for expr in &select.group_by {
                walk(Node::Expr(expr), visit);
            }
            if let Some(having) = &select.having {
                walk(Node::Expr(having), visit);
            }
        }
        Node::TableRef(table) => match table {
            TableRef::Derived { query, .. } => walk(Node::Query(query), visit),
            TableRef::Join(join) => walk(Node::Join(join), visit),
            TableRef::Table { .. } | TableRef::Other => {}
        },
        Node::Join(join) => {
            walk(Node::TableRef(&join.left), visit);
            walk(Node::TableRef(&join.right), visit);
            if let JoinCondition::On(on) = &join.condition {
                walk(Node::Expr(on), visit);
            }
        }
        Node::Expr(expr) => walk_expr_children(expr, visit),
    }
}

fn walk_expr_children<'a, F>(expr: &'a Expr, visit: &mut F)
where
    F: FnMut(Node<'a>) -> bool,
{
    match expr {
        Expr::Column(_) | Expr::Literal(_) => {}
        Expr::Compare { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
            walk(Node::Expr(left), visit);
            walk(Node::Expr(right), visit);
        }
        Expr::Is { expr, .. } | Expr::Not(expr) | Expr::Nested(expr) => walk(Node::Expr(expr), visit),
        Expr::InList { expr, list, .. } => {
            walk(Node::Expr(expr), visit);
            for item in list {
                walk(Node::Expr(item), visit);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk(Node::Expr(expr), visit);
            walk(Node::Query(subquery), visit);
        }
        Expr::Between { expr, low, high, .. } => {
            walk(Node::Expr(expr), visit);
            walk(Node::Expr(low), visit);
            walk(Node::Expr(high), visit);
        }
        Expr::Like { expr, pattern, .. } => {
            walk(Node::Expr(expr), visit);
            walk(Node::Expr(pattern), visit);
        }
        Expr::Arithmetic(items) | Expr::Tuple(items) | Expr::Opaque(items) => {
            for item in items {
                walk(Node::Expr(item), visit);
            }
        }
        Expr::Function { args, .. } => {
            for arg in args {
                walk(Node::Expr(arg), visit);
            }
        }
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => walk(Node::Query(query), visit),
    }
}

/// Whether the node opens a nested query scope
pub fn is_subquery(node: Node<'_>) -> bool {
    matches!(
        node,
        Node::Expr(Expr::Subquery(_))
            | Node::Expr(Expr::Exists { .. })
            | Node::Expr(Expr::InSubquery { .. })
            | Node::TableRef(TableRef::Derived { .. })
    )
}
