use std::ops::ControlFlow;

use sqlparser::ast as sql;
use sqlparser::ast::{Visit, Visitor};

use super::ast::{
    ColumnRef, CompareOp, Expr, IsTest, Join, JoinCondition, Literal, OrderItem, Query, Select, SetExpr,
    Statement, TableName, TableRef,
};

pub fn lower_statement(statement: &sql::Statement) -> Statement {
    match statement {
        sql::Statement::Query(query) => Statement::Query(lower_query(query)),
        sql::Statement::Insert {
            table_name, source, ..
        } => Statement::Insert {
            table: lower_object_name(table_name),
            source: Some(lower_query(source)),
        },
        sql::Statement::Update {
            table,
            from,
            selection,
            ..
        } => {
            let mut tables = vec![lower_table_with_joins(table)];
            if let Some(from) = from {
                tables.push(lower_table_with_joins(from));
            }
            Statement::Update {
                tables,
                selection: selection.as_ref().map(lower_expr),
            }
        }
        sql::Statement::Delete {
            tables: targets,
            from,
            using,
            selection,
            ..
        } => {
            // multi-table DELETE names its targets by alias, the FROM list binds them
            let mut tables: Vec<TableRef> = from.iter().map(lower_table_with_joins).collect();
            tables.extend(using.iter().flatten().map(lower_table_with_joins));
            if tables.is_empty() {
                tables = targets
                    .iter()
                    .map(|name| TableRef::Table {
                        name: lower_object_name(name),
                        alias: None,
                    })
                    .collect();
            }
            Statement::Delete {
                tables,
                selection: selection.as_ref().map(lower_expr),
            }
        }
        sql::Statement::CreateTable { name, .. } | sql::Statement::AlterTable { name, .. } => Statement::Ddl {
            tables: vec![lower_object_name(name)],
        },
        sql::Statement::CreateIndex { table_name, .. } => Statement::Ddl {
            tables: vec![lower_object_name(table_name)],
        },
        sql::Statement::Drop { names, .. } => Statement::Ddl {
            tables: names.iter().map(lower_object_name).collect(),
        },
        _ => Statement::Other,
    }
}

pub fn lower_query(query: &sql::Query) -> Query {
    Query {
        body: lower_set_expr(&query.body),
        order_by: query
            .order_by
            .iter()
            .map(|item| OrderItem {
                expr: lower_expr(&item.expr),
                descending: item.asc == Some(false),
            })
            .collect(),
    }
}

fn lower_set_expr(set_expr: &sql::SetExpr) -> SetExpr {
    match set_expr {
        sql::SetExpr::Select(select) => SetExpr::Select(Box::new(lower_select(select))),
        sql::SetExpr::Query(query) => SetExpr::Query(Box::new(lower_query(query))),
        sql::SetExpr::SetOperation { left, right, .. } => SetExpr::SetOperation {
            left: Box::new(lower_set_expr(left)),
            right: Box::new(lower_set_expr(right)),
        },
        _ => SetExpr::Other,
    }
}

fn lower_select(select: &sql::Select) -> Select {
    Select {
        projection: top_level_exprs(&select.projection),
        from: select.from.iter().map(lower_table_with_joins).collect(),
        selection: select.selection.as_ref().map(lower_expr),
        group_by: top_level_exprs(&select.group_by),
        having: select.having.as_ref().map(lower_expr),
    }
}

fn lower_table_with_joins(table: &sql::TableWithJoins) -> TableRef {
    table
        .joins
        .iter()
        .fold(lower_table_factor(&table.relation), |left, join| {
            TableRef::Join(Box::new(Join {
                left,
                right: lower_table_factor(&join.relation),
                condition: lower_join_operator(&join.join_operator),
            }))
        })
}

fn lower_table_factor(factor: &sql::TableFactor) -> TableRef {
    match factor {
        sql::TableFactor::Table { name, alias, .. } => TableRef::Table {
            name: lower_object_name(name),
            alias: alias.as_ref().map(|alias| alias.name.value.clone()),
        },
        sql::TableFactor::Derived { subquery, alias, .. } => TableRef::Derived {
            query: Box::new(lower_query(subquery)),
            alias: alias.as_ref().map(|alias| alias.name.value.clone()),
        },
        sql::TableFactor::NestedJoin { table_with_joins, .. } => lower_table_with_joins(table_with_joins),
        _ => TableRef::Other,
    }
}

fn lower_join_operator(operator: &sql::JoinOperator) -> JoinCondition {
    let constraint = match operator {
        sql::JoinOperator::Inner(constraint)
        | sql::JoinOperator::LeftOuter(constraint)
        | sql::JoinOperator::RightOuter(constraint)
        | sql::JoinOperator::FullOuter(constraint) => constraint,
        _ => return JoinCondition::None,
    };

    match constraint {
        sql::JoinConstraint::On(expr) => JoinCondition::On(lower_expr(expr)),
        sql::JoinConstraint::Using(idents) => {
            JoinCondition::Using(idents.iter().map(|ident| ident.value.clone()).collect())
        }
        sql::JoinConstraint::Natural => JoinCondition::Natural,
        sql::JoinConstraint::None => JoinCondition::None,
    }
}

fn lower_object_name(name: &sql::ObjectName) -> TableName {
    let parts: Vec<&str> = name.0.iter().map(|ident| ident.value.as_str()).collect();
    match parts.as_slice() {
        [table] => TableName::new("", *table),
        [.., database, table] => TableName::new(*database, *table),
        [] => TableName::default(),
    }
}

pub fn lower_expr(expr: &sql::Expr) -> Expr {
    match expr {
        sql::Expr::Identifier(ident) => Expr::Column(ColumnRef::new(ident.value.clone())),
        sql::Expr::CompoundIdentifier(parts) => lower_compound_identifier(parts),
        sql::Expr::Value(value) => Expr::Literal(lower_value(value)),
        sql::Expr::Nested(inner) => Expr::Nested(Box::new(lower_expr(inner))),
        sql::Expr::Tuple(items) => Expr::Tuple(items.iter().map(lower_expr).collect()),
        sql::Expr::BinaryOp { left, op, right } => lower_binary_op(left, op, right),
        sql::Expr::UnaryOp {
            op: sql::UnaryOperator::Not,
            expr,
        } => Expr::Not(Box::new(lower_expr(expr))),
        sql::Expr::UnaryOp { expr, .. } => Expr::Arithmetic(vec![lower_expr(expr)]),
        sql::Expr::IsNull(inner) => is_test(IsTest::Null, inner),
        sql::Expr::IsNotNull(inner) => is_test(IsTest::NotNull, inner),
        sql::Expr::IsTrue(inner) => is_test(IsTest::True, inner),
        sql::Expr::IsNotTrue(inner) => is_test(IsTest::NotTrue, inner),
        sql::Expr::IsFalse(inner) => is_test(IsTest::False, inner),
        sql::Expr::IsNotFalse(inner) => is_test(IsTest::NotFalse, inner),
        sql::Expr::IsNotDistinctFrom(left, right) => Expr::Compare {
            op: CompareOp::NullSafeEq,
            left: Box::new(lower_expr(left)),
            right: Box::new(lower_expr(right)),
        },
        sql::Expr::InList { expr, list, negated } => Expr::InList {
            expr: Box::new(lower_expr(expr)),
            list: list.iter().map(lower_expr).collect(),
            negated: *negated,
        },
        sql::Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Expr::InSubquery {
            expr: Box::new(lower_expr(expr)),
            subquery: Box::new(lower_query(subquery)),
            negated: *negated,
        },
        sql::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Expr::Between {
            expr: Box::new(lower_expr(expr)),
            low: Box::new(lower_expr(low)),
            high: Box::new(lower_expr(high)),
            negated: *negated,
        },
        sql::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => Expr::Like {
            expr: Box::new(lower_expr(expr)),
            pattern: Box::new(lower_expr(pattern)),
            negated: *negated,
        },
        sql::Expr::Subquery(query) => Expr::Subquery(Box::new(lower_query(query))),
        sql::Expr::Exists { subquery, negated } => Expr::Exists {
            subquery: Box::new(lower_query(subquery)),
            negated: *negated,
        },
        sql::Expr::Function(function) => Expr::Function {
            name: function.name.to_string().to_lowercase(),
            args: child_exprs(expr),
        },
        // CAST, CASE, EXTRACT and friends keep their operands only
        _ => Expr::Opaque(child_exprs(expr)),
    }
}

fn lower_compound_identifier(parts: &[sql::Ident]) -> Expr {
    let names: Vec<&str> = parts.iter().map(|ident| ident.value.as_str()).collect();
    let column = match names.as_slice() {
        [name] => ColumnRef::new(*name),
        [table, name] => ColumnRef::qualified(*table, *name),
        [.., database, table, name] => ColumnRef {
            database: database.to_string(),
            table: table.to_string(),
            name: name.to_string(),
        },
        [] => return Expr::Opaque(Vec::new()),
    };
    Expr::Column(column)
}

fn lower_binary_op(left: &sql::Expr, op: &sql::BinaryOperator, right: &sql::Expr) -> Expr {
    let compare = |op: CompareOp| Expr::Compare {
        op,
        left: Box::new(lower_expr(left)),
        right: Box::new(lower_expr(right)),
    };

    match op {
        sql::BinaryOperator::Eq => compare(CompareOp::Eq),
        sql::BinaryOperator::Spaceship => compare(CompareOp::NullSafeEq),
        sql::BinaryOperator::NotEq => compare(CompareOp::NotEq),
        sql::BinaryOperator::Lt => compare(CompareOp::Lt),
        sql::BinaryOperator::LtEq => compare(CompareOp::LtEq),
        sql::BinaryOperator::Gt => compare(CompareOp::Gt),
        sql::BinaryOperator::GtEq => compare(CompareOp::GtEq),
        sql::BinaryOperator::And => Expr::And(Box::new(lower_expr(left)), Box::new(lower_expr(right))),
        sql::BinaryOperator::Or => Expr::Or(Box::new(lower_expr(left)), Box::new(lower_expr(right))),
        sql::BinaryOperator::Plus
        | sql::BinaryOperator::Minus
        | sql::BinaryOperator::Multiply
        | sql::BinaryOperator::Divide
        | sql::BinaryOperator::Modulo
        | sql::BinaryOperator::StringConcat
        | sql::BinaryOperator::BitwiseOr
        | sql::BinaryOperator::BitwiseAnd
        | sql::BinaryOperator::BitwiseXor => Expr::Arithmetic(vec![lower_expr(left), lower_expr(right)]),
        _ => Expr::Opaque(vec![lower_expr(left), lower_expr(right)]),
    }
}

fn is_test(test: IsTest, inner: &sql::Expr) -> Expr {
    Expr::Is {
        test,
        expr: Box::new(lower_expr(inner)),
    }
}

fn lower_value(value: &sql::Value) -> Literal {
    match value {
        sql::Value::Number(number, _) => Literal::Number(number.to_string()),
        sql::Value::SingleQuotedString(text) | sql::Value::DoubleQuotedString(text) => {
            Literal::String(text.clone())
        }
        sql::Value::Boolean(value) => Literal::Boolean(*value),
        sql::Value::Null => Literal::Null,
        sql::Value::Placeholder(placeholder) => Literal::Placeholder(placeholder.clone()),
        other => Literal::Other(other.to_string()),
    }
}

/// Lowered direct children of `expr`
fn child_exprs(expr: &sql::Expr) -> Vec<Expr> {
    let mut collector = ExprCollector::at_depth(1);
    let _ = expr.visit(&mut collector);
    collector.exprs
}

/// Lowered outermost expressions of any visitable node (GROUP BY lists, projections)
fn top_level_exprs<T: Visit>(node: &T) -> Vec<Expr> {
    let mut collector = ExprCollector::at_depth(0);
    let _ = node.visit(&mut collector);
    collector.exprs
}

/// Collects expressions found at one nesting depth. Nested queries are kept whole as
/// [`Expr::Subquery`] instead of being searched.
struct ExprCollector {
    target: usize,
    depth: usize,
    query_depth: usize,
    exprs: Vec<Expr>,
}

impl ExprCollector {
    fn at_depth(target: usize) -> Self {
        Self {
            target,
            depth: 0,
            query_depth: 0,
            exprs: Vec::new(),
        }
    }
}

fn opens_query(expr: &sql::Expr) -> bool {
    matches!(
        expr,
        sql::Expr::Subquery(_) | sql::Expr::Exists { .. } | sql::Expr::InSubquery { .. }
    )
}

impl Visitor for ExprCollector {
    type Break = ();

    fn pre_visit_table_factor(&mut self, factor: &sql::TableFactor) -> ControlFlow<Self::Break> {
        if matches!(factor, sql::TableFactor::Derived { .. }) {
            self.query_depth += 1;
        }
        ControlFlow::Continue(())
    }

    fn post_visit_table_factor(&mut self, factor: &sql::TableFactor) -> ControlFlow<Self::Break> {
        if matches!(factor, sql::TableFactor::Derived { .. }) {
            self.query_depth -= 1;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &sql::Expr) -> ControlFlow<Self::Break> {
        if self.query_depth == 0 && self.depth == self.target {
            self.exprs.push(lower_expr(expr));
        }
        if opens_query(expr) {
            self.query_depth += 1;
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &sql::Expr) -> ControlFlow<Self::Break> {
        if opens_query(expr) {
            self.query_depth -= 1;
        }
        self.depth -= 1;
        ControlFlow::Continue(())
    }
}
