use super::*;
use crate::error::AdvisorError;

fn parse_one(sql: &str) -> Statement {
    let mut statements = parse_statements(sql).expect("statement should parse");
    assert_eq!(statements.len(), 1);
    statements.remove(0)
}

fn select_of(statement: &Statement) -> &Select {
    match statement {
        Statement::Query(Query {
            body: SetExpr::Select(select),
            ..
        }) => select,
        other => panic!("expected a plain select, got {:?}", other),
    }
}

#[test]
fn test_empty_input_is_invalid() {
    let err = parse_statements("   ").unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput { .. }));
}

#[test]
fn test_syntax_error_is_reported() {
    let err = parse_statements("SELEC * FORM t").unwrap_err();
    assert!(matches!(err, AdvisorError::Parse { .. }));
}

#[test]
fn test_where_comparison_is_lowered() {
    let statement = parse_one("SELECT * FROM t WHERE a = 1");
    let select = select_of(&statement);
    match select.selection.as_ref().unwrap() {
        Expr::Compare { op, left, right } => {
            assert_eq!(*op, CompareOp::Eq);
            assert_eq!(left.as_column(), Some(&ColumnRef::new("a")));
            assert_eq!(**right, Expr::Literal(Literal::Number("1".to_string())));
        }
        other => panic!("unexpected selection {:?}", other),
    }
}

#[test]
fn test_null_safe_equal_and_is_true() {
    let statement = parse_one("SELECT * FROM t WHERE a <=> 1 AND b IS TRUE");
    let select = select_of(&statement);
    match select.selection.as_ref().unwrap() {
        Expr::And(left, right) => {
            assert!(matches!(**left, Expr::Compare { op: CompareOp::NullSafeEq, .. }));
            assert!(matches!(**right, Expr::Is { test: IsTest::True, .. }));
        }
        other => panic!("unexpected selection {:?}", other),
    }
}

#[test]
fn test_qualified_columns_and_aliases() {
    let statement = parse_one("SELECT o.id FROM shop.orders AS o WHERE o.status = 'open'");
    let select = select_of(&statement);
    assert_eq!(
        select.from[0],
        TableRef::Table {
            name: TableName::new("shop", "orders"),
            alias: Some("o".to_string()),
        }
    );
    match select.selection.as_ref().unwrap() {
        Expr::Compare { left, .. } => {
            assert_eq!(left.as_column(), Some(&ColumnRef::qualified("o", "status")));
        }
        other => panic!("unexpected selection {:?}", other),
    }
}

#[test]
fn test_join_chain_is_left_deep() {
    let statement = parse_one("SELECT * FROM a JOIN b ON a.x = b.x JOIN c ON b.y = c.y");
    let select = select_of(&statement);
    let outer = match &select.from[0] {
        TableRef::Join(join) => join,
        other => panic!("expected join, got {:?}", other),
    };
    assert!(matches!(outer.right, TableRef::Table { ref name, .. } if name.table == "c"));
    assert!(matches!(outer.condition, JoinCondition::On(_)));
    match &outer.left {
        TableRef::Join(inner) => {
            assert!(matches!(inner.left, TableRef::Table { ref name, .. } if name.table == "a"));
            assert!(matches!(inner.right, TableRef::Table { ref name, .. } if name.table == "b"));
        }
        other => panic!("expected nested join, got {:?}", other),
    }
}

#[test]
fn test_join_using_columns() {
    let statement = parse_one("SELECT * FROM a LEFT JOIN b USING (id, kind)");
    let select = select_of(&statement);
    match &select.from[0] {
        TableRef::Join(join) => {
            assert_eq!(
                join.condition,
                JoinCondition::Using(vec!["id".to_string(), "kind".to_string()])
            );
        }
        other => panic!("expected join, got {:?}", other),
    }
}

#[test]
fn test_order_by_direction() {
    let statement = parse_one("SELECT * FROM t ORDER BY a, b DESC, c ASC");
    match statement {
        Statement::Query(query) => {
            let directions: Vec<bool> = query.order_by.iter().map(|item| item.descending).collect();
            assert_eq!(directions, vec![false, true, false]);
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_group_by_and_function_arguments() {
    let statement = parse_one("SELECT a, COUNT(*) FROM t WHERE LOWER(name) = 'x' GROUP BY a, b + 1");
    let select = select_of(&statement);
    assert_eq!(select.group_by.len(), 2);
    assert_eq!(select.group_by[0], Expr::Column(ColumnRef::new("a")));
    assert!(matches!(select.group_by[1], Expr::Arithmetic(_)));
    match select.selection.as_ref().unwrap() {
        Expr::Compare { left, .. } => match &**left {
            Expr::Function { name, args } => {
                assert_eq!(name, "lower");
                assert_eq!(args, &vec![Expr::Column(ColumnRef::new("name"))]);
            }
            other => panic!("expected function, got {:?}", other),
        },
        other => panic!("unexpected selection {:?}", other),
    }
}

#[test]
fn test_update_and_delete_targets() {
    match parse_one("UPDATE orders SET status = 'done' WHERE id = 3") {
        Statement::Update { tables, selection } => {
            assert_eq!(tables.len(), 1);
            assert!(selection.is_some());
        }
        other => panic!("unexpected statement {:?}", other),
    }

    match parse_one("DELETE FROM orders WHERE id IN (SELECT order_id FROM refunds)") {
        Statement::Delete { tables, selection } => {
            assert_eq!(
                tables,
                vec![TableRef::Table {
                    name: TableName::new("", "orders"),
                    alias: None,
                }]
            );
            assert!(matches!(selection, Some(Expr::InSubquery { .. })));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_multi_table_delete_keeps_aliases_and_joins() {
    match parse_one("DELETE o FROM orders o JOIN users u ON o.customer_id = u.id WHERE o.status = 'void'") {
        Statement::Delete { tables, selection } => {
            assert_eq!(tables.len(), 1);
            match &tables[0] {
                TableRef::Join(join) => {
                    assert_eq!(
                        join.left,
                        TableRef::Table {
                            name: TableName::new("", "orders"),
                            alias: Some("o".to_string()),
                        }
                    );
                    assert!(matches!(join.condition, JoinCondition::On(_)));
                }
                other => panic!("expected join, got {:?}", other),
            }
            assert!(selection.is_some());
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_function_arguments_keep_subqueries_whole() {
    let statement = parse_one("SELECT * FROM t1 WHERE COALESCE((SELECT max(b) FROM t2 WHERE t2.c = 1), 0) = 1");
    match &select_of(&statement).selection {
        Some(Expr::Compare { left, .. }) => match left.as_ref() {
            Expr::Function { name, args } => {
                assert_eq!(name, "coalesce");
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], Expr::Subquery(_)));
                assert!(matches!(args[1], Expr::Literal(_)));
            }
            other => panic!("expected function, got {:?}", other),
        },
        other => panic!("unexpected selection {:?}", other),
    }
}

#[test]
fn test_insert_select_keeps_source() {
    match parse_one("INSERT INTO archive SELECT * FROM orders WHERE status = 'done'") {
        Statement::Insert { table, source } => {
            assert_eq!(table, TableName::new("", "archive"));
            assert!(source.is_some());
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_ddl_statements() {
    assert!(matches!(
        parse_one("CREATE TABLE t (id INT PRIMARY KEY)"),
        Statement::Ddl { .. }
    ));
    assert!(matches!(
        parse_one("CREATE INDEX idx_a ON t (a)"),
        Statement::Ddl { .. }
    ));
}

#[test]
fn test_walk_can_skip_subqueries() {
    let statement = parse_one("SELECT * FROM t WHERE a = 1 AND b IN (SELECT c FROM u WHERE d = 2)");
    let mut all = 0;
    walk(Node::Statement(&statement), &mut |node| {
        if let Node::Expr(Expr::Column(_)) = node {
            all += 1;
        }
        true
    });
    let mut outer = 0;
    walk(Node::Statement(&statement), &mut |node| {
        if is_subquery(node) {
            if let Node::Expr(Expr::InSubquery { expr, .. }) = node {
                if expr.as_column().is_some() {
                    outer += 1;
                }
            }
            return false;
        }
        if let Node::Expr(Expr::Column(_)) = node {
            outer += 1;
        }
        true
    });
    assert_eq!(all, 4);
    assert_eq!(outer, 2);
}
