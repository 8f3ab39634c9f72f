//! Closed statement tree consumed by the index advisor.
//!
//! Only the shapes that matter for index advice are modelled precisely. Anything
//! else is kept as [`Expr::Opaque`] or [`Expr::Function`] so the columns it
//! references still count as "used in WHERE".

/// `database.table`, database empty when unqualified
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName {
    pub database: String,
    pub table: String,
}

impl TableName {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(Query),
    Update {
        tables: Vec<TableRef>,
        selection: Option<Expr>,
    },
    Delete {
        tables: Vec<TableRef>,
        selection: Option<Expr>,
    },
    Insert {
        table: TableName,
        source: Option<Query>,
    },
    /// CREATE/ALTER/DROP TABLE and CREATE INDEX
    Ddl { tables: Vec<TableName> },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub body: SetExpr,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<Select>),
    Query(Box<Query>),
    SetOperation { left: Box<SetExpr>, right: Box<SetExpr> },
    Other,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub projection: Vec<Expr>,
    pub from: Vec<TableRef>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table { name: TableName, alias: Option<String> },
    Derived { query: Box<Query>, alias: Option<String> },
    Join(Box<Join>),
    Other,
}

/// One binary join node; chains are folded left-deep
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: TableRef,
    pub right: TableRef,
    pub condition: JoinCondition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expr),
    Using(Vec<String>),
    Natural,
    None,
}

/// Column reference with optional `database.` and `table.` qualifiers (empty when absent)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRef {
    pub database: String,
    pub table: String,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(String),
    Boolean(bool),
    Null,
    Placeholder(String),
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NullSafeEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsTest {
    True,
    NotTrue,
    False,
    NotFalse,
    Null,
    NotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Literal),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Is {
        test: IsTest,
        expr: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Operands of `+ - * / % ||` and bitwise operators
    Arithmetic(Vec<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Subquery(Box<Query>),
    Exists {
        subquery: Box<Query>,
        negated: bool,
    },
    Tuple(Vec<Expr>),
    Nested(Box<Expr>),
    /// Unmodelled expression, keeps the sub-expressions it was built from
    Opaque(Vec<Expr>),
}

impl Expr {
    /// Strip redundant parentheses
    pub fn unnested(&self) -> &Expr {
        match self {
            Expr::Nested(inner) => inner.unnested(),
            other => other,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self.unnested() {
            Expr::Column(column) => Some(column),
            _ => None,
        }
    }
}
