//! Query descriptors consumed by the query grammar.
//!
//! These are deliberately thin: a table reference, a predicate list, joins
//! and paging. The grammar only reads them.
use crate::value::{Record, Value};

/// Table reference in a FROM clause or a mutation target.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// An identifier, optionally `name as alias`.
    Name(String),
    /// An opaque expression passed through unmodified.
    Raw(String),
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::Name(name.to_string())
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::Name(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

impl Boolean {
    pub fn keyword(&self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    ILike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op value`
    Basic {
        column: String,
        operator: Operator,
        value: Value,
    },
    /// `first op second`, both columns.
    Column {
        first: String,
        operator: Operator,
        second: String,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// Raw SQL with `?` placeholders.
    Raw { sql: String, bindings: Vec<Value> },
    /// Parenthesized group.
    Nested(Vec<Where>),
}

/// A predicate and the connector joining it to the one before.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    pub boolean: Boolean,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner join",
            JoinKind::Left => "left join",
            JoinKind::Right => "right join",
            JoinKind::Full => "full join",
            JoinKind::Cross => "cross join",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Vec<Where>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub from: TableRef,
    /// Selected columns; empty means `*`.
    pub columns: Vec<String>,
    pub wheres: Vec<Where>,
    pub joins: Vec<Join>,
    pub orders: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn table(table: impl Into<TableRef>) -> Self {
        Self {
            from: table.into(),
            columns: Vec::new(),
            wheres: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Self::table(TableRef::Raw(expression.into()))
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    fn push(mut self, boolean: Boolean, predicate: Predicate) -> Self {
        self.wheres.push(Where { boolean, predicate });
        self
    }

    pub fn where_op(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.push(
            Boolean::And,
            Predicate::Basic {
                column: column.to_string(),
                operator,
                value: value.into(),
            },
        )
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    pub fn or_where(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.push(
            Boolean::Or,
            Predicate::Basic {
                column: column.to_string(),
                operator,
                value: value.into(),
            },
        )
    }

    pub fn where_in<V: Into<Value>>(self, column: &str, values: Vec<V>) -> Self {
        self.push(
            Boolean::And,
            Predicate::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated: false,
            },
        )
    }

    pub fn where_not_in<V: Into<Value>>(self, column: &str, values: Vec<V>) -> Self {
        self.push(
            Boolean::And,
            Predicate::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated: true,
            },
        )
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push(
            Boolean::And,
            Predicate::Null {
                column: column.to_string(),
                negated: false,
            },
        )
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push(
            Boolean::And,
            Predicate::Null {
                column: column.to_string(),
                negated: true,
            },
        )
    }

    pub fn where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(
            Boolean::And,
            Predicate::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
                negated: false,
            },
        )
    }

    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push(
            Boolean::And,
            Predicate::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    pub fn where_nested(self, boolean: Boolean, wheres: Vec<Where>) -> Self {
        self.push(boolean, Predicate::Nested(wheres))
    }

    pub fn join(mut self, table: impl Into<TableRef>, first: &str, operator: Operator, second: &str) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: table.into(),
            on: vec![Where {
                boolean: Boolean::And,
                predicate: Predicate::Column {
                    first: first.to_string(),
                    operator,
                    second: second.to_string(),
                },
            }],
        });
        self
    }

    pub fn join_with(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Rows handed to an insert: one flat record or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValues {
    One(Record),
    Many(Vec<Record>),
}

impl InsertValues {
    /// Every insert is treated as a batch.
    pub fn into_batch(self) -> Vec<Record> {
        match self {
            InsertValues::One(record) if record.is_empty() => Vec::new(),
            InsertValues::One(record) => vec![record],
            InsertValues::Many(records) => records,
        }
    }
}

impl From<Record> for InsertValues {
    fn from(record: Record) -> Self {
        InsertValues::One(record)
    }
}

impl From<Vec<Record>> for InsertValues {
    fn from(records: Vec<Record>) -> Self {
        InsertValues::Many(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_wheres() {
        let q = Query::table("events")
            .where_eq("a", 1)
            .or_where("b", Operator::Gt, 2)
            .where_null("c")
            .limit(5);
        assert_eq!(q.wheres.len(), 3);
        assert_eq!(q.wheres[1].boolean, Boolean::Or);
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn test_single_record_becomes_batch() {
        let values: InsertValues = Record::new().with("a", 1).into();
        assert_eq!(values.into_batch().len(), 1);
        let empty: InsertValues = Record::new().into();
        assert!(empty.into_batch().is_empty());
    }
}
