//! Statement construction
//!
//! [`Query`] is a small statement tree covering exactly what repositories
//! issue: filtered selects, counts, inserts and updates against one table.
//! Stores either render it to parameterized SQL ([`sql::render`]) or evaluate
//! it directly.
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::query::{sql, Dialect, Query};
//! use filtered_repository::repository::OrderDirection;
//!
//! let query = Query::select("users")
//!     .where_eq("deleted", false)
//!     .where_in("eid", vec![1_i64.into(), 2_i64.into()])
//!     .order_by("eid", OrderDirection::Descending)
//!     .limit(10);
//!
//! let rendered = sql::render(&query, Dialect::Postgres);
//! assert_eq!(
//!     rendered.sql,
//!     r#"SELECT * FROM "users" WHERE "deleted" = $1 AND "eid" IN ($2, $3) ORDER BY "eid" DESC LIMIT 10"#
//! );
//! ```

pub mod hook;
pub mod sql;

pub use hook::{NoopQueryHook, QueryHook, TracingQueryHook};
pub use sql::{Dialect, RenderedSql};

use crate::repository::{FilterCondition, FilterOperator, Filters, Order, OrderDirection, Sort};
use crate::value::{Record, Value};

/// One WHERE-clause term
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field <op> value`
    Compare(FilterCondition),
    /// `field IN (values...)`
    In { field: String, values: Vec<Value> },
}

impl Predicate {
    /// Evaluate the predicate against a row
    ///
    /// Missing columns read as `Null`.
    pub fn matches(&self, row: &Record) -> bool {
        match self {
            Self::Compare(condition) => {
                let actual = row.get(&condition.field).unwrap_or(&Value::Null);
                compare(actual, condition.operator, &condition.value)
            }
            Self::In { field, values } => {
                let actual = row.get(field).unwrap_or(&Value::Null);
                values
                    .iter()
                    .any(|v| compare(actual, FilterOperator::Equal, v))
            }
        }
    }
}

fn compare(actual: &Value, operator: FilterOperator, expected: &Value) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};

    match operator {
        FilterOperator::IsNull => actual.is_null(),
        FilterOperator::IsNotNull => !actual.is_null(),
        FilterOperator::Like => match (actual, expected) {
            (Value::Text(text), Value::Text(pattern)) => like_matches(text, pattern),
            _ => false,
        },
        FilterOperator::Equal => actual.compare(expected) == Some(Equal),
        FilterOperator::NotEqual => matches!(actual.compare(expected), Some(Less | Greater)),
        FilterOperator::GreaterThan => actual.compare(expected) == Some(Greater),
        FilterOperator::GreaterThanOrEqual => {
            matches!(actual.compare(expected), Some(Greater | Equal))
        }
        FilterOperator::LessThan => actual.compare(expected) == Some(Less),
        FilterOperator::LessThanOrEqual => matches!(actual.compare(expected), Some(Less | Equal)),
    }
}

/// SQL LIKE matching with `%` and `_` wildcards
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Greedy wildcard matching with backtracking to the last `%`.
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Statement tree for a single table
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select {
        table: String,
        predicates: Vec<Predicate>,
        order: Vec<Order>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Count {
        table: String,
        predicates: Vec<Predicate>,
    },
    Insert {
        table: String,
        rows: Vec<Record>,
        /// Column whose generated value is reported back
        returning: Option<String>,
    },
    Update {
        table: String,
        predicates: Vec<Predicate>,
        assignments: Record,
    },
}

impl Query {
    /// `SELECT * FROM table`
    pub fn select(table: impl Into<String>) -> Self {
        Self::Select {
            table: table.into(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// `SELECT COUNT(*) AS total FROM table`
    pub fn count(table: impl Into<String>) -> Self {
        Self::Count {
            table: table.into(),
            predicates: Vec::new(),
        }
    }

    /// `INSERT INTO table ... VALUES ...`
    pub fn insert(table: impl Into<String>, rows: Vec<Record>) -> Self {
        Self::Insert {
            table: table.into(),
            rows,
            returning: None,
        }
    }

    /// `UPDATE table SET ...`
    pub fn update(table: impl Into<String>, assignments: Record) -> Self {
        Self::Update {
            table: table.into(),
            predicates: Vec::new(),
            assignments,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Select { table, .. }
            | Self::Count { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. } => table,
        }
    }

    /// WHERE-clause terms, empty for inserts
    pub fn predicates(&self) -> &[Predicate] {
        match self {
            Self::Select { predicates, .. }
            | Self::Count { predicates, .. }
            | Self::Update { predicates, .. } => predicates,
            Self::Insert { .. } => &[],
        }
    }

    fn predicates_mut(&mut self) -> Option<&mut Vec<Predicate>> {
        match self {
            Self::Select { predicates, .. }
            | Self::Count { predicates, .. }
            | Self::Update { predicates, .. } => Some(predicates),
            Self::Insert { .. } => None,
        }
    }

    /// Append a predicate; ignored on inserts
    #[must_use]
    pub fn and(mut self, predicate: Predicate) -> Self {
        if let Some(predicates) = self.predicates_mut() {
            predicates.push(predicate);
        }
        self
    }

    /// `WHERE field = value`
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOperator::Equal, value)
    }

    /// `WHERE field <op> value`
    #[must_use]
    pub fn filter(
        self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.and(Predicate::Compare(FilterCondition::new(
            field, operator, value,
        )))
    }

    /// Append every condition of a filter set, in order
    #[must_use]
    pub fn filters(self, filters: &Filters) -> Self {
        filters
            .iter()
            .cloned()
            .fold(self, |query, condition| query.and(Predicate::Compare(condition)))
    }

    /// `WHERE field IN (values...)`
    #[must_use]
    pub fn where_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.and(Predicate::In {
            field: field.into(),
            values,
        })
    }

    /// `ORDER BY field direction`; only affects selects
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        if let Self::Select { order, .. } = &mut self {
            order.push(Order {
                field: field.into(),
                direction,
            });
        }
        self
    }

    /// Append every term of a sort, in order
    #[must_use]
    pub fn sort(self, sort: Option<&Sort>) -> Self {
        match sort {
            Some(sort) => sort.orders().iter().fold(self, |query, o| {
                query.order_by(o.field.clone(), o.direction)
            }),
            None => self,
        }
    }

    #[must_use]
    pub fn limit(mut self, value: u64) -> Self {
        if let Self::Select { limit, .. } = &mut self {
            *limit = Some(value);
        }
        self
    }

    #[must_use]
    pub fn offset(mut self, value: u64) -> Self {
        if let Self::Select { offset, .. } = &mut self {
            *offset = Some(value);
        }
        self
    }

    /// Report the generated value of `column` from an insert
    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        if let Self::Insert { returning, .. } = &mut self {
            *returning = Some(column.into());
        }
        self
    }

    /// Returns `true` if a row satisfies every predicate
    pub fn matches(&self, row: &Record) -> bool {
        self.predicates().iter().all(|p| p.matches(row))
    }
}
