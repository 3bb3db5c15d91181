//! SQL rendering
//!
//! Values always travel as bind parameters except `NULL`, which is rendered
//! as a literal so untyped nulls never reach the driver. Identifiers are quoted
//! per dialect; callers validate them beforehand.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::query::{Predicate, Query};
use crate::repository::{FilterCondition, FilterOperator, Order};
use crate::value::{Record, Value};

/// SQL flavour to render for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// `$1` placeholders, `"ident"` quoting, `RETURNING` on inserts
    #[default]
    Postgres,
    /// `?` placeholders, backtick quoting
    MySql,
    /// `?` placeholders, `"ident"` quoting, `RETURNING` on inserts
    Sqlite,
}

impl Dialect {
    fn quote_char(&self) -> char {
        match self {
            Self::MySql => '`',
            Self::Postgres | Self::Sqlite => '"',
        }
    }

    /// Quote a possibly dotted identifier
    pub fn quote(&self, ident: &str) -> String {
        let q = self.quote_char();
        ident
            .split('.')
            .map(|part| format!("{q}{part}{q}"))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    fn supports_returning(&self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }
}

/// Parameterized SQL text plus its bind values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub binds: Vec<Value>,
    pub dialect: Dialect,
}

impl RenderedSql {
    /// SQL with bind values substituted, for human-readable traces only
    pub fn interpolated(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.chars().peekable();
        let mut next_positional = 0;

        while let Some(c) = chars.next() {
            match (self.dialect, c) {
                (Dialect::Postgres, '$') if chars.peek().is_some_and(|d| d.is_ascii_digit()) => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                    }
                    match digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| self.binds.get(n.wrapping_sub(1)))
                    {
                        Some(value) => out.push_str(&literal(value)),
                        None => {
                            out.push('$');
                            out.push_str(&digits);
                        }
                    }
                }
                (Dialect::MySql | Dialect::Sqlite, '?') => {
                    match self.binds.get(next_positional) {
                        Some(value) => out.push_str(&literal(value)),
                        None => out.push('?'),
                    }
                    next_positional += 1;
                }
                _ => out.push(c),
            }
        }
        out
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Timestamp(ts) => format!("'{}'", ts.to_rfc3339()),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

struct Renderer {
    dialect: Dialect,
    sql: String,
    binds: Vec<Value>,
}

impl Renderer {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn push_ident(&mut self, ident: &str) {
        let quoted = self.dialect.quote(ident);
        self.sql.push_str(&quoted);
    }

    fn push_value(&mut self, value: &Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.binds.push(value.clone());
        let placeholder = self.dialect.placeholder(self.binds.len());
        self.sql.push_str(&placeholder);
    }

    fn push_where(&mut self, predicates: &[Predicate]) {
        for (i, predicate) in predicates.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Compare(condition) => self.push_condition(condition),
                Predicate::In { field, values } => {
                    if values.is_empty() {
                        self.push("1 = 0");
                        continue;
                    }
                    self.push_ident(field);
                    self.push(" IN (");
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            self.push(", ");
                        }
                        self.push_value(value);
                    }
                    self.push(")");
                }
            }
        }
    }

    fn push_condition(&mut self, condition: &FilterCondition) {
        self.push_ident(&condition.field);
        let op = match condition.operator {
            FilterOperator::IsNull => {
                self.push(" IS NULL");
                return;
            }
            FilterOperator::IsNotNull => {
                self.push(" IS NOT NULL");
                return;
            }
            FilterOperator::Equal => " = ",
            FilterOperator::NotEqual => " <> ",
            FilterOperator::GreaterThan => " > ",
            FilterOperator::GreaterThanOrEqual => " >= ",
            FilterOperator::LessThan => " < ",
            FilterOperator::LessThanOrEqual => " <= ",
            FilterOperator::Like => " LIKE ",
        };
        self.push(op);
        self.push_value(&condition.value);
    }

    fn push_order(&mut self, order: &[Order]) {
        for (i, o) in order.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            self.push_ident(&o.field);
            self.push(" ");
            self.push(o.direction.as_sql());
        }
    }

    fn push_insert(&mut self, table: &str, rows: &[Record], returning: Option<&str>) {
        let columns: BTreeSet<&str> = rows.iter().flat_map(Record::columns).collect();

        self.push("INSERT INTO ");
        self.push_ident(table);
        self.push(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_ident(column);
        }
        self.push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push("(");
            for (j, column) in columns.iter().enumerate() {
                if j > 0 {
                    self.push(", ");
                }
                match row.get(column) {
                    Some(value) => self.push_value(value),
                    None => self.push("DEFAULT"),
                }
            }
            self.push(")");
        }
        if let Some(column) = returning.filter(|_| self.dialect.supports_returning()) {
            self.push(" RETURNING ");
            self.push_ident(column);
        }
    }

    fn finish(self) -> RenderedSql {
        RenderedSql {
            sql: self.sql,
            binds: self.binds,
            dialect: self.dialect,
        }
    }
}

/// Render a statement for `dialect`
pub fn render(query: &Query, dialect: Dialect) -> RenderedSql {
    let mut r = Renderer::new(dialect);
    match query {
        Query::Select {
            table,
            predicates,
            order,
            limit,
            offset,
        } => {
            r.push("SELECT * FROM ");
            r.push_ident(table);
            r.push_where(predicates);
            r.push_order(order);
            if let Some(limit) = limit {
                let _ = write!(r.sql, " LIMIT {}", limit);
            }
            if let Some(offset) = offset {
                let _ = write!(r.sql, " OFFSET {}", offset);
            }
        }
        Query::Count { table, predicates } => {
            r.push("SELECT COUNT(*) AS total FROM ");
            r.push_ident(table);
            r.push_where(predicates);
        }
        Query::Insert {
            table,
            rows,
            returning,
        } => r.push_insert(table, rows, returning.as_deref()),
        Query::Update {
            table,
            predicates,
            assignments,
        } => {
            r.push("UPDATE ");
            r.push_ident(table);
            r.push(" SET ");
            for (i, (column, value)) in assignments.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                r.push_ident(column);
                r.push(" = ");
                r.push_value(value);
            }
            r.push_where(predicates);
        }
    }
    r.finish()
}
