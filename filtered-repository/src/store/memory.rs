//! In-process store
//!
//! Evaluates statement trees directly against rows held in memory. Tables must
//! be created before use; each one auto-increments its integer primary key.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreResult};
use crate::error::{StoreError, StoreOperation};
use crate::query::{Dialect, Query};
use crate::repository::{Order, OrderDirection};
use crate::value::{Record, Value};

#[derive(Debug)]
struct Table {
    primary_key: String,
    next_id: i64,
    rows: Vec<Record>,
}

impl Table {
    fn new(primary_key: String) -> Self {
        Self {
            primary_key,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    fn has_key(&self, id: i64) -> bool {
        self.rows
            .iter()
            .any(|row| row.get_i64(&self.primary_key) == Some(id))
    }
}

/// Relational store backed by process memory
///
/// # Example
///
/// ```rust
/// use filtered_repository::query::Query;
/// use filtered_repository::store::{MemoryStore, Store};
/// use filtered_repository::value::Record;
///
/// # tokio::runtime::Builder::new_current_thread()
/// #     .build()
/// #     .unwrap()
/// #     .block_on(async {
/// let store = MemoryStore::new();
/// store.create_table("users", "eid").await;
///
/// let insert = Query::insert("users", vec![Record::new().with("name", "alice")])
///     .returning("eid");
/// assert_eq!(store.insert(&insert).await.unwrap(), Some(1));
/// assert_eq!(store.fetch_count(&Query::count("users")).await.unwrap(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table; an existing table of the same name is kept
    pub async fn create_table(&self, name: impl Into<String>, primary_key: impl Into<String>) {
        let mut tables = self.tables.write().await;
        tables
            .entry(name.into())
            .or_insert_with(|| Table::new(primary_key.into()));
    }

    /// Every stored row of `table`, soft-deleted ones included
    pub async fn dump(&self, table: &str) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().await;
        lookup(&tables, table, StoreOperation::Query).map(|t| t.rows.clone())
    }
}

fn lookup<'a>(
    tables: &'a HashMap<String, Table>,
    name: &str,
    operation: StoreOperation,
) -> StoreResult<&'a Table> {
    tables.get(name).ok_or_else(|| unknown_table(name, operation))
}

fn unknown_table(name: &str, operation: StoreOperation) -> StoreError {
    StoreError::query_failed(operation, format!("relation \"{}\" does not exist", name))
        .add_context(name.to_string())
}

fn unsupported(query: &Query, operation: StoreOperation) -> StoreError {
    StoreError::query_failed(operation, "statement kind not supported by this call")
        .add_context(query.table().to_string())
}

fn order_rows(rows: &mut [Record], order: &[Order]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for o in order {
            let left = a.get(&o.field).unwrap_or(&Value::Null);
            let right = b.get(&o.field).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                // NULLs sort last ascending, first descending
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ordering = match o.direction {
                OrderDirection::Ascending => ordering,
                OrderDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl Store for MemoryStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_rows(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let Query::Select {
            table,
            order,
            limit,
            offset,
            ..
        } = query
        else {
            return Err(unsupported(query, StoreOperation::Query));
        };

        let tables = self.tables.read().await;
        let source = lookup(&tables, table, StoreOperation::Query)?;

        let mut rows: Vec<Record> = source
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        order_rows(&mut rows, order);

        let skip = offset.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let take = limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        Ok(rows.into_iter().skip(skip).take(take).collect())
    }

    async fn fetch_count(&self, query: &Query) -> StoreResult<u64> {
        let Query::Count { table, .. } = query else {
            return Err(unsupported(query, StoreOperation::Query));
        };

        let tables = self.tables.read().await;
        let source = lookup(&tables, table, StoreOperation::Query)?;
        Ok(source.rows.iter().filter(|row| query.matches(row)).count() as u64)
    }

    async fn insert(&self, query: &Query) -> StoreResult<Option<i64>> {
        let Query::Insert {
            table,
            rows,
            returning,
        } = query
        else {
            return Err(unsupported(query, StoreOperation::Insert));
        };

        let mut tables = self.tables.write().await;
        let target = tables
            .get_mut(table.as_str())
            .ok_or_else(|| unknown_table(table, StoreOperation::Insert))?;

        // Validate every row before touching the table so a failed batch leaves no trace
        let mut next_id = target.next_id;
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            let id = match row.get(&target.primary_key).cloned() {
                None | Some(Value::Null) => {
                    let id = next_id;
                    row.insert(target.primary_key.clone(), id);
                    id
                }
                Some(Value::Integer(id)) => id,
                Some(other) => {
                    return Err(StoreError::type_conversion(format!(
                        "primary key \"{}\" must be an integer, got {}",
                        target.primary_key, other
                    ))
                    .with_operation(StoreOperation::Insert)
                    .add_context(table.clone()));
                }
            };
            let duplicate = target.has_key(id)
                || prepared
                    .iter()
                    .any(|r: &Record| r.get_i64(&target.primary_key) == Some(id));
            if duplicate {
                return Err(StoreError::constraint_violation(
                    StoreOperation::Insert,
                    format!(
                        "duplicate key value violates unique constraint on \"{}\" ({})",
                        target.primary_key, id
                    ),
                )
                .add_context(table.clone()));
            }
            // Saturates at i64::MAX; the duplicate check rejects the next automatic key
            next_id = next_id.max(id.saturating_add(1));
            prepared.push(row);
        }

        let first_id = prepared
            .first()
            .and_then(|row| row.get_i64(&target.primary_key));
        target.next_id = next_id;
        target.rows.extend(prepared);

        Ok(returning.as_ref().and(first_id))
    }

    async fn execute(&self, query: &Query) -> StoreResult<u64> {
        let Query::Update {
            table, assignments, ..
        } = query
        else {
            return Err(unsupported(query, StoreOperation::Update));
        };

        let mut tables = self.tables.write().await;
        let target = tables
            .get_mut(table.as_str())
            .ok_or_else(|| unknown_table(table, StoreOperation::Update))?;

        let mut affected = 0;
        for row in target.rows.iter_mut().filter(|row| query.matches(row)) {
            for (column, value) in assignments.iter() {
                row.insert(column, value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }
}
