//! Per-repository statement observation
//!
//! Each repository owns one [`QueryHook`] and calls it with every statement it
//! is about to dispatch. Nothing is registered globally; two repositories over
//! the same store can observe differently.

use crate::query::RenderedSql;

/// Callback invoked before a statement reaches the store
pub trait QueryHook: Send + Sync {
    fn on_query(&self, table: &str, sql: &RenderedSql);
}

/// Emits the interpolated statement as a `debug` event on the
/// `filtered_repository::sql` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingQueryHook;

impl QueryHook for TracingQueryHook {
    fn on_query(&self, table: &str, sql: &RenderedSql) {
        tracing::debug!(
            target: "filtered_repository::sql",
            table = %table,
            binds = sql.binds.len(),
            "{}",
            sql.interpolated()
        );
    }
}

/// Ignores every statement
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQueryHook;

impl QueryHook for NoopQueryHook {
    fn on_query(&self, _table: &str, _sql: &RenderedSql) {}
}

impl<F> QueryHook for F
where
    F: Fn(&str, &RenderedSql) + Send + Sync,
{
    fn on_query(&self, table: &str, sql: &RenderedSql) {
        self(table, sql)
    }
}
