//! Statement executors behind a repository
//!
//! A [`Store`] receives [`Query`] trees from repositories and runs them. It
//! knows nothing about soft deletes or validation; those stay in the
//! repository.

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::query::{Dialect, Query};
use crate::value::Record;

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Asynchronous executor for repository statements
///
/// Implementations must be safe to share between concurrent callers. Every
/// method resolves once the backing store has answered; none retries.
#[async_trait]
pub trait Store: Send + Sync {
    /// Dialect used when rendering statements for this store
    fn dialect(&self) -> Dialect;

    /// Run a `Select` and return its rows
    async fn fetch_rows(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Run a `Count` and return the number of matching rows
    async fn fetch_count(&self, query: &Query) -> StoreResult<u64>;

    /// Run an `Insert`, returning the first generated key when the store
    /// reports one
    async fn insert(&self, query: &Query) -> StoreResult<Option<i64>>;

    /// Run an `Update`, returning the number of affected rows
    async fn execute(&self, query: &Query) -> StoreResult<u64>;
}
