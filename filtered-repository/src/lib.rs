//! # filtered-repository
//!
//! Generic data-access layer for tables that share a soft-delete flag.
//! A single [`FilteredRepository`](repository::FilteredRepository) is bound to a
//! table and turns filter sets, sort orders and page requests into
//! parameterized SQL, hiding deleted rows from every read.
//!
//! ## Features
//!
//! - **Soft delete**: deletes flag rows, reads never see them
//! - **Filters**: equality, comparison, `LIKE`, `IN` and null checks combined with `AND`
//! - **Pagination**: counted pages with clamped page sizes
//! - **Validation**: bad arguments are rejected before any statement is built
//! - **Stores**: PostgreSQL through sqlx, plus an in-memory store for tests
//! - **Statement logging**: every statement is handed to a per-repository hook
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use filtered_repository::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("orders", "eid").await;
//!
//! let orders = FilteredRepository::builder(store, "orders").build()?;
//! orders.save_entity(Record::new().with("sku", "A-1").with("qty", 3)).await?;
//! orders.save_entity(Record::new().with("sku", "B-2").with("qty", 0)).await?;
//!
//! let page = orders
//!     .find_page(
//!         &PageRequest::new(1, 10),
//!         Some(&Filters::new().gt("qty", 0)),
//!         Some(&Sort::by("eid", OrderDirection::Descending)),
//!     )
//!     .await?;
//! assert_eq!(page.total, 1);
//! # Ok::<(), Error>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod query;
pub mod repository;
pub mod services;
pub mod store;
pub mod validation;
pub mod value;

#[cfg(feature = "database")]
pub mod database;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, RepositoryConfig};
    pub use crate::error::{Error, Result, StoreError, StoreErrorKind, StoreOperation};
    pub use crate::observability::init_tracing;
    pub use crate::query::{Dialect, QueryHook, RenderedSql, TracingQueryHook};
    pub use crate::repository::{
        FilteredRepository, FilteredRepositoryBuilder, FilterOperator, Filters, OrderDirection,
        Page, PageRequest, RepositoryError, RepositoryResult, RowTransform, Sort,
    };
    pub use crate::services::{LogService, OrderScope, OrderService, PasswordHasher, UserService};
    pub use crate::store::{MemoryStore, Store};
    pub use crate::value::{Record, Value};

    #[cfg(feature = "database")]
    pub use crate::database::create_pool;

    #[cfg(feature = "database")]
    pub use crate::store::PgStore;

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use async_trait::async_trait;
}
