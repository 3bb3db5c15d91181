//! Generic filtered repository
//!
//! This module provides the soft-delete aware data-access façade and the
//! value types callers use to drive it.
//!
//! # Features
//!
//! - **Filtering**: [`Filters`] is an ordered AND chain of [`FilterCondition`]s
//! - **Pagination**: [`Page`] results driven by [`PageRequest`] or explicit numbers
//! - **Sorting**: [`Sort`] as an ordered list of [`Order`] terms
//! - **Soft delete**: reads skip flagged rows, deletes only flag them
//! - **Row shaping**: a [`RowTransform`] applied on every read path
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use filtered_repository::repository::{FilteredRepository, Filters, OrderDirection, Sort};
//! use filtered_repository::store::MemoryStore;
//! use filtered_repository::value::Record;
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("orders", "eid").await;
//!
//! let orders = FilteredRepository::builder(store, "orders").build().unwrap();
//! orders
//!     .save_entities(vec![
//!         Record::new().with("status", "paid").with("amount", 120_i64),
//!         Record::new().with("status", "paid").with("amount", 40_i64),
//!         Record::new().with("status", "open").with("amount", 300_i64),
//!     ])
//!     .await
//!     .unwrap();
//!
//! let filters = Filters::new().eq("status", "paid");
//! let sort = Sort::by("amount", OrderDirection::Descending);
//! let page = orders
//!     .find_page_by_filter(1, 1, Some(&filters), Some(&sort))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(page.total, 2);
//! assert_eq!(page.items[0].get_i64("amount"), Some(120));
//! # });
//! ```

mod error;
mod filtered;
mod filters;
mod pagination;
mod transform;

pub use error::{RepositoryError, RepositoryOperation, RepositoryResult};
pub use filtered::{FilteredRepository, FilteredRepositoryBuilder};
pub use filters::{FilterCondition, FilterOperator, Filters};
pub use pagination::{Order, OrderDirection, Page, PageRequest, Pagination, Sort};
pub use transform::{HideColumns, PassThrough, RowTransform};
