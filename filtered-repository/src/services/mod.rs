//! Admin-panel services built on filtered repositories
//!
//! Each service owns the repositories for its table and exposes the operations
//! the panel's routes call. Route handling itself lives outside this crate.

mod logs;
mod orders;
mod password;
mod users;

pub use logs::{LogService, LoginLog};
pub use orders::{OrderScope, OrderService};
pub use password::PasswordHasher;
pub use users::{User, UserService};

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::repository::Page;
use crate::value::Record;

/// Decode every row of a page into `T`, keeping the paging metadata
fn decode_page<T: DeserializeOwned>(page: Page<Record>) -> Result<Page<T>> {
    let items = page
        .items
        .into_iter()
        .map(Record::into_entity)
        .collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(Page::new(page.total, items, page.page_number, page.page_size))
}
