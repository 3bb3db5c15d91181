//! Pagination and ordering types for repository queries
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::repository::{OrderDirection, Pagination, Sort};
//!
//! // Page 3 of 20 rows skips the first 40
//! let pagination = Pagination::page(3, 20);
//! assert_eq!(pagination.offset, 40);
//!
//! // Newest first, then by name
//! let sort = Sort::by("created_at", OrderDirection::Descending).then_asc("name");
//! assert_eq!(sort.len(), 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use filtered_repository::repository::OrderDirection;
///
/// assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
/// assert_eq!(format!("{}", OrderDirection::Descending), "desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(alias = "desc", alias = "DESC")]
    Descending,
}

impl OrderDirection {
    /// SQL keyword for the direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One `(field, direction)` ordering term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub direction: OrderDirection,
}

/// Ordered sequence of ordering terms
///
/// An empty sort leaves the store's natural order in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    /// No ordering
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Start a sort on one field
    pub fn by(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self::unsorted().then(field, direction)
    }

    /// Append a tie-breaking term
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn then_asc(self, field: impl Into<String>) -> Self {
        self.then(field, OrderDirection::Ascending)
    }

    #[must_use]
    pub fn then_desc(self, field: impl Into<String>) -> Self {
        self.then(field, OrderDirection::Descending)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }
}

/// `OFFSET`/`LIMIT` window of a 1-indexed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    /// Window for `page_number`; page 0 is treated as page 1
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        Self {
            offset: page_number.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// One bounded slice of a result set plus the total matching count
///
/// `items.len() <= page_size` and `total >= items.len()` always hold for pages
/// produced by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows matching the query across all pages
    pub total: u64,
    /// Rows on this page
    pub items: Vec<T>,
    /// 1-indexed page number
    pub page_number: u64,
    /// Requested page size
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn new(total: u64, items: Vec<T>, page_number: u64, page_size: u64) -> Self {
        Self {
            total,
            items,
            page_number,
            page_size,
        }
    }

    /// A page with no matches
    pub fn empty(page_number: u64, page_size: u64) -> Self {
        Self::new(0, Vec::new(), page_number, page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages needed to hold `total` rows
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages()
    }

    /// Transform the items, keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }
}

/// Page number and size as supplied by a caller
///
/// Deserializes from query parameters `pn` and `ps`. A missing page number is
/// page 1; a missing size is left to the repository's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(rename = "pn", default = "default_page_number")]
    pub page_number: u64,
    #[serde(rename = "ps", default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
}

fn default_page_number() -> u64 {
    1
}

impl PageRequest {
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            page_number,
            page_size: Some(page_size),
        }
    }

    /// `page_number` at whatever size the repository defaults to
    pub fn page(page_number: u64) -> Self {
        Self {
            page_number,
            page_size: None,
        }
    }

    /// Requested size, or `default_size` when none was given, capped at `max_size`
    pub fn size_or(&self, default_size: u64, max_size: u64) -> u64 {
        self.page_size.unwrap_or(default_size).min(max_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::page(default_page_number())
    }
}
