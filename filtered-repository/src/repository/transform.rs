//! Row shaping applied on every read path
//!
//! A repository hands each fetched row to its [`RowTransform`] before returning
//! it. This is where entity-specific shaping lives: hiding sensitive columns,
//! adding derived values.
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::repository::RowTransform;
//! use filtered_repository::value::Record;
//!
//! let hide_password = |mut row: Record| {
//!     row.remove("password");
//!     row
//! };
//!
//! let row = Record::new().with("username", "admin").with("password", "hash");
//! let shaped = hide_password.transform_one(row);
//! assert!(!shaped.contains("password"));
//! ```

use crate::value::Record;

/// Capability that shapes raw rows into what callers see
pub trait RowTransform: Send + Sync {
    fn transform_one(&self, row: Record) -> Record;

    fn transform_list(&self, rows: Vec<Record>) -> Vec<Record> {
        rows.into_iter().map(|row| self.transform_one(row)).collect()
    }
}

/// Returns rows unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl RowTransform for PassThrough {
    fn transform_one(&self, row: Record) -> Record {
        row
    }

    fn transform_list(&self, rows: Vec<Record>) -> Vec<Record> {
        rows
    }
}

impl<F> RowTransform for F
where
    F: Fn(Record) -> Record + Send + Sync,
{
    fn transform_one(&self, row: Record) -> Record {
        self(row)
    }
}

/// Drops the named columns from every row
#[derive(Debug, Clone, Default)]
pub struct HideColumns {
    columns: Vec<String>,
}

impl HideColumns {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl RowTransform for HideColumns {
    fn transform_one(&self, mut row: Record) -> Record {
        for column in &self.columns {
            row.remove(column);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_is_identity() {
        let rows = vec![Record::new().with("a", 1_i64), Record::new().with("b", 2_i64)];
        assert_eq!(PassThrough.transform_list(rows.clone()), rows);
    }

    #[test]
    fn test_closure_transform_applies_to_list() {
        let add_flag = |row: Record| row.with("seen", true);
        let shaped = add_flag.transform_list(vec![Record::new(), Record::new()]);
        assert!(shaped.iter().all(|r| r.contains("seen")));
    }

    #[test]
    fn test_hide_columns() {
        let transform = HideColumns::new(["password", "salt"]);
        let row = Record::new()
            .with("username", "root")
            .with("password", "x")
            .with("salt", "y");
        let shaped = transform.transform_one(row);
        assert_eq!(shaped.columns().collect::<Vec<_>>(), vec!["username"]);
    }
}
