//! Argument validation for repository operations
//!
//! Every repository operation checks the shape of its arguments before it
//! touches the store. Checks are declared as a chain of named parameters with
//! an expected kind; the first failure is reported.
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::repository::RepositoryOperation;
//! use filtered_repository::validation::{ParamKind, Validator};
//!
//! let ids: Vec<i64> = vec![];
//! let err = Validator::new(RepositoryOperation::FindListByIds)
//!     .arr("ids", &ids)
//!     .validate()
//!     .unwrap_err();
//!
//! assert_eq!(err.parameter, "ids");
//! assert_eq!(err.expected, ParamKind::Array);
//! ```

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::repository::{Filters, RepositoryOperation, Sort};
use crate::value::Record;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// Returns `true` if `name` can be rendered as a SQL identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Declared kind of a validated parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positive integer (primary keys, page numbers, page sizes)
    Number,
    /// Column or table identifier
    String,
    /// Non-empty record or filter set
    Object,
    /// Non-empty sequence
    Array,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// A malformed or missing argument, caught before any store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The operation that rejected its arguments
    pub operation: RepositoryOperation,
    /// Name of the offending parameter
    pub parameter: String,
    /// The kind the parameter was declared as
    pub expected: ParamKind,
    /// What was wrong with it
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid argument `{}` for {} (expected {}): {}",
            self.parameter, self.operation, self.expected, self.message
        )
    }
}

impl std::error::Error for ValidationError {}

/// Chain of parameter checks for one operation
///
/// Only the first failure is kept; later checks are skipped once one fails.
#[derive(Debug)]
#[must_use]
pub struct Validator {
    operation: RepositoryOperation,
    failure: Option<ValidationError>,
}

impl Validator {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            failure: None,
        }
    }

    fn check(
        mut self,
        parameter: &str,
        expected: ParamKind,
        ok: bool,
        message: impl FnOnce() -> String,
    ) -> Self {
        if self.failure.is_none() && !ok {
            self.failure = Some(ValidationError {
                operation: self.operation,
                parameter: parameter.to_string(),
                expected,
                message: message(),
            });
        }
        self
    }

    /// Require a positive integer
    pub fn num(self, parameter: &str, value: i64) -> Self {
        self.check(parameter, ParamKind::Number, value > 0, || {
            format!("must be a positive integer, got {}", value)
        })
    }

    /// Require a page number or size of at least one
    pub fn page(self, parameter: &str, value: u64) -> Self {
        self.check(parameter, ParamKind::Number, value >= 1, || {
            format!("must be at least 1, got {}", value)
        })
    }

    /// Require a valid identifier
    pub fn str(self, parameter: &str, value: &str) -> Self {
        self.check(parameter, ParamKind::String, is_identifier(value), || {
            if value.is_empty() {
                "must not be empty".to_string()
            } else {
                format!("`{}` is not a valid column identifier", value)
            }
        })
    }

    /// Require a non-empty record whose columns are valid identifiers
    pub fn obj(self, parameter: &str, record: &Record) -> Self {
        let bad_column = record.columns().find(|c| !is_identifier(c)).map(str::to_string);
        self.check(parameter, ParamKind::Object, !record.is_empty(), || {
            "must contain at least one column".to_string()
        })
        .check(parameter, ParamKind::Object, bad_column.is_none(), || {
            format!(
                "`{}` is not a valid column identifier",
                bad_column.unwrap_or_default()
            )
        })
    }

    /// Require every predicate of a filter set to name a valid column
    ///
    /// An empty filter set is accepted.
    pub fn filters(self, parameter: &str, filters: &Filters) -> Self {
        let bad_field = filters
            .iter()
            .find(|c| !is_identifier(&c.field))
            .map(|c| c.field.clone());
        self.check(parameter, ParamKind::Object, bad_field.is_none(), || {
            format!(
                "`{}` is not a valid column identifier",
                bad_field.unwrap_or_default()
            )
        })
    }

    /// Require a filter set with at least one predicate
    pub fn non_empty_filters(self, parameter: &str, filters: &Filters) -> Self {
        self.check(parameter, ParamKind::Object, !filters.is_empty(), || {
            "must contain at least one predicate".to_string()
        })
        .filters(parameter, filters)
    }

    /// Require every sort field to be a valid identifier
    pub fn sort(self, parameter: &str, sort: Option<&Sort>) -> Self {
        let bad_field = sort.and_then(|s| {
            s.orders()
                .iter()
                .find(|o| !is_identifier(&o.field))
                .map(|o| o.field.clone())
        });
        self.check(parameter, ParamKind::Array, bad_field.is_none(), || {
            format!(
                "`{}` is not a valid sort field",
                bad_field.unwrap_or_default()
            )
        })
    }

    /// Require a non-empty sequence
    pub fn arr<T>(self, parameter: &str, values: &[T]) -> Self {
        self.check(parameter, ParamKind::Array, !values.is_empty(), || {
            "must contain at least one element".to_string()
        })
    }

    /// Require a non-empty sequence of positive integers
    pub fn ids(self, parameter: &str, ids: &[i64]) -> Self {
        let bad = ids.iter().copied().find(|id| *id <= 0);
        self.arr(parameter, ids)
            .check(parameter, ParamKind::Array, bad.is_none(), || {
                format!("contains non-positive id {}", bad.unwrap_or_default())
            })
    }

    /// Require a non-empty sequence of non-empty records
    pub fn records(self, parameter: &str, records: &[Record]) -> Self {
        let mut validator = self.arr(parameter, records);
        for record in records {
            validator = validator.obj(parameter, record);
        }
        validator
    }

    /// Finish the chain
    pub fn validate(self) -> Result<(), ValidationError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
