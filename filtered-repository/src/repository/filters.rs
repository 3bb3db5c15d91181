//! Filter sets for repository queries
//!
//! A [`Filters`] value is an ordered list of `(field, comparator, value)`
//! predicates combined with AND. Predicates are rendered in insertion order.
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::repository::{FilterOperator, Filters};
//!
//! let filters = Filters::new()
//!     .eq("status", "paid")
//!     .gte("amount", 100_i64)
//!     .like("customer", "%smith%");
//!
//! assert_eq!(filters.len(), 3);
//! assert_eq!(filters.iter().next().unwrap().operator, FilterOperator::Equal);
//! ```

use std::fmt;

use crate::value::Value;

/// Comparison operators for filter conditions
///
/// # Example
///
/// ```rust
/// use filtered_repository::repository::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "=");
/// assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE)
    Like,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl FilterOperator {
    /// Operators that take no right-hand value
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against (`Null` for unary operators)
    pub value: Value,
}

impl FilterCondition {
    /// Unary operators drop `value` and carry `Null`
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        let value = if operator.is_unary() {
            Value::Null
        } else {
            value.into()
        };
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Ordered, conjunctive set of filter conditions
///
/// An empty set matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    conditions: Vec<FilterCondition>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary condition
    #[must_use]
    pub fn push(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append `field <op> value`
    #[must_use]
    pub fn with(
        self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.push(FilterCondition::new(field, operator, value))
    }

    /// field = value
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::Equal, value)
    }

    /// field != value
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::NotEqual, value)
    }

    /// field > value
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::GreaterThan, value)
    }

    /// field >= value
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::GreaterThanOrEqual, value)
    }

    /// field < value
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::LessThan, value)
    }

    /// field <= value
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::LessThanOrEqual, value)
    }

    /// field LIKE pattern
    #[must_use]
    pub fn like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(field, FilterOperator::Like, Value::Text(pattern.into()))
    }

    /// field IS NULL
    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.with(field, FilterOperator::IsNull, Value::Null)
    }

    /// field IS NOT NULL
    #[must_use]
    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.with(field, FilterOperator::IsNotNull, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Conditions in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, FilterCondition> {
        self.conditions.iter()
    }

    pub fn as_slice(&self) -> &[FilterCondition] {
        &self.conditions
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = &'a FilterCondition;
    type IntoIter = std::slice::Iter<'a, FilterCondition>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditions.iter()
    }
}

impl FromIterator<FilterCondition> for Filters {
    fn from_iter<I: IntoIterator<Item = FilterCondition>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Equal), "=");
        assert_eq!(format!("{}", FilterOperator::NotEqual), "!=");
        assert_eq!(format!("{}", FilterOperator::GreaterThan), ">");
        assert_eq!(format!("{}", FilterOperator::GreaterThanOrEqual), ">=");
        assert_eq!(format!("{}", FilterOperator::LessThan), "<");
        assert_eq!(format!("{}", FilterOperator::LessThanOrEqual), "<=");
        assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
        assert_eq!(format!("{}", FilterOperator::IsNull), "IS NULL");
        assert_eq!(format!("{}", FilterOperator::IsNotNull), "IS NOT NULL");
    }

    #[test]
    fn test_filters_preserve_insertion_order() {
        let filters = Filters::new()
            .eq("status", "paid")
            .gt("amount", 10_i64)
            .is_null("refunded_at");
        let fields: Vec<&str> = filters.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["status", "amount", "refunded_at"]);
        assert_eq!(filters.as_slice()[2].value, Value::Null);
    }

    #[test]
    fn test_filters_like_wraps_text() {
        let filters = Filters::new().like("email", "%@example.com");
        let condition = filters.iter().next().unwrap();
        assert_eq!(condition.operator, FilterOperator::Like);
        assert_eq!(condition.value, Value::Text("%@example.com".to_string()));
    }

    #[test]
    fn test_filters_collect() {
        let filters: Filters = vec![
            FilterCondition::new("a", FilterOperator::Equal, 1_i64),
            FilterCondition::new("b", FilterOperator::LessThan, 2_i64),
        ]
        .into_iter()
        .collect();
        assert_eq!(filters.len(), 2);
        assert!(!filters.is_empty());
        assert!(Filters::new().is_empty());
    }

    #[test]
    fn test_unary_condition_ignores_value() {
        let condition = FilterCondition::new("deleted_at", FilterOperator::IsNotNull, "ignored");
        assert_eq!(condition.value, Value::Null);

        let condition = FilterCondition::new("name", FilterOperator::Like, "a%");
        assert_eq!(condition.value, Value::Text("a%".to_string()));
    }
}
