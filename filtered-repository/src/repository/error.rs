//! Repository error types
//!
//! A repository call fails in exactly one of two ways: its arguments were
//! rejected before any query was issued, or the backing store failed.
//!
//! # Example
//!
//! ```rust
//! use filtered_repository::error::StoreError;
//! use filtered_repository::repository::RepositoryError;
//!
//! let error: RepositoryError = StoreError::connection_failed("refused").into();
//! assert!(!error.is_validation());
//! assert!(error.is_retriable());
//! ```

use std::fmt;

use thiserror::Error;

use crate::error::StoreError;
use crate::validation::ValidationError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Listing every live row
    FindAll,
    /// Fetching one page plus the total count
    FindPageByFilter,
    /// Listing rows matching a filter set
    FindListByFilter,
    /// Looking up a row by primary key
    FindOneById,
    /// Listing rows by primary keys
    FindListByIds,
    /// Listing rows whose field is in a value list
    FindListByWhereIn,
    /// Counting rows matching a filter set
    GetTotalCount,
    /// Inserting one row
    SaveEntity,
    /// Inserting many rows
    SaveEntities,
    /// Updating rows matching a filter set
    UpdateEntities,
    /// Updating rows whose field is in a value list
    UpdateEntitiesByWhereIn,
    /// Updating a row by primary key
    UpdateEntityById,
    /// Updating rows by primary keys
    UpdateEntitiesByIds,
    /// Soft deleting a row by primary key
    DeleteEntityById,
    /// Soft deleting rows matching a filter set
    DeleteEntities,
    /// Soft deleting rows whose field is in a value list
    DeleteEntitiesByWhereIn,
    /// Soft deleting rows by primary keys
    DeleteEntitiesByIds,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FindAll => "find_all",
            Self::FindPageByFilter => "find_page_by_filter",
            Self::FindListByFilter => "find_list_by_filter",
            Self::FindOneById => "find_one_by_id",
            Self::FindListByIds => "find_list_by_ids",
            Self::FindListByWhereIn => "find_list_by_where_in",
            Self::GetTotalCount => "get_total_count",
            Self::SaveEntity => "save_entity",
            Self::SaveEntities => "save_entities",
            Self::UpdateEntities => "update_entities",
            Self::UpdateEntitiesByWhereIn => "update_entities_by_where_in",
            Self::UpdateEntityById => "update_entity_by_id",
            Self::UpdateEntitiesByIds => "update_entities_by_ids",
            Self::DeleteEntityById => "delete_entity_by_id",
            Self::DeleteEntities => "delete_entities",
            Self::DeleteEntitiesByWhereIn => "delete_entities_by_where_in",
            Self::DeleteEntitiesByIds => "delete_entities_by_ids",
        };
        write!(f, "{}", name)
    }
}

/// Error returned by every repository operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Malformed or missing argument; no query was issued
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Failure reported by the backing store, passed through unchanged
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl RepositoryError {
    /// Returns `true` if the arguments were rejected before any store call
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Transient store errors that may succeed if the caller retries
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Store(err) => err.is_retriable(),
        }
    }

    /// The validation failure, if this is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(_) => None,
        }
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreOperation;
    use crate::validation::Validator;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::FindAll), "find_all");
        assert_eq!(
            format!("{}", RepositoryOperation::FindPageByFilter),
            "find_page_by_filter"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::FindOneById),
            "find_one_by_id"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::SaveEntities),
            "save_entities"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::DeleteEntitiesByWhereIn),
            "delete_entities_by_where_in"
        );
    }

    #[test]
    fn test_validation_variant() {
        let validation = Validator::new(RepositoryOperation::FindOneById)
            .num("id", 0)
            .validate()
            .unwrap_err();
        let error = RepositoryError::from(validation.clone());
        assert!(error.is_validation());
        assert!(!error.is_retriable());
        assert_eq!(error.as_validation(), Some(&validation));
        assert!(error.to_string().contains("find_one_by_id"));
    }

    #[test]
    fn test_store_variant_passes_through() {
        let store = StoreError::constraint_violation(StoreOperation::Insert, "duplicate key");
        let error = RepositoryError::from(store.clone());
        assert!(!error.is_validation());
        assert!(!error.is_retriable());
        assert_eq!(error, RepositoryError::Store(store));
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> =
            Box::new(RepositoryError::from(StoreError::connection_failed("down")));
        assert!(error.to_string().contains("connection_failed"));
    }
}
