//! Error types

use std::fmt;
use thiserror::Error;

use crate::repository::RepositoryError;

// ============================================================================
// Structured Store Errors
// ============================================================================

/// Store operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Establishing a connection
    Connect,
    /// Executing a read query
    Query,
    /// Inserting records
    Insert,
    /// Updating records
    Update,
    /// Acquiring a connection from the pool
    PoolAcquire,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Query => write!(f, "query"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::PoolAcquire => write!(f, "pool_acquire"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Failed to establish connection
    ConnectionFailed,
    /// Constraint violation (unique, foreign key, check)
    ConstraintViolation,
    /// Query execution failed
    QueryFailed,
    /// Column value could not be converted
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Operation timed out
    Timeout,
    /// Connection pool exhausted
    PoolExhausted,
    /// Other/unknown error
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured error raised by the backing store
///
/// Repositories pass these through untouched; they never retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The operation being performed when the error occurred
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g., table name)
    pub context: Option<String>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(
        operation: StoreOperation,
        kind: StoreErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            StoreOperation::Connect,
            StoreErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a constraint violation error
    pub fn constraint_violation(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::ConstraintViolation, message)
    }

    /// Create a query failed error
    pub fn query_failed(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::QueryFailed, message)
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::new(
            StoreOperation::Query,
            StoreErrorKind::TypeConversion,
            message,
        )
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            StoreOperation::PoolAcquire,
            StoreErrorKind::PoolExhausted,
            message,
        )
    }

    /// Transient errors that may succeed if the caller retries
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::ConnectionFailed
                | StoreErrorKind::Timeout
                | StoreErrorKind::PoolExhausted
        )
    }

    /// Attach context to an existing error
    #[must_use]
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Override the operation recorded on the error
    #[must_use]
    pub fn with_operation(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

/// Sanitize a database URL by removing credentials
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            if scheme_end < at_pos {
                let scheme = &url[..scheme_end + 3];
                let after_at = &url[at_pos + 1..];
                return format!("{}<redacted>@{}", scheme, after_at);
            }
        }
    }
    url.to_string()
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for configuration, bootstrap and service code
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured store error
    #[error("{0}")]
    Store(StoreError),

    /// Repository error (validation or store)
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Entity could not be encoded into or decoded from a record
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Table or column name that cannot be rendered into SQL
    #[error("Invalid SQL identifier: `{0}`")]
    Identifier(String),

    /// Authentication error (password hashing)
    #[error("Auth error: {0}")]
    Auth(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

// Conversion from sqlx::Error to StoreError
#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::PoolTimedOut => Self::pool_exhausted("Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::Protocol(msg) => Self::query_failed(StoreOperation::Query, msg),
            E::Configuration(e) => Self::new(
                StoreOperation::Connect,
                StoreErrorKind::Configuration,
                e.to_string(),
            ),
            E::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Self::new(StoreOperation::Connect, StoreErrorKind::Timeout, e.to_string())
            }
            E::Io(e) => Self::connection_failed(e.to_string()),
            E::Tls(e) => Self::connection_failed(format!("TLS error: {}", e)),
            E::TypeNotFound { type_name } => {
                Self::type_conversion(format!("Type not found: {}", type_name))
            }
            E::ColumnNotFound(col) => Self::query_failed(
                StoreOperation::Query,
                format!("Column not found: {}", col),
            ),
            E::ColumnDecode { index, source } => {
                Self::type_conversion(format!("Failed to decode column {}: {}", index, source))
            }
            E::Decode(e) => Self::type_conversion(e.to_string()),
            E::Database(db_err) => {
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    Self::constraint_violation(StoreOperation::Query, db_err.to_string())
                } else {
                    Self::query_failed(StoreOperation::Query, db_err.to_string())
                }
            }
            E::WorkerCrashed => Self::connection_failed("Database worker crashed"),
            _ => Self::new(StoreOperation::Query, StoreErrorKind::Other, err.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_with_context() {
        let err = StoreError::query_failed(StoreOperation::Query, "relation missing")
            .add_context("users");
        let display = err.to_string();
        assert!(display.contains("query_failed"));
        assert!(display.contains("during query"));
        assert!(display.contains("[context: users]"));
    }

    #[test]
    fn test_store_error_retriable() {
        assert!(StoreError::connection_failed("refused").is_retriable());
        assert!(StoreError::pool_exhausted("busy").is_retriable());
        assert!(!StoreError::constraint_violation(StoreOperation::Insert, "dup").is_retriable());
    }

    #[test]
    fn test_with_operation() {
        let err = StoreError::type_conversion("bad").with_operation(StoreOperation::Insert);
        assert_eq!(err.operation, StoreOperation::Insert);
        assert_eq!(err.kind, StoreErrorKind::TypeConversion);
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("postgres://admin:secret@db:5432/panel"),
            "postgres://<redacted>@db:5432/panel"
        );
        assert_eq!(sanitize_url("postgres://db/panel"), "postgres://db/panel");
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_sqlx_io_errors() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err = StoreError::from(sqlx::Error::Io(timed_out));
        assert_eq!(err.kind, StoreErrorKind::Timeout);
        assert!(err.is_retriable());

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::from(sqlx::Error::Io(refused));
        assert_eq!(err.kind, StoreErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_error_from_store_error() {
        let err: Error = StoreError::connection_failed("down").into();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("connection_failed"));
    }
}
