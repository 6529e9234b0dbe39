//! # Engine Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Catalog failure (CatalogError)      │
//! │       │                                  │                              │
//! │       ▼                                  │                              │
//! │  DbError ← adds context                  │                              │
//! │       │                                  │                              │
//! │       └────────────┬─────────────────────┘                              │
//! │                    ▼                                                    │
//! │  EngineError ← the typed taxonomy the command surface returns          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller maps ErrorKind to HTTP status / UI message                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error is terminal for the triggering request: the engine never
//! retries a failed monetary or stock operation on its own. Either the
//! operation commits fully or state is left as it was.

use thiserror::Error;

use caja_core::ValidationError;

use crate::catalog::CatalogError;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These wrap sqlx errors and classify the constraint violations the engine
/// cares about (unique codes, the one-open-session index, FK integrity).
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second open session for the same till (partial unique index)
    /// - Duplicate credit note code
    /// - Duplicate idempotency key racing its first request
    #[error("duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether this error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                // FK:     "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Error
// =============================================================================

/// Coarse classification for transport layers (HTTP status, UI severity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input. User-correctable.
    Validation,
    /// Operation not legal in the current lifecycle state.
    InvalidState,
    /// Would violate a uniqueness/singleton invariant.
    Conflict,
    /// Referenced entity does not exist.
    NotFound,
    /// The stock collaborator failed or timed out. Transient/retryable.
    Dependency,
    /// Unexpected internal failure.
    Internal,
}

/// The typed errors the command surface returns.
///
/// ## Taxonomy
/// - `Validation` — negative amount, allocation mismatch, missing method
/// - `InvalidState` — checkout with no open session, double close, redeeming
///   a redeemed note, picking up a non-pending reservation
/// - `Conflict` — opening a session while one is open, exhausted code space
/// - `Dependency` — catalog collaborator failed or timed out
/// - `NotFound` — unknown session/reservation/credit-note code
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("dependency failure: {0}")]
    Dependency(String),

    /// The catalog reported not enough stock for a line. User-correctable,
    /// so it classifies as Validation rather than Dependency.
    #[error("insufficient stock for {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl EngineError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        EngineError::InvalidState(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        EngineError::Conflict(reason.into())
    }

    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn dependency(reason: impl Into<String>) -> Self {
        EngineError::Dependency(reason.into())
    }

    /// Classifies the error for transport layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) | EngineError::InsufficientStock { .. } => {
                ErrorKind::Validation
            }
            EngineError::InvalidState(_) => ErrorKind::InvalidState,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Dependency(_) => ErrorKind::Dependency,
            EngineError::Db(db) => match db {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InsufficientStock {
                variant_id,
                available,
                requested,
            } => EngineError::InsufficientStock {
                variant_id,
                available,
                requested,
            },
            CatalogError::UnknownVariant { variant_id } => {
                EngineError::not_found("variant", variant_id)
            }
            CatalogError::Unavailable(reason) => EngineError::Dependency(reason),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = EngineError::Validation(ValidationError::EmptyCart);
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = EngineError::invalid_state("session already closed");
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = EngineError::conflict("a session is already open");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = EngineError::not_found("credit note", "NC-XXXX");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = EngineError::dependency("catalog timed out");
        assert_eq!(err.kind(), ErrorKind::Dependency);

        let err = EngineError::Db(DbError::UniqueViolation {
            field: "credit_notes.code".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_insufficient_stock_is_user_correctable() {
        let err: EngineError = CatalogError::InsufficientStock {
            variant_id: "v1".to_string(),
            available: 1,
            requested: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
