//! Error types for entity mapper operations.
//!
//! Provides a unified error type covering lookups, validation, mass
//! assignment, configuration, writes and storage access.

use kiwi_core::{DescriptorError, Operation};
use thiserror::Error;

/// Errors that can occur while loading or persisting entities.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required lookup matched no row.
    #[error("no {entity} found")]
    NotFound { entity: String },

    /// Structural or domain rules rejected a write before it ran.
    #[error("cannot {operation} {entity}: {}", .errors.join("; "))]
    Validation {
        entity: String,
        operation: Operation,
        errors: Vec<String>,
    },

    /// Bulk-fill tried to assign a guarded field.
    #[error("{field} of {entity} is not mass assignable")]
    Guard { entity: String, field: String },

    /// The entity descriptor is incomplete or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(#[from] DescriptorError),

    /// The storage reported failure for a write statement.
    #[error("error while trying to {operation} {entity}: {message}")]
    Persistence {
        entity: String,
        operation: Operation,
        message: String,
    },

    /// The entity is not in a state that allows the operation.
    #[error("invalid state for {entity}: {reason}")]
    State { entity: String, reason: String },

    /// Direct field access named a field the entity does not declare.
    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// SQLite operation failure outside of a write (e.g. a malformed SELECT).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value cannot be represented as a scalar.
    #[error("conversion error: {0}")]
    Conversion(String),
}

impl ModelError {
    /// Returns `true` for [`ModelError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }
}

/// Convenience alias for results with [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ModelError::Guard {
            entity: "users(1)".into(),
            field: "is_admin".into(),
        };
        assert_eq!(err.to_string(), "is_admin of users(1) is not mass assignable");

        let err = ModelError::Validation {
            entity: "users()".into(),
            operation: Operation::Create,
            errors: vec!["A username is required".into(), "too short".into()],
        };
        assert_eq!(
            err.to_string(),
            "cannot create users(): A username is required; too short"
        );
        assert!(!err.is_not_found());
        assert!(ModelError::NotFound { entity: "users".into() }.is_not_found());
    }
}
