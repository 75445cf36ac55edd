//! Descriptor validation.
//!
//! Checks the structural invariants of an [`EntityDescriptor`] once, when a
//! model is built from it, catching forgotten guard declarations, unknown
//! primary keys and unsafe identifiers before any SQL is generated.
//!
//! # Examples
//!
//! ```
//! use kiwi_core::*;
//!
//! let users = EntityDescriptor::new("users")
//!     .field("id", FieldKind::Integer)
//!     .field("username", FieldKind::Text)
//!     .guarded(["username"]);
//! assert!(validate_descriptor(&users).is_ok());
//!
//! // Guarded set never declared
//! let bare = EntityDescriptor::new("users").field("id", FieldKind::Integer);
//! assert_eq!(
//!     validate_descriptor(&bare),
//!     Err(DescriptorError::GuardsNotDeclared("users".into()))
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::EntityDescriptor;

/// Descriptor configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Table name is empty or whitespace-only.
    #[error("entity table name cannot be empty")]
    EmptyTable,
    /// Table or column name is not a plain SQL identifier.
    #[error("invalid identifier '{0}': must be alphanumeric or underscore and not start with a digit")]
    InvalidIdentifier(String),
    /// Descriptor declares no fields at all.
    #[error("entity {0} declares no fields")]
    NoFields(String),
    /// Two fields share a name.
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    /// Primary key is not among the declared fields.
    #[error("primary key '{0}' is not a declared field")]
    UnknownPrimaryKey(String),
    /// A guarded name is not among the declared fields.
    #[error("guarded field '{0}' is not a declared field")]
    UnknownGuardedField(String),
    /// The entity never declared its guarded fields.
    #[error("{0} has no guarded fields declared")]
    GuardsNotDeclared(String),
    /// Audit stamping requested on an entity without audit columns.
    #[error("{0} declares no audit columns")]
    NotAudited(String),
}

/// Validates that `name` is usable as an unquoted SQL identifier.
///
/// # Examples
///
/// ```
/// use kiwi_core::validate_identifier;
///
/// assert!(validate_identifier("friend_id").is_ok());
/// assert!(validate_identifier("1st").is_err());
/// assert!(validate_identifier("name; DROP TABLE users").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), DescriptorError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(name.to_string()))
    }
}

/// Validates an entity descriptor.
///
/// Stops at the first problem found, in this order: table name, field
/// names and duplicates, primary key, guard declaration, guarded names,
/// audit columns.
pub fn validate_descriptor(descriptor: &EntityDescriptor) -> Result<(), DescriptorError> {
    if descriptor.table.trim().is_empty() {
        return Err(DescriptorError::EmptyTable);
    }
    validate_identifier(&descriptor.table)?;

    if descriptor.fields.is_empty() {
        return Err(DescriptorError::NoFields(descriptor.table.clone()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &descriptor.fields {
        validate_identifier(&field.name)?;
        if !seen.insert(field.name.as_str()) {
            return Err(DescriptorError::DuplicateField(field.name.clone()));
        }
    }

    if !seen.contains(descriptor.primary_key.as_str()) {
        return Err(DescriptorError::UnknownPrimaryKey(
            descriptor.primary_key.clone(),
        ));
    }

    let Some(guarded) = &descriptor.guarded else {
        return Err(DescriptorError::GuardsNotDeclared(descriptor.table.clone()));
    };
    for name in guarded {
        if !seen.contains(name.as_str()) {
            return Err(DescriptorError::UnknownGuardedField(name.clone()));
        }
    }
    if let Some(audit) = &descriptor.audit {
        for name in audit.names() {
            if !seen.contains(name) {
                return Err(DescriptorError::UnknownGuardedField(name.to_string()));
            }
        }
    }

    Ok(())
}
