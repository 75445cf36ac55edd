//! DDL generation for entity descriptors.
//!
//! Produces the `CREATE TABLE` statement matching a descriptor's field
//! schema so tests and tools can prepare a fresh database. This is not a
//! migration system: there is no versioning and no ALTER support.
//!
//! # Column mapping
//!
//! | `FieldKind` | SQLite column |
//! |-------------|---------------|
//! | `Integer`   | `INTEGER`     |
//! | `Bool`      | `INTEGER` (`1`/`0`) |
//! | `Real`      | `REAL`        |
//! | `Text`      | `TEXT`        |
//!
//! An integer primary key becomes `INTEGER PRIMARY KEY AUTOINCREMENT` so
//! generated keys are never reused.

use kiwi_core::{EntityDescriptor, FieldKind, validate_descriptor};

use crate::error::Result;

/// Generates `CREATE TABLE IF NOT EXISTS` for `descriptor`.
///
/// # Errors
///
/// Returns [`ModelError::Configuration`](crate::ModelError::Configuration)
/// if the descriptor is invalid.
///
/// # Examples
///
/// ```
/// use kiwi_core::{EntityDescriptor, FieldKind};
/// use kiwi_sqlite::create_table_sql;
///
/// let users = EntityDescriptor::new("users")
///     .field("id", FieldKind::Integer)
///     .field("username", FieldKind::Text)
///     .guarded(Vec::<String>::new());
/// assert_eq!(
///     create_table_sql(&users).unwrap(),
///     "CREATE TABLE IF NOT EXISTS users (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    username TEXT\n);"
/// );
/// ```
pub fn create_table_sql(descriptor: &EntityDescriptor) -> Result<String> {
    validate_descriptor(descriptor)?;

    let columns: Vec<String> = descriptor
        .fields
        .iter()
        .map(|field| {
            let affinity = field.kind.affinity();
            if field.name != descriptor.primary_key {
                format!("    {} {affinity}", field.name)
            } else if field.kind == FieldKind::Integer {
                format!("    {} INTEGER PRIMARY KEY AUTOINCREMENT", field.name)
            } else {
                format!("    {} {affinity} PRIMARY KEY", field.name)
            }
        })
        .collect();

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        descriptor.table,
        columns.join(",\n")
    ))
}

/// Generates `DROP TABLE IF EXISTS` for `descriptor`.
pub fn drop_table_sql(descriptor: &EntityDescriptor) -> Result<String> {
    validate_descriptor(descriptor)?;
    Ok(format!("DROP TABLE IF EXISTS {};", descriptor.table))
}
