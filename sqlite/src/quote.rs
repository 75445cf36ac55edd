//! Rendering scalar values as SQL literals.

use kiwi_core::Value;

use crate::database::Database;

/// Renders `value` as a SQL literal using the connection's own escaping.
///
/// `NULL` for absent values, single-quoted escaped text for strings, and
/// the plain textual form for numbers. Booleans render as `1`/`0`;
/// non-finite floats have no literal and render as `NULL`.
///
/// # Examples
///
/// ```
/// use kiwi_core::Value;
/// use kiwi_sqlite::quote;
/// use rusqlite::Connection;
///
/// let conn = Connection::open_in_memory().unwrap();
/// assert_eq!(quote(&conn, &Value::Null), "NULL");
/// assert_eq!(quote(&conn, &Value::from("O'Brien")), "'O''Brien'");
/// assert_eq!(quote(&conn, &Value::from(2)), "2");
/// assert_eq!(quote(&conn, &Value::from(true)), "1");
/// ```
pub fn quote(db: &dyn Database, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) if r.is_finite() => format!("{r:?}"),
        Value::Real(_) => "NULL".to_string(),
        Value::Text(s) => format!("'{}'", db.escape_string(s)),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
    }
}
