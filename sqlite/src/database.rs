//! The storage boundary.
//!
//! [`Database`] is the only interface the mapper uses to reach storage:
//! read a statement into rows, run a write, escape text, and read back the
//! last generated row id. It is implemented for [`rusqlite::Connection`];
//! the caller opens and closes the connection and hands a reference to every
//! model built against it.

use kiwi_core::{Row, Value};
use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::error::{ModelError, Result};

/// Connection capabilities the mapper relies on.
pub trait Database {
    /// Runs a SELECT and returns every row.
    fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Runs a SELECT and returns only its first row.
    fn query_first(&self, sql: &str) -> Result<Option<Row>> {
        Ok(self.query(sql)?.into_iter().next())
    }

    /// Runs an INSERT/UPDATE/DELETE and returns the number of affected rows.
    fn exec(&self, sql: &str) -> Result<usize>;

    /// Escapes text for embedding between single quotes.
    fn escape_string(&self, s: &str) -> String;

    /// Row id generated by the most recent successful INSERT.
    fn last_insert_rowid(&self) -> i64;
}

impl Database for Connection {
    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(convert_row(&columns, row)?);
        }
        Ok(out)
    }

    fn query_first(&self, sql: &str) -> Result<Option<Row>> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;

        match rows.next()? {
            Some(row) => Ok(Some(convert_row(&columns, row)?)),
            None => Ok(None),
        }
    }

    fn exec(&self, sql: &str) -> Result<usize> {
        Ok(self.execute(sql, [])?)
    }

    fn escape_string(&self, s: &str) -> String {
        s.replace('\'', "''")
    }

    fn last_insert_rowid(&self) -> i64 {
        Connection::last_insert_rowid(self)
    }
}

/// Converts a SQLite row into a [`Row`] keyed by result column names.
fn convert_row(columns: &[String], row: &rusqlite::Row<'_>) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in columns.iter().enumerate() {
        out.insert(column.as_str(), value_from_ref(column, row.get_ref(idx)?)?);
    }
    Ok(out)
}

/// Converts a borrowed SQLite value into an owned [`Value`].
///
/// Blobs have no scalar representation and are rejected.
pub(crate) fn value_from_ref(column: &str, value: ValueRef<'_>) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(r) => Ok(Value::Real(r)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| {
                ModelError::Conversion(format!("column '{column}' is not valid UTF-8: {e}"))
            }),
        ValueRef::Blob(_) => Err(ModelError::Conversion(format!(
            "column '{column}' holds a blob, which has no scalar representation"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB);
             INSERT INTO t (name, score) VALUES ('a', 1.5), ('b', NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_query_returns_rows_in_column_order() {
        let conn = conn();
        let rows = conn.query("SELECT id, name, score FROM t ORDER BY id").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["id", "name", "score"]);
        assert_eq!(rows[0].get("score"), Some(&Value::Real(1.5)));
        assert_eq!(rows[1].get("score"), Some(&Value::Null));
    }

    #[test]
    fn test_query_first_stops_at_first_row() {
        let conn = conn();
        let row = conn.query_first("SELECT name FROM t ORDER BY id DESC").unwrap();
        assert_eq!(row.unwrap().get("name"), Some(&Value::from("b")));
        assert!(conn.query_first("SELECT name FROM t WHERE id = 99").unwrap().is_none());
    }

    #[test]
    fn test_exec_and_last_insert_rowid() {
        let conn = conn();
        assert_eq!(conn.exec("INSERT INTO t (name) VALUES ('c')").unwrap(), 1);
        assert_eq!(Database::last_insert_rowid(&conn), 3);
        assert_eq!(conn.exec("DELETE FROM t").unwrap(), 3);
    }

    #[test]
    fn test_escape_string_doubles_quotes() {
        let conn = conn();
        assert_eq!(conn.escape_string("O'Brien"), "O''Brien");
        assert_eq!(conn.escape_string("plain"), "plain");
    }

    #[test]
    fn test_blob_is_rejected() {
        let conn = conn();
        conn.execute_batch("UPDATE t SET data = x'00ff' WHERE id = 1").unwrap();
        let err = conn.query("SELECT data FROM t WHERE id = 1").unwrap_err();
        assert!(matches!(err, ModelError::Conversion(_)));
    }

    #[test]
    fn test_malformed_sql_is_a_database_error() {
        let conn = conn();
        let err = conn.query("SELECT * FROM missing_table").unwrap_err();
        assert!(matches!(err, ModelError::Database(_)));
    }
}
