use serde::Serialize;
use serde::ser::SerializeMap;

use crate::Value;

/// Ordered column-name → value record.
///
/// Used identically for rows read from storage, for bulk-fill input and for
/// the INSERT/UPDATE value source. Column order is preserved, including when
/// serialized as a JSON object.
///
/// # Examples
///
/// ```
/// use kiwi_core::{Row, Value};
///
/// let row: Row = [("username", Value::from("GP")), ("friend_id", Value::from(2))]
///     .into_iter()
///     .collect();
/// assert_eq!(row.get("friend_id"), Some(&Value::Integer(2)));
/// assert_eq!(row.columns().collect::<Vec<_>>(), vec!["username", "friend_id"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cell, replacing the value if the column already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_existing_column() {
        let mut row = Row::new();
        row.insert("lastname", "Peters");
        row.insert("lastname", "Kaufmann");
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("lastname"), Some(&Value::from("Kaufmann")));
    }

    #[test]
    fn test_json_keeps_column_order() {
        let row: Row = [
            ("username", Value::from("GP")),
            ("friend_id", Value::from(2)),
            ("id", Value::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"username":"GP","friend_id":2,"id":null}"#
        );
    }
}
