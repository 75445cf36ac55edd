//! Entity type definitions for table-row modeling.
//!
//! This module defines the data model the mapper works with: scalar
//! [`Value`]s, the declared [`FieldKind`] of each column, and the
//! [`EntityDescriptor`] that every concrete entity type supplies to say
//! which table it maps, which field is its primary key, and which fields
//! must never be bulk-assigned.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar cell of a table row.
///
/// # Examples
///
/// ```
/// use kiwi_core::Value;
///
/// assert_eq!(Value::default(), Value::Null);
/// assert_eq!(Value::from("GP"), Value::Text("GP".into()));
/// assert_eq!(Value::from(2), Value::Integer(2));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL` (the default).
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Boolean, stored as `1`/`0`.
    Bool(bool),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for values considered "empty": `NULL`, `""`, `0`,
    /// `0.0` and `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiwi_core::Value;
    ///
    /// assert!(Value::from("").is_empty());
    /// assert!(Value::from(0).is_empty());
    /// assert!(Value::from(false).is_empty());
    /// assert!(!Value::from("x").is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(i) => *i == 0,
            Value::Real(r) => *r == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bool(b) => !b,
        }
    }

    /// Returns the integer payload, treating booleans as `0`/`1`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Returns the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean payload, treating integers `0`/`1` as booleans.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            _ => None,
        }
    }

    /// Returns the float payload, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Declared storage kind of an entity field.
///
/// Loaded and filled values are coerced to the declared kind when the
/// conversion is lossless (see [`FieldKind::coerce`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    Bool,
}

impl FieldKind {
    /// Coerces a value to the form SQLite stores for a column of this kind.
    ///
    /// Numbers and booleans assigned to a text column become their text
    /// form, canonical integer text assigned to an integer column becomes an
    /// integer, and non-finite reals become `NULL`. Anything else that cannot
    /// be converted losslessly is returned unchanged; SQLite columns are
    /// dynamically typed and the mapper does not reject such values.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiwi_core::{FieldKind, Value};
    ///
    /// assert_eq!(FieldKind::Bool.coerce(Value::Integer(1)), Value::Bool(true));
    /// assert_eq!(FieldKind::Real.coerce(Value::Integer(3)), Value::Real(3.0));
    /// assert_eq!(FieldKind::Integer.coerce(Value::Bool(false)), Value::Integer(0));
    /// assert_eq!(FieldKind::Bool.coerce(Value::Integer(7)), Value::Integer(7));
    /// assert_eq!(FieldKind::Text.coerce(Value::Integer(7)), Value::from("7"));
    /// assert_eq!(FieldKind::Real.coerce(Value::Real(f64::NAN)), Value::Null);
    /// ```
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Real(r)) if !r.is_finite() => Value::Null,
            (FieldKind::Bool, Value::Integer(i)) if i == 0 || i == 1 => Value::Bool(i == 1),
            (FieldKind::Real, Value::Integer(i)) => Value::Real(i as f64),
            (FieldKind::Integer, Value::Bool(b)) => Value::Integer(i64::from(b)),
            (FieldKind::Integer, Value::Text(s)) => match s.parse::<i64>() {
                Ok(i) if i.to_string() == s => Value::Integer(i),
                _ => Value::Text(s),
            },
            (FieldKind::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (FieldKind::Text, Value::Real(r)) => Value::Text(format!("{r:?}")),
            (FieldKind::Text, Value::Bool(b)) => Value::from(if b { "1" } else { "0" }),
            (_, other) => other,
        }
    }

    /// SQLite column affinity used when generating DDL.
    pub fn affinity(self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Bool => "INTEGER",
            FieldKind::Real => "REAL",
            FieldKind::Text => "TEXT",
        }
    }
}

/// A declared column of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Declared storage kind.
    pub kind: FieldKind,
}

/// Column names of the audit metadata stamped by `create_as`/`update_as`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditColumns {
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

impl Default for AuditColumns {
    fn default() -> Self {
        Self {
            created_at: "created_at".to_string(),
            created_by: "created_by".to_string(),
            updated_at: "updated_at".to_string(),
            updated_by: "updated_by".to_string(),
        }
    }
}

impl AuditColumns {
    /// All four column names in declaration order.
    pub fn names(&self) -> [&str; 4] {
        [
            &self.updated_at,
            &self.updated_by,
            &self.created_at,
            &self.created_by,
        ]
    }
}

/// Construction-time metadata of a concrete entity type.
///
/// Every entity type supplies one descriptor naming its table, its primary
/// key, its ordered field schema and the set of fields that bulk-fill must
/// never assign. The descriptor is checked by
/// [`validate_descriptor`](crate::validate_descriptor) before any model is
/// built from it.
///
/// The guarded set must be *declared*, even if empty. The primary key and,
/// for audited entities, the four audit columns are always guarded on top of
/// the declared set.
///
/// # Examples
///
/// ```
/// use kiwi_core::{EntityDescriptor, FieldKind};
///
/// let users = EntityDescriptor::new("users")
///     .primary_key("id")
///     .field("id", FieldKind::Integer)
///     .field("username", FieldKind::Text)
///     .field("is_admin", FieldKind::Bool)
///     .guarded(["is_admin"])
///     .audited();
///
/// assert!(users.is_guarded("is_admin"));
/// assert!(users.is_guarded("id"));
/// assert!(users.is_guarded("created_by"));
/// assert!(!users.is_guarded("username"));
/// assert_eq!(users.fields.len(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Table the entity maps to.
    pub table: String,
    /// Name of the primary key field.
    pub primary_key: String,
    /// Ordered field schema, primary key included.
    pub fields: Vec<Field>,
    /// Declared guarded fields; `None` means never declared.
    pub guarded: Option<Vec<String>>,
    /// Audit columns, when the entity carries audit metadata.
    pub audit: Option<AuditColumns>,
}

impl EntityDescriptor {
    /// Starts a descriptor for `table` with primary key `id` and no fields.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            fields: Vec::new(),
            guarded: None,
            audit: None,
        }
    }

    /// Sets the primary key field name.
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    /// Appends a field to the schema.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
        });
        self
    }

    /// Declares the fields bulk-fill must reject. May be empty.
    pub fn guarded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guarded = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Adds the four audit columns (integer timestamps and actor keys).
    pub fn audited(self) -> Self {
        self.audited_with(AuditColumns::default())
    }

    /// Adds audit columns under custom names.
    pub fn audited_with(mut self, columns: AuditColumns) -> Self {
        for name in columns.names() {
            self.fields.push(Field {
                name: name.to_string(),
                kind: FieldKind::Integer,
            });
        }
        self.audit = Some(columns);
        self
    }

    /// Position of `name` in the field schema.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Position of the primary key in the field schema.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.field_index(&self.primary_key)
    }

    /// Returns `true` if bulk-fill must reject `name`.
    pub fn is_guarded(&self, name: &str) -> bool {
        name == self.primary_key
            || self
                .guarded
                .as_ref()
                .is_some_and(|g| g.iter().any(|n| n == name))
            || self
                .audit
                .as_ref()
                .is_some_and(|a| a.names().contains(&name))
    }

    /// Iterates field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Write operation a validation pass runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
