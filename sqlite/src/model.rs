//! The entity mapper.
//!
//! A [`Model`] is one in-memory row of the table an [`Entity`] type maps.
//! It owns its pending [`Clause`] and the text of the last statement it ran;
//! the connection is borrowed and may be shared by any number of models.
//!
//! Every statement goes through a single executor that prefixes the clause,
//! records the full text as [`Model::last_query`] and resets the clause, so
//! conditions never leak from one statement into the next.
//!
//! # Lifecycle
//!
//! A model starts [`EntityState::Transient`] (no snapshot). A successful
//! load or [`create`](Model::create) makes it [`EntityState::Persisted`]
//! with a snapshot of its field values; [`update`](Model::update) refreshes
//! that snapshot and [`delete`](Model::delete) clears it together with the
//! primary key ([`EntityState::Deleted`]). A failed write leaves the model
//! exactly as it was before the attempt.
//!
//! # Example
//!
//! ```
//! use std::sync::OnceLock;
//!
//! use kiwi_core::{EntityDescriptor, FieldKind, Value};
//! use kiwi_sqlite::{Entity, Model, create_table_sql};
//! use rusqlite::Connection;
//!
//! struct Notes;
//!
//! impl Entity for Notes {
//!     fn descriptor() -> &'static EntityDescriptor {
//!         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
//!         DESCRIPTOR.get_or_init(|| {
//!             EntityDescriptor::new("notes")
//!                 .field("id", FieldKind::Integer)
//!                 .field("body", FieldKind::Text)
//!                 .guarded(Vec::<String>::new())
//!         })
//!     }
//! }
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch(&create_table_sql(Notes::descriptor()).unwrap()).unwrap();
//!
//! let mut note = Model::<Notes>::new(&conn).unwrap();
//! note.fill([("body", "hello")]).unwrap().create().unwrap();
//! assert_eq!(note.last_query(), "INSERT INTO notes (body) VALUES ('hello')");
//! assert!(!note.changed());
//!
//! let mut loaded = Model::<Notes>::new(&conn).unwrap();
//! loaded.find(note.primary_key().clone()).unwrap();
//! assert_eq!(loaded.get("body"), Some(&Value::from("hello")));
//! ```

use std::fmt;
use std::marker::PhantomData;

use kiwi_core::{
    Clause, Cmp, Connective, EntityDescriptor, MapperConfig, Operation, Row, Value,
    validate_descriptor, validate_identifier,
};
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{ModelError, Result};
use crate::quote::quote;

/// A concrete entity type: its descriptor plus optional domain validation.
pub trait Entity: Sized + 'static {
    /// Table, primary key, field schema and guarded set of this type.
    fn descriptor() -> &'static EntityDescriptor;

    /// Domain rules checked before `operation` runs. Each returned string is
    /// one human-readable error; an empty vector means valid.
    fn validate(_model: &Model<'_, Self>, _operation: Operation) -> Vec<String> {
        Vec::new()
    }
}

/// Where a model is in its persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Never loaded or created; no snapshot.
    Transient,
    /// Loaded, created or updated; snapshot present.
    Persisted,
    /// Deleted from storage; primary key and snapshot cleared.
    Deleted,
}

/// Outcome of a single-row lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Found,
    Missing,
}

/// One row of the table mapped by `E`.
pub struct Model<'c, E: Entity> {
    conn: &'c dyn Database,
    descriptor: &'static EntityDescriptor,
    config: MapperConfig,
    pub(crate) values: Vec<Value>,
    original: Option<Vec<Value>>,
    deleted: bool,
    clause: Clause,
    last_query: String,
    _entity: PhantomData<fn() -> E>,
}

impl<'c, E: Entity> Model<'c, E> {
    /// Creates an empty, transient model bound to `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if the entity descriptor is
    /// invalid, e.g. when it never declared its guarded fields.
    pub fn new(conn: &'c dyn Database) -> Result<Self> {
        Self::with_config(conn, MapperConfig::default())
    }

    /// Creates an empty model with explicit mapper settings.
    pub fn with_config(conn: &'c dyn Database, config: MapperConfig) -> Result<Self> {
        let descriptor = E::descriptor();
        validate_descriptor(descriptor)?;
        Ok(Self {
            conn,
            descriptor,
            config,
            values: vec![Value::Null; descriptor.fields.len()],
            original: None,
            deleted: false,
            clause: Clause::new(),
            last_query: String::new(),
            _entity: PhantomData,
        })
    }

    /// Returns a new empty model of the same type on the same connection.
    ///
    /// This is the factory used for multi-row results and relation lookups.
    pub fn fresh(&self) -> Self {
        Self {
            conn: self.conn,
            descriptor: self.descriptor,
            config: self.config.clone(),
            values: vec![Value::Null; self.descriptor.fields.len()],
            original: None,
            deleted: false,
            clause: Clause::new(),
            last_query: String::new(),
            _entity: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    pub fn connection(&self) -> &'c dyn Database {
        self.conn
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Full text of the most recently executed statement.
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    pub fn state(&self) -> EntityState {
        match (&self.original, self.deleted) {
            (Some(_), _) => EntityState::Persisted,
            (None, true) => EntityState::Deleted,
            (None, false) => EntityState::Transient,
        }
    }

    // ------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------

    /// Current value of `field`, or `None` if the entity does not declare it.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.descriptor.field_index(field).map(|i| &self.values[i])
    }

    /// Assigns a single field directly, bypassing the mass-assignment guard.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] if the entity does not declare
    /// `field`.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let idx = self
            .descriptor
            .field_index(field)
            .ok_or_else(|| ModelError::UnknownField {
                entity: self.to_string(),
                field: field.to_string(),
            })?;
        self.values[idx] = self.descriptor.fields[idx].kind.coerce(value.into());
        Ok(self)
    }

    pub fn primary_key(&self) -> &Value {
        &self.values[self.pk_index()]
    }

    pub fn set_primary_key(&mut self, value: impl Into<Value>) -> &mut Self {
        let idx = self.pk_index();
        self.values[idx] = self.descriptor.fields[idx].kind.coerce(value.into());
        self
    }

    /// Mass-assigns fields from untrusted key/value pairs.
    ///
    /// Keys the entity does not declare are ignored. Values are filtered by
    /// the configured [`FillPolicy`](kiwi_core::FillPolicy).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Guard`] naming the first guarded key, in input
    /// order. Nothing is assigned in that case.
    pub fn fill<I, K, V>(&mut self, data: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let data: Vec<(K, Value)> = data.into_iter().map(|(k, v)| (k, v.into())).collect();

        if let Some((key, _)) = data
            .iter()
            .find(|(k, _)| self.descriptor.is_guarded(k.as_ref()))
        {
            let field = AsRef::<str>::as_ref(key).to_string();
            warn!(entity = %self, field = %field, "rejected mass assignment of guarded field");
            return Err(ModelError::Guard {
                entity: self.to_string(),
                field,
            });
        }

        for (key, value) in data {
            let Some(idx) = self.descriptor.field_index(key.as_ref()) else {
                continue;
            };
            if self.config.fill_policy.accepts(&value) {
                self.values[idx] = self.descriptor.fields[idx].kind.coerce(value);
            }
        }
        Ok(self)
    }

    /// Serializes the fields into an ordered column → value record.
    pub fn to_row(&self) -> Row {
        self.descriptor
            .field_names()
            .zip(self.values.iter().cloned())
            .collect()
    }

    // ------------------------------------------------------------------
    // Change tracking
    // ------------------------------------------------------------------

    /// Names of the non-key fields whose value differs from the snapshot.
    /// Without a snapshot every non-key field counts as changed.
    pub fn diff(&self) -> Vec<&str> {
        self.changed_indices()
            .into_iter()
            .map(|i| self.descriptor.fields[i].name.as_str())
            .collect()
    }

    pub fn changed(&self) -> bool {
        !self.changed_indices().is_empty()
    }

    /// Discards unsaved edits by restoring the snapshot. No-op without one.
    pub fn reset(&mut self) -> &mut Self {
        if let Some(original) = &self.original {
            self.values.clone_from(original);
        }
        self
    }

    fn changed_indices(&self) -> Vec<usize> {
        let pk = self.pk_index();
        (0..self.values.len())
            .filter(|&i| i != pk)
            .filter(|&i| match &self.original {
                Some(original) => original.get(i) != Some(&self.values[i]),
                None => true,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Condition building
    // ------------------------------------------------------------------

    /// Appends a raw predicate followed by the quoted `value`.
    ///
    /// The predicate is caller-supplied SQL carrying the column, the
    /// comparison operator and, after the first call, the connective:
    /// `filter("friend_id = ", 2).filter("AND firstname LIKE ", "%ar%")`.
    pub fn filter(&mut self, predicate: &str, value: impl Into<Value>) -> &mut Self {
        let literal = quote(self.conn, &value.into());
        self.clause.push_predicate(predicate, &literal);
        self
    }

    /// Appends `column <cmp> value`, joined with `AND` after the first
    /// predicate.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if `column` is not a plain
    /// identifier.
    pub fn filter_by(
        &mut self,
        column: &str,
        cmp: Cmp,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.push_comparison(Connective::And, column, cmp, value.into())
    }

    /// Like [`filter_by`](Self::filter_by), joined with `OR`.
    pub fn or_filter_by(
        &mut self,
        column: &str,
        cmp: Cmp,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.push_comparison(Connective::Or, column, cmp, value.into())
    }

    fn push_comparison(
        &mut self,
        connective: Connective,
        column: &str,
        cmp: Cmp,
        value: Value,
    ) -> Result<&mut Self> {
        validate_identifier(column)?;
        let literal = quote(self.conn, &value);
        self.clause.push_comparison(connective, column, cmp, &literal);
        Ok(self)
    }

    /// Appends raw SQL after the predicates, e.g. `ORDER BY lastname`.
    pub fn raw(&mut self, sql: &str) -> &mut Self {
        self.clause.push_raw(sql);
        self
    }

    /// Limits the next query to `n` rows, skipping `offset` rows when > 0.
    pub fn limit(&mut self, n: u64, offset: u64) -> &mut Self {
        self.clause.set_limit(n, offset);
        self
    }

    /// Replaces the pending clause with `WHERE <pk> = <key>` and assigns
    /// `key` (or keeps the current key when `None`) to the primary key field.
    pub fn where_primary_key(&mut self, key: Option<Value>) -> &mut Self {
        if let Some(key) = key {
            self.set_primary_key(key);
        }
        let literal = quote(self.conn, self.primary_key());
        self.clause.reset_to_key(&self.descriptor.primary_key, &literal);
        self
    }

    /// Drops every pending condition.
    pub fn reset_conditions(&mut self) -> &mut Self {
        self.clause.reset();
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Runs `SELECT * FROM <table><clause> <extra_sql>` and returns one new
    /// model per row, each with a fresh snapshot. No rows is not an error.
    pub fn all(&mut self, extra_sql: Option<&str>) -> Result<Vec<Model<'c, E>>> {
        let select = self.select_prefix();
        let rows = self.execute(&select, extra_sql.unwrap_or(""), |db, sql| db.query(sql))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut model = self.fresh();
                model.load(row);
                model
            })
            .collect())
    }

    /// Loads the first matching row into this model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no row matches.
    pub fn first_or_fail(&mut self) -> Result<&mut Self> {
        match self.lookup()? {
            Lookup::Found => Ok(self),
            Lookup::Missing => Err(ModelError::NotFound {
                entity: self.descriptor.table.clone(),
            }),
        }
    }

    /// Loads the first matching row into this model; leaves the model
    /// untouched when nothing matches. Other errors propagate.
    pub fn first(&mut self) -> Result<&mut Self> {
        if self.lookup()? == Lookup::Missing {
            debug!(table = %self.descriptor.table, sql = %self.last_query, "lookup matched no row");
        }
        Ok(self)
    }

    /// Loads the row with primary key `key`; untouched when absent.
    pub fn find(&mut self, key: impl Into<Value>) -> Result<&mut Self> {
        self.key_condition(key.into());
        self.first()
    }

    /// Loads the row with primary key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no such row exists.
    pub fn find_or_fail(&mut self, key: impl Into<Value>) -> Result<&mut Self> {
        self.key_condition(key.into());
        self.first_or_fail()
    }

    /// Sets the key condition for a lookup without touching the fields, so
    /// a miss leaves the model as it was.
    fn key_condition(&mut self, key: Value) {
        let literal = quote(self.conn, &key);
        self.clause.reset_to_key(&self.descriptor.primary_key, &literal);
    }

    fn lookup(&mut self) -> Result<Lookup> {
        let select = self.select_prefix();
        match self.execute(&select, "", |db, sql| db.query_first(sql))? {
            Some(row) => {
                self.load(row);
                Ok(Lookup::Found)
            }
            None => Ok(Lookup::Missing),
        }
    }

    /// Assigns every declared column present in `row` and takes a snapshot.
    fn load(&mut self, row: Row) {
        for (column, value) in row {
            if let Some(idx) = self.descriptor.field_index(&column) {
                self.values[idx] = self.descriptor.fields[idx].kind.coerce(value);
            }
        }
        self.snapshot();
    }

    fn snapshot(&mut self) {
        self.original = Some(self.values.clone());
        self.deleted = false;
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Inserts this model and assigns the generated primary key.
    ///
    /// Any primary key already set is cleared first, and any pending
    /// clause is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] if a rule rejects the entity, or
    /// [`ModelError::Persistence`] if the INSERT fails. The model is left
    /// unchanged in both cases.
    pub fn create(&mut self) -> Result<&mut Self> {
        let pk = self.pk_index();
        let previous_key = std::mem::take(&mut self.values[pk]);

        if let Err(err) = self.check(Operation::Create) {
            self.values[pk] = previous_key;
            return Err(err);
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut literals = Vec::with_capacity(self.values.len());
        for (idx, field) in self.descriptor.fields.iter().enumerate() {
            if idx == pk {
                continue;
            }
            columns.push(field.name.as_str());
            literals.push(quote(self.conn, &self.values[idx]));
        }
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.descriptor.table,
            columns.join(","),
            literals.join(",")
        );

        self.clause.reset();
        if let Err(err) = self.execute(&insert, "", |db, sql| db.exec(sql)) {
            self.values[pk] = previous_key;
            return Err(self.persistence_error(Operation::Create, err));
        }

        self.values[pk] = Value::Integer(self.conn.last_insert_rowid());
        self.snapshot();
        Ok(self)
    }

    /// Writes the changed fields of a loaded model back to its row.
    ///
    /// Only fields that differ from the snapshot appear in the `SET` list.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::State`] if the model was never loaded or
    /// created, or if nothing changed; [`ModelError::Validation`] or
    /// [`ModelError::Persistence`] as for [`create`](Self::create).
    pub fn update(&mut self) -> Result<&mut Self> {
        if self.original.is_none() {
            return Err(self.state_error("no snapshot, load or create it before updating"));
        }
        let changed = self.changed_indices();
        if changed.is_empty() {
            return Err(self.state_error("nothing changed since it was loaded"));
        }

        self.check(Operation::Update)?;

        let assignments: Vec<String> = changed
            .iter()
            .map(|&i| {
                format!(
                    "{} = {}",
                    self.descriptor.fields[i].name,
                    quote(self.conn, &self.values[i])
                )
            })
            .collect();
        let update = format!(
            "UPDATE {} SET {}",
            self.descriptor.table,
            assignments.join(", ")
        );

        self.where_primary_key(None);
        if let Err(err) = self.execute(&update, "", |db, sql| db.exec(sql)) {
            return Err(self.persistence_error(Operation::Update, err));
        }

        self.snapshot();
        Ok(self)
    }

    /// Deletes the row with this model's primary key, then clears the key
    /// and the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] if no primary key is set, or
    /// [`ModelError::Persistence`] if the DELETE fails.
    pub fn delete(&mut self) -> Result<&mut Self> {
        self.check(Operation::Delete)?;

        let delete = format!("DELETE FROM {}", self.descriptor.table);
        self.where_primary_key(None);
        if let Err(err) = self.execute(&delete, "", |db, sql| db.exec(sql)) {
            return Err(self.persistence_error(Operation::Delete, err));
        }

        let pk = self.pk_index();
        self.values[pk] = Value::Null;
        self.original = None;
        self.deleted = true;
        Ok(self)
    }

    /// Runs the structural checks and the entity's own rules for `operation`.
    fn check(&self, operation: Operation) -> Result<()> {
        let mut errors = Vec::new();
        if operation != Operation::Create && self.primary_key().is_null() {
            errors.push(format!("No primary key set for {self}"));
        }
        errors.extend(E::validate(self, operation));

        if errors.is_empty() {
            return Ok(());
        }
        warn!(entity = %self, %operation, errors = ?errors, "validation failed");
        Err(ModelError::Validation {
            entity: self.to_string(),
            operation,
            errors,
        })
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Runs `prefix + clause + suffix` through `run`.
    ///
    /// The statement text is recorded as the last query and the clause is
    /// reset whether or not `run` succeeds.
    fn execute<T>(
        &mut self,
        prefix: &str,
        suffix: &str,
        run: impl FnOnce(&dyn Database, &str) -> Result<T>,
    ) -> Result<T> {
        let sql = format!("{prefix}{}", self.clause.render(suffix));
        self.clause.reset();
        debug!(table = %self.descriptor.table, sql = %sql, "executing statement");
        let result = run(self.conn, &sql);
        self.last_query = sql;
        result
    }

    fn select_prefix(&self) -> String {
        format!("SELECT * FROM {}", self.descriptor.table)
    }

    fn pk_index(&self) -> usize {
        // Guaranteed by validate_descriptor at construction.
        self.descriptor.primary_key_index().unwrap_or(0)
    }

    fn state_error(&self, reason: &str) -> ModelError {
        ModelError::State {
            entity: self.to_string(),
            reason: reason.to_string(),
        }
    }

    fn persistence_error(&self, operation: Operation, err: ModelError) -> ModelError {
        warn!(entity = %self, %operation, sql = %self.last_query, error = %err, "write failed");
        ModelError::Persistence {
            entity: self.to_string(),
            operation,
            message: err.to_string(),
        }
    }
}

impl<E: Entity> fmt::Display for Model<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primary_key() {
            Value::Null => write!(f, "{}()", self.descriptor.table),
            key => write!(f, "{}({key})", self.descriptor.table),
        }
    }
}

impl<E: Entity> fmt::Debug for Model<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.descriptor.table)
            .field("values", &self.to_row())
            .field("state", &self.state())
            .field("clause", &self.clause)
            .field("last_query", &self.last_query)
            .finish()
    }
}
