//! SQLite entity mapper.
//!
//! This crate maps rows of a SQLite table onto in-memory entity models built
//! from a [`kiwi_core::EntityDescriptor`]. It supports building WHERE/LIMIT
//! conditions, single and multi-row reads, create/update/delete with
//! validation and mass-assignment guards, dirty tracking against a snapshot,
//! and optional audit stamping.
//!
//! # Architecture
//!
//! The crate is organized into five modules:
//!
//! - **`database`**: the storage boundary, implemented for `rusqlite::Connection`
//! - **`quote`**: rendering values as SQL literals
//! - **`model`**: the query executor and entity mapper
//! - **`audit`**: creation/update actor and timestamp stamping
//! - **`schema`**: `CREATE TABLE` generation for a descriptor
//!
//! # Quick start
//!
//! ```
//! use std::sync::OnceLock;
//!
//! use kiwi_core::{EntityDescriptor, FieldKind};
//! use kiwi_sqlite::{Entity, Model, create_table_sql};
//! use rusqlite::Connection;
//!
//! struct Users;
//!
//! impl Entity for Users {
//!     fn descriptor() -> &'static EntityDescriptor {
//!         static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
//!         DESCRIPTOR.get_or_init(|| {
//!             EntityDescriptor::new("users")
//!                 .field("id", FieldKind::Integer)
//!                 .field("firstname", FieldKind::Text)
//!                 .field("friend_id", FieldKind::Integer)
//!                 .guarded(Vec::<String>::new())
//!         })
//!     }
//! }
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch(&create_table_sql(Users::descriptor()).unwrap()).unwrap();
//!
//! let mut query = Model::<Users>::new(&conn).unwrap();
//! let friends = query
//!     .filter("friend_id = ", 2)
//!     .filter("AND firstname LIKE ", "%ar%")
//!     .all(None)
//!     .unwrap();
//! assert!(friends.is_empty());
//! assert_eq!(
//!     query.last_query(),
//!     "SELECT * FROM users WHERE friend_id = 2 AND firstname LIKE '%ar%'"
//! );
//! ```
//!
//! # Connections
//!
//! Models borrow the connection; the caller opens and closes it. Any number
//! of models may share one connection. Nothing here is thread-safe beyond
//! what the connection itself guarantees.

mod audit;
mod database;
mod error;
mod model;
mod quote;
mod schema;

pub use audit::Audited;
pub use database::Database;
pub use error::{ModelError, Result};
pub use model::{Entity, EntityState, Model};
pub use quote::quote;
pub use schema::{create_table_sql, drop_table_sql};
