//! Core entity types and clause building for the kiwi mapper.
//!
//! This crate defines the storage-independent pieces of the mapper:
//!
//! - [`Value`]: a scalar table cell (null, integer, real, text, bool).
//! - [`EntityDescriptor`]: the table name, primary key, ordered field
//!   schema and guarded set a concrete entity type declares.
//! - [`Row`]: an ordered column → value record.
//! - [`Clause`]: the pending WHERE/LIMIT fragment of the next statement.
//! - [`MapperConfig`]: mapper behavior knobs such as the [`FillPolicy`].
//!
//! Descriptor checks ([`validate_descriptor`]) catch configuration mistakes
//! such as a forgotten guard declaration or an unknown primary key.
//!
//! # Example
//!
//! ```
//! use kiwi_core::*;
//!
//! let users = EntityDescriptor::new("users")
//!     .primary_key("id")
//!     .field("id", FieldKind::Integer)
//!     .field("username", FieldKind::Text)
//!     .field("friend_id", FieldKind::Integer)
//!     .guarded(Vec::<String>::new());
//! assert!(validate_descriptor(&users).is_ok());
//!
//! let mut clause = Clause::new();
//! clause.push_predicate("friend_id = ", "2");
//! assert_eq!(format!("SELECT * FROM {}{clause}", users.table), "SELECT * FROM users WHERE friend_id = 2");
//! ```

mod clause;
mod config;
mod row;
mod types;
mod validate;

pub use clause::{Clause, Cmp, Connective};
pub use config::{FillPolicy, MapperConfig};
pub use row::Row;
pub use types::*;
pub use validate::{DescriptorError, validate_descriptor, validate_identifier};
